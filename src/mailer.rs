use crate::config::MailConfig;
use crate::errors::ServiceError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, instrument};

/// Outbound email message.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mail transport seam. The delivery mechanism is a collaborator; the
/// notification worker only depends on this trait.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> Result<(), ServiceError>;
}

/// Delivers mail by POSTing JSON to an HTTP relay endpoint.
#[derive(Clone)]
pub struct HttpRelayMailer {
    client: reqwest::Client,
    relay_url: String,
}

impl HttpRelayMailer {
    pub fn new(relay_url: String, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .expect("reqwest client"),
            relay_url,
        }
    }
}

#[async_trait]
impl Mailer for HttpRelayMailer {
    #[instrument(skip(self, email), fields(to = %email.to, subject = %email.subject))]
    async fn send(&self, email: OutboundEmail) -> Result<(), ServiceError> {
        let response = self
            .client
            .post(&self.relay_url)
            .json(&email)
            .send()
            .await
            .map_err(|e| ServiceError::MailError(e.to_string()))?;

        response
            .error_for_status()
            .map_err(|e| ServiceError::MailError(e.to_string()))?;
        Ok(())
    }
}

/// Logs instead of sending; used when no relay is configured.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutboundEmail) -> Result<(), ServiceError> {
        info!(to = %email.to, subject = %email.subject, "mail relay not configured; logging instead");
        Ok(())
    }
}

/// Pick a transport from configuration.
pub fn mailer_from_config(cfg: &MailConfig) -> std::sync::Arc<dyn Mailer> {
    match &cfg.relay_url {
        Some(url) => std::sync::Arc::new(HttpRelayMailer::new(url.clone(), cfg.timeout_secs)),
        None => std::sync::Arc::new(LogMailer),
    }
}
