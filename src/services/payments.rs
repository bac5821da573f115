use crate::config::RazorpayConfig;
use crate::errors::ServiceError;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tracing::{instrument, warn};
use utoipa::ToSchema;

type HmacSha256 = Hmac<Sha256>;

/// Remote payment intent returned to the client so it can complete the
/// payment against the provider.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentIntent {
    pub gateway_order_id: String,
    /// Amount in minor currency units (paise)
    pub amount: i64,
    pub currency: String,
    /// Public key id the client hands to the provider's checkout widget
    pub key_id: String,
}

/// Seam to the external payment provider. Intent creation talks to the
/// remote API; signature verification is local crypto against the
/// shared secret and must never trust client-supplied results.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<PaymentIntent, ServiceError>;

    fn verify_signature(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> Result<(), ServiceError>;
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateOrderReply {
    id: String,
    amount: i64,
    currency: String,
}

/// Razorpay implementation. Calls are synchronous within the request,
/// carry an explicit timeout, and are never retried: re-creating an
/// intent can double-charge.
#[derive(Clone)]
pub struct RazorpayGateway {
    client: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    pub fn new(cfg: &RazorpayConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(cfg.timeout_secs))
                .build()
                .expect("reqwest client"),
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            key_id: cfg.key_id.clone(),
            key_secret: cfg.key_secret.clone(),
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    #[instrument(skip(self))]
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<PaymentIntent, ServiceError> {
        let url = format!("{}/v1/orders", self.api_base);
        let body = CreateOrderBody {
            amount: amount_minor,
            currency,
            receipt,
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::GatewayTimeout
                } else {
                    ServiceError::GatewayError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "gateway rejected order creation");
            return Err(ServiceError::GatewayError(format!(
                "provider returned {}",
                status
            )));
        }

        let reply: CreateOrderReply = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("malformed provider reply: {e}")))?;

        Ok(PaymentIntent {
            gateway_order_id: reply.id,
            amount: reply.amount,
            currency: reply.currency,
            key_id: self.key_id.clone(),
        })
    }

    fn verify_signature(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> Result<(), ServiceError> {
        let payload = format!("{}|{}", gateway_order_id, gateway_payment_id);
        let mut mac = HmacSha256::new_from_slice(self.key_secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        if constant_time_eq(&expected, signature) {
            Ok(())
        } else {
            Err(ServiceError::PaymentVerificationFailed)
        }
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}
