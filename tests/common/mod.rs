#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use sha2::Sha256;
use storefront_api::{
    auth::AuthService,
    config::AppConfig,
    db,
    entities::{category, product, user, UserModel},
    errors::ServiceError,
    events::{self, EventSender},
    handlers::AppServices,
    mailer::{Mailer, OutboundEmail},
    message_queue::{InMemoryMessageQueue, MessageQueue},
    services::{PaymentGateway, RazorpayGateway},
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";
pub const TEST_RAZORPAY_KEY_ID: &str = "rzp_test_key";
pub const TEST_RAZORPAY_SECRET: &str = "rzp_test_secret";

/// Mail transport that records what it was asked to send.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    pub sent: Arc<Mutex<Vec<OutboundEmail>>>,
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutboundEmail) -> Result<(), ServiceError> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

/// Helper harness spinning up application state backed by a throwaway
/// SQLite database.
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub mailer: RecordingMailer,
    _db_file: tempfile::NamedTempFile,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a test application. The gateway is a real Razorpay
    /// adapter pointed at `gateway_base` (a wiremock server for payment
    /// tests; an unroutable port otherwise).
    pub async fn with_gateway_base(gateway_base: &str) -> Self {
        let db_file = tempfile::NamedTempFile::new().expect("temp db file");
        let db_path = db_file.path().to_str().expect("utf-8 path").to_string();

        let mut cfg = AppConfig::new(
            format!("sqlite://{db_path}?mode=rwc"),
            TEST_JWT_SECRET.to_string(),
            "127.0.0.1".to_string(),
            0,
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.razorpay.key_id = TEST_RAZORPAY_KEY_ID.to_string();
        cfg.razorpay.key_secret = TEST_RAZORPAY_SECRET.to_string();
        cfg.razorpay.api_base = gateway_base.to_string();
        cfg.razorpay.timeout_secs = 2;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("connect");
        db::run_migrations(&pool).await.expect("migrate");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth = Arc::new(AuthService::new(cfg.jwt_secret.clone(), cfg.jwt_expiration));
        let gateway: Arc<dyn PaymentGateway> = Arc::new(RazorpayGateway::new(&cfg.razorpay));
        let queue: Arc<dyn MessageQueue> = Arc::new(InMemoryMessageQueue::new());
        let mailer = RecordingMailer::default();

        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            auth.clone(),
            gateway,
            queue.clone(),
            Arc::new(mailer.clone()),
            &cfg,
        );

        let state = Arc::new(AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            auth,
            services,
            queue,
        });

        Self {
            router: storefront_api::app_router(state.clone()),
            state,
            mailer,
            _db_file: db_file,
            _event_task: event_task,
        }
    }

    pub async fn new() -> Self {
        // Port 9 (discard) refuses connections, so unmocked gateway
        // calls fail fast instead of hanging.
        Self::with_gateway_base("http://127.0.0.1:9").await
    }

    /// Insert a user directly and hand back the model.
    pub async fn create_user(&self, email: &str, is_staff: bool) -> UserModel {
        let now = Utc::now();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            full_name: Set("Test Shopper".to_string()),
            password_hash: Set("unused-hash".to_string()),
            is_staff: Set(is_staff),
            is_superuser: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };
        model.insert(&*self.state.db).await.expect("insert user")
    }

    pub fn token_for(&self, user: &UserModel) -> String {
        self.state.auth.issue_token(user).expect("issue token")
    }

    pub async fn create_category(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let model = category::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            created_at: Set(Utc::now()),
        };
        model.insert(&*self.state.db).await.expect("insert category");
        id
    }

    pub async fn create_product(
        &self,
        name: &str,
        price: Decimal,
        stock: i32,
        category_id: Uuid,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            description: Set(format!("{name} description")),
            price: Set(price),
            stock: Set(stock),
            image_url: Set(None),
            category_id: Set(category_id),
            created_at: Set(now),
            updated_at: Set(now),
        };
        model.insert(&*self.state.db).await.expect("insert product");
        id
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }

        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router call");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, path, token, None).await
    }

    pub async fn post_json(
        &self,
        path: &str,
        token: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        self.request(Method::POST, path, token, Some(body)).await
    }

    pub async fn put_json(
        &self,
        path: &str,
        token: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        self.request(Method::PUT, path, token, Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, path, token, None).await
    }
}

/// Sign a (gateway order, payment) pair the way the provider would.
pub fn sign_payment(gateway_order_id: &str, payment_id: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(TEST_RAZORPAY_SECRET.as_bytes()).unwrap();
    mac.update(format!("{gateway_order_id}|{payment_id}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
