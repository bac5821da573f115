pub mod carts;
pub mod common;
pub mod orders;
pub mod payments;
pub mod products;
pub mod users;

use crate::{
    auth::AuthService,
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    mailer::Mailer,
    message_queue::MessageQueue,
    services,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates the business logic used by HTTP
/// handlers.
#[derive(Clone)]
pub struct AppServices {
    pub users: Arc<services::UserService>,
    pub catalog: Arc<services::CatalogService>,
    pub cart: Arc<services::CartService>,
    pub checkout: Arc<services::CheckoutService>,
    pub orders: Arc<services::OrderService>,
    pub notifications: Arc<services::NotificationService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        auth: Arc<AuthService>,
        gateway: Arc<dyn services::PaymentGateway>,
        queue: Arc<dyn MessageQueue>,
        mailer: Arc<dyn Mailer>,
        cfg: &AppConfig,
    ) -> Self {
        Self {
            users: Arc::new(services::UserService::new(
                db.clone(),
                auth,
                event_sender.clone(),
            )),
            catalog: Arc::new(services::CatalogService::new(db.clone())),
            cart: Arc::new(services::CartService::new(db.clone(), event_sender.clone())),
            checkout: Arc::new(services::CheckoutService::new(
                db.clone(),
                event_sender.clone(),
                gateway,
                queue,
                cfg.razorpay.currency.clone(),
            )),
            orders: Arc::new(services::OrderService::new(db.clone(), event_sender)),
            notifications: Arc::new(services::NotificationService::new(
                db,
                mailer,
                cfg.mail.from_address.clone(),
            )),
        }
    }
}

/// Compose the versioned API surface.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(users::register))
        .route("/products", get(products::list_products))
        .nest("/cart", carts::carts_routes())
        .nest("/orders", orders::orders_routes())
        .nest("/razorpay", payments::razorpay_routes())
        .nest("/admin/orders", orders::admin_orders_routes())
}
