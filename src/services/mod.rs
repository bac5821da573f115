pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod users;

pub use cart::CartService;
pub use catalog::CatalogService;
pub use checkout::CheckoutService;
pub use notifications::NotificationService;
pub use orders::OrderService;
pub use payments::{PaymentGateway, RazorpayGateway};
pub use users::UserService;
