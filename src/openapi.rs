use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::users::register,
        crate::handlers::products::list_products,
        crate::handlers::carts::view_cart,
        crate::handlers::carts::add_to_cart,
        crate::handlers::carts::update_cart_item,
        crate::handlers::carts::remove_cart_item,
        crate::handlers::orders::place_order,
        crate::handlers::orders::list_own_orders,
        crate::handlers::orders::admin_list_orders,
        crate::handlers::orders::admin_update_status,
        crate::handlers::payments::create_gateway_order,
        crate::handlers::payments::verify_payment,
        crate::health::health_check,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::services::users::RegisterInput,
        crate::services::users::UserResponse,
        crate::services::catalog::CategoryResponse,
        crate::services::catalog::ProductResponse,
        crate::services::cart::CartItemResponse,
        crate::services::cart::CartResponse,
        crate::services::orders::OrderItemResponse,
        crate::services::orders::OrderResponse,
        crate::services::payments::PaymentIntent,
        crate::services::checkout::VerifyPaymentInput,
        crate::handlers::carts::AddItemRequest,
        crate::handlers::carts::UpdateQuantityRequest,
        crate::handlers::orders::UpdateOrderStatusRequest,
        crate::health::HealthStatus,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Users", description = "Account registration"),
        (name = "Catalog", description = "Product listing"),
        (name = "Cart", description = "Per-user shopping cart"),
        (name = "Orders", description = "Checkout and order history"),
        (name = "Payments", description = "Razorpay checkout flow"),
        (name = "Admin", description = "Order status workflow"),
        (name = "Health", description = "Probes")
    )
)]
pub struct ApiDoc;
