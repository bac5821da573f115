use crate::handlers::common::created_response;
use crate::{
    auth::AuthUser, errors::ServiceError, services::checkout::VerifyPaymentInput, AppState,
};
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use std::sync::Arc;

/// Creates the router for the Razorpay checkout flow
pub fn razorpay_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create-order", post(create_gateway_order))
        .route("/verify-payment", post(verify_payment))
}

/// Create a remote payment intent for the caller's cart
#[utoipa::path(
    post,
    path = "/api/v1/razorpay/create-order",
    responses(
        (status = 201, description = "Remote intent created", body = crate::services::payments::PaymentIntent),
        (status = 400, description = "Cart is empty", body = crate::errors::ErrorResponse),
        (status = 402, description = "Gateway failure", body = crate::errors::ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Payments"
)]
pub async fn create_gateway_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let intent = state
        .services
        .checkout
        .create_gateway_order(user.user_id)
        .await?;
    Ok(created_response(intent))
}

/// Verify a payment confirmation and place the order
#[utoipa::path(
    post,
    path = "/api/v1/razorpay/verify-payment",
    request_body = VerifyPaymentInput,
    responses(
        (status = 201, description = "Order placed", body = crate::services::orders::OrderResponse),
        (status = 400, description = "Verification failed or cart empty", body = crate::errors::ErrorResponse),
        (status = 409, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Payments"
)]
pub async fn verify_payment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<VerifyPaymentInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let order = state
        .services
        .checkout
        .verify_and_place_order(user.user_id, payload)
        .await?;
    Ok(created_response(order))
}
