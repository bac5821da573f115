use crate::handlers::common::{created_response, success_response};
use crate::{
    auth::AuthUser,
    entities::OrderStatus,
    errors::ServiceError,
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Creates the router for the caller's order endpoints
pub fn orders_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_own_orders))
        .route("/create", post(place_order))
}

/// Creates the router for the admin order workflow
pub fn admin_orders_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(admin_list_orders))
        .route("/:id/update", put(admin_update_status).patch(admin_update_status))
}

/// Checkout the caller's cart without a payment step
#[utoipa::path(
    post,
    path = "/api/v1/orders/create",
    responses(
        (status = 201, description = "Order placed", body = crate::services::orders::OrderResponse),
        (status = 400, description = "Cart is empty", body = crate::errors::ErrorResponse),
        (status = 409, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Orders"
)]
pub async fn place_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let order = state.services.checkout.place_order(user.user_id).await?;
    Ok(created_response(order))
}

/// The caller's orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    responses(
        (status = 200, description = "Order history", body = [crate::services::orders::OrderResponse])
    ),
    security(("bearer" = [])),
    tag = "Orders"
)]
pub async fn list_own_orders(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let orders = state.services.orders.list_for_user(user.user_id).await?;
    Ok(success_response(orders))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AdminOrderListQuery {
    /// Case-insensitive status filter
    pub status: Option<String>,
}

/// All orders, staff only
#[utoipa::path(
    get,
    path = "/api/v1/admin/orders",
    params(AdminOrderListQuery),
    responses(
        (status = 200, description = "All orders", body = [crate::services::orders::OrderResponse]),
        (status = 403, description = "Staff privileges required", body = crate::errors::ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Admin"
)]
pub async fn admin_list_orders(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<AdminOrderListQuery>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    user.require_staff()?;

    let orders = state
        .services
        .orders
        .list_all(query.status.as_deref())
        .await?;
    Ok(success_response(orders))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

/// Update an order's status, staff only
#[utoipa::path(
    put,
    path = "/api/v1/admin/orders/{id}/update",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Updated order", body = crate::services::orders::OrderResponse),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse),
        (status = 403, description = "Staff privileges required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Admin"
)]
pub async fn admin_update_status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    user.require_staff()?;

    let status = OrderStatus::parse(&payload.status).ok_or_else(|| {
        ServiceError::ValidationError(format!("unknown order status '{}'", payload.status))
    })?;

    let order = state.services.orders.update_status(id, status).await?;
    Ok(success_response(order))
}
