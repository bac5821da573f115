use crate::handlers::common::{no_content_response, success_response, validate_input};
use crate::{
    auth::AuthUser, errors::ServiceError, services::cart::AddItemInput, AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for cart endpoints
pub fn carts_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(view_cart))
        .route("/add", post(add_to_cart))
        .route("/update/:item_id", put(update_cart_item))
        .route("/remove/:item_id", delete(remove_cart_item))
}

/// View the caller's cart, creating it lazily
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "The caller's cart", body = crate::services::cart::CartResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer" = [])),
    tag = "Cart"
)]
pub async fn view_cart(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let cart = state.services.cart.get_or_create_cart(user.user_id).await?;
    Ok(success_response(cart))
}

/// Add a product to the caller's cart
#[utoipa::path(
    post,
    path = "/api/v1/cart/add",
    request_body = AddItemRequest,
    responses(
        (status = 200, description = "Updated cart", body = crate::services::cart::CartResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let input = AddItemInput {
        product_id: payload.product_id,
        quantity: payload.quantity,
    };

    let cart = state.services.cart.add_item(user.user_id, input).await?;
    Ok(success_response(cart))
}

/// Overwrite a cart line's quantity
#[utoipa::path(
    put,
    path = "/api/v1/cart/update/{item_id}",
    params(("item_id" = Uuid, Path, description = "Cart item id")),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "Updated cart", body = crate::services::cart::CartResponse),
        (status = 404, description = "No such item in the caller's cart", body = crate::errors::ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let cart = state
        .services
        .cart
        .update_item(user.user_id, item_id, payload.quantity)
        .await?;
    Ok(success_response(cart))
}

/// Delete a cart line
#[utoipa::path(
    delete,
    path = "/api/v1/cart/remove/{item_id}",
    params(("item_id" = Uuid, Path, description = "Cart item id")),
    responses(
        (status = 204, description = "Line removed"),
        (status = 404, description = "No such item in the caller's cart", body = crate::errors::ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Cart"
)]
pub async fn remove_cart_item(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    state
        .services
        .cart
        .remove_item(user.user_id, item_id)
        .await?;
    Ok(no_content_response())
}

// Request DTOs

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    /// Defaults to 1 when omitted
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateQuantityRequest {
    #[validate(range(min = 1))]
    pub quantity: i32,
}
