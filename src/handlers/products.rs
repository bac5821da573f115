use crate::handlers::common::success_response;
use crate::{errors::ServiceError, services::catalog::ProductListQuery, AppState};
use axum::extract::{Query, State};
use std::sync::Arc;

/// List products, optionally filtered and sorted
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ProductListQuery),
    responses(
        (status = 200, description = "Product listing", body = [crate::services::catalog::ProductResponse])
    ),
    tag = "Catalog"
)]
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProductListQuery>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let products = state.services.catalog.list_products(query).await?;
    Ok(success_response(products))
}
