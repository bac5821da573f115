use crate::handlers::common::{created_response, validate_input};
use crate::{errors::ServiceError, services::users::RegisterInput, AppState};
use axum::extract::{Json, State};
use std::sync::Arc;

/// Create a user account
#[utoipa::path(
    post,
    path = "/api/v1/register",
    request_body = RegisterInput,
    responses(
        (status = 201, description = "User created", body = crate::services::users::UserResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let user = state.services.users.register(payload).await?;
    Ok(created_response(user))
}
