use axum::{extract::State, http::StatusCode, Json};
use service_core::error::AppError;

use crate::dtos::{IssuedTokenResponse, RegisterAccountRequest};
use crate::utils::ValidatedJson;
use crate::AppState;

/// Register an account at the identity provider and locally.
///
/// The response carries the provider-issued token in clear, exactly once.
pub async fn register_account(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterAccountRequest>,
) -> Result<(StatusCode, Json<IssuedTokenResponse>), AppError> {
    let identity = state.provisioning.register_account(payload).await?;
    Ok((StatusCode::CREATED, Json(identity.into())))
}
