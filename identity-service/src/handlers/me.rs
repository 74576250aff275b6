use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::context::CurrentUser;
use crate::dtos::{ChangePasswordRequest, IdentityResponse, MessageResponse};
use crate::models::AccountTokenResponse;
use crate::services::ProviderUser;
use crate::utils::{Password, ValidatedJson};
use crate::AppState;

/// The caller's person, account and (masked) token.
pub async fn get_me(CurrentUser(identity): CurrentUser) -> Json<IdentityResponse> {
    Json(identity.into())
}

pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    ValidatedJson(payload): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .accounts
        .change_password(
            identity.account.id,
            Password::new(payload.current_password),
            Password::new(payload.new_password),
        )
        .await?;

    Ok(Json(MessageResponse {
        message: "Password changed".to_string(),
    }))
}

/// Revoke the token used for this request.
pub async fn revoke_current_token(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<AccountTokenResponse>, AppError> {
    let token = state.accounts.revoke_current(&identity).await?;
    Ok(Json(token.into()))
}

pub async fn get_provider_profile(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<ProviderUser>, AppError> {
    let user = state.accounts.provider_profile(&identity).await?;
    Ok(Json(user))
}
