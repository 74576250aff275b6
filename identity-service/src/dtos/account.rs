use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::models::{AccountResponse, AccountTokenResponse, PersonResponse};
use crate::services::{ProvisionedIdentity, ResolvedIdentity};

#[derive(Deserialize, Validate)]
pub struct RegisterAccountRequest {
    #[validate(length(min = 2, max = 255, message = "Username must be 2-255 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    pub name: Option<String>,
}

impl fmt::Debug for RegisterAccountRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterAccountRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"***")
            .field("name", &self.name)
            .finish()
    }
}

#[derive(Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

impl fmt::Debug for ChangePasswordRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChangePasswordRequest { .. }")
    }
}

/// The caller's identity as returned by `GET /api/v1/me`.
#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityResponse {
    pub person: PersonResponse,
    pub account: AccountResponse,
    pub token: AccountTokenResponse,
}

impl From<ResolvedIdentity> for IdentityResponse {
    fn from(identity: ResolvedIdentity) -> Self {
        Self {
            person: identity.person.into(),
            account: identity.account.into(),
            token: identity.token.into(),
        }
    }
}

/// Registration result. `private_token` is the only place a live secret is
/// ever returned, and only once.
#[derive(Debug, Serialize, Deserialize)]
pub struct IssuedTokenResponse {
    pub person: PersonResponse,
    pub account: AccountResponse,
    pub token: AccountTokenResponse,
    pub private_token: String,
}

impl From<ProvisionedIdentity> for IssuedTokenResponse {
    fn from(identity: ProvisionedIdentity) -> Self {
        let private_token = identity.token.token.expose().to_string();
        Self {
            person: identity.person.into(),
            account: identity.account.into(),
            token: identity.token.into(),
            private_token,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
