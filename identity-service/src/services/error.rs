use service_core::error::AppError;
use thiserror::Error;

use super::gitlab::ProviderError;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{0}")]
    Conflict(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Identity provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The provider user exists but the local records could not be committed.
    #[error("Provider user {gitlab_id} exists without a local account: {source}")]
    Reconciliation {
        gitlab_id: i64,
        source: Box<IdentityError>,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IdentityError {
    pub fn not_found(entity: &'static str) -> Self {
        IdentityError::NotFound { entity }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, IdentityError::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, IdentityError::NotFound { .. })
    }
}

impl From<ProviderError> for IdentityError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(_) => IdentityError::not_found("provider user"),
            ProviderError::Conflict(msg) => IdentityError::Conflict(msg),
            ProviderError::Unavailable(msg) => IdentityError::ProviderUnavailable(msg),
            ProviderError::Rejected { status, message } => IdentityError::Internal(
                anyhow::anyhow!("Identity provider rejected the request ({}): {}", status, message),
            ),
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::NotFound { entity } => {
                AppError::NotFound(anyhow::anyhow!("{} not found", entity))
            }
            IdentityError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            IdentityError::Unauthenticated => AppError::Unauthenticated,
            IdentityError::ProviderUnavailable(msg) => {
                AppError::ProviderUnavailable(anyhow::anyhow!(msg))
            }
            IdentityError::Reconciliation { gitlab_id, .. } => AppError::Reconciliation(
                anyhow::anyhow!(
                    "Provider user {} was created but the local account could not be stored",
                    gitlab_id
                ),
            ),
            IdentityError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            IdentityError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            IdentityError::Internal(e) => AppError::InternalError(e),
        }
    }
}
