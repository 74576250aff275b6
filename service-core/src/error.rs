use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Identity provider unavailable: {0}")]
    ProviderUnavailable(anyhow::Error),

    #[error("Reconciliation required: {0}")]
    Reconciliation(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

/// Wire shape of every error the services emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Stable numeric code, one per error category.
    pub error_code: u32,
    /// Short error title.
    pub error_name: String,
    /// Human readable message. Never carries a secret.
    pub error_message: String,
    pub time: DateTime<Utc>,
}

impl AppError {
    /// Stable `(status, code, name)` triple for this error category.
    pub fn category(&self) -> (StatusCode, u32, &'static str) {
        match self {
            AppError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, 2000, "InternalError"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, 2001, "NotFound"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, 2002, "Conflict"),
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, 2003, "Unauthenticated"),
            AppError::ProviderUnavailable(_) => {
                (StatusCode::BAD_GATEWAY, 2004, "ProviderUnavailable")
            }
            AppError::ValidationError(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, 2005, "ValidationFailed")
            }
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, 2005, "ValidationFailed"),
            AppError::Reconciliation(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, 2006, "ReconciliationRequired")
            }
            AppError::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, 2007, "StorageError"),
            AppError::ConfigError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, 2008, "ConfigurationError")
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::ValidationError(err) => err.to_string(),
            AppError::BadRequest(err)
            | AppError::NotFound(err)
            | AppError::Conflict(err) => err.to_string(),
            AppError::Unauthenticated => "Missing, invalid or revoked credential".to_string(),
            AppError::ProviderUnavailable(_) => {
                "The identity provider could not be reached".to_string()
            }
            AppError::Reconciliation(err) => err.to_string(),
            AppError::InternalError(_) => "Internal server error".to_string(),
            AppError::DatabaseError(_) => "Database error".to_string(),
            AppError::ConfigError(_) => "Configuration error".to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, error_name) = self.category();

        if status.is_server_error() {
            tracing::error!(error = %self, error_code, "Request failed");
        } else {
            tracing::debug!(error = %self, error_code, "Request rejected");
        }

        (
            status,
            Json(ErrorResponse {
                error_code,
                error_name: error_name.to_string(),
                error_message: self.public_message(),
                time: Utc::now(),
            }),
        )
            .into_response()
    }
}
