use axum::{extract::State, Json};
use serde_json::Value;
use service_core::error::AppError;

use crate::AppState;

/// Service health check
pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Identity store health check failed");
        AppError::from(e)
    })?;

    let mode = if state.config.is_degraded() {
        "degraded"
    } else {
        "live"
    };

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "mode": mode,
        "checks": {
            "store": "up"
        }
    })))
}
