pub mod config;
pub mod context;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    http::Request,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use service_core::middleware::{
    redaction::redact_error_response_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use service_core::redaction::SecretRedactor;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::IdentityConfig;
use crate::services::{
    AccountService, CurrentIdentity, IdentityProvider, IdentityStore, ProvisioningService,
    StoreIdentityResolver,
};
use service_core::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub config: IdentityConfig,
    pub store: Arc<dyn IdentityStore>,
    pub provider: Arc<dyn IdentityProvider>,
    pub resolver: Arc<dyn CurrentIdentity>,
    pub provisioning: ProvisioningService,
    pub accounts: AccountService,
    pub redactor: SecretRedactor,
}

impl AppState {
    /// Wire services over `store` and `provider`, resolving callers from the
    /// store.
    pub fn new(
        config: IdentityConfig,
        store: Arc<dyn IdentityStore>,
        provider: Arc<dyn IdentityProvider>,
        redactor: SecretRedactor,
    ) -> Self {
        let resolver = Arc::new(StoreIdentityResolver::new(
            store.clone(),
            redactor.clone(),
        ));
        Self::with_resolver(config, store, provider, resolver, redactor)
    }

    pub fn with_resolver(
        config: IdentityConfig,
        store: Arc<dyn IdentityStore>,
        provider: Arc<dyn IdentityProvider>,
        resolver: Arc<dyn CurrentIdentity>,
        redactor: SecretRedactor,
    ) -> Self {
        let provisioning = ProvisioningService::new(
            store.clone(),
            provider.clone(),
            redactor.clone(),
            &config.gitlab.mock_user_token,
            config.gitlab.token_name.clone(),
        );
        let accounts = AccountService::new(store.clone(), provider.clone(), redactor.clone());

        Self {
            config,
            store,
            provider,
            resolver,
            provisioning,
            accounts,
            redactor,
        }
    }
}

impl AsRef<SecretRedactor> for AppState {
    fn as_ref(&self) -> &SecretRedactor {
        &self.redactor
    }
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let api = Router::new()
        .route("/api/v1/accounts", post(handlers::register_account))
        .route("/api/v1/me", get(handlers::get_me))
        .route("/api/v1/me/password", post(handlers::change_password))
        .route("/api/v1/me/token", delete(handlers::revoke_current_token))
        .route("/api/v1/me/provider", get(handlers::get_provider_profile));

    let app = Router::new()
        .route("/health", get(handlers::health_check))
        .merge(api)
        .with_state(state.clone())
        // Mask secrets in error bodies and strip credential headers
        .layer(from_fn_with_state(
            state.clone(),
            redact_error_response_middleware::<AppState>,
        ))
        // Add tracing layer
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    path = %request.uri().path(),
                    version = ?request.version(),
                )
            }),
        )
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware));

    Ok(app)
}
