use identity_service::{
    build_router,
    config::IdentityConfig,
    db,
    services::{Database, GitlabClient, IdentityProvider, IdentityStore, MemoryStore, MockIdentityProvider},
    AppState,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::observability::init_tracing;
use service_core::redaction::SecretRedactor;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = IdentityConfig::from_env()?;

    // Secrets known up front are masked before the first log line is written
    let redactor = SecretRedactor::default();
    redactor.register(config.gitlab.admin_token.expose_secret());
    redactor.register(config.gitlab.mock_user_token.expose_secret());

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
        redactor.clone(),
    )?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting identity service"
    );

    if config.is_degraded() {
        tracing::warn!(
            database = config.database.is_some(),
            provider = config.gitlab.root_url.is_some(),
            "Running in degraded mode with in-process stand-ins"
        );
    }

    let store: Arc<dyn IdentityStore> = match &config.database {
        Some(db_config) => {
            let pool = db::create_pool(db_config)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
            db::run_migrations(&pool)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
            Arc::new(Database::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, identities are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let provider: Arc<dyn IdentityProvider> = match &config.gitlab.root_url {
        Some(root_url) => {
            tracing::info!(root_url = %root_url, "Using GitLab identity provider");
            Arc::new(GitlabClient::new(&config.gitlab)?)
        }
        None => {
            tracing::warn!("GITLAB_ROOT_URL not set, using mock identity provider");
            Arc::new(MockIdentityProvider::new(config.gitlab.mock_user_token.clone()))
        }
    };

    let state = AppState::new(config.clone(), store, provider, redactor);
    let app = build_router(state).await?;

    let addr: SocketAddr = config
        .common
        .bind_address()
        .parse()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid bind address: {}", e)))?;

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
