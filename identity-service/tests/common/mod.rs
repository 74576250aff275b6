//! Shared setup for identity-service integration tests.
//!
//! Everything runs in-process: the memory store, the mock identity provider
//! and the router driven through `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use identity_service::{
    build_router,
    config::{Environment, GitlabConfig, IdentityConfig},
    services::{
        IdentityProvider, IdentityStore, MemoryStore, MockIdentityProvider, ProvisioningService,
    },
    AppState,
};
use secrecy::Secret;
use serde_json::Value;
use service_core::redaction::SecretRedactor;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const MOCK_USER_TOKEN: &str = "mock-private-user-token";
pub const TOKEN_NAME: &str = "identity-service-test";
pub const PASSWORD: &str = "password";

pub fn test_config() -> IdentityConfig {
    IdentityConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "identity-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        database: None,
        gitlab: GitlabConfig {
            root_url: None,
            admin_token: Secret::new(String::new()),
            mock_user_token: Secret::new(MOCK_USER_TOKEN.to_string()),
            token_name: TOKEN_NAME.to_string(),
            timeout_seconds: 5,
        },
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub provider: Arc<MockIdentityProvider>,
    pub redactor: SecretRedactor,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(MockIdentityProvider::new(Secret::new(
            MOCK_USER_TOKEN.to_string(),
        )));
        Self::over(store, provider).await
    }

    /// A new process over the same persisted state: fresh redactor, same
    /// store and provider.
    pub async fn restart(&self) -> Self {
        Self::over(self.store.clone(), self.provider.clone()).await
    }

    async fn over(store: Arc<MemoryStore>, provider: Arc<MockIdentityProvider>) -> Self {
        let redactor = SecretRedactor::default();

        let state = AppState::new(
            test_config(),
            store.clone() as Arc<dyn IdentityStore>,
            provider.clone() as Arc<dyn IdentityProvider>,
            redactor.clone(),
        );
        let router = build_router(state.clone())
            .await
            .expect("Failed to build router");

        Self {
            state,
            router,
            store,
            provider,
            redactor,
        }
    }

    pub fn provisioning(&self) -> &ProvisioningService {
        &self.state.provisioning
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request")
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header("PRIVATE-TOKEN", token);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn send_json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("PRIVATE-TOKEN", token);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}

pub async fn body_json(response: Response) -> Value {
    let text = body_text(response).await;
    serde_json::from_str(&text).expect("Body is not JSON")
}

pub fn assert_status(response: &Response, status: StatusCode) {
    assert_eq!(response.status(), status, "unexpected status");
}
