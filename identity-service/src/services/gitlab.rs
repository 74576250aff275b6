//! Identity provider client.
//!
//! Talks to a GitLab-compatible admin API: user lookup, user creation and
//! impersonation-token minting. [`GitlabClient`] is the live reqwest-backed
//! implementation, [`MockIdentityProvider`] the deterministic stand-in used
//! in degraded mode and in tests.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

use service_core::redaction::PRIVATE_TOKEN_HEADER;

use crate::config::GitlabConfig;
use crate::models::TokenSecret;
use crate::utils::Password;


#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider resource not found: {0}")]
    NotFound(String),

    #[error("Provider identity already exists: {0}")]
    Conflict(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// A user as the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderUser {
    pub id: i64,
    pub name: String,
    pub username: String,
    /// Only visible to administrators; empty otherwise.
    #[serde(default)]
    pub email: String,
    /// Lifecycle state, e.g. `active` or `blocked`.
    pub state: String,
}

impl ProviderUser {
    pub fn is_active(&self) -> bool {
        self.state == "active"
    }
}

/// A personal access token minted by the provider. The secret is only
/// returned once, at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderToken {
    pub id: i64,
    pub token: TokenSecret,
    #[serde(default)]
    pub revoked: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    pub name: String,
}

fn default_true() -> bool {
    true
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Look a user up by numeric id or username.
    async fn lookup_user(&self, identifier: &str) -> Result<ProviderUser, ProviderError>;

    /// Create a user as administrator. Not idempotent: never retry on error
    /// without first checking for [`ProviderError::Conflict`].
    async fn admin_create_user(
        &self,
        name: &str,
        username: &str,
        email: &str,
        password: &Password,
    ) -> Result<ProviderUser, ProviderError>;

    async fn admin_create_user_token(
        &self,
        provider_user_id: i64,
        token_name: &str,
    ) -> Result<ProviderToken, ProviderError>;
}

#[derive(Debug, Serialize)]
struct CreateUserRequest<'a> {
    name: &'a str,
    username: &'a str,
    email: &'a str,
    password: &'a str,
    skip_confirmation: bool,
}

#[derive(Debug, Serialize)]
struct CreateTokenRequest<'a> {
    name: &'a str,
    scopes: &'a [&'a str],
}

/// GitLab error bodies come as `{"message": ...}` or `{"error": ...}`, with
/// `message` sometimes being an object of field errors.
#[derive(Debug, Deserialize)]
struct GitlabErrorBody {
    message: Option<serde_json::Value>,
    error: Option<String>,
}

/// Live client for the GitLab admin API.
#[derive(Clone)]
pub struct GitlabClient {
    client: Client,
    root_url: String,
    admin_token: Secret<String>,
}

impl GitlabClient {
    pub fn new(config: &GitlabConfig) -> Result<Self, anyhow::Error> {
        let root_url = config
            .root_url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("GITLAB_ROOT_URL is not configured"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        tracing::info!(root_url = %root_url, "GitLab client configured");

        Ok(Self {
            client,
            root_url: root_url.trim_end_matches('/').to_string(),
            admin_token: config.admin_token.clone(),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v4{}", self.root_url, path)
    }

    async fn get_user_by_id(&self, id: i64) -> Result<ProviderUser, ProviderError> {
        let response = self
            .client
            .get(self.api_url(&format!("/users/{}", id)))
            .header(PRIVATE_TOKEN_HEADER, self.admin_token.expose_secret())
            .send()
            .await
            .map_err(transport_error)?;

        decode(response).await
    }

    async fn get_user_by_username(&self, username: &str) -> Result<ProviderUser, ProviderError> {
        let response = self
            .client
            .get(self.api_url("/users"))
            .query(&[("username", username)])
            .header(PRIVATE_TOKEN_HEADER, self.admin_token.expose_secret())
            .send()
            .await
            .map_err(transport_error)?;

        let users: Vec<ProviderUser> = decode(response).await?;
        users
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::NotFound(format!("user '{}'", username)))
    }
}

#[async_trait]
impl IdentityProvider for GitlabClient {
    #[instrument(skip(self))]
    async fn lookup_user(&self, identifier: &str) -> Result<ProviderUser, ProviderError> {
        match identifier.parse::<i64>() {
            Ok(id) => self.get_user_by_id(id).await,
            Err(_) => self.get_user_by_username(identifier).await,
        }
    }

    #[instrument(skip(self, password, email))]
    async fn admin_create_user(
        &self,
        name: &str,
        username: &str,
        email: &str,
        password: &Password,
    ) -> Result<ProviderUser, ProviderError> {
        let request = CreateUserRequest {
            name,
            username,
            email,
            password: password.as_str(),
            skip_confirmation: true,
        };

        let response = self
            .client
            .post(self.api_url("/users"))
            .header(PRIVATE_TOKEN_HEADER, self.admin_token.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let user: ProviderUser = decode(response).await?;
        tracing::info!(gitlab_id = user.id, username = %user.username, "Provider user created");
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn admin_create_user_token(
        &self,
        provider_user_id: i64,
        token_name: &str,
    ) -> Result<ProviderToken, ProviderError> {
        let request = CreateTokenRequest {
            name: token_name,
            scopes: &["api"],
        };

        let response = self
            .client
            .post(self.api_url(&format!(
                "/users/{}/impersonation_tokens",
                provider_user_id
            )))
            .header(PRIVATE_TOKEN_HEADER, self.admin_token.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let token: ProviderToken = decode(response).await?;
        tracing::info!(
            gitlab_id = provider_user_id,
            token_id = token.id,
            "Provider token issued"
        );
        Ok(token)
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        tracing::warn!(error = %e, "Identity provider timed out");
        ProviderError::Unavailable(format!("request timed out: {}", e))
    } else {
        tracing::warn!(error = %e, "Identity provider unreachable");
        ProviderError::Unavailable(e.to_string())
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;

    if status.is_success() {
        return serde_json::from_str(&body).map_err(|e| {
            tracing::error!(status = %status, error = %e, "Unreadable identity provider response");
            ProviderError::Unavailable(format!("unreadable provider response: {}", e))
        });
    }

    let message = error_message(&body);
    tracing::warn!(status = %status, message = %message, "Identity provider returned an error");

    Err(match status {
        StatusCode::NOT_FOUND => ProviderError::NotFound(message),
        StatusCode::CONFLICT => ProviderError::Conflict(message),
        s if s.is_server_error()
            || s == StatusCode::TOO_MANY_REQUESTS
            || s == StatusCode::REQUEST_TIMEOUT =>
        {
            ProviderError::Unavailable(format!("{}: {}", s, message))
        }
        s => ProviderError::Rejected {
            status: s.as_u16(),
            message,
        },
    })
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<GitlabErrorBody>(body) {
        Ok(GitlabErrorBody {
            message: Some(serde_json::Value::String(msg)),
            ..
        }) => msg,
        Ok(GitlabErrorBody {
            message: Some(other),
            ..
        }) => other.to_string(),
        Ok(GitlabErrorBody {
            error: Some(err), ..
        }) => err,
        _ => body.chars().take(200).collect(),
    }
}

const CANNED_USER_ID: i64 = 1;

/// Deterministic stand-in for the provider.
///
/// Before any user is created every lookup answers with the canned
/// `mock_user` (id 1). Tokens minted for the canned user carry the configured
/// mock secret; created users start at id 2 and get unique
/// `mock-issued-token-<user>-<n>` secrets.
pub struct MockIdentityProvider {
    mock_user_token: Secret<String>,
    state: Mutex<MockProviderState>,
}

#[derive(Default)]
struct MockProviderState {
    users: Vec<ProviderUser>,
    issued_tokens: i64,
    unavailable: bool,
}

impl MockIdentityProvider {
    pub fn new(mock_user_token: Secret<String>) -> Self {
        Self {
            mock_user_token,
            state: Mutex::new(MockProviderState::default()),
        }
    }

    pub fn canned_user() -> ProviderUser {
        ProviderUser {
            id: CANNED_USER_ID,
            name: "Mock Gitlab User".to_string(),
            username: "mock_user".to_string(),
            email: "mock@example.com".to_string(),
            state: "active".to_string(),
        }
    }

    /// Make every following call fail with [`ProviderError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) -> Result<(), anyhow::Error> {
        self.lock()?.unavailable = unavailable;
        Ok(())
    }

    pub fn created_users(&self) -> Result<Vec<ProviderUser>, anyhow::Error> {
        Ok(self.lock()?.users.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MockProviderState>, anyhow::Error> {
        self.state
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock provider mutex poisoned: {}", e))
    }

    fn guarded(&self) -> Result<std::sync::MutexGuard<'_, MockProviderState>, ProviderError> {
        let guard = self
            .lock()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        if guard.unavailable {
            return Err(ProviderError::Unavailable(
                "mock provider switched off".to_string(),
            ));
        }
        Ok(guard)
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn lookup_user(&self, identifier: &str) -> Result<ProviderUser, ProviderError> {
        let state = self.guarded()?;
        if state.users.is_empty() {
            return Ok(Self::canned_user());
        }
        state
            .users
            .iter()
            .find(|u| u.id.to_string() == identifier || u.username == identifier)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("user '{}'", identifier)))
    }

    async fn admin_create_user(
        &self,
        name: &str,
        username: &str,
        email: &str,
        _password: &Password,
    ) -> Result<ProviderUser, ProviderError> {
        let mut state = self.guarded()?;
        if state
            .users
            .iter()
            .any(|u| u.username == username || u.email.eq_ignore_ascii_case(email))
        {
            return Err(ProviderError::Conflict(
                "Username or email has already been taken".to_string(),
            ));
        }

        let user = ProviderUser {
            id: state.users.len() as i64 + CANNED_USER_ID + 1,
            name: name.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            state: "active".to_string(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn admin_create_user_token(
        &self,
        provider_user_id: i64,
        token_name: &str,
    ) -> Result<ProviderToken, ProviderError> {
        let mut state = self.guarded()?;
        let known = provider_user_id == CANNED_USER_ID
            || state.users.iter().any(|u| u.id == provider_user_id);
        if !known {
            return Err(ProviderError::NotFound(format!(
                "user {}",
                provider_user_id
            )));
        }

        state.issued_tokens += 1;
        let secret = if provider_user_id == CANNED_USER_ID {
            self.mock_user_token.expose_secret().clone()
        } else {
            format!(
                "mock-issued-token-{:04}-{:04}",
                provider_user_id, state.issued_tokens
            )
        };

        Ok(ProviderToken {
            id: state.issued_tokens,
            token: TokenSecret::new(secret),
            revoked: false,
            active: true,
            name: token_name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock() -> MockIdentityProvider {
        MockIdentityProvider::new(Secret::new("mock-token-12345".to_string()))
    }

    #[tokio::test]
    async fn canned_user_answers_any_lookup_until_users_exist() {
        let provider = mock();
        let user = provider.lookup_user("anyone").await.unwrap();
        assert_eq!(user, MockIdentityProvider::canned_user());
    }

    #[tokio::test]
    async fn created_users_are_looked_up_by_id_or_username() {
        let provider = mock();
        let created = provider
            .admin_create_user("Jane", "jane", "jane@example.com", &Password::new("pw"))
            .await
            .unwrap();

        assert_eq!(provider.lookup_user("jane").await.unwrap(), created);
        assert_eq!(
            provider.lookup_user(&created.id.to_string()).await.unwrap(),
            created
        );
        assert!(matches!(
            provider.lookup_user("nobody").await,
            Err(ProviderError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_user_is_a_conflict() {
        let provider = mock();
        let pw = Password::new("pw");
        provider
            .admin_create_user("Jane", "jane", "jane@example.com", &pw)
            .await
            .unwrap();

        let err = provider
            .admin_create_user("Jane 2", "jane", "other@example.com", &pw)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Conflict(_)));
    }

    #[tokio::test]
    async fn canned_user_token_uses_configured_secret() {
        let provider = mock();
        let token = provider.admin_create_user_token(1, "t").await.unwrap();

        assert_eq!(token.token.expose(), "mock-token-12345");
        assert!(token.active && !token.revoked);
        assert_eq!(token.name, "t");
    }

    #[tokio::test]
    async fn created_users_get_distinct_secrets() {
        let provider = mock();
        let user = provider
            .admin_create_user("Jane", "jane", "jane@example.com", &Password::new("pw"))
            .await
            .unwrap();
        assert_eq!(user.id, 2);

        let first = provider.admin_create_user_token(user.id, "t").await.unwrap();
        let second = provider.admin_create_user_token(user.id, "t").await.unwrap();
        assert_eq!(first.token.expose(), "mock-issued-token-0002-0001");
        assert_ne!(first.token, second.token);
    }

    #[tokio::test]
    async fn unknown_user_gets_no_token() {
        let provider = mock();
        let err = provider.admin_create_user_token(99, "t").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn switched_off_provider_is_unavailable() {
        let provider = mock();
        provider.set_unavailable(true).unwrap();
        assert!(matches!(
            provider.lookup_user("1").await,
            Err(ProviderError::Unavailable(_))
        ));
    }

    #[test]
    fn error_message_prefers_message_field() {
        assert_eq!(
            error_message(r#"{"message":"Email has already been taken"}"#),
            "Email has already been taken"
        );
        assert_eq!(
            error_message(r#"{"message":{"username":["has already been taken"]}}"#),
            r#"{"username":["has already been taken"]}"#
        );
        assert_eq!(error_message(r#"{"error":"invalid_token"}"#), "invalid_token");
        assert_eq!(error_message("plain failure"), "plain failure");
    }
}
