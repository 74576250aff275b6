//! Creation of person/account/token triples.
//!
//! Two entry points:
//! - [`ProvisioningService::provision_account`] builds a fixture identity from
//!   a suffix without talking to the provider. Ids come from
//!   [`FixtureIds`], the secret is either the configured mock token or
//!   `second-token-<suffix>`.
//! - [`ProvisioningService::register_account`] creates the user and a token
//!   at the provider first, then commits the local records with random ids.
//!   The remote side cannot be rolled back, so a local failure after the
//!   provider call is reported as [`IdentityError::Reconciliation`].

use secrecy::{ExposeSecret, Secret};
use service_core::redaction::SecretRedactor;
use std::sync::Arc;
use validator::Validate;

use super::error::IdentityError;
use super::gitlab::IdentityProvider;
use super::store::{ensure_identity_available, IdentityStore};
use crate::dtos::RegisterAccountRequest;
use crate::models::{slugify, Account, AccountToken, FixtureIds, Person, TokenSecret};
use crate::utils::{hash_password_blocking, Password};

/// Suffix used when a fixture account is provisioned without an override.
pub const DEFAULT_SUFFIX: &str = "0000";
pub const SECOND_TOKEN_PREFIX: &str = "second-token-";
const FIXTURE_DISPLAY_NAME: &str = "user name";
const MAX_SUFFIX_LEN: usize = 64;

/// A freshly committed identity. `token` carries the live secret.
#[derive(Debug, Clone)]
pub struct ProvisionedIdentity {
    pub person: Person,
    pub account: Account,
    pub token: AccountToken,
}

#[derive(Clone)]
pub struct ProvisioningService {
    store: Arc<dyn IdentityStore>,
    provider: Arc<dyn IdentityProvider>,
    redactor: SecretRedactor,
    mock_user_token: TokenSecret,
    token_name: String,
}

impl ProvisioningService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        provider: Arc<dyn IdentityProvider>,
        redactor: SecretRedactor,
        mock_user_token: &Secret<String>,
        token_name: impl Into<String>,
    ) -> Self {
        let mock_user_token = TokenSecret::new(mock_user_token.expose_secret().clone());
        redactor.register(mock_user_token.expose());
        Self {
            store,
            provider,
            redactor,
            mock_user_token,
            token_name: token_name.into(),
        }
    }

    /// Provision a fixture account and return it.
    pub async fn provision_account(
        &self,
        plain_password: Password,
        identity_suffix: Option<&str>,
    ) -> Result<Account, IdentityError> {
        self.provision_identity(plain_password, identity_suffix)
            .await
            .map(|identity| identity.account)
    }

    /// Like [`Self::provision_account`] but returns the whole triple.
    #[tracing::instrument(skip(self, plain_password))]
    pub async fn provision_identity(
        &self,
        plain_password: Password,
        identity_suffix: Option<&str>,
    ) -> Result<ProvisionedIdentity, IdentityError> {
        let (suffix, secret) = match identity_suffix {
            None => (DEFAULT_SUFFIX, self.mock_user_token.clone()),
            Some(suffix) => {
                validate_suffix(suffix)?;
                (
                    suffix,
                    TokenSecret::new(format!("{}{}", SECOND_TOKEN_PREFIX, suffix)),
                )
            }
        };

        let password_hash = hash_password_blocking(plain_password).await?;

        let ids = FixtureIds::for_suffix(suffix);
        let person = Person::with_id(
            ids.person,
            format!("person_slug{}", suffix),
            FIXTURE_DISPLAY_NAME.to_string(),
        );
        let account = Account::with_id(
            ids.account,
            format!("username{}", suffix),
            format!("email{}@example.com", suffix),
            password_hash,
            person.id,
        );
        let token = AccountToken::with_id(ids.token, account.id, secret, Some(0));

        self.redactor.register(token.token.expose());
        self.store.insert_identity(&person, &account, &token).await?;

        tracing::info!(
            account_id = %account.id,
            person_id = %person.id,
            token = %token.token,
            "Fixture account provisioned"
        );

        Ok(ProvisionedIdentity {
            person,
            account,
            token,
        })
    }

    /// Register a new account at the identity provider and locally.
    #[tracing::instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register_account(
        &self,
        request: RegisterAccountRequest,
    ) -> Result<ProvisionedIdentity, IdentityError> {
        request
            .validate()
            .map_err(|e| IdentityError::Validation(e.to_string()))?;

        let slug = slugify(&request.username);
        if slug.is_empty() {
            return Err(IdentityError::Validation(
                "Username must contain at least one letter or digit".to_string(),
            ));
        }
        let name = request
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| request.username.clone());

        ensure_identity_available(self.store.as_ref(), &request.username, &request.email, &slug)
            .await?;

        let password = Password::new(request.password);
        // Hash before touching the provider so nothing remote is created for
        // a request that cannot finish locally.
        let password_hash = hash_password_blocking(password.clone()).await?;

        let provider_user = self
            .provider
            .admin_create_user(&name, &request.username, &request.email, &password)
            .await?;
        let gitlab_id = provider_user.id;

        let provider_token = self
            .provider
            .admin_create_user_token(gitlab_id, &self.token_name)
            .await
            .map_err(|e| reconciliation(gitlab_id, e.into()))?;
        self.redactor.register(provider_token.token.expose());

        let person = Person::new(slug, name);
        let account = Account::new(
            request.username,
            request.email,
            password_hash,
            person.id,
        );
        let token = AccountToken::new(account.id, provider_token.token, Some(gitlab_id));

        self.store
            .insert_identity(&person, &account, &token)
            .await
            .map_err(|e| reconciliation(gitlab_id, e))?;

        tracing::info!(
            account_id = %account.id,
            gitlab_id,
            "Account registered"
        );

        Ok(ProvisionedIdentity {
            person,
            account,
            token,
        })
    }
}

fn reconciliation(gitlab_id: i64, source: IdentityError) -> IdentityError {
    tracing::error!(
        gitlab_id,
        error = %source,
        "Provider user created but local identity was not committed; manual reconciliation required"
    );
    IdentityError::Reconciliation {
        gitlab_id,
        source: Box::new(source),
    }
}

fn validate_suffix(suffix: &str) -> Result<(), IdentityError> {
    if suffix.is_empty()
        || suffix.len() > MAX_SUFFIX_LEN
        || !suffix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(IdentityError::Validation(format!(
            "Identity suffix must be 1-{} characters of [A-Za-z0-9_-]",
            MAX_SUFFIX_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::gitlab::MockIdentityProvider;
    use crate::services::memory::MemoryStore;

    fn service() -> ProvisioningService {
        let token = Secret::new("mock-private-user-token".to_string());
        ProvisioningService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MockIdentityProvider::new(token.clone())),
            SecretRedactor::default(),
            &token,
            "identity-service-token",
        )
    }

    #[test]
    fn suffix_charset_is_enforced() {
        assert!(validate_suffix("0001").is_ok());
        assert!(validate_suffix("alice_2-b").is_ok());
        assert!(validate_suffix("").is_err());
        assert!(validate_suffix("a b").is_err());
        assert!(validate_suffix("x@y").is_err());
    }

    #[tokio::test]
    async fn invalid_suffix_stores_nothing() {
        let service = service();
        let err = service
            .provision_account(Password::new("password"), Some("../etc"))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Validation(_)));
        assert!(service.store.find_all_accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn secrets_are_registered_for_redaction() {
        let service = service();
        service
            .provision_account(Password::new("password"), Some("0001"))
            .await
            .unwrap();

        assert!(service.redactor.is_registered("mock-private-user-token"));
        assert!(service.redactor.is_registered("second-token-0001"));
        assert_eq!(
            service.redactor.redact("token=second-token-0001"),
            "token=secon**********"
        );
    }
}
