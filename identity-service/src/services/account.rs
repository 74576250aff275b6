//! Operations an authenticated caller performs on their own account.

use service_core::redaction::SecretRedactor;
use std::sync::Arc;
use uuid::Uuid;

use super::error::IdentityError;
use super::gitlab::{IdentityProvider, ProviderUser};
use super::resolver::ResolvedIdentity;
use super::store::IdentityStore;
use crate::models::AccountToken;
use crate::utils::{hash_password_blocking, verify_password_blocking, Password, PasswordError};

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn IdentityStore>,
    provider: Arc<dyn IdentityProvider>,
    redactor: SecretRedactor,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        provider: Arc<dyn IdentityProvider>,
        redactor: SecretRedactor,
    ) -> Self {
        Self {
            store,
            provider,
            redactor,
        }
    }

    /// Replace the password after checking the current one.
    #[tracing::instrument(skip(self, current, new_password))]
    pub async fn change_password(
        &self,
        account_id: Uuid,
        current: Password,
        new_password: Password,
    ) -> Result<(), IdentityError> {
        let account = self.store.find_account_by_id(account_id).await?;

        match verify_password_blocking(current, account.password_hash()).await {
            Ok(()) => {}
            Err(PasswordError::Mismatch) => {
                tracing::warn!(%account_id, "Password change rejected: current password mismatch");
                return Err(IdentityError::Unauthenticated);
            }
            Err(e) => {
                tracing::error!(%account_id, error = %e, "Stored password could not be checked");
                return Err(IdentityError::Internal(anyhow::Error::new(e)));
            }
        }

        let hash = hash_password_blocking(new_password).await?;
        self.store
            .update_account_password(account_id, hash.as_str())
            .await?;

        tracing::info!(%account_id, "Password changed");
        Ok(())
    }

    /// Revoke a token. The row stays, flagged revoked and inactive, and the
    /// secret drops out of the redaction registry.
    #[tracing::instrument(skip(self))]
    pub async fn revoke_token(&self, token_id: Uuid) -> Result<AccountToken, IdentityError> {
        let token = self.store.revoke_token(token_id).await?;
        self.redactor.unregister(token.token.expose());
        tracing::info!(
            token_id = %token.id,
            account_id = %token.account_id,
            "Token revoked"
        );
        Ok(token)
    }

    /// Revoke the token the caller authenticated with.
    pub async fn revoke_current(
        &self,
        identity: &ResolvedIdentity,
    ) -> Result<AccountToken, IdentityError> {
        self.revoke_token(identity.token.id).await
    }

    /// Provider-side profile of the caller; `NotFound` when the token was
    /// never linked to a provider user.
    pub async fn provider_profile(
        &self,
        identity: &ResolvedIdentity,
    ) -> Result<ProviderUser, IdentityError> {
        let gitlab_id = identity
            .token
            .provider_user_id()
            .ok_or_else(|| IdentityError::not_found("provider user"))?;

        Ok(self.provider.lookup_user(&gitlab_id.to_string()).await?)
    }
}
