//! Maps a request's credential to the calling person and account.

use async_trait::async_trait;
use service_core::redaction::SecretRedactor;
use std::sync::Arc;

use super::error::IdentityError;
use super::store::IdentityStore;
use crate::context::RequestContext;
use crate::models::{Account, AccountToken, Person, TokenSecret};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub person: Person,
    pub account: Account,
    pub token: AccountToken,
}

/// "Who is calling" for the request behind `ctx`.
///
/// Every failure, whatever its cause, surfaces as
/// [`IdentityError::Unauthenticated`].
#[async_trait]
pub trait CurrentIdentity: Send + Sync {
    async fn resolve(&self, ctx: &RequestContext) -> Result<ResolvedIdentity, IdentityError>;

    async fn resolve_person(&self, ctx: &RequestContext) -> Result<Person, IdentityError> {
        Ok(self.resolve(ctx).await?.person)
    }

    async fn resolve_account(&self, ctx: &RequestContext) -> Result<Account, IdentityError> {
        Ok(self.resolve(ctx).await?.account)
    }

    async fn resolve_token(&self, ctx: &RequestContext) -> Result<AccountToken, IdentityError> {
        Ok(self.resolve(ctx).await?.token)
    }
}

/// Resolver reading committed state from an [`IdentityStore`].
///
/// Secrets that authenticate successfully are registered with the redactor,
/// so tokens issued before this process started are masked as well.
pub struct StoreIdentityResolver {
    store: Arc<dyn IdentityStore>,
    redactor: SecretRedactor,
}

impl StoreIdentityResolver {
    pub fn new(store: Arc<dyn IdentityStore>, redactor: SecretRedactor) -> Self {
        Self { store, redactor }
    }

    async fn lookup(&self, secret: &TokenSecret) -> Result<ResolvedIdentity, IdentityError> {
        let token = self.store.find_token_by_secret(secret).await?;
        if !token.is_usable() {
            return Err(IdentityError::Unauthenticated);
        }
        self.redactor.register(token.token.expose());
        let account = self.store.find_account_by_id(token.account_id).await?;
        let person = self.store.find_person_by_id(account.person_id).await?;
        Ok(ResolvedIdentity {
            person,
            account,
            token,
        })
    }
}

#[async_trait]
impl CurrentIdentity for StoreIdentityResolver {
    async fn resolve(&self, ctx: &RequestContext) -> Result<ResolvedIdentity, IdentityError> {
        let secret = ctx.credential().ok_or(IdentityError::Unauthenticated)?;

        let identity = ctx
            .identity_or_init(|| self.lookup(secret))
            .await
            .map_err(|e| {
                match &e {
                    IdentityError::Unauthenticated | IdentityError::NotFound { .. } => {
                        tracing::debug!(
                            request_id = ctx.request_id(),
                            token = %secret,
                            reason = %e,
                            "Credential rejected"
                        )
                    }
                    _ => tracing::warn!(
                        request_id = ctx.request_id(),
                        error = %e,
                        "Identity resolution failed"
                    ),
                }
                IdentityError::Unauthenticated
            })?;

        Ok(identity.clone())
    }
}

/// Resolver that always answers with a fixed identity, or with
/// `Unauthenticated` when constructed via [`StaticIdentityResolver::rejecting`].
pub struct StaticIdentityResolver {
    identity: Option<ResolvedIdentity>,
}

impl StaticIdentityResolver {
    pub fn new(identity: ResolvedIdentity) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    pub fn rejecting() -> Self {
        Self { identity: None }
    }
}

#[async_trait]
impl CurrentIdentity for StaticIdentityResolver {
    async fn resolve(&self, _ctx: &RequestContext) -> Result<ResolvedIdentity, IdentityError> {
        self.identity.clone().ok_or(IdentityError::Unauthenticated)
    }
}
