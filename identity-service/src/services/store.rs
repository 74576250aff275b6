//! Storage contract for persons, accounts and account tokens.
//!
//! Lookups by a unique field return `NotFound` when nothing matches, inserts
//! return `Conflict` when a unique field is already taken.

use async_trait::async_trait;
use uuid::Uuid;

use super::error::IdentityError;
use crate::models::{Account, AccountToken, Person, TokenSecret};

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn insert_person(&self, person: &Person) -> Result<(), IdentityError>;

    async fn insert_account(&self, account: &Account) -> Result<(), IdentityError>;

    /// Fails with `NotFound` when the owning account does not exist.
    async fn insert_token(&self, token: &AccountToken) -> Result<(), IdentityError>;

    /// Commits person, account and token together or not at all.
    async fn insert_identity(
        &self,
        person: &Person,
        account: &Account,
        token: &AccountToken,
    ) -> Result<(), IdentityError>;

    async fn find_person_by_id(&self, id: Uuid) -> Result<Person, IdentityError>;

    async fn find_person_by_slug(&self, slug: &str) -> Result<Person, IdentityError>;

    async fn find_all_persons(&self) -> Result<Vec<Person>, IdentityError>;

    async fn find_account_by_id(&self, id: Uuid) -> Result<Account, IdentityError>;

    async fn find_account_by_username(&self, username: &str) -> Result<Account, IdentityError>;

    /// Emails compare case-insensitively.
    async fn find_account_by_email(&self, email: &str) -> Result<Account, IdentityError>;

    async fn find_all_accounts(&self) -> Result<Vec<Account>, IdentityError>;

    async fn find_token_by_id(&self, id: Uuid) -> Result<AccountToken, IdentityError>;

    async fn find_token_by_secret(&self, secret: &TokenSecret)
        -> Result<AccountToken, IdentityError>;

    async fn find_tokens_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<AccountToken>, IdentityError>;

    async fn update_account_password(
        &self,
        account_id: Uuid,
        password_encrypted: &str,
    ) -> Result<(), IdentityError>;

    /// Marks the token revoked and inactive, returning the updated row.
    async fn revoke_token(&self, token_id: Uuid) -> Result<AccountToken, IdentityError>;

    async fn health_check(&self) -> Result<(), IdentityError>;
}

/// Ok when the username, email and slug are all still free.
pub async fn ensure_identity_available(
    store: &dyn IdentityStore,
    username: &str,
    email: &str,
    slug: &str,
) -> Result<(), IdentityError> {
    if exists(store.find_account_by_username(username).await)? {
        return Err(IdentityError::Conflict(format!(
            "Username '{}' is already taken",
            username
        )));
    }
    if exists(store.find_account_by_email(email).await)? {
        return Err(IdentityError::Conflict(format!(
            "Email '{}' is already registered",
            email
        )));
    }
    if exists(store.find_person_by_slug(slug).await)? {
        return Err(IdentityError::Conflict(format!(
            "Slug '{}' is already taken",
            slug
        )));
    }
    Ok(())
}

fn exists<T>(lookup: Result<T, IdentityError>) -> Result<bool, IdentityError> {
    match lookup {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}
