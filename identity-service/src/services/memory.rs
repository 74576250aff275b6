//! In-memory identity store for degraded mode and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use super::error::IdentityError;
use super::store::IdentityStore;
use crate::models::{Account, AccountToken, Person, TokenSecret};

#[derive(Default)]
struct Tables {
    persons: HashMap<Uuid, Person>,
    accounts: HashMap<Uuid, Account>,
    tokens: HashMap<Uuid, AccountToken>,
}

impl Tables {
    fn check_person(&self, person: &Person) -> Result<(), IdentityError> {
        if self.persons.contains_key(&person.id) {
            return Err(IdentityError::Conflict(format!(
                "Person {} already exists",
                person.id
            )));
        }
        if self.persons.values().any(|p| p.slug == person.slug) {
            return Err(IdentityError::Conflict(format!(
                "Slug '{}' is already taken",
                person.slug
            )));
        }
        Ok(())
    }

    fn check_account(&self, account: &Account) -> Result<(), IdentityError> {
        if self.accounts.contains_key(&account.id) {
            return Err(IdentityError::Conflict(format!(
                "Account {} already exists",
                account.id
            )));
        }
        if self.accounts.values().any(|a| a.username == account.username) {
            return Err(IdentityError::Conflict(format!(
                "Username '{}' is already taken",
                account.username
            )));
        }
        if self
            .accounts
            .values()
            .any(|a| a.email.eq_ignore_ascii_case(&account.email))
        {
            return Err(IdentityError::Conflict(format!(
                "Email '{}' is already registered",
                account.email
            )));
        }
        Ok(())
    }

    fn check_token(&self, token: &AccountToken) -> Result<(), IdentityError> {
        if self.tokens.contains_key(&token.id) {
            return Err(IdentityError::Conflict(format!(
                "Token {} already exists",
                token.id
            )));
        }
        if self.tokens.values().any(|t| t.token == token.token) {
            return Err(IdentityError::Conflict(
                "Token secret is already in use".to_string(),
            ));
        }
        Ok(())
    }
}

/// Store backed by hash maps behind a single lock.
///
/// Every write validates and applies under one write guard, so readers never
/// observe half of an identity.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, IdentityError> {
        self.tables
            .read()
            .map_err(|e| IdentityError::Internal(anyhow::anyhow!("Memory store lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, IdentityError> {
        self.tables
            .write()
            .map_err(|e| IdentityError::Internal(anyhow::anyhow!("Memory store lock poisoned: {}", e)))
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn insert_person(&self, person: &Person) -> Result<(), IdentityError> {
        let mut tables = self.write()?;
        tables.check_person(person)?;
        tables.persons.insert(person.id, person.clone());
        Ok(())
    }

    async fn insert_account(&self, account: &Account) -> Result<(), IdentityError> {
        let mut tables = self.write()?;
        if !tables.persons.contains_key(&account.person_id) {
            return Err(IdentityError::not_found("person"));
        }
        tables.check_account(account)?;
        tables.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn insert_token(&self, token: &AccountToken) -> Result<(), IdentityError> {
        let mut tables = self.write()?;
        if !tables.accounts.contains_key(&token.account_id) {
            return Err(IdentityError::not_found("account"));
        }
        tables.check_token(token)?;
        tables.tokens.insert(token.id, token.clone());
        Ok(())
    }

    async fn insert_identity(
        &self,
        person: &Person,
        account: &Account,
        token: &AccountToken,
    ) -> Result<(), IdentityError> {
        let mut tables = self.write()?;

        tables.check_person(person)?;
        if account.person_id != person.id {
            return Err(IdentityError::Validation(
                "Account must reference the person being created".to_string(),
            ));
        }
        tables.check_account(account)?;
        if token.account_id != account.id {
            return Err(IdentityError::Validation(
                "Token must reference the account being created".to_string(),
            ));
        }
        tables.check_token(token)?;

        tables.persons.insert(person.id, person.clone());
        tables.accounts.insert(account.id, account.clone());
        tables.tokens.insert(token.id, token.clone());
        Ok(())
    }

    async fn find_person_by_id(&self, id: Uuid) -> Result<Person, IdentityError> {
        self.read()?
            .persons
            .get(&id)
            .cloned()
            .ok_or_else(|| IdentityError::not_found("person"))
    }

    async fn find_person_by_slug(&self, slug: &str) -> Result<Person, IdentityError> {
        self.read()?
            .persons
            .values()
            .find(|p| p.slug == slug)
            .cloned()
            .ok_or_else(|| IdentityError::not_found("person"))
    }

    async fn find_all_persons(&self) -> Result<Vec<Person>, IdentityError> {
        let mut persons: Vec<Person> = self.read()?.persons.values().cloned().collect();
        persons.sort_by_key(|p| (p.created_utc, p.id));
        Ok(persons)
    }

    async fn find_account_by_id(&self, id: Uuid) -> Result<Account, IdentityError> {
        self.read()?
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| IdentityError::not_found("account"))
    }

    async fn find_account_by_username(&self, username: &str) -> Result<Account, IdentityError> {
        self.read()?
            .accounts
            .values()
            .find(|a| a.username == username)
            .cloned()
            .ok_or_else(|| IdentityError::not_found("account"))
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Account, IdentityError> {
        self.read()?
            .accounts
            .values()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or_else(|| IdentityError::not_found("account"))
    }

    async fn find_all_accounts(&self) -> Result<Vec<Account>, IdentityError> {
        let mut accounts: Vec<Account> = self.read()?.accounts.values().cloned().collect();
        accounts.sort_by_key(|a| (a.created_utc, a.id));
        Ok(accounts)
    }

    async fn find_token_by_id(&self, id: Uuid) -> Result<AccountToken, IdentityError> {
        self.read()?
            .tokens
            .get(&id)
            .cloned()
            .ok_or_else(|| IdentityError::not_found("token"))
    }

    async fn find_token_by_secret(
        &self,
        secret: &TokenSecret,
    ) -> Result<AccountToken, IdentityError> {
        self.read()?
            .tokens
            .values()
            .find(|t| &t.token == secret)
            .cloned()
            .ok_or_else(|| IdentityError::not_found("token"))
    }

    async fn find_tokens_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<AccountToken>, IdentityError> {
        let mut tokens: Vec<AccountToken> = self
            .read()?
            .tokens
            .values()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect();
        tokens.sort_by_key(|t| (t.created_utc, t.id));
        Ok(tokens)
    }

    async fn update_account_password(
        &self,
        account_id: Uuid,
        password_encrypted: &str,
    ) -> Result<(), IdentityError> {
        let mut tables = self.write()?;
        let account = tables
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| IdentityError::not_found("account"))?;
        account.password_encrypted = password_encrypted.to_string();
        Ok(())
    }

    async fn revoke_token(&self, token_id: Uuid) -> Result<AccountToken, IdentityError> {
        let mut tables = self.write()?;
        let token = tables
            .tokens
            .get_mut(&token_id)
            .ok_or_else(|| IdentityError::not_found("token"))?;
        token.revoke();
        Ok(token.clone())
    }

    async fn health_check(&self) -> Result<(), IdentityError> {
        self.read().map(|_| ())
    }
}
