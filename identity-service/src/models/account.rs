//! Account model - a local login identity owned by exactly one person.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::PasswordHashString;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string, never the plaintext.
    pub password_encrypted: String,
    pub person_id: Uuid,
    pub created_utc: DateTime<Utc>,
}

impl Account {
    /// Create an account with a random id for `person_id`.
    pub fn new(
        username: String,
        email: String,
        password_encrypted: PasswordHashString,
        person_id: Uuid,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), username, email, password_encrypted, person_id)
    }

    pub fn with_id(
        id: Uuid,
        username: String,
        email: String,
        password_encrypted: PasswordHashString,
        person_id: Uuid,
    ) -> Self {
        Self {
            id,
            username,
            email,
            password_encrypted: password_encrypted.into_string(),
            person_id,
            created_utc: Utc::now(),
        }
    }

    pub fn password_hash(&self) -> PasswordHashString {
        PasswordHashString::new(self.password_encrypted.clone())
    }
}

/// Account for API responses (without the password hash).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub person_id: Uuid,
    pub created_utc: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            username: a.username,
            email: a.email,
            person_id: a.person_id,
            created_utc: a.created_utc,
        }
    }
}
