//! PostgreSQL identity store.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::error::IdentityError;
use super::store::IdentityStore;
use crate::models::{Account, AccountToken, Person, TokenSecret};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_person_in(
        tx: &mut Transaction<'_, Postgres>,
        person: &Person,
    ) -> Result<(), IdentityError> {
        sqlx::query(
            r#"
            INSERT INTO persons (id, slug, name, created_utc)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(person.id)
        .bind(&person.slug)
        .bind(&person.name)
        .bind(person.created_utc)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_write_error(e, "person"))?;
        Ok(())
    }

    async fn insert_account_in(
        tx: &mut Transaction<'_, Postgres>,
        account: &Account,
    ) -> Result<(), IdentityError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, username, email, password_encrypted, person_id, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(account.id)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_encrypted)
        .bind(account.person_id)
        .bind(account.created_utc)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_write_error(e, "person"))?;
        Ok(())
    }

    async fn insert_token_in(
        tx: &mut Transaction<'_, Postgres>,
        token: &AccountToken,
    ) -> Result<(), IdentityError> {
        sqlx::query(
            r#"
            INSERT INTO account_tokens (id, account_id, token, gitlab_id, revoked, active, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(token.id)
        .bind(token.account_id)
        .bind(token.token.expose())
        .bind(token.gitlab_id)
        .bind(token.revoked)
        .bind(token.active)
        .bind(token.created_utc)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_write_error(e, "account"))?;
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, IdentityError> {
        self.pool.begin().await.map_err(IdentityError::Database)
    }
}

/// Translate constraint violations into the store's error contract.
/// `parent` names the referenced entity for foreign-key failures.
fn map_write_error(err: sqlx::Error, parent: &'static str) -> IdentityError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => {
                let constraint = db_err.constraint().unwrap_or("unique constraint");
                return IdentityError::Conflict(format!(
                    "Duplicate value violates {}",
                    constraint
                ));
            }
            Some(FOREIGN_KEY_VIOLATION) => return IdentityError::not_found(parent),
            _ => {}
        }
    }
    IdentityError::Database(err)
}

fn map_read_error(err: sqlx::Error, entity: &'static str) -> IdentityError {
    match err {
        sqlx::Error::RowNotFound => IdentityError::not_found(entity),
        other => IdentityError::Database(other),
    }
}

#[async_trait]
impl IdentityStore for Database {
    async fn insert_person(&self, person: &Person) -> Result<(), IdentityError> {
        let mut tx = self.begin().await?;
        Self::insert_person_in(&mut tx, person).await?;
        tx.commit().await.map_err(IdentityError::Database)
    }

    async fn insert_account(&self, account: &Account) -> Result<(), IdentityError> {
        let mut tx = self.begin().await?;
        Self::insert_account_in(&mut tx, account).await?;
        tx.commit().await.map_err(IdentityError::Database)
    }

    async fn insert_token(&self, token: &AccountToken) -> Result<(), IdentityError> {
        let mut tx = self.begin().await?;
        Self::insert_token_in(&mut tx, token).await?;
        tx.commit().await.map_err(IdentityError::Database)
    }

    async fn insert_identity(
        &self,
        person: &Person,
        account: &Account,
        token: &AccountToken,
    ) -> Result<(), IdentityError> {
        let mut tx = self.begin().await?;

        // Dropping the transaction on any early return rolls it back.
        Self::insert_person_in(&mut tx, person).await?;
        Self::insert_account_in(&mut tx, account).await?;
        Self::insert_token_in(&mut tx, token).await?;

        tx.commit().await.map_err(IdentityError::Database)?;

        tracing::debug!(
            person_id = %person.id,
            account_id = %account.id,
            token_id = %token.id,
            "Identity committed"
        );
        Ok(())
    }

    async fn find_person_by_id(&self, id: Uuid) -> Result<Person, IdentityError> {
        sqlx::query_as::<_, Person>("SELECT * FROM persons WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_read_error(e, "person"))
    }

    async fn find_person_by_slug(&self, slug: &str) -> Result<Person, IdentityError> {
        sqlx::query_as::<_, Person>("SELECT * FROM persons WHERE slug = $1")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_read_error(e, "person"))
    }

    async fn find_all_persons(&self) -> Result<Vec<Person>, IdentityError> {
        sqlx::query_as::<_, Person>("SELECT * FROM persons ORDER BY created_utc, id")
            .fetch_all(&self.pool)
            .await
            .map_err(IdentityError::Database)
    }

    async fn find_account_by_id(&self, id: Uuid) -> Result<Account, IdentityError> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_read_error(e, "account"))
    }

    async fn find_account_by_username(&self, username: &str) -> Result<Account, IdentityError> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE username = $1")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_read_error(e, "account"))
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Account, IdentityError> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_read_error(e, "account"))
    }

    async fn find_all_accounts(&self) -> Result<Vec<Account>, IdentityError> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts ORDER BY created_utc, id")
            .fetch_all(&self.pool)
            .await
            .map_err(IdentityError::Database)
    }

    async fn find_token_by_id(&self, id: Uuid) -> Result<AccountToken, IdentityError> {
        sqlx::query_as::<_, AccountToken>("SELECT * FROM account_tokens WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_read_error(e, "token"))
    }

    async fn find_token_by_secret(
        &self,
        secret: &TokenSecret,
    ) -> Result<AccountToken, IdentityError> {
        sqlx::query_as::<_, AccountToken>("SELECT * FROM account_tokens WHERE token = $1")
            .bind(secret.expose())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_read_error(e, "token"))
    }

    async fn find_tokens_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<AccountToken>, IdentityError> {
        sqlx::query_as::<_, AccountToken>(
            "SELECT * FROM account_tokens WHERE account_id = $1 ORDER BY created_utc, id",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(IdentityError::Database)
    }

    async fn update_account_password(
        &self,
        account_id: Uuid,
        password_encrypted: &str,
    ) -> Result<(), IdentityError> {
        let result = sqlx::query("UPDATE accounts SET password_encrypted = $2 WHERE id = $1")
            .bind(account_id)
            .bind(password_encrypted)
            .execute(&self.pool)
            .await
            .map_err(IdentityError::Database)?;

        if result.rows_affected() == 0 {
            return Err(IdentityError::not_found("account"));
        }
        Ok(())
    }

    async fn revoke_token(&self, token_id: Uuid) -> Result<AccountToken, IdentityError> {
        sqlx::query_as::<_, AccountToken>(
            r#"
            UPDATE account_tokens SET revoked = TRUE, active = FALSE
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(token_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_read_error(e, "token"))
    }

    /// Health check - ping the database.
    async fn health_check(&self) -> Result<(), IdentityError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                IdentityError::Database(e)
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_row_is_not_found() {
        let err = map_read_error(sqlx::Error::RowNotFound, "account");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "account not found");
    }

    #[test]
    fn other_errors_stay_database_errors() {
        let err = map_write_error(sqlx::Error::PoolTimedOut, "person");
        assert!(matches!(err, IdentityError::Database(_)));
    }
}
