//! AccountToken model - API credentials issued to an account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::TokenSecret;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct AccountToken {
    pub id: Uuid,
    pub account_id: Uuid,
    #[sqlx(try_from = "String")]
    pub token: TokenSecret,
    /// Provider user id, `Some(0)` when no provider user exists yet.
    pub gitlab_id: Option<i64>,
    pub revoked: bool,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

impl AccountToken {
    pub fn new(account_id: Uuid, token: TokenSecret, gitlab_id: Option<i64>) -> Self {
        Self::with_id(Uuid::new_v4(), account_id, token, gitlab_id)
    }

    pub fn with_id(
        id: Uuid,
        account_id: Uuid,
        token: TokenSecret,
        gitlab_id: Option<i64>,
    ) -> Self {
        Self {
            id,
            account_id,
            token,
            gitlab_id,
            revoked: false,
            active: true,
            created_utc: Utc::now(),
        }
    }

    /// A token authenticates only while active and not revoked.
    pub fn is_usable(&self) -> bool {
        self.active && !self.revoked
    }

    pub fn revoke(&mut self) {
        self.revoked = true;
        self.active = false;
    }

    /// Provider user id if one was ever linked.
    pub fn provider_user_id(&self) -> Option<i64> {
        self.gitlab_id.filter(|id| *id > 0)
    }
}

/// Token metadata for API responses. `token` is rendered masked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountTokenResponse {
    pub id: Uuid,
    pub account_id: Uuid,
    pub token: String,
    pub gitlab_id: Option<i64>,
    pub revoked: bool,
    pub active: bool,
}

impl From<AccountToken> for AccountTokenResponse {
    fn from(t: AccountToken) -> Self {
        Self {
            id: t.id,
            account_id: t.account_id,
            token: t.token.masked(),
            gitlab_id: t.gitlab_id,
            revoked: t.revoked,
            active: t.active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revoke_flips_both_flags() {
        let mut token = AccountToken::new(Uuid::new_v4(), "abcde12345".into(), Some(0));
        assert!(token.is_usable());

        token.revoke();
        assert!(token.revoked);
        assert!(!token.active);
        assert!(!token.is_usable());
    }

    #[test]
    fn zero_gitlab_id_means_unlinked() {
        let token = AccountToken::new(Uuid::new_v4(), "abcde12345".into(), Some(0));
        assert_eq!(token.provider_user_id(), None);

        let linked = AccountToken::new(Uuid::new_v4(), "abcde12345".into(), Some(17));
        assert_eq!(linked.provider_user_id(), Some(17));
    }

    #[test]
    fn response_masks_secret() {
        let token = AccountToken::new(Uuid::new_v4(), "abcde12345".into(), Some(0));
        let response = AccountTokenResponse::from(token);
        assert_eq!(response.token, "abcde**********");
    }
}
