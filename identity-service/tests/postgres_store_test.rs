//! PostgreSQL identity store.
//!
//! Needs a database reachable through `DATABASE_URL`; each test runs on a
//! fresh random suffix so reruns do not collide.

use identity_service::config::DatabaseConfig;
use identity_service::db;
use identity_service::models::{Account, AccountToken, Person, TokenSecret};
use identity_service::services::{Database, IdentityStore};
use identity_service::utils::PasswordHashString;
use secrecy::Secret;
use uuid::Uuid;

async fn database() -> Database {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let config = DatabaseConfig {
        url: Secret::new(url),
        max_connections: 2,
        min_connections: 1,
    };
    let pool = db::create_pool(&config).await.expect("Failed to connect");
    db::run_migrations(&pool).await.expect("Failed to migrate");
    Database::new(pool)
}

fn identity() -> (Person, Account, AccountToken) {
    let suffix = Uuid::new_v4().simple().to_string();
    let person = Person::new(format!("slug-{}", suffix), "user name".to_string());
    let account = Account::new(
        format!("user-{}", suffix),
        format!("{}@example.com", suffix),
        PasswordHashString::new("$argon2id$stub".to_string()),
        person.id,
    );
    let token = AccountToken::new(account.id, TokenSecret::new(format!("tok-{}", suffix)), Some(0));
    (person, account, token)
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn identity_round_trips_through_postgres() {
    let db = database().await;
    let (person, account, token) = identity();

    db.insert_identity(&person, &account, &token).await.unwrap();

    let stored = db.find_token_by_secret(&token.token).await.unwrap();
    assert_eq!(stored.id, token.id);
    assert_eq!(stored.account_id, account.id);
    assert_eq!(
        db.find_account_by_email(&account.email.to_uppercase())
            .await
            .unwrap()
            .id,
        account.id
    );
    assert_eq!(db.find_person_by_slug(&person.slug).await.unwrap().id, person.id);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn failed_identity_insert_rolls_back() {
    let db = database().await;
    let (person, account, token) = identity();
    db.insert_identity(&person, &account, &token).await.unwrap();

    // New person and account, duplicate token secret.
    let (person2, account2, mut token2) = identity();
    token2.token = token.token.clone();
    let err = db
        .insert_identity(&person2, &account2, &token2)
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert!(db.find_person_by_id(person2.id).await.unwrap_err().is_not_found());
    assert!(db.find_account_by_id(account2.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn orphan_token_is_rejected() {
    let db = database().await;
    let token = AccountToken::new(Uuid::new_v4(), TokenSecret::new(Uuid::new_v4().to_string()), None);
    let err = db.insert_token(&token).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn revoke_returns_updated_row() {
    let db = database().await;
    let (person, account, token) = identity();
    db.insert_identity(&person, &account, &token).await.unwrap();

    let revoked = db.revoke_token(token.id).await.unwrap();
    assert!(revoked.revoked);
    assert!(!revoked.active);
    assert!(db.revoke_token(Uuid::new_v4()).await.unwrap_err().is_not_found());
}
