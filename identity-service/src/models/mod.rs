pub mod account;
pub mod account_token;
pub mod fixtures;
pub mod person;
pub mod token_secret;

pub use account::{Account, AccountResponse};
pub use account_token::{AccountToken, AccountTokenResponse};
pub use fixtures::FixtureIds;
pub use person::{slugify, Person, PersonResponse};
pub use token_secret::TokenSecret;
