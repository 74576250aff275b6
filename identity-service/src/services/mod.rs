//! Services layer for identity-service.
//!
//! Storage, the identity provider client, provisioning, current-identity
//! resolution and self-service account operations.

mod account;
mod database;
pub mod error;
pub mod gitlab;
pub mod memory;
mod provisioning;
mod resolver;
pub mod store;

pub use account::AccountService;
pub use database::Database;
pub use error::IdentityError;
pub use gitlab::{
    GitlabClient, IdentityProvider, MockIdentityProvider, ProviderError, ProviderToken,
    ProviderUser,
};
pub use memory::MemoryStore;
pub use provisioning::{
    ProvisionedIdentity, ProvisioningService, DEFAULT_SUFFIX, SECOND_TOKEN_PREFIX,
};
pub use resolver::{CurrentIdentity, ResolvedIdentity, StaticIdentityResolver, StoreIdentityResolver};
pub use store::IdentityStore;
