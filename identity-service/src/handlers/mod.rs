pub mod accounts;
pub mod health;
pub mod me;

pub use accounts::register_account;
pub use health::health_check;
pub use me::{change_password, get_me, get_provider_profile, revoke_current_token};
