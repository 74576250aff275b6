pub mod password;
pub mod validation;

pub use password::{
    hash_password, hash_password_blocking, verify_password, verify_password_blocking, Password,
    PasswordError, PasswordHashString,
};
pub use validation::ValidatedJson;
