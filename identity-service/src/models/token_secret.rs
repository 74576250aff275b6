use serde::{Deserialize, Serialize, Serializer};
use service_core::redaction::SecretRedactor;
use std::fmt;
use subtle::ConstantTimeEq;

/// Bearer token secret.
///
/// `Debug`, `Display` and `Serialize` all render the masked form; the raw
/// value is only reachable through [`TokenSecret::expose`].
#[derive(Clone, Deserialize)]
#[serde(from = "String")]
pub struct TokenSecret(String);

impl TokenSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn masked(&self) -> String {
        SecretRedactor::mask(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for TokenSecret {
    fn from(secret: String) -> Self {
        Self(secret)
    }
}

impl From<&str> for TokenSecret {
    fn from(secret: &str) -> Self {
        Self(secret.to_string())
    }
}

impl PartialEq for TokenSecret {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl Eq for TokenSecret {}

impl fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenSecret({})", self.masked())
    }
}

impl fmt::Display for TokenSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

impl Serialize for TokenSecret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.masked())
    }
}
