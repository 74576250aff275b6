//! Secret redaction for every outbound text surface.
//!
//! Live secrets are registered once with a [`SecretRedactor`]; the log writer,
//! the HTTP error-response layer and the documentation recorder all run their
//! output through the same instance. A secret is rendered as its first
//! [`VISIBLE_PREFIX_CHARS`] characters followed by [`MASK_SUFFIX`].

mod exchange;
mod writer;

pub use exchange::{AUTHORIZATION_HEADER, PRIVATE_TOKEN_HEADER, RecordedExchange};
pub use writer::{RedactingMakeWriter, RedactingWriter};

use dashmap::DashMap;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Number of leading characters of a secret left readable.
pub const VISIBLE_PREFIX_CHARS: usize = 5;

/// Constant suffix appended in place of the hidden part of a secret.
pub const MASK_SUFFIX: &str = "**********";

/// Shared registry of live secrets. Cloning is cheap; clones share state.
#[derive(Clone, Default)]
pub struct SecretRedactor {
    /// secret -> masked rendering
    secrets: Arc<DashMap<String, String>>,
}

impl SecretRedactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mask a single secret.
    ///
    /// Secrets not longer than the visible prefix are hidden completely.
    pub fn mask(secret: &str) -> String {
        if secret.chars().count() <= VISIBLE_PREFIX_CHARS {
            return MASK_SUFFIX.to_string();
        }
        let prefix: String = secret.chars().take(VISIBLE_PREFIX_CHARS).collect();
        format!("{}{}", prefix, MASK_SUFFIX)
    }

    /// Start redacting `secret` everywhere. Empty strings are ignored.
    pub fn register(&self, secret: &str) {
        if secret.is_empty() {
            return;
        }
        self.secrets
            .entry(secret.to_string())
            .or_insert_with(|| Self::mask(secret));
    }

    /// Stop redacting `secret`, e.g. once its token is revoked.
    pub fn unregister(&self, secret: &str) {
        self.secrets.remove(secret);
    }

    pub fn is_registered(&self, secret: &str) -> bool {
        self.secrets.contains_key(secret)
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Replace every registered secret in `text` by its masked form.
    ///
    /// Longer secrets are replaced first so a secret that contains another
    /// one is never left half visible.
    pub fn redact<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if self.secrets.is_empty() {
            return Cow::Borrowed(text);
        }

        let mut matches: Vec<(String, String)> = self
            .secrets
            .iter()
            .filter(|entry| text.contains(entry.key().as_str()))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        if matches.is_empty() {
            return Cow::Borrowed(text);
        }

        matches.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let mut output = text.to_string();
        for (secret, masked) in matches {
            output = output.replace(&secret, &masked);
        }
        Cow::Owned(output)
    }
}

impl fmt::Debug for SecretRedactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretRedactor")
            .field("registered", &self.secrets.len())
            .finish()
    }
}
