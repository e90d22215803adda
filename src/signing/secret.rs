//! Shared signing secret

use std::fmt;

/// The shared secret used as the HMAC key.
///
/// Loaded once at startup and never mutated afterwards. The `Debug` output
/// is redacted so the value cannot end up in logs by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    /// Create a new secret from raw bytes
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    /// The raw key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether the secret is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

impl From<String> for SigningSecret {
    fn from(secret: String) -> Self {
        Self(secret.into_bytes())
    }
}

impl From<&str> for SigningSecret {
    fn from(secret: &str) -> Self {
        Self(secret.as_bytes().to_vec())
    }
}
