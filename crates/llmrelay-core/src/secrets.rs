//! Secret values with redacted `Debug` output and zeroization on drop.
//!
//! Access tokens, API keys and refreshed tokens travel through the relay as
//! [`SecretValue`]s so they never show up in logs or panic messages.

use std::fmt;

use zeroize::Zeroize;

/// A credential string that is cleared from memory when dropped.
#[derive(Clone)]
pub struct SecretValue {
    inner: String,
}

impl SecretValue {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: value.into(),
        }
    }

    /// Get the secret value as a string slice.
    ///
    /// Use only at the point where the value is written into a request.
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Get the secret value length (without exposing the value).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the secret value is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretValue")
            .field("inner", &"[REDACTED]")
            .field("len", &self.inner.len())
            .finish()
    }
}

impl Drop for SecretValue {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_value_redacted_debug() {
        let secret = SecretValue::new("super-secret-api-key");
        let debug = format!("{secret:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret-api-key"));
    }

    #[test]
    fn test_secret_value_expose() {
        let secret = SecretValue::new("my-key-123");
        assert_eq!(secret.expose(), "my-key-123");
        assert_eq!(secret.len(), 10);
        assert!(!secret.is_empty());
    }
}
