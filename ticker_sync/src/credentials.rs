//! Alpaca key pair held in memory.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

/// API key id plus secret. Neither half is ever printed in full.
pub struct Credentials {
    api_key: SecretString,
    secret_key: SecretString,
}

impl Credentials {
    /// Wraps a key pair. Blank halves are allowed here and rejected when a provider is built.
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into().into_boxed_str()),
            secret_key: SecretString::new(secret_key.into().into_boxed_str()),
        }
    }

    /// Key id.
    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    /// Secret key.
    pub fn secret_key(&self) -> &SecretString {
        &self.secret_key
    }

    /// `true` when both halves contain something other than whitespace.
    pub fn is_complete(&self) -> bool {
        !self.api_key.expose_secret().trim().is_empty()
            && !self.secret_key.expose_secret().trim().is_empty()
    }

    /// Key id in `abcd...wxyz` form.
    pub fn masked_key(&self) -> String {
        mask_key(self.api_key.expose_secret())
    }
}

impl Clone for Credentials {
    fn clone(&self) -> Self {
        Self::new(
            self.api_key.expose_secret(),
            self.secret_key.expose_secret(),
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.masked_key())
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// Keeps the first and last four characters; short keys are fully hidden.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
