//! Exchange API credentials.
//!
//! Credentials are read from the environment only, never from the config
//! file. `Debug` output redacts the secret and passphrase.

use std::fmt;

use crate::error::{ConfigError, Result};

pub const API_KEY_VAR: &str = "OKX_API_KEY";
pub const API_SECRET_VAR: &str = "OKX_API_SECRET";
pub const PASSPHRASE_VAR: &str = "OKX_API_PASSPHRASE";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
    secret: String,
    passphrase: String,
}

impl Credentials {
    pub fn new(
        api_key: impl Into<String>,
        secret: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            secret: secret.into(),
            passphrase: passphrase.into(),
        }
    }

    /// Read `OKX_API_KEY`, `OKX_API_SECRET` and `OKX_API_PASSPHRASE`.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: required_var(API_KEY_VAR)?,
            secret: required_var(API_SECRET_VAR)?,
            passphrase: required_var(PASSPHRASE_VAR)?,
        })
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.secret
    }

    #[must_use]
    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }
}

fn required_var(name: &'static str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::MissingField { field: name }.into()),
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("secret", &"<redacted>")
            .field("passphrase", &"<redacted>")
            .finish()
    }
}
