//! Request signing.
//!
//! `sign = base64(HMAC-SHA256(secret, timestamp + method + path + body))`
//! where `timestamp` is ISO-8601 UTC with milliseconds and a `Z` suffix,
//! `path` includes the query string for GET requests, and `body` is empty
//! for bodiless requests.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::error::{ConfigError, Result};
use crate::infrastructure::config::Credentials;

type HmacSha256 = Hmac<Sha256>;

/// Path signed by the private stream login frame.
pub const LOGIN_VERIFY_PATH: &str = "/users/self/verify";

pub const HEADER_KEY: &str = "OK-ACCESS-KEY";
pub const HEADER_SIGN: &str = "OK-ACCESS-SIGN";
pub const HEADER_TIMESTAMP: &str = "OK-ACCESS-TIMESTAMP";
pub const HEADER_PASSPHRASE: &str = "OK-ACCESS-PASSPHRASE";

/// The four authentication headers of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub key: String,
    pub sign: String,
    pub timestamp: String,
    pub passphrase: String,
}

#[derive(Debug, Serialize)]
struct LoginFrame<'a> {
    op: &'static str,
    args: [LoginArgs<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginArgs<'a> {
    api_key: &'a str,
    passphrase: &'a str,
    timestamp: String,
    sign: String,
}

/// Signs REST requests and stream logins with one keyed HMAC.
#[derive(Clone)]
pub struct RequestSigner {
    api_key: String,
    passphrase: String,
    mac: HmacSha256,
}

impl RequestSigner {
    #[allow(clippy::result_large_err)]
    pub fn new(credentials: &Credentials) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(credentials.expose_secret().as_bytes()).map_err(
            |e| ConfigError::InvalidValue {
                field: "OKX_API_SECRET",
                reason: e.to_string(),
            },
        )?;
        Ok(Self {
            api_key: credentials.api_key().to_string(),
            passphrase: credentials.passphrase().to_string(),
            mac,
        })
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Signature over `timestamp + method + path + body`.
    #[must_use]
    pub fn sign(&self, timestamp: &str, method: &str, path: &str, body: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(timestamp.as_bytes());
        mac.update(method.as_bytes());
        mac.update(path.as_bytes());
        mac.update(body.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }

    /// Headers for a request signed at the current time.
    #[must_use]
    pub fn headers(&self, method: &str, path: &str, body: &str) -> SignedHeaders {
        self.headers_at(&timestamp(Utc::now()), method, path, body)
    }

    #[must_use]
    pub fn headers_at(&self, timestamp: &str, method: &str, path: &str, body: &str) -> SignedHeaders {
        SignedHeaders {
            key: self.api_key.clone(),
            sign: self.sign(timestamp, method, path, body),
            timestamp: timestamp.to_string(),
            passphrase: self.passphrase.clone(),
        }
    }

    /// Serialized private stream login frame.
    pub fn login_frame(&self) -> Result<String> {
        self.login_frame_at(&timestamp(Utc::now()))
    }

    pub fn login_frame_at(&self, timestamp: &str) -> Result<String> {
        let frame = LoginFrame {
            op: "login",
            args: [LoginArgs {
                api_key: &self.api_key,
                passphrase: &self.passphrase,
                timestamp: timestamp.to_string(),
                sign: self.sign(timestamp, "GET", LOGIN_VERIFY_PATH, ""),
            }],
        };
        Ok(serde_json::to_string(&frame)?)
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

/// ISO-8601 UTC with millisecond precision, e.g. `2020-12-08T09:08:57.715Z`.
#[must_use]
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
