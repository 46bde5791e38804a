use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Network failure or timeout below the HTTP status layer.
    #[error("transport error: {0}")]
    Transport(String),

    /// The exchange answered with a non-success status or error code.
    #[error("exchange rejected request ({status}): {body}")]
    ExchangeRejection { status: u16, body: String },

    /// Malformed or unexpected stream frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("circuit '{name}' open, retry in {}ms", .retry_in.as_millis())]
    CircuitOpen { name: String, retry_in: Duration },

    #[error("strategy '{strategy}' failed: {reason}")]
    StrategyExecution { strategy: String, reason: String },

    /// Request rejected locally before reaching the exchange.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("persistence error: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Closed set of error kinds the error handler counts and dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    ExchangeRejection,
    Protocol,
    CircuitOpen,
    StrategyExecution,
    InvalidRequest,
    Config,
    Persistence,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::ExchangeRejection => "exchange_rejection",
            Self::Protocol => "protocol",
            Self::CircuitOpen => "circuit_open",
            Self::StrategyExecution => "strategy_execution",
            Self::InvalidRequest => "invalid_request",
            Self::Config => "config",
            Self::Persistence => "persistence",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error into the handler's closed kind set.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::WebSocket(_) | Self::Connection(_) => ErrorKind::Transport,
            Self::ExchangeRejection { .. } => ErrorKind::ExchangeRejection,
            Self::Protocol(_) | Self::Json(_) => ErrorKind::Protocol,
            Self::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Self::StrategyExecution { .. } => ErrorKind::StrategyExecution,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Config(_) | Self::Url(_) => ErrorKind::Config,
            Self::Io(_) | Self::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// Whether a transport-level retry could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            Error::ExchangeRejection {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else if err.is_decode() {
            Error::Protocol(err.to_string())
        } else {
            Error::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_cover_taxonomy() {
        assert_eq!(Error::Transport("reset".into()).kind(), ErrorKind::Transport);
        assert_eq!(
            Error::ExchangeRejection {
                status: 401,
                body: "{}".into()
            }
            .kind(),
            ErrorKind::ExchangeRejection
        );
        assert_eq!(Error::Protocol("bad frame".into()).kind(), ErrorKind::Protocol);
        assert_eq!(
            Error::CircuitOpen {
                name: "rest".into(),
                retry_in: Duration::from_secs(1)
            }
            .kind(),
            ErrorKind::CircuitOpen
        );
        assert_eq!(
            Error::StrategyExecution {
                strategy: "scalping".into(),
                reason: "boom".into()
            }
            .kind(),
            ErrorKind::StrategyExecution
        );
        assert_eq!(Error::Connection("closed".into()).kind(), ErrorKind::Transport);
    }

    #[test]
    fn json_errors_are_protocol_errors() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{nope")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(!err.is_transient());
    }

    #[test]
    fn circuit_open_message_includes_wait() {
        let err = Error::CircuitOpen {
            name: "okx-rest".into(),
            retry_in: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "circuit 'okx-rest' open, retry in 1500ms");
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ExchangeRejection).unwrap();
        assert_eq!(json, "\"exchange_rejection\"");
    }
}
