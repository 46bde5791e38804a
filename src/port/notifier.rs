//! Notifier port for error-handler alerts.

use std::time::Duration;

use serde::Serialize;

use crate::error::ErrorKind;

/// Alerts raised by the error handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "alert", rename_all = "snake_case")]
pub enum Alert {
    /// Occurrences of one `(context, kind)` reached the alert threshold
    /// inside the lookback window.
    ThresholdExceeded {
        context: String,
        kind: ErrorKind,
        message: String,
        occurrences: usize,
        #[serde(with = "duration_secs")]
        window: Duration,
    },
    /// A retryable operation failed on every attempt.
    RetriesExhausted {
        context: String,
        kind: ErrorKind,
        message: String,
        attempts: u32,
    },
}

impl Alert {
    #[must_use]
    pub fn context(&self) -> &str {
        match self {
            Self::ThresholdExceeded { context, .. } | Self::RetriesExhausted { context, .. } => {
                context
            }
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ThresholdExceeded { kind, .. } | Self::RetriesExhausted { kind, .. } => *kind,
        }
    }
}

/// Receives alerts.
///
/// Implementations must return quickly; slow delivery should be spawned.
pub trait Notifier: Send + Sync {
    fn notify(&self, alert: Alert);
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }
}
