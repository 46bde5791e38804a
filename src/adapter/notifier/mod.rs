//! Notification adapters.
//!
//! Implements the `port::Notifier` trait for the error handler's alerts.

use tracing::warn;

use crate::port::{Alert, Notifier};

/// A logging notifier that reports alerts via tracing.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, alert: Alert) {
        match alert {
            Alert::ThresholdExceeded {
                context,
                kind,
                message,
                occurrences,
                window,
            } => {
                warn!(
                    context = %context,
                    kind = %kind,
                    occurrences,
                    window_secs = window.as_secs(),
                    message = %message,
                    "Error threshold exceeded"
                );
            }
            Alert::RetriesExhausted {
                context,
                kind,
                message,
                attempts,
            } => {
                warn!(
                    context = %context,
                    kind = %kind,
                    attempts,
                    message = %message,
                    "Retries exhausted"
                );
            }
        }
    }
}
