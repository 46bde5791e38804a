//! HTTP transport that transparently retries server errors.
//!
//! Requests answered with one of the configured statuses, or failing below
//! the HTTP layer, are resent up to `max_retries` times. The wait before
//! retry `n` (starting at one) is `backoff_factor * 2^(n-1)`.

use std::time::Duration;

use reqwest::{Client, Request, Response, StatusCode};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Retry policy of a [`RetryingTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_factor: Duration,
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_factor: Duration::from_millis(500),
            retry_statuses: vec![500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `retry` (one-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.backoff_factor.saturating_mul(1u32 << exponent)
    }

    #[must_use]
    pub fn retries_status(&self, status: StatusCode) -> bool {
        self.retry_statuses.contains(&status.as_u16())
    }
}

#[derive(Debug, Clone)]
pub struct RetryingTransport {
    client: Client,
    policy: RetryPolicy,
}

impl RetryingTransport {
    /// Build a transport with a per-request `timeout`.
    pub fn new(timeout: Duration, policy: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, policy })
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `request`, retrying per the policy.
    ///
    /// After the last retry the final response is returned as-is, so callers
    /// see the server's status and body.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        let mut retry = 0;
        loop {
            let attempt = request
                .try_clone()
                .ok_or_else(|| Error::InvalidRequest("request body cannot be replayed".into()))?;
            let url = attempt.url().clone();

            let outcome = self.client.execute(attempt).await;
            let retryable = match &outcome {
                Ok(response) => self.policy.retries_status(response.status()),
                Err(err) => err.is_connect() || err.is_timeout() || err.is_request(),
            };

            if !retryable || retry >= self.policy.max_retries {
                return outcome.map_err(Error::from);
            }

            retry += 1;
            let delay = self.policy.delay_for(retry);
            match &outcome {
                Ok(response) => warn!(
                    url = %url,
                    status = response.status().as_u16(),
                    retry,
                    delay_ms = delay.as_millis() as u64,
                    "Server error, retrying"
                ),
                Err(err) => warn!(
                    url = %url,
                    error = %err,
                    retry,
                    delay_ms = delay.as_millis() as u64,
                    "Transport failure, retrying"
                ),
            }
            tokio::time::sleep(delay).await;
            debug!(url = %url, retry, "Resending request");
        }
    }
}
