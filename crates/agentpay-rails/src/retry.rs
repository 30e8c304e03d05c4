//! Shared retry policy for provider calls
//!
//! Only 5xx, 429, and connection resets are retried, with exponential
//! backoff. 4xx answers and timeouts are terminal: the provider heard us,
//! or the deadline passed and the caller's transaction must roll back.

use crate::RailError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Exponential backoff configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Ceiling on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): base * 2^(retry-1),
    /// capped
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Whether a response status warrants a retry
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Run a provider call under the retry policy.
///
/// `call` is invoked with the attempt number (1-based) and must produce a
/// fresh request each time. Timeouts are mapped to `RailError::Timeout` and
/// not retried; connect errors and retryable statuses back off and retry
/// until attempts run out.
pub async fn send_with_retry<F, Fut>(
    policy: &RetryPolicy,
    timeout_ms: u64,
    mut call: F,
) -> Result<reqwest::Response, RailError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 1u32;
    loop {
        match call(attempt).await {
            Ok(response) => {
                let status = response.status().as_u16();
                if is_retryable_status(status) && attempt < policy.max_attempts {
                    warn!(status, attempt, "retryable provider status; backing off");
                } else {
                    return Ok(response);
                }
            }
            Err(err) if err.is_timeout() => {
                return Err(RailError::Timeout { timeout_ms });
            }
            Err(err) if err.is_connect() && attempt < policy.max_attempts => {
                warn!(error = %err, attempt, "provider connection error; backing off");
            }
            Err(err) => {
                return Err(RailError::Provider {
                    message: err.to_string(),
                });
            }
        }

        tokio::time::sleep(policy.delay_for(attempt)).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
        // Capped at 5s regardless of how far it grows.
        assert_eq!(policy.delay_for(10), Duration::from_secs(5));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(599));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(422));
        assert!(!is_retryable_status(200));
    }
}
