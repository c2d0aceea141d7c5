//! Bounded retry and fail-open helpers
//!
//! Retrying here always wraps the *whole* operation: a failed attempt is
//! discarded and the next one starts from scratch after a fixed delay.
//!
//! DO NOT retry:
//! - Structural check failures (a wrong artifact stays wrong)
//! - Browser runtime failures (the outer HTML fetch already proved reachability)

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::Result;

/// Fixed-delay retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    /// Pause between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Total attempts this policy allows
    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Run `f` until it succeeds, at most `policy.max_attempts()` times
///
/// `f` receives the 1-based attempt number. Only transient errors (see
/// [`crate::ShipcheckError::is_transient`]) are retried; anything else is
/// returned immediately. The last transient error is returned once the bound
/// is exhausted.
///
/// # Usage
///
/// ```no_run
/// use shipcheck_core::retry::{retry_fixed, RetryPolicy};
/// use shipcheck_core::Result;
///
/// async fn fetch_page() -> Result<String> {
///     Ok("<html></html>".to_string())
/// }
///
/// async fn example() -> Result<String> {
///     retry_fixed("fetch deployment", RetryPolicy::default(), |_attempt| fetch_page()).await
/// }
/// ```
pub async fn retry_fixed<F, Fut, T>(operation_name: &str, policy: RetryPolicy, mut f: F) -> Result<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 1;

    loop {
        match f(attempt).await {
            Ok(val) => return Ok(val),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) if attempt >= max_attempts => {
                warn!(
                    "{} failed after {} attempts: {}",
                    operation_name, max_attempts, e
                );
                return Err(e);
            }
            Err(e) => {
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    operation_name, attempt, max_attempts, e, policy.delay
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}

/// Execute a best-effort operation whose failure must never fail the caller
///
/// Logs the error via `tracing::warn!` on failure and returns `None`.
///
/// Appropriate for CI summary appends, git metadata lookups and other
/// side-channel output.
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}
