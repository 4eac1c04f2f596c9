//! Fixed-delay retry around ranking operations
//!
//! The upstream metrics backend is allowed to be flaky: data may not be
//! ingested yet, or a request may time out. Every ranking operation is run
//! through [`retry`], which re-invokes it up to a fixed number of attempts with
//! a fixed pause in between.
//!
//! ```text
//! attempt 1 ── fail ── sleep(delay) ── attempt 2 ── fail ── ... ── attempt N ── fail → last error
//!                                          │
//!                                          └── ok → return immediately
//! ```
//!
//! No backoff growth, no jitter. Which errors earn another attempt is decided
//! by [`RetryMode`].

use serde::{Deserialize, Serialize};
use spot_ranker_core::{RankerError, Result};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default number of attempts per ranking operation
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 20;

/// Default pause between attempts (seconds)
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 10;

/// Which failures are worth another attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetryMode {
    /// Retry every error kind, including result shape mismatches
    All,

    /// Retry only transport failures and empty results; fail fast otherwise
    #[default]
    Transient,
}

impl RetryMode {
    /// Decide whether `err` gets another attempt under this mode
    pub fn should_retry(&self, err: &RankerError) -> bool {
        match self {
            Self::All => true,
            Self::Transient => err.is_transient(),
        }
    }
}

impl FromStr for RetryMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "transient" => Ok(Self::Transient),
            other => Err(format!("unknown retry mode '{}' (expected 'all' or 'transient')", other)),
        }
    }
}

impl fmt::Display for RetryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Transient => write!(f, "transient"),
        }
    }
}

/// Attempt budget and pause for [`retry`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one (0 is treated as 1)
    pub max_attempts: u32,

    /// Fixed pause between attempts
    pub delay: Duration,

    pub mode: RetryMode,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            mode: RetryMode::default(),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the default mode
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            mode: RetryMode::default(),
        }
    }

    /// Set the retry mode
    pub fn with_mode(mut self, mode: RetryMode) -> Self {
        self.mode = mode;
        self
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Run `op` until it succeeds or the policy gives up.
///
/// `label` only names the operation in log lines. Returns the last error once
/// attempts are exhausted, or the first error the mode refuses to retry. No
/// sleep follows the final attempt.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        debug!(operation = label, attempt, max_attempts = attempts, "Running attempt");

        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation = label, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if !policy.mode.should_retry(&e) => {
                warn!(operation = label, attempt, error = %e, "Non-retryable failure");
                return Err(e);
            }
            Err(e) if attempt >= attempts => {
                warn!(operation = label, attempts, error = %e, "Giving up after final attempt");
                return Err(e);
            }
            Err(e) => {
                warn!(
                    operation = label,
                    attempt,
                    max_attempts = attempts,
                    delay_secs = policy.delay.as_secs_f64(),
                    error = %e,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);

        let result = retry(&fast_policy(3), "flaky", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(RankerError::transport("connection reset"))
                } else {
                    Ok("ranked")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("ranked"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_returns_last_error_when_exhausted() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = retry(&fast_policy(4), "always-empty", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err(RankerError::no_data(format!("attempt {}", n))) }
        })
        .await;

        assert_eq!(result, Err(RankerError::no_data("attempt 4")));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_first_success_runs_once() {
        let calls = AtomicU32::new(0);

        let result = retry(&fast_policy(20), "healthy", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_mode_fails_fast_on_shape() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = retry(&fast_policy(5), "bad-shape", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RankerError::shape("got matrix")) }
        })
        .await;

        assert!(matches!(result, Err(RankerError::Shape(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_mode_retries_shape() {
        let calls = AtomicU32::new(0);
        let policy = fast_policy(5).with_mode(RetryMode::All);

        let result: Result<()> = retry(&policy, "bad-shape", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RankerError::shape("got matrix")) }
        })
        .await;

        assert!(matches!(result, Err(RankerError::Shape(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = retry(&fast_policy(0), "zero", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RankerError::transport("down")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retry_mode_parsing() {
        assert_eq!("all".parse::<RetryMode>(), Ok(RetryMode::All));
        assert_eq!("transient".parse::<RetryMode>(), Ok(RetryMode::Transient));
        assert!("sometimes".parse::<RetryMode>().is_err());
        assert_eq!(RetryMode::Transient.to_string(), "transient");
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 20);
        assert_eq!(policy.delay, Duration::from_secs(10));
        assert_eq!(policy.mode, RetryMode::Transient);
    }
}
