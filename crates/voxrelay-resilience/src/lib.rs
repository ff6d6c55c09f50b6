// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry with exponential backoff, shared by every vendor call site.
//!
//! Policies are data, not behavior: call sites pick attempt counts and
//! delays, the combinator owns the loop, the backoff curve, and the jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;
use voxrelay_core::RelayError;

/// Jitter fraction applied on top of each computed delay, so clients that
/// failed together do not retry in lockstep.
const JITTER_FRACTION: f64 = 0.1;

/// Backoff parameters for a retryable operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Must be at least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay, pre-jitter.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub factor: f64,
}

impl RetryPolicy {
    /// Policy for session establishment: three attempts with increasing
    /// waits, since the gateway can take several seconds to provision an
    /// instance.
    pub fn connect() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(15),
            factor: 2.0,
        }
    }

    /// Policy for vendor API calls (transcription, chat completion).
    pub fn vendor() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            factor: 2.0,
        }
    }

    /// Backoff delay after the given failed attempt (1-based), pre-jitter.
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.factor.powi(attempt.saturating_sub(1) as i32);
        let raw = self.base_delay.as_secs_f64() * exp;
        Duration::from_secs_f64(raw.min(self.max_delay.as_secs_f64()))
    }

    /// Backoff delay with jitter applied.
    fn jittered_delay_for(&self, attempt: u32) -> Duration {
        let delay = self.delay_for(attempt);
        let jitter = rand::thread_rng().gen_range(0.0..JITTER_FRACTION);
        delay.mul_f64(1.0 + jitter)
    }
}

/// Runs `op` until it succeeds or the policy's attempts are exhausted,
/// sleeping between attempts. `is_retryable` classifies each failure: a
/// non-retryable error (bad credentials, malformed request) is returned
/// immediately instead of burning the remaining attempts.
pub async fn retry<T, E, F, Fut, P>(
    policy: RetryPolicy,
    op_name: &str,
    mut op: F,
    is_retryable: P,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !is_retryable(&e) {
                    warn!(op = op_name, attempt, error = %e, "non-retryable error, giving up");
                    return Err(e);
                }
                if attempt < attempts {
                    let delay = policy.jittered_delay_for(attempt);
                    warn!(
                        op = op_name,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "operation failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                } else {
                    warn!(op = op_name, attempts, error = %e, "operation failed, giving up");
                }
                last_error = Some(e);
            }
        }
    }

    // attempts >= 1, so at least one error was recorded.
    Err(last_error.unwrap())
}

/// Returns true for HTTP status codes that indicate transient errors worth
/// retrying.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Retry classification for [`RelayError`]: vendor answers are judged by
/// their HTTP status, while network-level failures (no status at all) and
/// timeouts are assumed transient.
pub fn is_transient(error: &RelayError) -> bool {
    match error {
        RelayError::Gateway { status, .. } | RelayError::Reply { status, .. } => {
            status.map_or(true, is_transient_status)
        }
        RelayError::Timeout { .. } => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            factor: 2.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_first_try_without_sleeping() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry(
            fast_policy(),
            "test",
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            },
            |_| true,
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, String> = retry(
            fast_policy(),
            "test",
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(format!("failure {n}"))
                    } else {
                        Ok("recovered")
                    }
                }
            },
            |_| true,
        )
        .await;
        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_last_error_on_exhaustion() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry(
            fast_policy(),
            "test",
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("failure {n}")) }
            },
            |_| true,
        )
        .await;
        assert_eq!(result.unwrap_err(), "failure 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_fails_on_the_first_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), RelayError> = retry(
            fast_policy(),
            "test",
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(RelayError::Reply {
                        message: "completion returned 401".into(),
                        status: Some(401),
                        source: None,
                    })
                }
            },
            is_transient,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn relay_errors_classify_by_status() {
        let with_status = |status| RelayError::Reply {
            message: format!("completion returned {status}"),
            status: Some(status),
            source: None,
        };
        assert!(is_transient(&with_status(429)));
        assert!(is_transient(&with_status(503)));
        assert!(!is_transient(&with_status(401)));
        assert!(!is_transient(&with_status(422)));

        // No status means the request never got an answer.
        assert!(is_transient(&RelayError::Gateway {
            message: "connection refused".into(),
            status: None,
            source: None,
        }));
        assert!(is_transient(&RelayError::Timeout {
            duration: Duration::from_secs(30),
        }));
        assert!(!is_transient(&RelayError::Config("bad key".into())));
    }

    #[test]
    fn delay_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(15),
            factor: 2.0,
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(2), Duration::from_secs(10));
        // 20s raw, capped at 15s.
        assert_eq!(policy.delay_for(3), Duration::from_secs(15));
        assert_eq!(policy.delay_for(4), Duration::from_secs(15));
    }

    #[test]
    fn jitter_stays_within_fraction() {
        let policy = fast_policy();
        for attempt in 1..=3 {
            let base = policy.delay_for(attempt);
            for _ in 0..50 {
                let jittered = policy.jittered_delay_for(attempt);
                assert!(jittered >= base);
                assert!(jittered <= base.mul_f64(1.0 + JITTER_FRACTION));
            }
        }
    }

    #[test]
    fn transient_statuses() {
        assert!(is_transient_status(429));
        assert!(is_transient_status(500));
        assert!(is_transient_status(503));
        assert!(!is_transient_status(400));
        assert!(!is_transient_status(401));
        assert!(!is_transient_status(404));
    }
}
