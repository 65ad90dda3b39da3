//! Bounded retry with a fixed delay
//!
//! One combinator wraps both link harvesting and entry extraction:
//!
//! | Attempt result | Attempts left | Action |
//! |----------------|---------------|--------|
//! | `Ok` and accepted | any | stop with `Success` |
//! | `Ok` but rejected, or `Err` | yes | sleep `retry_delay`, try again |
//! | `Ok` but rejected, or `Err` | no | stop with one `FailureRecord` |

use crate::config::RetryConfig;
use crate::state::FailureRecord;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// How many times to retry and how long to wait in between
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.retry_delay_ms),
        )
    }

    /// Total attempts, including the first one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

/// Result of a retried operation
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Success { value: T, attempts: u32 },
    Exhausted(FailureRecord),
}

/// Runs `operation` until `accept` approves its result or attempts run out
///
/// `target` names the URL the operation works on; it becomes the `url` of the
/// failure record on exhaustion.
///
/// # Example
///
/// ```
/// use catalog_harvester::crawler::{retry, RetryOutcome, RetryPolicy};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let policy = RetryPolicy::new(2, Duration::ZERO);
/// let outcome = retry(
///     &policy,
///     "https://site/page",
///     || async { Ok::<_, String>(Vec::<u32>::new()) },
///     |links| !links.is_empty(),
/// )
/// .await;
///
/// match outcome {
///     RetryOutcome::Exhausted(failure) => assert_eq!(failure.attempts, 3),
///     RetryOutcome::Success { .. } => unreachable!(),
/// }
/// # }
/// ```
pub async fn retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    target: &str,
    mut operation: F,
    accept: P,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&T) -> bool,
{
    let max_attempts = policy.max_attempts();
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(value) if accept(&value) => {
                if attempt > 1 {
                    tracing::info!("{} succeeded on attempt {}", target, attempt);
                }
                return RetryOutcome::Success {
                    value,
                    attempts: attempt,
                };
            }
            Ok(_) => last_error = Some("result rejected".to_string()),
            Err(e) => last_error = Some(e.to_string()),
        }

        if attempt < max_attempts {
            tracing::warn!(
                "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                attempt,
                max_attempts,
                target,
                last_error.as_deref().unwrap_or("unknown error"),
                policy.retry_delay
            );
            tokio::time::sleep(policy.retry_delay).await;
        }
    }

    tracing::warn!(
        "Giving up on {} after {} attempt(s): {}",
        target,
        max_attempts,
        last_error.as_deref().unwrap_or("unknown error")
    );
    RetryOutcome::Exhausted(FailureRecord::new(target, max_attempts, last_error))
}
