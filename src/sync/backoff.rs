//! Bounded exponential backoff around page fetches.
//!
//! Retries cover throttling and transient transport failures only.
//! Every retry re-fetches the same cursor, so a retried page is merged
//! at most once. The budget counts retries after the first attempt.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::sync::types::PageResult;

/// Retry budget and delay curve.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Retries allowed after the first attempt.
    pub attempts: u32,
    /// Delay before the first retry; doubles per attempt.
    pub initial_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_delay: Duration::from_secs(1),
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry `attempt` (0-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Delay honoring a server-provided Retry-After when it asks for
    /// longer than the curve would wait.
    #[must_use]
    pub fn delay_with_hint(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let base = self.delay_for(attempt);
        retry_after.map_or(base, |suggested| suggested.max(base))
    }
}

/// Run `fetch` until it produces something other than a retryable
/// failure, or the retry budget runs out.
///
/// The final `RateLimited` or `Transient` is returned as-is once the
/// budget is spent; the caller decides how the run ends.
pub async fn retry_page<F, Fut>(policy: &BackoffPolicy, fetch: F) -> PageResult
where
    F: Fn() -> Fut,
    Fut: Future<Output = PageResult>,
{
    let mut attempt = 0u32;
    loop {
        let result = fetch().await;
        let delay = match &result {
            PageResult::RateLimited { retry_after } if attempt < policy.attempts => {
                warn!(
                    attempt = attempt + 1,
                    budget = policy.attempts,
                    "rate limited, backing off"
                );
                policy.delay_with_hint(attempt, *retry_after)
            }
            PageResult::Transient(detail) if attempt < policy.attempts => {
                warn!(
                    attempt = attempt + 1,
                    budget = policy.attempts,
                    "transient fetch failure, backing off: {detail}"
                );
                policy.delay_for(attempt)
            }
            _ => return result,
        };
        attempt += 1;
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delays_double_per_attempt() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(16));
    }

    #[test]
    fn retry_after_extends_but_never_shortens_the_wait() {
        let policy = BackoffPolicy::default();
        assert_eq!(
            policy.delay_with_hint(0, Some(Duration::from_secs(30))),
            Duration::from_secs(30)
        );
        assert_eq!(
            policy.delay_with_hint(3, Some(Duration::from_secs(2))),
            Duration::from_secs(8)
        );
        assert_eq!(policy.delay_with_hint(1, None), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn retries_then_returns_first_success() {
        let policy = BackoffPolicy {
            attempts: 5,
            initial_delay: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);

        let result = retry_page(&policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    PageResult::Transient("flaky".to_string())
                } else {
                    PageResult::Exhausted
                }
            }
        })
        .await;

        assert!(matches!(result, PageResult::Exhausted));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn budget_exhaustion_surfaces_the_last_failure() {
        let policy = BackoffPolicy {
            attempts: 2,
            initial_delay: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);

        let result = retry_page(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { PageResult::RateLimited { retry_after: None } }
        })
        .await;

        assert!(matches!(result, PageResult::RateLimited { .. }));
        // 1 initial attempt + 2 retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_results_pass_straight_through() {
        let policy = BackoffPolicy::default();
        let calls = AtomicU32::new(0);

        let result = retry_page(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { PageResult::Malformed("not json".to_string()) }
        })
        .await;

        assert!(matches!(result, PageResult::Malformed(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
