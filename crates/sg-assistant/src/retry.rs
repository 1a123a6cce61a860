//! Retry logic with exponential backoff.

use async_trait::async_trait;
use sg_core::retry::RetryPolicy;
use std::time::Duration;

/// Delay after failed attempt `attempt` (0-based).
pub fn compute_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let delay_ms = (policy.backoff_ms as f64) * policy.backoff_multiplier.powi(attempt as i32);
    let capped = delay_ms.min(policy.max_backoff_ms as f64) as u64;
    Duration::from_millis(capped)
}

/// Whether another attempt follows failed attempt `attempt` (0-based).
pub fn should_retry(policy: &RetryPolicy, attempt: u32) -> bool {
    attempt + 1 < policy.max_attempts
}

/// Suspension point between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff() {
        let policy = RetryPolicy {
            max_attempts: 6,
            backoff_ms: 2000,
            backoff_multiplier: 2.0,
            max_backoff_ms: 30_000,
        };

        assert_eq!(compute_delay(&policy, 0), Duration::from_secs(2));
        assert_eq!(compute_delay(&policy, 1), Duration::from_secs(4));
        assert_eq!(compute_delay(&policy, 2), Duration::from_secs(8));
        assert_eq!(compute_delay(&policy, 3), Duration::from_secs(16));
        // capped
        assert_eq!(compute_delay(&policy, 4), Duration::from_secs(30));
    }

    #[test]
    fn attempt_limit() {
        let policy = RetryPolicy::default();
        assert!(should_retry(&policy, 0));
        assert!(should_retry(&policy, 1));
        assert!(!should_retry(&policy, 2));
    }
}
