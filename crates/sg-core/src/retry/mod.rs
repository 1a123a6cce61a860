//! Retry policy shared by components that talk to flaky remote services.

use serde::{Deserialize, Serialize};

/// Bounded exponential backoff.
///
/// The delay after failed attempt `n` (0-based) is
/// `backoff_ms * backoff_multiplier^n`, capped at `max_backoff_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub backoff_multiplier: f64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_backoff() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 2_000,
            backoff_multiplier: 2.0,
            max_backoff_ms: 30_000,
        }
    }
}
