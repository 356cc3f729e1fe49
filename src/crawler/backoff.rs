//! Retry delay policy and the sleep seam the transport waits through

use crate::config::TransportConfig;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

/// Exponential backoff with jitter, capped
///
/// Attempt `n` (0-based, so the first retry is `n = 1`) waits
/// `min(base * 2^n + jitter, cap)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_jitter: Duration,
}

impl BackoffPolicy {
    pub fn from_config(config: &TransportConfig) -> Self {
        Self {
            base: Duration::from_millis(config.backoff_base_ms),
            cap: Duration::from_millis(config.backoff_cap_ms),
            max_jitter: Duration::from_millis(config.jitter_ms),
        }
    }

    /// Delay before `attempt` with an explicit jitter value
    pub fn delay_with_jitter(&self, attempt: u32, jitter: Duration) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(31));
        let exponential = self.base.saturating_mul(factor);
        exponential.saturating_add(jitter).min(self.cap)
    }

    /// Delay before `attempt` with jitter drawn uniformly from `[0, max_jitter]`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        self.delay_with_jitter(attempt, jitter)
    }
}

/// Something that can wait
///
/// The transport never calls `tokio::time::sleep` directly, so tests can
/// substitute a sleeper that records the requested delays and returns at once.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real-time sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
