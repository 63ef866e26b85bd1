//! Shared rate limiter keyed by credential fingerprint
//!
//! Every call made with the same token draws from one GCRA bucket; calls
//! made with different tokens never wait on each other.

use aiplane_cloud::{Diagnostic, DiagnosticCode};
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

type KeyedLimiter = RateLimiter<u64, DefaultKeyedStateStore<u64>, DefaultClock>;

/// Client-side request budget per credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_minute: u32,
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 500,
            burst: 20,
        }
    }
}

impl RateLimitConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// Cheap to clone; clones share the same buckets.
#[derive(Clone, Default)]
pub struct SharedLimiter {
    limiter: Option<Arc<KeyedLimiter>>,
}

impl std::fmt::Debug for SharedLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedLimiter")
            .field("enabled", &self.limiter.is_some())
            .finish()
    }
}

impl SharedLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            return Self::unlimited();
        }
        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_minute(per_minute).allow_burst(burst);
        Self {
            limiter: Some(Arc::new(RateLimiter::keyed(quota))),
        }
    }

    pub fn unlimited() -> Self {
        Self { limiter: None }
    }

    /// Wait for budget on `key`. The wait ends early with `Aborted` when
    /// `abort` fires.
    pub async fn acquire(&self, key: u64, abort: &CancellationToken) -> Result<(), Diagnostic> {
        if abort.is_cancelled() {
            return Err(aborted());
        }
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };
        if limiter.check_key(&key).is_ok() {
            return Ok(());
        }

        tracing::debug!("Rate limit budget exhausted for credential {:016x}, waiting", key);
        tokio::select! {
            _ = abort.cancelled() => Err(aborted()),
            _ = limiter.until_key_ready(&key) => Ok(()),
        }
    }
}

fn aborted() -> Diagnostic {
    Diagnostic::fatal(
        DiagnosticCode::Aborted,
        "aborted while waiting for rate limit budget",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unlimited_never_waits() {
        let limiter = SharedLimiter::new(&RateLimitConfig::disabled());
        let abort = CancellationToken::new();
        for _ in 0..100 {
            limiter.acquire(1, &abort).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_keys_have_independent_buckets() {
        let limiter = SharedLimiter::new(&RateLimitConfig {
            enabled: true,
            requests_per_minute: 1,
            burst: 1,
        });
        let abort = CancellationToken::new();

        limiter.acquire(1, &abort).await.unwrap();
        // key 1 is now exhausted; key 2 still has budget
        limiter.acquire(2, &abort).await.unwrap();

        abort.cancel();
        let err = limiter.acquire(1, &abort).await.unwrap_err();
        assert_eq!(err.code, DiagnosticCode::Aborted);
    }

    #[tokio::test]
    async fn test_abort_interrupts_wait() {
        let limiter = SharedLimiter::new(&RateLimitConfig {
            enabled: true,
            requests_per_minute: 1,
            burst: 1,
        });
        let abort = CancellationToken::new();
        limiter.acquire(7, &abort).await.unwrap();

        let trigger = abort.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = limiter.acquire(7, &abort).await.unwrap_err();
        assert_eq!(err.code, DiagnosticCode::Aborted);
    }
}
