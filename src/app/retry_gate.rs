use crate::app::ports::RateLimiterPort;
use crate::cancel::CancelToken;
use crate::error::{IngestError, Result};
use crate::rate_limiter::LimitSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// Sleep after the denied attempt number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Asks `limiter` for permission up to `policy.max_attempts` times, backing
/// off exponentially after every denial.
pub async fn acquire<L: RateLimiterPort + ?Sized>(
    limiter: &L,
    limits: &LimitSet,
    bucket: &str,
    policy: RetryPolicy,
    cancel: &CancelToken,
) -> Result<()> {
    for attempt in 0..policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }
        if limiter.hit(limits, bucket) {
            if attempt > 0 {
                debug!(limit_set = limits.name(), bucket, attempt, "rate gate opened after backoff");
            }
            return Ok(());
        }
        let delay = policy.delay_for(attempt);
        crate::metrics::limiter::denied(limits.name());
        debug!(
            limit_set = limits.name(),
            bucket,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "about to hit rate limit, backing off"
        );
        cancel.sleep(delay).await?;
    }

    warn!(
        limit_set = limits.name(),
        bucket,
        attempts = policy.max_attempts,
        "rate gate exhausted"
    );
    Err(IngestError::RateLimitExceeded {
        limit_set: limits.name().to_string(),
        bucket: bucket.to_string(),
        attempts: policy.max_attempts,
    })
}

/// A limiter bound to one limit set, bucket and retry policy.
#[derive(Clone)]
pub struct RetryingGate {
    limiter: Arc<dyn RateLimiterPort>,
    limits: LimitSet,
    bucket: String,
    policy: RetryPolicy,
}

impl RetryingGate {
    pub fn new(
        limiter: Arc<dyn RateLimiterPort>,
        limits: LimitSet,
        bucket: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            limiter,
            limits,
            bucket: bucket.into(),
            policy,
        }
    }

    pub async fn acquire(&self, cancel: &CancelToken) -> Result<()> {
        acquire(self.limiter.as_ref(), &self.limits, &self.bucket, self.policy, cancel).await
    }

    pub fn limits(&self) -> &LimitSet {
        &self.limits
    }
}
