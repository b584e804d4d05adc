use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// One fixed window: at most `capacity` hits per `period`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateWindow {
    pub capacity: u32,
    pub period: Duration,
    pub label: String,
}

impl RateWindow {
    pub fn new(capacity: u32, period: Duration, label: impl Into<String>) -> Self {
        Self {
            capacity,
            period,
            label: label.into(),
        }
    }

    fn period_millis(&self) -> i64 {
        (self.period.as_millis() as i64).max(1)
    }
}

/// A named group of windows that must all admit a hit.
#[derive(Clone, Debug)]
pub struct LimitSet {
    name: String,
    windows: Vec<RateWindow>,
}

impl LimitSet {
    pub fn new(name: impl Into<String>, windows: Vec<RateWindow>) -> Self {
        Self {
            name: name.into(),
            windows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn windows(&self) -> &[RateWindow] {
        &self.windows
    }
}

/// Wall-clock source, in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CounterKey {
    limit_set: String,
    bucket: String,
    // position in the limit set; windows sharing a period keep separate counts
    window: usize,
    period_ms: i64,
    boundary: i64,
}

/// Fixed-window counter table shared by every caller in the process.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    counters: Mutex<HashMap<CounterKey, u32>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one hit against every window of `limits` for `bucket`.
    ///
    /// Either every window admits the hit and all of them are incremented, or
    /// nothing changes and `false` is returned.
    pub fn hit(&self, limits: &LimitSet, bucket: &str) -> bool {
        let now = self.clock.now_millis();
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);

        // Windows that have rolled over start from zero again.
        counters.retain(|key, _| key.boundary + key.period_ms > now);

        let keys: Vec<(CounterKey, u32)> = limits
            .windows()
            .iter()
            .enumerate()
            .map(|(index, window)| {
                let period_ms = window.period_millis();
                let key = CounterKey {
                    limit_set: limits.name().to_string(),
                    bucket: bucket.to_string(),
                    window: index,
                    period_ms,
                    boundary: now - now.rem_euclid(period_ms),
                };
                (key, window.capacity)
            })
            .collect();

        for ((key, capacity), window) in keys.iter().zip(limits.windows()) {
            let current = counters.get(key).copied().unwrap_or(0);
            if current + 1 > *capacity {
                debug!(
                    limit_set = limits.name(),
                    bucket,
                    window = %window.label,
                    count = current,
                    capacity,
                    "rate window full"
                );
                return false;
            }
        }

        for (key, _) in keys {
            *counters.entry(key).or_insert(0) += 1;
        }
        true
    }

    /// Hits already counted in the current window of `window`.
    ///
    /// `window` is looked up by position in `limits`; a window that is not part
    /// of the set has no count.
    pub fn current_count(&self, limits: &LimitSet, window: &RateWindow, bucket: &str) -> u32 {
        let Some(index) = limits.windows().iter().position(|w| w == window) else {
            return 0;
        };
        let now = self.clock.now_millis();
        let period_ms = window.period_millis();
        let key = CounterKey {
            limit_set: limits.name().to_string(),
            bucket: bucket.to_string(),
            window: index,
            period_ms,
            boundary: now - now.rem_euclid(period_ms),
        };
        let counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        counters.get(&key).copied().unwrap_or(0)
    }
}

impl crate::app::ports::RateLimiterPort for RateLimiter {
    fn hit(&self, limits: &LimitSet, bucket: &str) -> bool {
        RateLimiter::hit(self, limits, bucket)
    }
}
