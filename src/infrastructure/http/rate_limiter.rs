//! Request budget derivation and the shared throttle
//!
//! Every worker of every collector on a connection awaits the same
//! [`RequestThrottle`], so the budget holds regardless of concurrency.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header::HeaderMap;
use std::num::NonZeroU32;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info};

use crate::domain::errors::{CollectorError, CollectorResult};
use crate::domain::models::RateLimitConfig;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Requests allowed per window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBudget {
    pub limit: u32,
    pub window: Duration,
}

impl RateBudget {
    /// Spacing between two requests that keeps within the budget
    pub fn tick_interval(&self) -> Duration {
        let interval = self.window / self.limit.max(1);
        interval.max(Duration::from_millis(1))
    }
}

/// Derives a [`RateBudget`] from response headers.
///
/// The quota header is read per credential and multiplied by the number of
/// credentials on the connection; all credentials are assumed to carry the
/// same quota.
#[derive(Debug, Clone)]
pub struct RateLimitCalculator {
    quota_header: String,
    window: Duration,
    default_budget: RateBudget,
    credential_count: u32,
}

impl RateLimitCalculator {
    pub fn new(config: &RateLimitConfig, credential_count: usize) -> Self {
        Self {
            quota_header: config.quota_header.clone(),
            window: Duration::from_secs(config.quota_window_secs),
            default_budget: RateBudget {
                limit: config.requests_per_hour,
                window: Duration::from_secs(3600),
            },
            credential_count: u32::try_from(credential_count.max(1)).unwrap_or(u32::MAX),
        }
    }

    pub const fn default_budget(&self) -> RateBudget {
        self.default_budget
    }

    /// Budget for the most recent response; the configured default when
    /// there is no response yet or it carries no quota header.
    pub fn calculate(&self, headers: Option<&HeaderMap>) -> CollectorResult<RateBudget> {
        let Some(value) = headers.and_then(|h| h.get(self.quota_header.as_str())) else {
            return Ok(self.default_budget);
        };

        let per_credential: u32 = value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .filter(|limit| *limit > 0)
            .ok_or_else(|| {
                CollectorError::Parse(format!(
                    "invalid {} header: {:?}",
                    self.quota_header, value
                ))
            })?;

        Ok(RateBudget {
            limit: per_credential.saturating_mul(self.credential_count),
            window: self.window,
        })
    }
}

struct ThrottleState {
    limiter: Arc<DirectLimiter>,
    budget: RateBudget,
    /// Active min tick overrides with their holder counts
    overrides: BTreeMap<Duration, usize>,
}

impl ThrottleState {
    fn new(budget: RateBudget) -> Self {
        Self {
            limiter: Arc::new(build_limiter(budget.tick_interval())),
            budget,
            overrides: BTreeMap::new(),
        }
    }

    fn interval(&self) -> Duration {
        effective_interval(self.budget, self.overrides.keys().next_back().copied())
    }

    /// Swap in a limiter for the current interval when it changed.
    ///
    /// The fresh limiter's single burst cell is consumed up front, so a swap
    /// never lets a request through ahead of the new spacing.
    fn rebuild_if(&mut self, previous: Duration) {
        let interval = self.interval();
        if interval == previous {
            return;
        }
        let limiter = build_limiter(interval);
        let _ = limiter.check();
        self.limiter = Arc::new(limiter);
        debug!(tick_ms = interval.as_millis(), "throttle interval changed");
    }
}

fn build_limiter(interval: Duration) -> DirectLimiter {
    let quota = Quota::with_period(interval)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(NonZeroU32::MIN);
    RateLimiter::direct(quota)
}

fn effective_interval(budget: RateBudget, min_tick: Option<Duration>) -> Duration {
    let interval = budget.tick_interval();
    min_tick.map_or(interval, |min| interval.max(min))
}

/// Token-bucket throttle shared by all workers using one connection
pub struct RequestThrottle {
    state: RwLock<ThrottleState>,
}

impl RequestThrottle {
    pub fn new(budget: RateBudget) -> Self {
        Self {
            state: RwLock::new(ThrottleState::new(budget)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ThrottleState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ThrottleState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until the next request may be sent
    pub async fn acquire(&self) {
        let limiter = Arc::clone(&self.read().limiter);
        limiter.until_ready().await;
    }

    /// Replace the budget; in-flight waiters finish on the old limiter
    pub fn reset(&self, budget: RateBudget) {
        let mut state = self.write();
        if state.budget == budget {
            return;
        }
        let previous = state.interval();
        state.budget = budget;
        state.rebuild_if(previous);
        info!(
            limit = budget.limit,
            window_secs = budget.window.as_secs(),
            tick_ms = state.interval().as_millis(),
            "request budget updated"
        );
    }

    /// Slow the throttle to at least one request per `min_tick` until the
    /// returned guard drops.
    ///
    /// Overlapping guards stack: the slowest active override wins, and each
    /// guard only withdraws its own entry.
    pub fn slow_down(&self, min_tick: Duration) -> MinTickGuard<'_> {
        let mut state = self.write();
        let previous = state.interval();
        *state.overrides.entry(min_tick).or_insert(0) += 1;
        state.rebuild_if(previous);
        MinTickGuard {
            throttle: self,
            min_tick,
        }
    }

    fn release(&self, min_tick: Duration) {
        let mut state = self.write();
        let previous = state.interval();
        let remaining = state.overrides.get_mut(&min_tick).map(|count| {
            *count -= 1;
            *count
        });
        if remaining == Some(0) {
            state.overrides.remove(&min_tick);
        }
        state.rebuild_if(previous);
    }

    pub fn budget(&self) -> RateBudget {
        self.read().budget
    }

    /// Current spacing between requests
    pub fn tick_interval(&self) -> Duration {
        self.read().interval()
    }
}

/// Holds one min tick override on a [`RequestThrottle`].
pub struct MinTickGuard<'a> {
    throttle: &'a RequestThrottle,
    min_tick: Duration,
}

impl Drop for MinTickGuard<'_> {
    fn drop(&mut self) {
        self.throttle.release(self.min_tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use std::time::Instant;

    fn headers(limit: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("X-RateLimit-Limit", HeaderValue::from_str(limit).unwrap());
        headers
    }

    #[test]
    fn test_quota_header_times_credentials() {
        let calculator = RateLimitCalculator::new(&RateLimitConfig::default(), 3);
        let budget = calculator.calculate(Some(&headers("100"))).unwrap();
        assert_eq!(budget.limit, 300);
        assert_eq!(budget.window, Duration::from_secs(3600));
    }

    #[test]
    fn test_default_without_header() {
        let calculator = RateLimitCalculator::new(&RateLimitConfig::default(), 3);
        assert_eq!(calculator.calculate(None).unwrap().limit, 18_000);
        assert_eq!(calculator.calculate(Some(&HeaderMap::new())).unwrap().limit, 18_000);
    }

    #[test]
    fn test_malformed_header() {
        let calculator = RateLimitCalculator::new(&RateLimitConfig::default(), 1);
        assert!(calculator.calculate(Some(&headers("lots"))).is_err());
        assert!(calculator.calculate(Some(&headers("0"))).is_err());
    }

    #[test]
    fn test_tick_interval() {
        let budget = RateBudget {
            limit: 18_000,
            window: Duration::from_secs(3600),
        };
        assert_eq!(budget.tick_interval(), Duration::from_millis(200));
    }

    fn hourly(limit: u32) -> RequestThrottle {
        RequestThrottle::new(RateBudget {
            limit,
            window: Duration::from_secs(3600),
        })
    }

    #[test]
    fn test_min_tick_override_and_restore() {
        let throttle = hourly(3600);
        assert_eq!(throttle.tick_interval(), Duration::from_secs(1));

        {
            let _guard = throttle.slow_down(Duration::from_secs(5));
            assert_eq!(throttle.tick_interval(), Duration::from_secs(5));
        }
        assert_eq!(throttle.tick_interval(), Duration::from_secs(1));

        // an override faster than the budget never speeds it up
        let _fast = throttle.slow_down(Duration::from_millis(10));
        assert_eq!(throttle.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_overlapping_overrides_release_only_their_own() {
        let throttle = hourly(3600);

        let first = throttle.slow_down(Duration::from_secs(2));
        let second = throttle.slow_down(Duration::from_secs(5));
        assert_eq!(throttle.tick_interval(), Duration::from_secs(5));

        drop(first);
        assert_eq!(throttle.tick_interval(), Duration::from_secs(5));

        drop(second);
        assert_eq!(throttle.tick_interval(), Duration::from_secs(1));

        // same interval held twice
        let a = throttle.slow_down(Duration::from_secs(3));
        let b = throttle.slow_down(Duration::from_secs(3));
        drop(a);
        assert_eq!(throttle.tick_interval(), Duration::from_secs(3));
        drop(b);
        assert_eq!(throttle.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_override_survives_budget_reset() {
        let throttle = hourly(3600);
        let _guard = throttle.slow_down(Duration::from_secs(5));
        throttle.reset(RateBudget {
            limit: 7200,
            window: Duration::from_secs(3600),
        });
        assert_eq!(throttle.tick_interval(), Duration::from_secs(5));
        assert_eq!(throttle.budget().limit, 7200);
    }

    #[tokio::test]
    async fn test_poisoned_lock_keeps_throttling() {
        let throttle = hourly(3600);
        let poisoned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _state = throttle.state.write().unwrap();
            panic!("worker panicked while holding the throttle");
        }));
        assert!(poisoned.is_err());
        assert!(throttle.state.is_poisoned());

        assert_eq!(throttle.tick_interval(), Duration::from_secs(1));
        throttle.acquire().await;
        let _guard = throttle.slow_down(Duration::from_secs(4));
        assert_eq!(throttle.tick_interval(), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_swapped_limiter_has_no_free_burst() {
        let throttle = RequestThrottle::new(RateBudget {
            limit: 50,
            window: Duration::from_secs(1),
        });
        let _guard = throttle.slow_down(Duration::from_millis(60));

        let start = Instant::now();
        throttle.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_acquire_spaces_requests() {
        let throttle = Arc::new(RequestThrottle::new(RateBudget {
            limit: 50,
            window: Duration::from_secs(1),
        }));

        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..5 {
            let throttle = Arc::clone(&throttle);
            handles.push(tokio::spawn(async move { throttle.acquire().await }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        // first permit is immediate, the remaining four are 20ms apart
        assert!(start.elapsed() >= Duration::from_millis(75));
    }
}
