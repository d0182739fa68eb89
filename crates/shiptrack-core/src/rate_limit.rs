//! Per-provider request budgets.
//!
//! The minute budget is a fixed window that restarts once more than 60s have
//! passed since it opened. The hourly budget is enforced with a `governor`
//! limiter whose clock is pinned to the tracker's [`Clock`] for each decision.
//! Both live behind a single mutex per tracker so concurrent resolutions never
//! lose an increment.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use governor::clock::Clock as QuotaClockSource;
use governor::middleware::StateInformationMiddleware;
use governor::nanos::Nanos;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::registry::{ProviderDescriptor, RateLimit};
use crate::UtcDateTime;

const WINDOW: Duration = Duration::from_secs(60);

type HourlyLimiter = RateLimiter<NotKeyed, InMemoryState, PinnedClock, StateInformationMiddleware>;

/// Mutable counter for one provider's current minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitWindow {
    pub count: u32,
    pub window_start: UtcDateTime,
}

/// `governor` clock reading an instant set by the tracker under its lock.
#[derive(Debug, Clone, Default)]
struct PinnedClock {
    nanos: Arc<AtomicU64>,
}

impl PinnedClock {
    fn pin(&self, at: Nanos) {
        self.nanos.store(at.as_u64(), Ordering::Relaxed);
    }
}

impl QuotaClockSource for PinnedClock {
    type Instant = Nanos;

    fn now(&self) -> Nanos {
        Nanos::from(self.nanos.load(Ordering::Relaxed))
    }
}

struct ProviderBudget {
    limit: RateLimit,
    window: Option<RateLimitWindow>,
    clock: PinnedClock,
    hourly: HourlyLimiter,
    /// Earliest instant the hourly quota admits another call; `None` while it has room.
    hourly_free_at: Option<Nanos>,
}

impl ProviderBudget {
    fn new(limit: RateLimit, at: Nanos) -> Self {
        let clock = PinnedClock::default();
        clock.pin(at);
        let hourly = RateLimiter::direct_with_clock(hourly_quota(limit.per_hour), &clock)
            .with_middleware::<StateInformationMiddleware>();
        Self {
            limit,
            window: None,
            clock,
            hourly,
            hourly_free_at: None,
        }
    }

    fn acquire_hourly(&mut self, at: Nanos) -> bool {
        self.clock.pin(at);
        match self.hourly.check() {
            Ok(snapshot) => {
                self.hourly_free_at = if snapshot.remaining_burst_capacity() > 0 {
                    None
                } else {
                    // Same pinned instant with no burst left, so this is denied and consumes nothing.
                    self.hourly
                        .check()
                        .err()
                        .map(|not_until| not_until.earliest_possible())
                };
                true
            }
            Err(not_until) => {
                self.hourly_free_at = Some(not_until.earliest_possible());
                false
            }
        }
    }

    fn hourly_available(&self, at: Nanos) -> bool {
        self.hourly_free_at.map_or(true, |free_at| at >= free_at)
    }
}

/// Sliding one-minute request counter per provider, plus an hourly cap.
#[derive(Clone)]
pub struct RateLimitTracker {
    budgets: Arc<Mutex<HashMap<String, ProviderBudget>>>,
    clock: Arc<dyn Clock>,
    epoch: UtcDateTime,
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl RateLimitTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let epoch = clock.now();
        Self {
            budgets: Arc::new(Mutex::new(HashMap::new())),
            clock,
            epoch,
        }
    }

    /// Tracker pre-seeded with the limits of every given descriptor.
    pub fn for_providers<'a>(
        clock: Arc<dyn Clock>,
        descriptors: impl IntoIterator<Item = &'a ProviderDescriptor>,
    ) -> Self {
        let tracker = Self::new(clock);
        let at = tracker.quota_instant(tracker.clock.now());
        {
            let mut budgets = tracker.lock();
            for descriptor in descriptors {
                budgets.insert(
                    descriptor.name.clone(),
                    ProviderBudget::new(descriptor.rate_limit, at),
                );
            }
        }
        tracker
    }

    /// Registers or replaces the limits for a provider, resetting its window.
    pub fn register(&self, name: impl Into<String>, limit: RateLimit) {
        let at = self.quota_instant(self.clock.now());
        self.lock().insert(name.into(), ProviderBudget::new(limit, at));
    }

    /// Counts one request against `provider` and reports whether it may proceed.
    ///
    /// Providers that were never registered are not limited.
    pub fn try_acquire(&self, provider: &str) -> bool {
        let now = self.clock.now();
        let at = self.quota_instant(now);
        let mut budgets = self.lock();
        let Some(budget) = budgets.get_mut(provider) else {
            return true;
        };

        let permitted = match budget.window.as_mut() {
            Some(window) if now.duration_since(window.window_start) <= WINDOW => {
                window.count = window.count.saturating_add(1);
                window.count <= budget.limit.per_minute
            }
            _ => {
                budget.window = Some(RateLimitWindow {
                    count: 1,
                    window_start: now,
                });
                budget.limit.per_minute >= 1
            }
        };

        if !permitted {
            debug!(provider, limit = budget.limit.per_minute, "minute budget exhausted");
            return false;
        }

        if !budget.acquire_hourly(at) {
            debug!(provider, limit = budget.limit.per_hour, "hourly budget exhausted");
            return false;
        }

        true
    }

    /// Whether a call would currently be permitted, without consuming budget.
    pub fn has_capacity(&self, provider: &str) -> bool {
        let now = self.clock.now();
        let at = self.quota_instant(now);
        let budgets = self.lock();
        let Some(budget) = budgets.get(provider) else {
            return true;
        };

        let minute_ok = match budget.window {
            Some(window) if now.duration_since(window.window_start) <= WINDOW => {
                window.count < budget.limit.per_minute
            }
            _ => budget.limit.per_minute >= 1,
        };

        minute_ok && budget.hourly_available(at)
    }

    /// Snapshot of the current minute window for `provider`.
    pub fn window(&self, provider: &str) -> Option<RateLimitWindow> {
        self.lock().get(provider).and_then(|budget| budget.window)
    }

    fn quota_instant(&self, now: UtcDateTime) -> Nanos {
        Nanos::from(now.duration_since(self.epoch))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ProviderBudget>> {
        self.budgets
            .lock()
            .expect("rate limit tracker lock is not poisoned")
    }
}

fn hourly_quota(per_hour: u32) -> Quota {
    let burst = NonZeroU32::new(per_hour.max(1)).unwrap_or(NonZeroU32::MIN);
    Quota::per_hour(burst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn tracker(per_minute: u32) -> (RateLimitTracker, ManualClock) {
        let clock = ManualClock::new(UtcDateTime::parse("2024-01-01T00:00:00Z").expect("valid"));
        let tracker = RateLimitTracker::new(Arc::new(clock.clone()));
        tracker.register("maersk", RateLimit::new(per_minute, 1_000));
        (tracker, clock)
    }

    #[test]
    fn denies_after_limit_within_window() {
        let (tracker, _clock) = tracker(3);

        assert!(tracker.try_acquire("maersk"));
        assert!(tracker.try_acquire("maersk"));
        assert!(tracker.try_acquire("maersk"));
        assert!(!tracker.try_acquire("maersk"));
    }

    #[test]
    fn window_resets_after_sixty_seconds() {
        let (tracker, clock) = tracker(1);

        assert!(tracker.try_acquire("maersk"));
        assert!(!tracker.try_acquire("maersk"));

        clock.advance(Duration::from_secs(60));
        assert!(!tracker.try_acquire("maersk"), "exactly 60s is still the same window");

        clock.advance(Duration::from_secs(1));
        assert!(tracker.try_acquire("maersk"));
        assert_eq!(tracker.window("maersk").map(|window| window.count), Some(1));
    }

    #[test]
    fn unknown_providers_are_not_limited() {
        let (tracker, _clock) = tracker(1);
        assert!(tracker.try_acquire("unregistered"));
        assert!(tracker.try_acquire("unregistered"));
    }

    #[test]
    fn hourly_cap_applies_across_minute_windows() {
        let clock = ManualClock::new(UtcDateTime::parse("2024-01-01T00:00:00Z").expect("valid"));
        let tracker = RateLimitTracker::new(Arc::new(clock.clone()));
        tracker.register("hapag", RateLimit::new(10, 2));

        assert!(tracker.try_acquire("hapag"));
        clock.advance(Duration::from_secs(61));
        assert!(tracker.try_acquire("hapag"));
        clock.advance(Duration::from_secs(61));
        assert!(!tracker.has_capacity("hapag"));
        assert!(!tracker.try_acquire("hapag"));
    }

    #[test]
    fn capacity_reports_spent_hourly_budget_before_the_next_call() {
        let clock = ManualClock::new(UtcDateTime::parse("2024-01-01T00:00:00Z").expect("valid"));
        let tracker = RateLimitTracker::new(Arc::new(clock.clone()));
        tracker.register("cma", RateLimit::new(10, 1));

        assert!(tracker.try_acquire("cma"));
        clock.advance(Duration::from_secs(61));

        let reported = tracker.has_capacity("cma");
        let granted = tracker.try_acquire("cma");
        assert!(!reported);
        assert_eq!(reported, granted);
    }

    #[test]
    fn hourly_budget_refills_on_the_injected_clock() {
        let clock = ManualClock::new(UtcDateTime::parse("2024-01-01T00:00:00Z").expect("valid"));
        let tracker = RateLimitTracker::new(Arc::new(clock.clone()));
        tracker.register("cma", RateLimit::new(10, 1));

        assert!(tracker.try_acquire("cma"));
        clock.advance(Duration::from_secs(61));
        assert!(!tracker.try_acquire("cma"));

        clock.advance(Duration::from_secs(3_700));
        assert!(tracker.has_capacity("cma"));
        assert!(tracker.try_acquire("cma"));
        assert!(!tracker.has_capacity("cma"));
    }

    #[test]
    fn capacity_check_does_not_consume_budget() {
        let (tracker, _clock) = tracker(1);

        assert!(tracker.has_capacity("maersk"));
        assert!(tracker.has_capacity("maersk"));
        assert!(tracker.try_acquire("maersk"));
        assert!(!tracker.has_capacity("maersk"));
    }

    #[test]
    fn concurrent_acquisitions_never_exceed_limit() {
        let (tracker, _clock) = tracker(50);
        let handles = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || (0..20).filter(|_| tracker.try_acquire("maersk")).count())
            })
            .collect::<Vec<_>>();

        let granted: usize = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread completes"))
            .sum();

        assert_eq!(granted, 50);
    }
}
