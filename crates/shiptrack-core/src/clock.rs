//! Time source shared by the cache, rate limiter and resolution service.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::UtcDateTime;

/// Wall-clock abstraction.
pub trait Clock: Send + Sync {
    fn now(&self) -> UtcDateTime;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> UtcDateTime {
        UtcDateTime::now()
    }
}

/// Manually advanced clock for deterministic offline tests.
///
/// Clones share the same instant, so a test can hold one handle and hand
/// another to the components under test.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<UtcDateTime>>,
}

impl ManualClock {
    pub fn new(start: UtcDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().expect("manual clock lock is not poisoned");
        *now = now.saturating_add(duration);
    }

    pub fn set(&self, instant: UtcDateTime) {
        *self.now.lock().expect("manual clock lock is not poisoned") = instant;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(UtcDateTime::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> UtcDateTime {
        *self.now.lock().expect("manual clock lock is not poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let start = UtcDateTime::parse("2024-05-01T12:00:00Z").expect("valid timestamp");
        let clock = ManualClock::new(start);
        let handle = clock.clone();

        handle.advance(Duration::from_secs(61));

        assert_eq!(clock.now().duration_since(start), Duration::from_secs(61));
    }
}
