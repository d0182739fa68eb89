//! Per-provider circuit breaker.
//!
//! Only infrastructure failures (timeouts, network faults, unusable
//! responses) are recorded; a shipment that is simply not found at one
//! provider says nothing about that provider's health.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

use crate::classifier::ErrorCode;
use crate::clock::{Clock, SystemClock};
use crate::UtcDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<UtcDateTime>,
}

impl Default for CircuitInner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
        }
    }
}

/// Thread-safe circuit breaker guarding one provider.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
    clock: Arc<dyn Clock>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default(), Arc::new(SystemClock))
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            inner: Mutex::new(CircuitInner::default()),
            clock,
        }
    }

    /// Whether a call may go out now. An open circuit past its timeout moves
    /// to half-open and lets one trial call through.
    pub fn allow_request(&self) -> bool {
        let now = self.clock.now();
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let can_try = inner.opened_at.is_some_and(|opened_at| {
                    now.duration_since(opened_at) >= self.config.open_timeout
                });

                if can_try {
                    inner.state = CircuitState::HalfOpen;
                    inner.opened_at = None;
                }
                can_try
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    pub fn record_failure(&self) {
        let now = self.clock.now();
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        if inner.state == CircuitState::HalfOpen
            || inner.consecutive_failures >= self.config.failure_threshold
        {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(now);
        }
    }

    /// Records the outcome of a classified failure, ignoring answers that
    /// reached the provider and came back negative.
    pub fn record_error(&self, code: ErrorCode) {
        if counts_against_circuit(code) {
            self.record_failure();
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CircuitInner> {
        self.inner
            .lock()
            .expect("circuit breaker lock is not poisoned")
    }
}

fn counts_against_circuit(code: ErrorCode) -> bool {
    matches!(
        code,
        ErrorCode::Timeout
            | ErrorCode::NetworkError
            | ErrorCode::InvalidResponse
            | ErrorCode::UnknownError
    )
}

/// One breaker per provider name, created on first use.
#[derive(Clone)]
pub struct CircuitBreakerSet {
    config: CircuitBreakerConfig,
    breakers: Arc<Mutex<HashMap<String, Arc<CircuitBreaker>>>>,
    clock: Arc<dyn Clock>,
}

impl Default for CircuitBreakerSet {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default(), Arc::new(SystemClock))
    }
}

impl CircuitBreakerSet {
    pub fn new(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            breakers: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    pub fn breaker(&self, provider: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self
            .breakers
            .lock()
            .expect("circuit breaker set lock is not poisoned");
        Arc::clone(
            breakers
                .entry(provider.to_owned())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(self.config, Arc::clone(&self.clock)))),
        )
    }

    /// State without creating a breaker; unknown providers are closed.
    pub fn state(&self, provider: &str) -> CircuitState {
        self.breakers
            .lock()
            .expect("circuit breaker set lock is not poisoned")
            .get(provider)
            .map_or(CircuitState::Closed, |breaker| breaker.state())
    }
}
