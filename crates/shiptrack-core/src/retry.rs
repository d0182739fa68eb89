//! Per-provider retry policy with exponential backoff and jitter.

use std::time::Duration;

use crate::classifier::ErrorCode;

/// Delay strategy between attempts against the same provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed {
        delay: Duration,
    },
    /// `base * factor^attempt`, capped at `max`, optionally with +/- 50% jitter.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(250),
            factor: 2.0,
            max: Duration::from_secs(2),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let seconds = (base.as_secs_f64() * factor.powi(exponent)).min(max.as_secs_f64());
                let delay = Duration::from_secs_f64(seconds.max(0.0));

                if !jitter {
                    return delay;
                }

                let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                let spread = millis / 2;
                let offset = fastrand::u64(0..=spread.saturating_mul(2));
                Duration::from_millis((millis - spread).saturating_add(offset))
            }
        }
    }
}

/// Decides whether a failed provider attempt is tried again.
///
/// Only transient infrastructure codes are retried; `max_retries` comes
/// from each provider's descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub enabled: bool,
    pub backoff: Backoff,
    pub retry_on: Vec<ErrorCode>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backoff: Backoff::default(),
            retry_on: vec![ErrorCode::Timeout, ErrorCode::NetworkError],
        }
    }
}

impl RetryConfig {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// `retries_used` counts retries already made, not the initial attempt.
    pub fn should_retry(&self, code: ErrorCode, retries_used: u32, max_retries: u32) -> bool {
        self.enabled && retries_used < max_retries && self.retry_on.contains(&code)
    }

    pub fn delay_for_retry(&self, retries_used: u32) -> Duration {
        self.backoff.delay(retries_used)
    }
}
