//! Resolution policy configuration.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `SHIPTRACK_FRESH_MINUTES` | 60 |
//! | `SHIPTRACK_RESPONSE_TTL_SECS` | 900 |
//! | `SHIPTRACK_RECORD_TTL_SECS` | 86400 |
//! | `SHIPTRACK_ARCHIVE_TTL_SECS` | 604800 |
//! | `SHIPTRACK_EARLY_STOP_RELIABILITY` | 0.90 |
//! | `SHIPTRACK_STALE_RETRY_AFTER_SECS` | 300 |
//! | `SHIPTRACK_VERY_STALE_RETRY_AFTER_SECS` | 600 |
//! | `SHIPTRACK_RETRY_BASE_MS` | 250 |
//! | `SHIPTRACK_CIRCUIT_FAILURE_THRESHOLD` | 5 |
//! | `SHIPTRACK_CIRCUIT_OPEN_SECS` | 60 |

use std::time::Duration;

use config::{Config, Environment};
use serde::Deserialize;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::retry::{Backoff, RetryConfig};
use crate::{CoreError, ValidationError};

const ENV_PREFIX: &str = "SHIPTRACK";

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Cached records younger than this are served without a refresh.
    pub fresh_threshold: Duration,
    pub response_ttl: Duration,
    pub record_ttl: Duration,
    /// Lifetime of the archive copy backing the very-stale fallback.
    pub archive_ttl: Duration,
    /// A success from a provider strictly above this reliability ends the walk.
    pub early_stop_reliability: f64,
    pub stale_retry_after_secs: u64,
    pub very_stale_retry_after_secs: u64,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            fresh_threshold: Duration::from_secs(60 * 60),
            response_ttl: Duration::from_secs(15 * 60),
            record_ttl: Duration::from_secs(24 * 60 * 60),
            archive_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            early_stop_reliability: 0.90,
            stale_retry_after_secs: 300,
            very_stale_retry_after_secs: 600,
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Raw `SHIPTRACK_*` overrides; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TrackerSettings {
    fresh_minutes: Option<u64>,
    response_ttl_secs: Option<u64>,
    record_ttl_secs: Option<u64>,
    archive_ttl_secs: Option<u64>,
    early_stop_reliability: Option<f64>,
    stale_retry_after_secs: Option<u64>,
    very_stale_retry_after_secs: Option<u64>,
    retry_base_ms: Option<u64>,
    circuit_failure_threshold: Option<u32>,
    circuit_open_secs: Option<u64>,
}

impl TrackerSettings {
    fn apply(self, mut config: TrackerConfig) -> TrackerConfig {
        if let Some(minutes) = self.fresh_minutes {
            config.fresh_threshold = Duration::from_secs(minutes.saturating_mul(60));
        }
        if let Some(secs) = self.response_ttl_secs {
            config.response_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = self.record_ttl_secs {
            config.record_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = self.archive_ttl_secs {
            config.archive_ttl = Duration::from_secs(secs);
        }
        if let Some(reliability) = self.early_stop_reliability {
            config.early_stop_reliability = reliability;
        }
        if let Some(secs) = self.stale_retry_after_secs {
            config.stale_retry_after_secs = secs;
        }
        if let Some(secs) = self.very_stale_retry_after_secs {
            config.very_stale_retry_after_secs = secs;
        }
        if let Some(millis) = self.retry_base_ms {
            if let Backoff::Exponential { base, .. } = &mut config.retry.backoff {
                *base = Duration::from_millis(millis);
            }
        }
        if let Some(threshold) = self.circuit_failure_threshold {
            config.circuit_breaker.failure_threshold = threshold;
        }
        if let Some(secs) = self.circuit_open_secs {
            config.circuit_breaker.open_timeout = Duration::from_secs(secs);
        }
        config
    }
}

impl TrackerConfig {
    /// Defaults overridden by `SHIPTRACK_*` environment variables.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::load(Environment::with_prefix(ENV_PREFIX))
    }

    fn load(environment: Environment) -> Result<Self, CoreError> {
        let settings: TrackerSettings = Config::builder()
            .add_source(environment.try_parsing(true).ignore_empty(true))
            .build()?
            .try_deserialize()?;

        let config = settings.apply(Self::default());
        config.validate()?;
        Ok(config)
    }

    /// Range checks that deserialization alone cannot express.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..=1.0).contains(&self.early_stop_reliability) {
            return Err(invalid(
                "EARLY_STOP_RELIABILITY",
                self.early_stop_reliability.to_string(),
            ));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(invalid("CIRCUIT_FAILURE_THRESHOLD", String::from("0")));
        }
        Ok(())
    }
}

fn invalid(suffix: &str, value: String) -> ValidationError {
    ValidationError::InvalidConfig {
        key: format!("{ENV_PREFIX}_{suffix}"),
        value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<TrackerConfig, CoreError> {
        let vars = pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect::<config::Map<_, _>>();
        TrackerConfig::load(Environment::with_prefix(ENV_PREFIX).source(Some(vars)))
    }

    #[test]
    fn defaults_match_resolution_policy() {
        let config = TrackerConfig::default();
        assert_eq!(config.fresh_threshold, Duration::from_secs(3_600));
        assert_eq!(config.response_ttl, Duration::from_secs(900));
        assert_eq!(config.early_stop_reliability, 0.90);
        assert_eq!(config.stale_retry_after_secs, 300);
        assert_eq!(config.very_stale_retry_after_secs, 600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn no_overrides_keeps_defaults() {
        let config = load(&[]).expect("empty environment is valid");
        assert_eq!(config, TrackerConfig::default());
    }

    #[test]
    fn env_overrides_apply() {
        let config = load(&[
            ("SHIPTRACK_FRESH_MINUTES", "30"),
            ("SHIPTRACK_RESPONSE_TTL_SECS", "120"),
            ("SHIPTRACK_CIRCUIT_FAILURE_THRESHOLD", "2"),
            ("SHIPTRACK_EARLY_STOP_RELIABILITY", ""),
            ("SHIPTRACK_MAERSK_API_KEY", "secret"),
        ])
        .expect("valid overrides");

        assert_eq!(config.fresh_threshold, Duration::from_secs(1_800));
        assert_eq!(config.response_ttl, Duration::from_secs(120));
        assert_eq!(config.circuit_breaker.failure_threshold, 2);
        assert_eq!(config.early_stop_reliability, 0.90);
    }

    #[test]
    fn fractional_reliability_is_parsed() {
        let config = load(&[("SHIPTRACK_EARLY_STOP_RELIABILITY", "0.8")]).expect("valid");
        assert_eq!(config.early_stop_reliability, 0.8);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let error = load(&[("SHIPTRACK_RECORD_TTL_SECS", "a day")]).expect_err("must reject");
        assert!(matches!(error, CoreError::Config(_)));
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let error = load(&[("SHIPTRACK_EARLY_STOP_RELIABILITY", "1.5")]).expect_err("must reject");
        assert!(matches!(
            error,
            CoreError::Validation(ValidationError::InvalidConfig { ref key, .. })
                if key == "SHIPTRACK_EARLY_STOP_RELIABILITY"
        ));

        let error = load(&[("SHIPTRACK_CIRCUIT_FAILURE_THRESHOLD", "0")]).expect_err("must reject");
        assert!(matches!(error, CoreError::Validation(_)));
    }
}
