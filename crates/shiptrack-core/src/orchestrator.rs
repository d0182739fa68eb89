//! Sequential provider walk with early stop.
//!
//! Providers are tried strictly one after another in prioritized order.
//! Each attempt passes the circuit breaker and the rate limiter, then runs
//! under the provider's timeout; dropping the timed-out future cancels the
//! in-flight call. A success from a provider whose reliability exceeds the
//! early-stop threshold ends the walk.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{CacheMode, ResponseCache};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerSet};
use crate::classifier::{self, TrackingError};
use crate::clock::Clock;
use crate::prioritizer;
use crate::provider::{ProviderError, ProviderPayload, RawProviderResult, ResultStatus, TrackingProvider};
use crate::rate_limit::RateLimitTracker;
use crate::registry::ProviderRegistry;
use crate::retry::RetryConfig;
use crate::{IdentifierType, TrackingNumber};

/// Usable results of one resolution, in the order providers were tried.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchReport {
    pub results: Vec<RawProviderResult>,
    pub errors: Vec<RawProviderResult>,
    pub source_chain: Vec<String>,
    pub from_cache: bool,
}

/// Every prioritized provider failed, or none was eligible.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("all providers failed: {error}")]
pub struct FetchFailure {
    pub attempts: Vec<RawProviderResult>,
    pub error: TrackingError,
    pub source_chain: Vec<String>,
}

pub type FetchOutcome = Result<FetchReport, FetchFailure>;

pub struct FetchOrchestrator {
    registry: ProviderRegistry,
    rate_limits: RateLimitTracker,
    cache: ResponseCache,
    breakers: CircuitBreakerSet,
    retry: RetryConfig,
    early_stop_reliability: f64,
    clock: Arc<dyn Clock>,
}

impl FetchOrchestrator {
    pub fn new(
        registry: ProviderRegistry,
        rate_limits: RateLimitTracker,
        cache: ResponseCache,
        breakers: CircuitBreakerSet,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            rate_limits,
            cache,
            breakers,
            retry: RetryConfig::default(),
            early_stop_reliability: 0.90,
            clock,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_early_stop_reliability(mut self, reliability: f64) -> Self {
        self.early_stop_reliability = reliability;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn rate_limits(&self) -> &RateLimitTracker {
        &self.rate_limits
    }

    pub fn breakers(&self) -> &CircuitBreakerSet {
        &self.breakers
    }

    /// Resolves `identifier` against the response cache, then the providers.
    pub async fn resolve(
        &self,
        identifier: &TrackingNumber,
        identifier_type: IdentifierType,
        mode: CacheMode,
    ) -> FetchOutcome {
        if mode.reads() {
            if let Some(cached) = self.cache.get(identifier, identifier_type).await {
                debug!(identifier = %identifier, provider = %cached.provider, "response cache hit");
                return Ok(FetchReport {
                    source_chain: vec![cached.provider.clone()],
                    results: vec![cached],
                    errors: Vec::new(),
                    from_cache: true,
                });
            }
        }

        let chain = prioritizer::prioritize(
            &self.registry.list_providers(Some(identifier_type)),
            identifier_type,
        );

        let mut results = Vec::new();
        let mut errors = Vec::new();
        let mut source_chain = Vec::with_capacity(chain.len());
        let mut cached_primary = false;

        for descriptor in &chain {
            let Some(provider) = self.registry.provider(&descriptor.name) else {
                continue;
            };
            source_chain.push(descriptor.name.clone());

            let breaker = self.breakers.breaker(&descriptor.name);
            let outcome = if breaker.allow_request() {
                self.attempt(provider.as_ref(), &breaker, identifier, identifier_type)
                    .await
            } else {
                Err(classifier::classify(&ProviderError::CircuitOpen {
                    provider: descriptor.name.clone(),
                }))
            };

            let now = self.clock.now();
            match outcome {
                Ok(payload) => {
                    let result = RawProviderResult::from_payload(
                        descriptor,
                        identifier,
                        identifier_type,
                        payload,
                        now,
                    );
                    let is_success = result.status == ResultStatus::Success;

                    if is_success && mode.writes() && !cached_primary {
                        self.cache.put(&result).await;
                        cached_primary = true;
                    }
                    results.push(result);

                    if is_success && descriptor.reliability > self.early_stop_reliability {
                        info!(
                            identifier = %identifier,
                            provider = %descriptor.name,
                            reliability = descriptor.reliability,
                            "early stop on reliable success"
                        );
                        break;
                    }
                }
                Err(error) => {
                    warn!(
                        identifier = %identifier,
                        provider = %descriptor.name,
                        code = %error.code,
                        "provider attempt failed"
                    );
                    errors.push(RawProviderResult::failed(
                        descriptor,
                        identifier,
                        identifier_type,
                        error,
                        now,
                    ));
                }
            }
        }

        if results.is_empty() {
            let classified = errors
                .iter()
                .filter_map(|attempt| attempt.error.clone())
                .collect::<Vec<_>>();
            return Err(FetchFailure {
                attempts: errors,
                error: classifier::aggregate(&classified),
                source_chain,
            });
        }

        Ok(FetchReport {
            results,
            errors,
            source_chain,
            from_cache: false,
        })
    }

    /// One provider, including retries. Every try consumes a rate-limit token.
    async fn attempt(
        &self,
        provider: &dyn TrackingProvider,
        breaker: &CircuitBreaker,
        identifier: &TrackingNumber,
        identifier_type: IdentifierType,
    ) -> Result<ProviderPayload, TrackingError> {
        let descriptor = provider.descriptor();
        let mut retries_used = 0;

        loop {
            if !self.rate_limits.try_acquire(&descriptor.name) {
                return Err(classifier::classify(&ProviderError::RateLimited {
                    provider: descriptor.name.clone(),
                }));
            }

            let started = Instant::now();
            let fetched = tokio::time::timeout(
                descriptor.timeout,
                provider.fetch(identifier, identifier_type, descriptor.timeout),
            )
            .await;
            let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            let outcome = match fetched {
                Ok(Ok(payload)) if payload.is_empty() => Err(ProviderError::InvalidPayload(
                    String::from("provider returned an empty payload"),
                )),
                Ok(outcome) => outcome,
                Err(_) => Err(ProviderError::Timeout {
                    after: descriptor.timeout,
                }),
            };

            match outcome {
                Ok(payload) => {
                    breaker.record_success();
                    debug!(
                        provider = %descriptor.name,
                        attempt = retries_used + 1,
                        latency_ms,
                        "provider returned payload"
                    );
                    return Ok(payload);
                }
                Err(error) => {
                    let classified = classifier::classify(&error);
                    breaker.record_error(classified.code);

                    if !self
                        .retry
                        .should_retry(classified.code, retries_used, descriptor.retry_attempts)
                    {
                        return Err(classified);
                    }

                    let delay = self.retry.delay_for_retry(retries_used);
                    retries_used += 1;
                    debug!(
                        provider = %descriptor.name,
                        attempt = retries_used,
                        code = %classified.code,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        latency_ms,
                        "retrying provider"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
