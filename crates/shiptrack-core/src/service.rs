//! Resolution entry point.
//!
//! ```text
//! VALIDATING ─▶ CACHE_LOOKUP ─┬─▶ FRESH_HIT
//!                             ├─▶ STALE ─▶ refresh ─┬─▶ REFRESH_SUCCESS
//!                             │                     └─▶ REFRESH_FAILED_RETURN_STALE
//!                             └─▶ MISS ─▶ fetch ─┬─▶ FETCH_SUCCESS
//!                                                └─▶ archive ─┬─▶ VERY_STALE_HIT
//!                                                             └─▶ NO_DATA
//! ```
//!
//! A forced refresh skips the cache lookup and enters the miss branch.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::cache::{CacheMode, CachedShipment, RecordCache, ResponseCache};
use crate::circuit_breaker::{CircuitBreakerSet, CircuitState};
use crate::classifier::TrackingError;
use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::merger;
use crate::orchestrator::{FetchFailure, FetchOrchestrator, FetchReport};
use crate::prioritizer;
use crate::rate_limit::RateLimitTracker;
use crate::registry::{ProviderDescriptor, ProviderRegistry};
use crate::store::KeyValueStore;
use crate::{IdentifierType, ShipmentRecord, TrackingNumber, UtcDateTime};

/// Terminal state reached by one `track` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPath {
    FreshHit,
    RefreshSuccess,
    RefreshFailedReturnStale,
    FetchSuccess,
    VeryStaleHit,
    NoData,
    ValidationFailed,
}

impl ResolutionPath {
    /// Data was returned together with a staleness warning.
    pub const fn is_degraded(self) -> bool {
        matches!(self, Self::RefreshFailedReturnStale | Self::VeryStaleHit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ShipmentRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TrackingError>,
    pub from_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_age_minutes: Option<u64>,
    pub path: ResolutionPath,
    pub source_chain: Vec<String>,
}

impl ResolutionResult {
    fn cached(path: ResolutionPath, entry: CachedShipment, age: u64, error: Option<TrackingError>) -> Self {
        Self {
            success: true,
            data: Some(entry.record),
            error,
            from_cache: true,
            data_age_minutes: Some(age),
            path,
            source_chain: Vec::new(),
        }
    }

    fn failure(path: ResolutionPath, error: TrackingError, source_chain: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            from_cache: false,
            data_age_minutes: None,
            path,
            source_chain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    pub name: String,
    pub reliability: f64,
    pub available: bool,
    pub circuit: CircuitState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallHealth {
    Healthy,
    Degraded,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealthReport {
    pub providers: Vec<ProviderHealth>,
    pub overall_health: OverallHealth,
}

/// Cache-first shipment resolution with tiered staleness fallback.
pub struct ResolutionService {
    orchestrator: FetchOrchestrator,
    records: RecordCache,
    config: TrackerConfig,
    clock: Arc<dyn Clock>,
}

impl ResolutionService {
    /// Wires every component around one shared store and clock.
    pub fn new(
        registry: ProviderRegistry,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: TrackerConfig,
    ) -> Self {
        let all_descriptors = registry.list_providers(None);
        let rate_limits = RateLimitTracker::for_providers(Arc::clone(&clock), &all_descriptors);
        let responses = ResponseCache::new(Arc::clone(&store), config.response_ttl);
        let breakers = CircuitBreakerSet::new(config.circuit_breaker, Arc::clone(&clock));
        let orchestrator =
            FetchOrchestrator::new(registry, rate_limits, responses, breakers, Arc::clone(&clock))
                .with_retry(config.retry.clone())
                .with_early_stop_reliability(config.early_stop_reliability);

        Self {
            orchestrator,
            records: RecordCache::new(store, config.record_ttl, config.archive_ttl),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Resolves a raw identifier. An omitted type is detected from its shape.
    pub async fn track(
        &self,
        identifier: &str,
        identifier_type: Option<IdentifierType>,
        force_refresh: bool,
    ) -> ResolutionResult {
        let identifier = match TrackingNumber::parse(identifier) {
            Ok(identifier) => identifier,
            Err(error) => {
                warn!(error = %error, "rejected tracking identifier");
                return ResolutionResult::failure(
                    ResolutionPath::ValidationFailed,
                    TrackingError::validation(&error),
                    Vec::new(),
                );
            }
        };
        let identifier_type = identifier_type.unwrap_or_else(|| IdentifierType::detect(&identifier));

        let result = if force_refresh {
            self.force_refresh(&identifier, identifier_type).await
        } else {
            self.resolve_cached(&identifier, identifier_type).await
        };

        info!(
            identifier = %identifier,
            identifier_type = %identifier_type,
            path = ?result.path,
            success = result.success,
            "resolution finished"
        );
        result
    }

    /// Sugar for `track(identifier, type, true)`.
    pub async fn refresh_tracking_data(
        &self,
        identifier: &str,
        identifier_type: Option<IdentifierType>,
    ) -> ResolutionResult {
        self.track(identifier, identifier_type, true).await
    }

    /// Providers that would be tried for `identifier_type`, in order.
    pub fn provider_chain(&self, identifier_type: IdentifierType) -> Vec<ProviderDescriptor> {
        prioritizer::prioritize(
            &self
                .orchestrator
                .registry()
                .list_providers(Some(identifier_type)),
            identifier_type,
        )
    }

    pub fn get_provider_health(&self) -> ProviderHealthReport {
        let providers = self
            .orchestrator
            .registry()
            .list_providers(None)
            .into_iter()
            .map(|descriptor| {
                let circuit = self.orchestrator.breakers().state(&descriptor.name);
                let available = circuit != CircuitState::Open
                    && self.orchestrator.rate_limits().has_capacity(&descriptor.name);
                ProviderHealth {
                    name: descriptor.name,
                    reliability: descriptor.reliability,
                    available,
                    circuit,
                }
            })
            .collect::<Vec<_>>();

        let available = providers.iter().filter(|provider| provider.available).count();
        let overall_health = if providers.is_empty() || available == 0 {
            OverallHealth::Unavailable
        } else if available == providers.len() {
            OverallHealth::Healthy
        } else {
            OverallHealth::Degraded
        };

        ProviderHealthReport {
            providers,
            overall_health,
        }
    }

    async fn resolve_cached(
        &self,
        identifier: &TrackingNumber,
        identifier_type: IdentifierType,
    ) -> ResolutionResult {
        let Some(cached) = self.records.get(identifier, identifier_type).await else {
            return self.fetch_or_fallback(identifier, identifier_type).await;
        };

        let now = self.clock.now();
        let age = cached.age_minutes(now);
        if now.duration_since(cached.cached_at) < self.config.fresh_threshold {
            return ResolutionResult::cached(ResolutionPath::FreshHit, cached, age, None);
        }

        match self
            .orchestrator
            .resolve(identifier, identifier_type, CacheMode::Refresh)
            .await
        {
            Ok(report) => self.store_fetched(report, ResolutionPath::RefreshSuccess).await,
            Err(failure) => self.serve_stale(identifier, cached, failure),
        }
    }

    /// Skips every cache read; a failed refresh still falls back to the
    /// live record before the archive.
    async fn force_refresh(
        &self,
        identifier: &TrackingNumber,
        identifier_type: IdentifierType,
    ) -> ResolutionResult {
        let failure = match self
            .orchestrator
            .resolve(identifier, identifier_type, CacheMode::Refresh)
            .await
        {
            Ok(report) => return self.store_fetched(report, ResolutionPath::FetchSuccess).await,
            Err(failure) => failure,
        };

        match self.records.get(identifier, identifier_type).await {
            Some(cached) => self.serve_stale(identifier, cached, failure),
            None => self.serve_archived(identifier, identifier_type, failure).await,
        }
    }

    async fn fetch_or_fallback(
        &self,
        identifier: &TrackingNumber,
        identifier_type: IdentifierType,
    ) -> ResolutionResult {
        match self
            .orchestrator
            .resolve(identifier, identifier_type, CacheMode::Use)
            .await
        {
            Ok(report) => self.store_fetched(report, ResolutionPath::FetchSuccess).await,
            Err(failure) => self.serve_archived(identifier, identifier_type, failure).await,
        }
    }

    fn serve_stale(
        &self,
        identifier: &TrackingNumber,
        cached: CachedShipment,
        failure: FetchFailure,
    ) -> ResolutionResult {
        let age = cached.age_minutes(self.clock.now());
        warn!(
            identifier = %identifier,
            age_minutes = age,
            code = %failure.error.code,
            "refresh failed; serving stale record"
        );
        let mut result = ResolutionResult::cached(
            ResolutionPath::RefreshFailedReturnStale,
            cached,
            age,
            Some(TrackingError::stale_data(age, self.config.stale_retry_after_secs)),
        );
        result.source_chain = failure.source_chain;
        result
    }

    async fn serve_archived(
        &self,
        identifier: &TrackingNumber,
        identifier_type: IdentifierType,
        failure: FetchFailure,
    ) -> ResolutionResult {
        let Some(archived) = self.records.get_archived(identifier, identifier_type).await else {
            return ResolutionResult::failure(ResolutionPath::NoData, failure.error, failure.source_chain);
        };

        let age = archived.age_minutes(self.clock.now());
        warn!(
            identifier = %identifier,
            age_minutes = age,
            code = %failure.error.code,
            "all providers failed; serving archived record"
        );
        let mut result = ResolutionResult::cached(
            ResolutionPath::VeryStaleHit,
            archived,
            age,
            Some(TrackingError::very_stale_data(age, self.config.very_stale_retry_after_secs)),
        );
        result.source_chain = failure.source_chain;
        result
    }

    async fn store_fetched(&self, report: FetchReport, path: ResolutionPath) -> ResolutionResult {
        let FetchReport {
            results,
            source_chain,
            from_cache,
            ..
        } = report;

        let Some(record) = merger::merge(&results) else {
            // The orchestrator only reports usable results.
            return ResolutionResult::failure(
                ResolutionPath::NoData,
                crate::classifier::aggregate(&[]),
                source_chain,
            );
        };

        let now = self.clock.now();
        let data_age_minutes = from_cache.then(|| minutes_between(record.last_updated, now));
        self.records
            .put(&CachedShipment {
                record: record.clone(),
                cached_at: if from_cache { record.last_updated } else { now },
            })
            .await;

        ResolutionResult {
            success: true,
            data: Some(record),
            error: None,
            from_cache,
            data_age_minutes,
            path,
            source_chain,
        }
    }
}

fn minutes_between(earlier: UtcDateTime, later: UtcDateTime) -> u64 {
    later.duration_since(earlier).as_secs() / 60
}
