//! # Shiptrack Core
//!
//! Multi-provider shipment resolution for the shiptrack toolkit.
//!
//! ## Overview
//!
//! A tracking number (container, booking, bill of lading or vessel) is
//! resolved by walking a prioritized list of tracking providers, merging
//! what they return into one canonical [`ShipmentRecord`], and falling back
//! to stale cached data when no provider can answer.
//!
//! - **Deterministic prioritization** by cost tier and reliability
//! - **Sequential fetching** with early stop on a reliable success
//! - **Per-provider rate limits**, timeouts, retries and circuit breakers
//! - **Tiered staleness** over a pluggable key-value store
//! - **Closed failure taxonomy** with retry hints
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Carrier and aggregator provider families |
//! | [`cache`] | Raw response and merged record caches |
//! | [`catalog`] | Built-in provider catalog and registry builder |
//! | [`circuit_breaker`] | Per-provider circuit breakers |
//! | [`classifier`] | Error taxonomy, classification and aggregate decision |
//! | [`clock`] | Injectable time source |
//! | [`config`](crate::config) | Resolution policy configuration |
//! | [`domain`] | Identifiers, statuses, events and records |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP client abstraction |
//! | [`merger`] | Cross-source timeline merge |
//! | [`orchestrator`] | Sequential provider walk |
//! | [`prioritizer`] | Provider ordering policy |
//! | [`provider`] | Provider capability trait and per-attempt results |
//! | [`rate_limit`] | Minute window and hourly quota per provider |
//! | [`registry`] | Provider descriptors and registry |
//! | [`retry`] | Retry policy and backoff |
//! | [`service`] | Resolution entry point |
//! | [`store`] | Key-value store abstraction |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shiptrack_core::{
//!     MemoryStore, ProviderRegistryBuilder, ResolutionService, SystemClock, TrackerConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ProviderRegistryBuilder::new().with_mock_mode().build()?;
//!     let service = ResolutionService::new(
//!         registry,
//!         Arc::new(MemoryStore::default()),
//!         Arc::new(SystemClock),
//!         TrackerConfig::from_env()?,
//!     );
//!
//!     let result = service.track("MSKU1234567", None, false).await;
//!     if let Some(record) = result.data {
//!         println!("{} via {}", record.status, record.data_source);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────┐
//! │ CLI / HTTP layer   │
//! └─────────┬──────────┘
//!           │
//!           ▼
//! ┌────────────────────┐     ┌──────────────────┐
//! │ Resolution Service │────▶│ Record Cache     │
//! └─────────┬──────────┘     └──────────────────┘
//!           │
//!           ▼
//! ┌────────────────────┐     ┌──────────────────┐
//! │ Fetch Orchestrator │────▶│ Response Cache   │
//! │  + Prioritizer     │────▶│ Rate Limiter     │
//! └─────────┬──────────┘     │ Circuit Breakers │
//!           │                └──────────────────┘
//!           ▼
//! ┌────────────────────┐     ┌──────────────────┐
//! │ Tracking Provider  │────▶│ HTTP Client      │
//! │ (Adapter Trait)    │     │ (reqwest/none)   │
//! └─────────┬──────────┘     └──────────────────┘
//!           │
//!           ▼
//! ┌────────────────────┐
//! │ Data Merger        │
//! └────────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Per-provider failures never abort a resolution. They are classified and
//! only surface when every provider fails:
//!
//! ```rust
//! use shiptrack_core::{ErrorCode, TrackingError};
//!
//! fn handle(error: &TrackingError) {
//!     match error.code {
//!         ErrorCode::RateLimit | ErrorCode::NetworkError => {
//!             // Retry after `error.retry_after` seconds
//!         }
//!         ErrorCode::NotFound => {
//!             // Ask the user to check the number
//!         }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - API keys are read from environment variables only (never logged)
//! - Identifiers are validated before any network access

pub mod adapters;
pub mod cache;
pub mod catalog;
pub mod circuit_breaker;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod merger;
pub mod orchestrator;
pub mod prioritizer;
pub mod provider;
pub mod rate_limit;
pub mod registry;
pub mod retry;
pub mod service;
pub mod store;

// Adapter implementations
pub use adapters::{AggregatorAdapter, CarrierApiAdapter};

// Caching
pub use cache::{CacheMode, CachedShipment, RecordCache, ResponseCache};

// Catalog and registry construction
pub use catalog::{CatalogEntry, ProviderCatalog, ProviderFamily, ProviderRegistryBuilder};

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSet, CircuitState};

// Failure taxonomy
pub use classifier::{aggregate, classify, ErrorCode, TrackingError};

// Time
pub use clock::{Clock, ManualClock, SystemClock};

// Configuration
pub use crate::config::TrackerConfig;

// Domain models
pub use domain::{
    IdentifierType, ShipmentRecord, ShipmentStatus, TimelineEvent, TrackingNumber, UtcDateTime,
};

// Error types
pub use error::{CoreError, ValidationError};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpMethod, HttpRequest, HttpResponse,
    NoopHttpClient, ReqwestHttpClient,
};

// Resolution pipeline
pub use merger::merge;
pub use orchestrator::{FetchFailure, FetchOrchestrator, FetchOutcome, FetchReport};
pub use prioritizer::{prioritize, PriorityTier};
pub use provider::{
    ProviderError, ProviderFuture, ProviderPayload, RawProviderResult, ResultStatus,
    TrackingProvider,
};
pub use rate_limit::{RateLimitTracker, RateLimitWindow};
pub use registry::{CostTier, ProviderDescriptor, ProviderRegistry, RateLimit};
pub use retry::{Backoff, RetryConfig};
pub use service::{
    OverallHealth, ProviderHealth, ProviderHealthReport, ResolutionPath, ResolutionResult,
    ResolutionService,
};
pub use store::{KeyValueStore, MemoryStore, StoreError, StoreFuture};
