//! Provider capability interface and per-attempt result types.
//!
//! Every provider family implements [`TrackingProvider`]. The prioritizer and
//! orchestrator only ever see this trait and the provider's
//! [`ProviderDescriptor`]; no code outside `adapters` branches on a provider
//! name.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::TrackingError;
use crate::registry::ProviderDescriptor;
use crate::{IdentifierType, ShipmentStatus, TimelineEvent, TrackingNumber, UtcDateTime};

/// Low-level failure raised by a provider call, before classification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("request timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },
    #[error("request aborted")]
    Aborted,
    #[error("upstream returned status {status}: {message}")]
    Http { status: u16, message: String },
    #[error("rate limit budget exhausted for provider '{provider}'")]
    RateLimited { provider: String },
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("dns resolution failed: {0}")]
    Dns(String),
    #[error("circuit breaker open for provider '{provider}'")]
    CircuitOpen { provider: String },
    #[error("invalid provider payload: {0}")]
    InvalidPayload(String),
    #[error("{0}")]
    Other(String),
}

/// Normalized payload returned by a provider fetch.
///
/// Adapters translate their vendor JSON into this shape; everything else in
/// the core treats payloads uniformly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ShipmentStatus>,
    #[serde(default)]
    pub events: Vec<TimelineEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vessel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<UtcDateTime>,
}

impl ProviderPayload {
    /// Carrier, status and at least one event: enough to stand alone.
    pub fn is_complete(&self) -> bool {
        self.carrier.is_some() && self.status.is_some() && !self.events.is_empty()
    }

    /// Nothing usable at all.
    pub fn is_empty(&self) -> bool {
        self.carrier.is_none() && self.status.is_none() && self.events.is_empty()
    }
}

pub type ProviderFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ProviderPayload, ProviderError>> + Send + 'a>>;

/// Uniform capability every provider family implements.
///
/// Implementations must be `Send + Sync`: one instance serves all concurrent
/// resolutions. `timeout` is advisory for the transport; the orchestrator
/// enforces it independently and drops the future when it elapses.
pub trait TrackingProvider: Send + Sync {
    fn descriptor(&self) -> &ProviderDescriptor;

    fn fetch<'a>(
        &'a self,
        identifier: &'a TrackingNumber,
        identifier_type: IdentifierType,
        timeout: Duration,
    ) -> ProviderFuture<'a>;
}

/// Outcome class of a single provider attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    Partial,
    Error,
}

/// Record of one provider attempt within a resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProviderResult {
    pub provider: String,
    pub identifier: TrackingNumber,
    pub identifier_type: IdentifierType,
    pub payload: Option<ProviderPayload>,
    pub timestamp: UtcDateTime,
    pub reliability: f64,
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TrackingError>,
}

impl RawProviderResult {
    /// Builds a success or partial result depending on payload completeness.
    pub fn from_payload(
        descriptor: &ProviderDescriptor,
        identifier: &TrackingNumber,
        identifier_type: IdentifierType,
        payload: ProviderPayload,
        timestamp: UtcDateTime,
    ) -> Self {
        let status = if payload.is_complete() {
            ResultStatus::Success
        } else {
            ResultStatus::Partial
        };

        Self {
            provider: descriptor.name.clone(),
            identifier: identifier.clone(),
            identifier_type,
            payload: Some(payload),
            timestamp,
            reliability: descriptor.reliability,
            status,
            error: None,
        }
    }

    pub fn failed(
        descriptor: &ProviderDescriptor,
        identifier: &TrackingNumber,
        identifier_type: IdentifierType,
        error: TrackingError,
        timestamp: UtcDateTime,
    ) -> Self {
        Self {
            provider: descriptor.name.clone(),
            identifier: identifier.clone(),
            identifier_type,
            payload: None,
            timestamp,
            reliability: descriptor.reliability,
            status: ResultStatus::Error,
            error: Some(error),
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self.status, ResultStatus::Success | ResultStatus::Partial)
    }
}
