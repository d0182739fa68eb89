//! Caching layered on top of a [`KeyValueStore`].
//!
//! Two caches share one store:
//!
//! | Cache | Key | Value |
//! |-------|-----|-------|
//! | [`ResponseCache`] | `raw:{type}:{identifier}` | one [`RawProviderResult`] |
//! | [`RecordCache`] | `shipment:{type}:{identifier}` | merged [`CachedShipment`] |
//! | [`RecordCache`] archive | `shipment-archive:{type}:{identifier}` | long-lived copy |
//!
//! Store failures and undecodable entries are logged and read as misses.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::provider::RawProviderResult;
use crate::store::KeyValueStore;
use crate::{IdentifierType, ShipmentRecord, TrackingNumber, UtcDateTime};

/// Defines how a resolution interacts with the caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Read from the cache if a non-expired entry is present;
    /// otherwise, fetch from providers and write the result back. (Default)
    #[default]
    Use,
    /// Always fetch from providers, ignoring any cached entry,
    /// and write the new result back.
    Refresh,
    /// Always fetch from providers and do not touch the cache.
    Bypass,
}

impl CacheMode {
    pub const fn reads(self) -> bool {
        matches!(self, Self::Use)
    }

    pub const fn writes(self) -> bool {
        matches!(self, Self::Use | Self::Refresh)
    }
}

/// Short-TTL cache of raw per-provider results.
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn key(identifier_type: IdentifierType, identifier: &TrackingNumber) -> String {
        format!("raw:{identifier_type}:{identifier}")
    }

    pub async fn get(
        &self,
        identifier: &TrackingNumber,
        identifier_type: IdentifierType,
    ) -> Option<RawProviderResult> {
        let key = Self::key(identifier_type, identifier);
        read_json(self.store.as_ref(), &key).await
    }

    pub async fn put(&self, result: &RawProviderResult) {
        let key = Self::key(result.identifier_type, &result.identifier);
        write_json(self.store.as_ref(), &key, result, self.ttl).await;
    }
}

/// Merged record plus the moment it was cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedShipment {
    pub record: ShipmentRecord,
    pub cached_at: UtcDateTime,
}

impl CachedShipment {
    /// Whole minutes elapsed since caching, floored and clamped at zero.
    pub fn age_minutes(&self, now: UtcDateTime) -> u64 {
        now.duration_since(self.cached_at).as_secs() / 60
    }
}

/// Cache of merged shipment records with a long-lived archive copy.
#[derive(Clone)]
pub struct RecordCache {
    store: Arc<dyn KeyValueStore>,
    record_ttl: Duration,
    archive_ttl: Duration,
}

impl RecordCache {
    pub fn new(store: Arc<dyn KeyValueStore>, record_ttl: Duration, archive_ttl: Duration) -> Self {
        Self {
            store,
            record_ttl,
            archive_ttl,
        }
    }

    pub fn key(identifier_type: IdentifierType, identifier: &TrackingNumber) -> String {
        format!("shipment:{identifier_type}:{identifier}")
    }

    pub fn archive_key(identifier_type: IdentifierType, identifier: &TrackingNumber) -> String {
        format!("shipment-archive:{identifier_type}:{identifier}")
    }

    pub async fn get(
        &self,
        identifier: &TrackingNumber,
        identifier_type: IdentifierType,
    ) -> Option<CachedShipment> {
        let key = Self::key(identifier_type, identifier);
        read_json(self.store.as_ref(), &key).await
    }

    /// Archived copy, kept well beyond the normal record TTL.
    pub async fn get_archived(
        &self,
        identifier: &TrackingNumber,
        identifier_type: IdentifierType,
    ) -> Option<CachedShipment> {
        let key = Self::archive_key(identifier_type, identifier);
        read_json(self.store.as_ref(), &key).await
    }

    /// Writes both the record and its archive copy.
    pub async fn put(&self, entry: &CachedShipment) {
        let identifier = &entry.record.identifier;
        let identifier_type = entry.record.identifier_type;

        let key = Self::key(identifier_type, identifier);
        write_json(self.store.as_ref(), &key, entry, self.record_ttl).await;

        let archive_key = Self::archive_key(identifier_type, identifier);
        write_json(self.store.as_ref(), &archive_key, entry, self.archive_ttl).await;
    }
}

async fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(key, "cache miss");
            return None;
        }
        Err(error) => {
            warn!(key, error = %error, "cache read failed; treating as miss");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(key, error = %error, "discarding undecodable cache entry");
            None
        }
    }
}

async fn write_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T, ttl: Duration) {
    let body = match serde_json::to_string(value) {
        Ok(body) => body,
        Err(error) => {
            warn!(key, error = %error, "failed to encode cache entry");
            return;
        }
    };

    if let Err(error) = store.set(key, body, ttl).await {
        warn!(key, error = %error, "cache write failed");
    }
}
