//! Key-value store abstraction with TTL, plus the in-memory implementation.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::UtcDateTime;

/// Failure reported by an external key-value backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("key-value store error: {message}")]
pub struct StoreError {
    message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Generic string key-value store with per-entry TTL.
///
/// Implementations must treat expired entries as absent. Concurrent writes
/// to the same key resolve last-write-wins.
pub trait KeyValueStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

    fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> StoreFuture<'a, ()>;

    /// Returns whether an entry was removed.
    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool>;
}

#[derive(Debug, Clone)]
struct StoreEntry {
    value: String,
    expires_at: UtcDateTime,
}

/// Thread-safe in-memory store with lazy expiry.
#[derive(Clone)]
pub struct MemoryStore {
    map: Arc<tokio::sync::RwLock<HashMap<String, StoreEntry>>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            map: Arc::new(tokio::sync::RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Remove expired entries. Lookups already ignore them; this only reclaims memory.
    pub async fn clear_expired(&self) -> usize {
        let now = self.clock.now();
        let mut map = self.map.write().await;
        let before = map.len();
        map.retain(|_, entry| entry.expires_at > now);
        before - map.len()
    }

    /// Clear all entries.
    pub async fn clear(&self) {
        self.map.write().await.clear();
    }

    /// Number of entries, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.map.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.map.read().await.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move {
            let now = self.clock.now();
            let map = self.map.read().await;
            Ok(map.get(key).and_then(|entry| {
                if now < entry.expires_at {
                    Some(entry.value.clone())
                } else {
                    None
                }
            }))
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            if ttl.is_zero() {
                return Ok(());
            }

            let expires_at = self.clock.now().saturating_add(ttl);
            self.map
                .write()
                .await
                .insert(key.to_owned(), StoreEntry { value, expires_at });
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move { Ok(self.map.write().await.remove(key).is_some()) })
    }
}
