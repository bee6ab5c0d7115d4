//! Read-through cache for per-owner product listings.
//!
//! Derived data only, never authoritative. The fail-open rule: any backend
//! error or decode failure is treated exactly like a miss, so a broken
//! cache degrades latency, never correctness.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::warn;

use crate::models::TrackedProduct;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Backend(String),

    #[error("cache payload corrupt: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Key/value store with TTL and explicit delete. Swapping the backing
/// service (in-process map, Redis, ...) must not touch any caller.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// In-process backend. Expiry is checked on read; stale entries are
/// overwritten rather than reaped, which is fine for a working set of one
/// entry per owner.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some((value, deadline)) if Instant::now() < *deadline => Ok(Some(value.clone())),
            _ => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }
}

/// The product-listing concern over a [`CacheBackend`]: JSON payloads keyed
/// by owner, fixed TTL, explicit invalidation on every mutation.
#[derive(Clone)]
pub struct ListingCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl ListingCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    fn key(owner_id: i64) -> String {
        format!("products:owner:{owner_id}")
    }

    pub async fn get(&self, owner_id: i64) -> Option<Vec<TrackedProduct>> {
        let raw = match self.backend.get(&Self::key(owner_id)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(owner_id, error = %e, "cache read failed, falling through to repository");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(products) => Some(products),
            Err(e) => {
                warn!(owner_id, error = %e, "cache payload undecodable, treating as miss");
                None
            }
        }
    }

    pub async fn put(&self, owner_id: i64, products: &[TrackedProduct]) {
        let payload = match serde_json::to_string(products) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(owner_id, error = %e, "listing not serializable, skipping cache fill");
                return;
            }
        };
        if let Err(e) = self.backend.set(&Self::key(owner_id), &payload, self.ttl).await {
            warn!(owner_id, error = %e, "cache write failed");
        }
    }

    /// Drop exactly the mutated owner's entry. Once invalidated the entry
    /// must not be served again until repopulated from the repository.
    pub async fn invalidate(&self, owner_id: i64) {
        if let Err(e) = self.backend.delete(&Self::key(owner_id)).await {
            warn!(owner_id, error = %e, "cache invalidation failed");
        }
    }
}
