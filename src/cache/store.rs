//! Cache collaborator contract and the in-process backend.

use std::{num::NonZeroUsize, sync::RwLock, time::Duration};

use async_trait::async_trait;
use lru::LruCache;
use tokio::time::Instant;

use super::{
    error::CacheError,
    lock::{rw_read, rw_write},
};

const SOURCE: &str = "cache::store";

/// Key-value cache with per-entry expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub serialized_value: String,
    pub ttl: Duration,
    stored_at: Instant,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, serialized_value: impl Into<String>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            serialized_value: serialized_value.into(),
            ttl,
            stored_at: Instant::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.stored_at.elapsed() >= self.ttl
    }
}

/// Bounded in-process cache. Least recently used entries are evicted once
/// `capacity` is reached; expired entries are dropped on read.
pub struct MemoryCacheStore {
    entries: RwLock<LruCache<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let live = entries
            .get(key)
            .map(|entry| (!entry.is_expired()).then(|| entry.serialized_value.clone()));
        match live {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                entries.pop(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let entry = CacheEntry::new(key, value, ttl);
        rw_write(&self.entries, SOURCE, "set").put(entry.key.clone(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "delete").pop(key);
        Ok(())
    }
}
