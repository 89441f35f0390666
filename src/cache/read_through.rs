//! Read-through wrapper around a [`CacheStore`].

use std::{future::Future, sync::Arc, time::Duration};

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::{
    config::CacheConfig,
    error::CacheError,
    keys::{self, Selector},
    store::CacheStore,
};

pub const METRIC_CACHE_HIT: &str = "storefront_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "storefront_cache_miss_total";
pub const METRIC_CACHE_ERROR: &str = "storefront_cache_error_total";

/// Resolves values through the cache, falling back to a loader.
///
/// Cache failures of any kind (unreachable backend, timeout, undecodable
/// entry) are logged and counted, then handled as a miss. Concurrent misses
/// on one key each run the loader; the last write wins.
#[derive(Clone)]
pub struct ReadThrough {
    store: Option<Arc<dyn CacheStore>>,
    ttl: Duration,
    timeout: Duration,
}

impl ReadThrough {
    pub fn new(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self {
            store: Some(store),
            ttl: config.ttl,
            timeout: config.timeout,
        }
    }

    /// Wrapper that always calls the loader.
    pub fn disabled() -> Self {
        let config = CacheConfig::default();
        Self {
            store: None,
            ttl: config.ttl,
            timeout: config.timeout,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Derive the key for `resource` and `selector`, then read through it
    /// with the configured TTL.
    pub async fn resolve<T, E, F, Fut>(
        &self,
        resource: &str,
        selector: Selector<'_>,
        load: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if self.store.is_none() {
            return load().await;
        }
        match keys::key_for(resource, selector) {
            Ok(key) => self.read_through(&key, self.ttl, load).await,
            Err(err) => {
                warn!(resource, error = %err, "failed to derive cache key; bypassing cache");
                load().await
            }
        }
    }

    pub async fn read_through<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        load: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(store) = self.store.as_ref() else {
            return load().await;
        };

        match self.bounded(store.get(key)).await {
            Ok(Some(raw)) => match keys::decode::<T>(&raw) {
                Ok(value) => {
                    counter!(METRIC_CACHE_HIT).increment(1);
                    debug!(key, "cache hit");
                    return Ok(value);
                }
                Err(err) => self.record_error("decode", key, &err),
            },
            Ok(None) => {}
            Err(err) => self.record_error("get", key, &err),
        }

        counter!(METRIC_CACHE_MISS).increment(1);
        debug!(key, "cache miss");
        let value = load().await?;

        match keys::encode(&value) {
            Ok(raw) => {
                if let Err(err) = self.bounded(store.set(key, &raw, ttl)).await {
                    self.record_error("set", key, &err);
                }
            }
            Err(err) => self.record_error("encode", key, &err),
        }

        Ok(value)
    }

    /// Best-effort removal of `key`.
    pub async fn invalidate(&self, key: &str) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        if let Err(err) = self.bounded(store.delete(key)).await {
            self.record_error("delete", key, &err);
        }
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        match self.store.as_ref() {
            Some(store) => self.bounded(store.ping()).await,
            None => Ok(()),
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or_else(|_| Err(CacheError::Timeout))
    }

    fn record_error(&self, op: &'static str, key: &str, err: &CacheError) {
        counter!(METRIC_CACHE_ERROR, "op" => op).increment(1);
        warn!(op, key, error = %err, "cache operation failed; continuing without cache");
    }
}
