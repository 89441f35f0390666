//! Cache configuration.

use std::{num::NonZeroUsize, time::Duration};

use serde::Deserialize;

const DEFAULT_TTL_SECONDS: u64 = 10;
const DEFAULT_TIMEOUT_MS: u64 = 250;
const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    #[default]
    Memory,
    Redis,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub redis_url: Option<String>,
    /// Expiry applied to every entry written by the read-through wrapper.
    pub ttl: Duration,
    /// Upper bound on a single cache round-trip.
    pub timeout: Duration,
    /// Entry limit for the in-process backend.
    pub capacity: NonZeroUsize,
    /// Purge `<resource>:<id>` entries after a successful update or delete.
    pub invalidate_on_write: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Memory,
            redis_url: None,
            ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            capacity: NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            invalidate_on_write: true,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            backend: settings.backend,
            redis_url: settings.redis_url.clone(),
            ttl: Duration::from_secs(settings.ttl_seconds.get()),
            timeout: Duration::from_millis(settings.timeout_ms.get()),
            capacity: settings.capacity,
            invalidate_on_write: settings.invalidate_on_write,
        }
    }
}
