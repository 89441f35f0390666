//! Storefront cache layer.
//!
//! The cache is an optimisation and never a dependency: every read goes
//! through [`ReadThrough`], which treats any cache failure as a miss and
//! falls back to the loader.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! backend = "redis"          # memory | redis | disabled
//! redis_url = "redis://127.0.0.1:6379"
//! ttl_seconds = 10
//! timeout_ms = 250
//! invalidate_on_write = true
//! ```

mod config;
mod error;
pub mod keys;
pub(crate) mod lock;
mod read_through;
mod redis_store;
mod store;

pub use config::{CacheBackendKind, CacheConfig};
pub use error::CacheError;
pub use keys::{Selector, canonical_json, decode, encode, key_for};
pub use read_through::{METRIC_CACHE_ERROR, METRIC_CACHE_HIT, METRIC_CACHE_MISS, ReadThrough};
pub use redis_store::RedisCacheStore;
pub use store::{CacheEntry, CacheStore, MemoryCacheStore};
