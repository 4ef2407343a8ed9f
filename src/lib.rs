//! Response cache
//!
//! A namespaced cache for API responses on top of Redis:
//! - Keys scoped as `prefix:key` so several services can share one store
//! - Versioned JSON entries for any `serde` value
//! - Per-entry TTLs with a configured default
//! - Pattern and whole-namespace invalidation via cursor-based SCAN

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{Cache, CacheExt, DomainError, NamespacedCache, NamespacedCacheConfig};
pub use infrastructure::cache::{CacheFactory, InMemoryStore, RedisStore, RedisStoreConfig};
