//! Cache factory for runtime backend selection

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::config::CacheSettings;
use crate::domain::cache::{KeyValueStore, NamespacedCache, NamespacedCacheConfig, ScanOptions};
use crate::domain::DomainError;

use super::in_memory::{InMemoryStore, InMemoryStoreConfig};
use super::redis::{RedisStore, RedisStoreConfig};

/// Supported store backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreType {
    /// Remote Redis server
    #[default]
    Redis,
    /// Process-local store using moka
    InMemory,
}

impl std::fmt::Display for StoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreType::Redis => write!(f, "redis"),
            StoreType::InMemory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for StoreType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "redis" => Ok(StoreType::Redis),
            "memory" | "in_memory" | "inmemory" => Ok(StoreType::InMemory),
            _ => Err(DomainError::configuration(format!(
                "Unknown cache backend: {}. Valid backends: redis, memory",
                s
            ))),
        }
    }
}

/// A ready cache plus the resources backing it
#[derive(Debug)]
pub struct CacheHandle {
    pub cache: NamespacedCache,
    redis: Option<RedisStore>,
    reaper: Option<JoinHandle<()>>,
}

impl CacheHandle {
    /// Stops the idle reaper and closes the pool
    pub fn shutdown(self) {
        if let Some(reaper) = self.reaper {
            reaper.abort();
        }

        if let Some(redis) = self.redis {
            redis.close();
        }
    }
}

/// Factory for creating cache instances
#[derive(Debug, Default)]
pub struct CacheFactory;

impl CacheFactory {
    /// Creates a new cache factory
    pub fn new() -> Self {
        Self
    }

    /// Creates the store and facade described by the settings
    ///
    /// Must run inside a Tokio runtime when the Redis backend spawns its reaper.
    pub fn create(&self, settings: &CacheSettings) -> Result<CacheHandle, DomainError> {
        let backend: StoreType = settings.backend.parse()?;
        let cache_config = Self::cache_config(settings);

        let handle = match backend {
            StoreType::InMemory => {
                let store = InMemoryStore::with_config(
                    InMemoryStoreConfig::default().with_max_capacity(settings.memory_max_capacity),
                );

                CacheHandle {
                    cache: NamespacedCache::new(Arc::new(store), cache_config)?,
                    redis: None,
                    reaper: None,
                }
            }
            StoreType::Redis => {
                let store = RedisStore::connect(Self::redis_config(settings))?;
                let cache = NamespacedCache::new(
                    Arc::new(store.clone()) as Arc<dyn KeyValueStore>,
                    cache_config,
                )?;

                let reaper = match settings.pool.reap_interval_secs {
                    0 => None,
                    secs => Some(store.spawn_idle_reaper(Duration::from_secs(secs))),
                };

                CacheHandle {
                    cache,
                    redis: Some(store),
                    reaper,
                }
            }
        };

        info!(backend = %backend, prefix = %settings.prefix, "Cache ready");
        Ok(handle)
    }

    /// Creates an in-memory cache with the given prefix and defaults otherwise
    pub fn create_in_memory(&self, prefix: impl Into<String>) -> Result<NamespacedCache, DomainError> {
        NamespacedCache::new(
            Arc::new(InMemoryStore::new()),
            NamespacedCacheConfig::new(prefix),
        )
    }

    fn cache_config(settings: &CacheSettings) -> NamespacedCacheConfig {
        NamespacedCacheConfig::new(settings.prefix.clone())
            .with_default_ttl(Duration::from_secs(settings.default_ttl_secs))
            .with_operation_timeout(Duration::from_millis(settings.operation_timeout_ms))
            .with_scan_options(
                ScanOptions::default()
                    .with_count(settings.scan_count)
                    .with_max_iterations(settings.max_scan_iterations),
            )
    }

    fn redis_config(settings: &CacheSettings) -> RedisStoreConfig {
        let pool = &settings.pool;

        RedisStoreConfig {
            host: settings.host.clone(),
            password: settings.password.clone(),
            database: settings.database,
            max_size: pool.max_size,
            wait_timeout: Duration::from_millis(pool.wait_timeout_ms),
            create_timeout: Duration::from_millis(pool.create_timeout_ms),
            recycle_timeout: Duration::from_millis(pool.recycle_timeout_ms),
            idle_timeout: Duration::from_secs(pool.idle_timeout_secs),
        }
    }
}
