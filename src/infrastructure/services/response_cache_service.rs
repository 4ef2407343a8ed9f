//! HTTP response caching service

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};

use crate::domain::cache::{Cache, CacheExt};
use crate::domain::DomainError;

/// Logical-key namespace for cached responses
pub const RESPONSE_KEY_PREFIX: &str = "response";

/// Outcome of a [`ResponseCacheService::remember`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the cache
    Hit,
    /// Loaded and written to the cache
    Miss,
    /// Loaded while the cache was unavailable
    Bypass,
}

/// Cache-aside helper for API responses
///
/// The cache is never authoritative: a store outage or a payload that no
/// longer decodes falls back to the loader instead of failing the request.
#[derive(Debug, Clone)]
pub struct ResponseCacheService {
    cache: Arc<dyn Cache>,
    ttl: Option<Duration>,
}

impl ResponseCacheService {
    /// Creates a service that writes with the cache's default TTL
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache, ttl: None }
    }

    /// Sets the TTL used for cached responses
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Builds the logical key for a request path and optional query string
    pub fn response_key(path: &str, query: Option<&str>) -> String {
        match query.filter(|q| !q.is_empty()) {
            Some(query) => format!("{}:{}?{}", RESPONSE_KEY_PREFIX, path, query),
            None => format!("{}:{}", RESPONSE_KEY_PREFIX, path),
        }
    }

    /// Returns the cached value for `key`, or runs `loader` and caches its result
    pub async fn remember<V, F, Fut, E>(&self, key: &str, loader: F) -> Result<(V, CacheStatus), E>
    where
        V: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let status = match self.cache.get_optional::<V>(key).await {
            Ok(Some(value)) => {
                debug!(key, "Response served from cache");
                return Ok((value, CacheStatus::Hit));
            }
            Ok(None) => CacheStatus::Miss,
            Err(DomainError::Decode { message }) => {
                warn!(key, error = %message, "Cached response no longer decodes, replacing");
                CacheStatus::Miss
            }
            Err(e) if e.is_unavailable() => {
                warn!(key, error = %e, "Response cache unavailable, loading directly");
                CacheStatus::Bypass
            }
            Err(e) => {
                error!(key, error = %e, "Response cache read rejected, loading directly");
                CacheStatus::Bypass
            }
        };

        let value = loader().await?;

        if let Err(e) = self.cache.set(key, &value, self.ttl).await {
            warn!(key, error = %e, "Failed to cache response");
            return Ok((value, CacheStatus::Bypass));
        }

        Ok((value, status))
    }

    /// Drops one cached response
    pub async fn invalidate(&self, key: &str) -> Result<(), DomainError> {
        self.cache.forget(key).await
    }

    /// Drops every cached response whose key starts with `pattern`
    pub async fn invalidate_matching(&self, pattern: &str) -> Result<usize, DomainError> {
        self.cache.empty_by_match(pattern).await
    }

    /// Drops everything in the cache namespace
    pub async fn invalidate_all(&self) -> Result<usize, DomainError> {
        self.cache.empty().await
    }
}
