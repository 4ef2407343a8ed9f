//! Application services built on the cache

mod response_cache_service;

pub use response_cache_service::{CacheStatus, ResponseCacheService, RESPONSE_KEY_PREFIX};
