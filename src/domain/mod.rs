//! Domain layer - Cache contract, codec and key handling

pub mod cache;
pub mod error;

pub use cache::{
    Cache, CacheExt, Entry, KeyValueStore, Namespace, NamespacedCache, NamespacedCacheConfig,
    ScanOptions, ScanPage,
};
pub use error::DomainError;
