//! Cache domain - Namespaced caching over a remote key-value store

mod entry;
mod facade;
mod key;
mod repository;
mod scan;
mod store;

pub use entry::{Entry, CODEC_VERSION};
pub use facade::{NamespacedCache, NamespacedCacheConfig, MAX_TTL_SECS};
pub use key::{escape_glob, Namespace, KEY_SEPARATOR};
pub use repository::{Cache, CacheExt};
pub use scan::{scan_keys, ScanOptions};
pub use store::{KeyValueStore, ScanPage};

#[cfg(test)]
pub use store::MockKeyValueStore;
