//! Cache infrastructure - Key-value store implementations

mod factory;
mod in_memory;
mod redis;

pub use factory::{CacheFactory, CacheHandle, StoreType};
pub use in_memory::{InMemoryStore, InMemoryStoreConfig};
pub use redis::{RedisStore, RedisStoreConfig};
