//! Cache trait definition

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use super::entry::Entry;
use super::key::Namespace;
use crate::domain::DomainError;

/// Namespaced cache over a remote key-value store
///
/// All keys are logical keys; implementations prepend their namespace.
/// This trait moves encoded payloads so it stays dyn-compatible; use
/// [`CacheExt`] for typed values.
#[async_trait]
pub trait Cache: Send + Sync + Debug {
    /// Namespace every key is scoped to
    fn namespace(&self) -> &Namespace;

    /// Checks whether a key exists
    async fn has(&self, key: &str) -> Result<bool, DomainError>;

    /// Gets the encoded payload stored under a key, `NotFound` if absent
    async fn get_raw(&self, key: &str) -> Result<Vec<u8>, DomainError>;

    /// Stores an encoded payload; `None` applies the default TTL
    async fn set_raw(
        &self,
        key: &str,
        payload: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), DomainError>;

    /// Deletes a key; deleting an absent key succeeds
    async fn forget(&self, key: &str) -> Result<(), DomainError>;

    /// Deletes every key whose logical key starts with `pattern`
    ///
    /// Not atomic: keys written while the scan runs may survive. Stops at the
    /// first failed delete. Returns the number of keys removed.
    async fn empty_by_match(&self, pattern: &str) -> Result<usize, DomainError>;

    /// Deletes every key in the namespace, with the same caveats as
    /// [`Cache::empty_by_match`]
    async fn empty(&self) -> Result<usize, DomainError>;
}

/// Extension trait providing typed get/set operations
pub trait CacheExt: Cache {
    /// Gets a typed value from the cache
    fn get<'a, V>(
        &'a self,
        key: &'a str,
    ) -> impl std::future::Future<Output = Result<V, DomainError>> + Send
    where
        V: DeserializeOwned + Send,
    {
        async move {
            let namespaced = self.namespace().key(key)?;
            let payload = self.get_raw(key).await?;
            let entry = Entry::<V>::decode(&payload, &namespaced)?;
            Ok(entry.into_value())
        }
    }

    /// Gets a typed value, mapping `NotFound` to `None`
    fn get_optional<'a, V>(
        &'a self,
        key: &'a str,
    ) -> impl std::future::Future<Output = Result<Option<V>, DomainError>> + Send
    where
        V: DeserializeOwned + Send,
    {
        async move {
            match self.get(key).await {
                Ok(value) => Ok(Some(value)),
                Err(e) if e.is_not_found() => Ok(None),
                Err(e) => Err(e),
            }
        }
    }

    /// Sets a typed value in the cache
    fn set<'a, V>(
        &'a self,
        key: &'a str,
        value: &'a V,
        ttl: Option<Duration>,
    ) -> impl std::future::Future<Output = Result<(), DomainError>> + Send
    where
        V: Serialize + Send + Sync,
    {
        async move {
            let namespaced = self.namespace().key(key)?;
            let payload = Entry::new(namespaced, value).encode()?;
            self.set_raw(key, payload, ttl).await
        }
    }
}

// Blanket implementation for all types implementing Cache
impl<T: Cache + ?Sized> CacheExt for T {}
