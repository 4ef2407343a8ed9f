//! Namespaced cache facade over a [`KeyValueStore`]

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::key::Namespace;
use super::repository::Cache;
use super::scan::{scan_keys, ScanOptions};
use super::store::KeyValueStore;
use crate::domain::DomainError;

/// Longest expiry Redis accepts: it stores expire times as `i64` milliseconds
pub const MAX_TTL_SECS: u64 = (i64::MAX / 1000) as u64;

/// Settings for a [`NamespacedCache`]
#[derive(Debug, Clone)]
pub struct NamespacedCacheConfig {
    /// Prefix for every key
    pub prefix: String,
    /// TTL applied when a caller does not pass one
    pub default_ttl: Duration,
    /// Deadline for each store round trip
    pub operation_timeout: Duration,
    /// Limits for bulk-eviction scans
    pub scan: ScanOptions,
}

impl Default for NamespacedCacheConfig {
    fn default() -> Self {
        Self {
            prefix: "cache".to_string(),
            default_ttl: Duration::from_secs(3600),
            operation_timeout: Duration::from_secs(5),
            scan: ScanOptions::default(),
        }
    }
}

impl NamespacedCacheConfig {
    /// Creates a new configuration with the given prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// Sets the default TTL
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Sets the per-command deadline
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Sets the scan limits
    pub fn with_scan_options(mut self, scan: ScanOptions) -> Self {
        self.scan = scan;
        self
    }
}

/// Cache facade: namespacing, expiry defaults, deadlines and bulk eviction
#[derive(Clone)]
pub struct NamespacedCache {
    store: Arc<dyn KeyValueStore>,
    namespace: Namespace,
    default_ttl: Duration,
    operation_timeout: Duration,
    scan: ScanOptions,
}

impl fmt::Debug for NamespacedCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespacedCache")
            .field("namespace", &self.namespace)
            .field("backend", &self.store.backend())
            .field("default_ttl", &self.default_ttl)
            .field("operation_timeout", &self.operation_timeout)
            .field("scan", &self.scan)
            .finish()
    }
}

impl NamespacedCache {
    /// Creates a facade over the given store
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        config: NamespacedCacheConfig,
    ) -> Result<Self, DomainError> {
        let namespace = Namespace::new(config.prefix)?;

        if config.default_ttl.is_zero() {
            return Err(DomainError::configuration("Default TTL must be positive"));
        }

        if config.default_ttl > Duration::from_secs(MAX_TTL_SECS) {
            return Err(DomainError::configuration(format!(
                "Default TTL must not exceed {} seconds",
                MAX_TTL_SECS
            )));
        }

        if config.operation_timeout.is_zero() {
            return Err(DomainError::configuration(
                "Operation timeout must be positive",
            ));
        }

        if config.scan.max_iterations == 0 {
            return Err(DomainError::configuration(
                "Scan iteration cap must be positive",
            ));
        }

        Ok(Self {
            store,
            namespace,
            default_ttl: config.default_ttl,
            operation_timeout: config.operation_timeout,
            scan: config.scan,
        })
    }

    /// Returns a facade sharing this store with a different per-command deadline
    pub fn with_operation_timeout(&self, timeout: Duration) -> Self {
        Self {
            operation_timeout: timeout,
            ..self.clone()
        }
    }

    /// TTL used when a caller passes none
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Deadline applied to each store round trip
    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    /// Checks the store is reachable
    pub async fn ping(&self) -> Result<(), DomainError> {
        self.within("PING", "-", self.store.ping()).await
    }

    /// Runs one store round trip under the operation deadline
    async fn within<T>(
        &self,
        command: &str,
        key: &str,
        fut: impl Future<Output = Result<T, DomainError>>,
    ) -> Result<T, DomainError> {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::timeout(format!(
                "{} '{}' exceeded {:?}",
                command, key, self.operation_timeout
            ))),
        }
    }

    fn ttl_seconds(&self, ttl: Option<Duration>) -> Result<u64, DomainError> {
        let ttl = ttl.unwrap_or(self.default_ttl);

        if ttl.is_zero() {
            return Err(DomainError::validation("Cache TTL must be positive"));
        }

        // SETEX takes whole seconds; round partial seconds up
        let seconds = match ttl.subsec_nanos() {
            0 => ttl.as_secs(),
            _ => ttl.as_secs().saturating_add(1),
        };

        if seconds > MAX_TTL_SECS {
            return Err(DomainError::validation(format!(
                "Cache TTL of {} seconds exceeds the {} second maximum",
                seconds, MAX_TTL_SECS
            )));
        }

        Ok(seconds)
    }

    async fn delete_all(&self, pattern: &str) -> Result<usize, DomainError> {
        let options = self
            .scan
            .with_round_trip_timeout(Some(self.operation_timeout));
        let keys = scan_keys(self.store.as_ref(), pattern, options).await?;
        let total = keys.len();
        let mut deleted = 0usize;

        for key in &keys {
            if let Err(e) = self.within("DEL", key, self.store.del(key)).await {
                warn!(
                    namespace = %self.namespace,
                    pattern,
                    key = %key,
                    deleted,
                    remaining = total - deleted,
                    error = %e,
                    "Bulk eviction aborted"
                );
                return Err(e);
            }

            deleted += 1;
        }

        debug!(namespace = %self.namespace, pattern, deleted, "Bulk eviction complete");
        Ok(deleted)
    }
}

#[async_trait]
impl Cache for NamespacedCache {
    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    async fn has(&self, key: &str) -> Result<bool, DomainError> {
        let key = self.namespace.key(key)?;
        self.within("EXISTS", &key, self.store.exists(&key)).await
    }

    async fn get_raw(&self, key: &str) -> Result<Vec<u8>, DomainError> {
        let key = self.namespace.key(key)?;

        match self.within("GET", &key, self.store.get(&key)).await? {
            Some(payload) => {
                debug!(key = %key, bytes = payload.len(), "Cache hit");
                Ok(payload)
            }
            None => {
                debug!(key = %key, "Cache miss");
                Err(DomainError::not_found(format!("GET '{}'", key)))
            }
        }
    }

    async fn set_raw(
        &self,
        key: &str,
        payload: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), DomainError> {
        let key = self.namespace.key(key)?;
        let seconds = self.ttl_seconds(ttl)?;

        self.within("SETEX", &key, self.store.set_ex(&key, seconds, &payload))
            .await?;

        debug!(key = %key, ttl_secs = seconds, bytes = payload.len(), "Cache set");
        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<(), DomainError> {
        let key = self.namespace.key(key)?;
        let removed = self.within("DEL", &key, self.store.del(&key)).await?;

        debug!(key = %key, removed, "Cache forget");
        Ok(())
    }

    async fn empty_by_match(&self, pattern: &str) -> Result<usize, DomainError> {
        let pattern = self.namespace.match_pattern(pattern);
        self.delete_all(&pattern).await
    }

    async fn empty(&self) -> Result<usize, DomainError> {
        let pattern = self.namespace.all_pattern();
        self.delete_all(&pattern).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::store::{MockKeyValueStore, ScanPage};
    use crate::domain::cache::CacheExt;
    use mockall::predicate::{always, eq};

    fn cache_with(store: MockKeyValueStore) -> NamespacedCache {
        NamespacedCache::new(Arc::new(store), NamespacedCacheConfig::new("app")).unwrap()
    }

    #[tokio::test]
    async fn test_has_uses_namespaced_key() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_exists()
            .with(eq("app:user:1"))
            .times(1)
            .returning(|_| Ok(true));

        assert!(cache_with(store).has("user:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let mut store = MockKeyValueStore::new();
        store.expect_get().returning(|_| Ok(None));

        let result: Result<String, _> = cache_with(store).get("user:1").await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_get_corrupted_payload_is_decode_error() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_get()
            .returning(|_| Ok(Some(b"not an entry".to_vec())));

        let result: Result<String, _> = cache_with(store).get("user:1").await;
        assert!(matches!(result, Err(DomainError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_set_without_ttl_uses_default() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_set_ex()
            .with(eq("app:user:1"), eq(3600u64), always())
            .times(1)
            .returning(|_, _, _| Ok(()));

        cache_with(store)
            .set("user:1", &"payload", None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_set_rounds_partial_seconds_up() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_set_ex()
            .with(eq("app:k"), eq(2u64), always())
            .times(1)
            .returning(|_, _, _| Ok(()));

        cache_with(store)
            .set("k", &1u8, Some(Duration::from_millis(1500)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_set_zero_ttl_rejected() {
        let store = MockKeyValueStore::new();

        let result = cache_with(store).set("k", &1u8, Some(Duration::ZERO)).await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_set_ttl_beyond_store_maximum_rejected() {
        let mut store = MockKeyValueStore::new();
        store.expect_set_ex().never();
        let cache = cache_with(store);

        let result = cache.set("k", &1u8, Some(Duration::MAX)).await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));

        let result = cache
            .set("k", &1u8, Some(Duration::from_secs(MAX_TTL_SECS + 1)))
            .await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_set_ttl_at_store_maximum_accepted() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_set_ex()
            .with(eq("app:k"), eq(MAX_TTL_SECS), always())
            .times(1)
            .returning(|_, _, _| Ok(()));

        cache_with(store)
            .set("k", &1u8, Some(Duration::from_secs(MAX_TTL_SECS)))
            .await
            .unwrap();
    }

    #[test]
    fn test_oversized_default_ttl_rejected() {
        let config = NamespacedCacheConfig::new("app").with_default_ttl(Duration::MAX);
        let result = NamespacedCache::new(Arc::new(MockKeyValueStore::new()), config);
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_empty_key_rejected_before_store_call() {
        let store = MockKeyValueStore::new();

        let result = cache_with(store).forget("").await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_exists()
            .returning(|_| Err(DomainError::transport("connection refused")));

        let result = cache_with(store).has("user:1").await;
        assert!(matches!(result, Err(DomainError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_empty_by_match_aborts_on_first_delete_error() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_scan()
            .with(eq(0u64), eq("app:session*"), always())
            .returning(|_, _, _| {
                Ok(ScanPage::new(
                    0,
                    vec![
                        "app:session:1".to_string(),
                        "app:session:2".to_string(),
                        "app:session:3".to_string(),
                    ],
                ))
            });
        store
            .expect_del()
            .with(eq("app:session:1"))
            .times(1)
            .returning(|_| Ok(1));
        store
            .expect_del()
            .with(eq("app:session:2"))
            .times(1)
            .returning(|_| Err(DomainError::transport("broken pipe")));
        store.expect_del().with(eq("app:session:3")).never();

        let result = cache_with(store).empty_by_match("session").await;
        assert!(matches!(result, Err(DomainError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_empty_deletes_scanned_keys_without_reprefixing() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_scan()
            .with(eq(0u64), eq("app:*"), always())
            .returning(|_, _, _| Ok(ScanPage::new(0, vec!["app:a".to_string()])));
        store
            .expect_del()
            .with(eq("app:a"))
            .times(1)
            .returning(|_| Ok(1));

        let deleted = cache_with(store).empty().await.unwrap();
        assert_eq!(deleted, 1);
    }

    #[derive(Debug)]
    struct SlowStore {
        delay: Duration,
    }

    #[async_trait]
    impl KeyValueStore for SlowStore {
        async fn exists(&self, _key: &str) -> Result<bool, DomainError> {
            tokio::time::sleep(self.delay).await;
            Ok(true)
        }

        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, DomainError> {
            tokio::time::sleep(self.delay).await;
            Ok(None)
        }

        async fn set_ex(&self, _key: &str, _seconds: u64, _value: &[u8]) -> Result<(), DomainError> {
            tokio::time::sleep(self.delay).await;
            Ok(())
        }

        async fn del(&self, _key: &str) -> Result<u64, DomainError> {
            tokio::time::sleep(self.delay).await;
            Ok(0)
        }

        async fn scan(
            &self,
            _cursor: u64,
            _pattern: &str,
            _count: Option<usize>,
        ) -> Result<ScanPage, DomainError> {
            tokio::time::sleep(self.delay).await;
            Ok(ScanPage::default())
        }

        async fn ping(&self) -> Result<(), DomainError> {
            tokio::time::sleep(self.delay).await;
            Ok(())
        }

        fn backend(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_times_out() {
        let store = SlowStore {
            delay: Duration::from_secs(30),
        };
        let cache = NamespacedCache::new(Arc::new(store), NamespacedCacheConfig::new("app"))
            .unwrap()
            .with_operation_timeout(Duration::from_millis(100));

        let result = cache.has("k").await;
        assert!(matches!(result, Err(DomainError::Timeout { .. })));

        let result = cache.set("k", &"v", None).await;
        assert!(matches!(result, Err(DomainError::Timeout { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_scan_times_out_bulk_eviction() {
        let store = SlowStore {
            delay: Duration::from_secs(3600),
        };
        let cache = NamespacedCache::new(Arc::new(store), NamespacedCacheConfig::new("app"))
            .unwrap()
            .with_operation_timeout(Duration::from_millis(100));

        let started = tokio::time::Instant::now();
        let result = cache.empty().await;

        assert!(matches!(result, Err(DomainError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(1));

        let result = cache.empty_by_match("session").await;
        assert!(matches!(result, Err(DomainError::Timeout { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_store_within_deadline() {
        let store = SlowStore {
            delay: Duration::from_millis(10),
        };
        let cache = NamespacedCache::new(Arc::new(store), NamespacedCacheConfig::new("app"))
            .unwrap();

        assert!(cache.has("k").await.unwrap());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = NamespacedCacheConfig::new("app").with_operation_timeout(Duration::ZERO);
        let result = NamespacedCache::new(Arc::new(MockKeyValueStore::new()), config);
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }
}
