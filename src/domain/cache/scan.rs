//! Cursor-based key enumeration

use std::time::Duration;

use tracing::debug;

use super::store::KeyValueStore;
use crate::domain::DomainError;

/// Limits for a SCAN loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// `COUNT` hint passed to every SCAN call
    pub count: Option<usize>,
    /// Maximum number of SCAN round trips before giving up
    pub max_iterations: usize,
    /// Deadline for each SCAN round trip; unset waits indefinitely
    pub round_trip_timeout: Option<Duration>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            count: Some(100),
            max_iterations: 10_000,
            round_trip_timeout: None,
        }
    }
}

impl ScanOptions {
    pub fn with_count(mut self, count: Option<usize>) -> Self {
        self.count = count;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_round_trip_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.round_trip_timeout = timeout;
        self
    }
}

/// Collects every key matching `pattern`, following the cursor until the
/// store reports completion.
///
/// Keys are not deduplicated: a key may be returned more than once when the
/// keyspace changes during iteration.
pub async fn scan_keys(
    store: &dyn KeyValueStore,
    pattern: &str,
    options: ScanOptions,
) -> Result<Vec<String>, DomainError> {
    let mut cursor = 0u64;
    let mut keys = Vec::new();

    for iteration in 1..=options.max_iterations {
        let call = store.scan(cursor, pattern, options.count);
        let page = match options.round_trip_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                DomainError::timeout(format!(
                    "SCAN '{}' cursor {} exceeded {:?}",
                    pattern, cursor, limit
                ))
            })??,
            None => call.await?,
        };

        debug!(
            pattern,
            iteration,
            cursor = page.cursor,
            found = page.keys.len(),
            "SCAN page"
        );

        if page.is_last() {
            keys.extend(page.keys);
            return Ok(keys);
        }

        cursor = page.cursor;
        keys.extend(page.keys);
    }

    Err(DomainError::scan_limit(format!(
        "SCAN '{}' did not complete within {} iterations ({} keys seen)",
        pattern,
        options.max_iterations,
        keys.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::store::{MockKeyValueStore, ScanPage};
    use mockall::Sequence;
    use mockall::predicate::{always, eq};

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_follows_cursor_until_zero() {
        let mut store = MockKeyValueStore::new();
        let mut seq = Sequence::new();

        store
            .expect_scan()
            .with(eq(0u64), eq("app:*"), always())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(ScanPage::new(17, keys(&["app:a", "app:b"]))));
        store
            .expect_scan()
            .with(eq(17u64), eq("app:*"), always())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(ScanPage::new(4, Vec::new())));
        store
            .expect_scan()
            .with(eq(4u64), eq("app:*"), always())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(ScanPage::new(0, keys(&["app:c", "app:a"]))));

        let found = scan_keys(&store, "app:*", ScanOptions::default())
            .await
            .unwrap();

        assert_eq!(found, keys(&["app:a", "app:b", "app:c", "app:a"]));
    }

    #[tokio::test]
    async fn test_passes_count_hint() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_scan()
            .with(eq(0u64), eq("app:*"), eq(Some(500usize)))
            .times(1)
            .returning(|_, _, _| Ok(ScanPage::new(0, Vec::new())));

        let options = ScanOptions::default().with_count(Some(500));
        let found = scan_keys(&store, "app:*", options).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_stops_at_iteration_cap() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_scan()
            .times(3)
            .returning(|_, _, _| Ok(ScanPage::new(9, keys(&["app:x"]))));

        let options = ScanOptions::default().with_max_iterations(3);
        let result = scan_keys(&store, "app:*", options).await;

        assert!(matches!(result, Err(DomainError::ScanLimit { .. })));
    }

    #[tokio::test]
    async fn test_propagates_store_error() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_scan()
            .times(1)
            .returning(|_, _, _| Err(DomainError::transport("connection reset")));

        let result = scan_keys(&store, "app:*", ScanOptions::default()).await;
        assert!(matches!(result, Err(DomainError::Transport { .. })));
    }
}
