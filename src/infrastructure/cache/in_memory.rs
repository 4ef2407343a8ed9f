//! In-memory key-value store using moka

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use regex::Regex;

use crate::domain::cache::{KeyValueStore, ScanPage};
use crate::domain::DomainError;

/// Page size used when a SCAN carries no COUNT hint
const DEFAULT_SCAN_COUNT: usize = 10;

/// Configuration for the in-memory store
#[derive(Debug, Clone)]
pub struct InMemoryStoreConfig {
    /// Maximum number of entries
    pub max_capacity: u64,
}

impl Default for InMemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

impl InMemoryStoreConfig {
    /// Sets the maximum capacity
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }
}

#[derive(Debug, Clone)]
struct StoredValue {
    data: Vec<u8>,
    expires_at: Instant,
}

impl StoredValue {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Process-local store speaking the same command set as Redis
///
/// Entries expire individually. SCAN walks a sorted snapshot of the keyspace
/// using the offset into that snapshot as the cursor.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    entries: MokaCache<String, StoredValue>,
}

impl InMemoryStore {
    /// Creates a new in-memory store with default configuration
    pub fn new() -> Self {
        Self::with_config(InMemoryStoreConfig::default())
    }

    /// Creates a new in-memory store with the given configuration
    pub fn with_config(config: InMemoryStoreConfig) -> Self {
        Self {
            entries: MokaCache::builder()
                .max_capacity(config.max_capacity)
                .build(),
        }
    }

    async fn live(&self, key: &str) -> Option<StoredValue> {
        let value = self.entries.get(key).await?;

        if value.is_expired() {
            self.entries.remove(key).await;
            return None;
        }

        Some(value)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.live(key).await.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DomainError> {
        Ok(self.live(key).await.map(|value| value.data))
    }

    async fn set_ex(&self, key: &str, seconds: u64, value: &[u8]) -> Result<(), DomainError> {
        if seconds == 0 {
            return Err(DomainError::validation(format!(
                "invalid expire time in 'SETEX' for '{}'",
                key
            )));
        }

        let expires_at = Instant::now()
            .checked_add(Duration::from_secs(seconds))
            .ok_or_else(|| {
                DomainError::validation(format!("invalid expire time in 'SETEX' for '{}'", key))
            })?;

        let stored = StoredValue {
            data: value.to_vec(),
            expires_at,
        };

        self.entries.insert(key.to_string(), stored).await;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<u64, DomainError> {
        let removed = self.entries.remove(key).await;

        Ok(match removed {
            Some(value) if !value.is_expired() => 1,
            _ => 0,
        })
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: Option<usize>,
    ) -> Result<ScanPage, DomainError> {
        let matcher = glob_to_regex(pattern)?;

        self.entries.run_pending_tasks().await;

        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(key, value)| !value.is_expired() && matcher.is_match(key.as_str()))
            .map(|(key, _)| (*key).clone())
            .collect();
        keys.sort();

        let start = (cursor as usize).min(keys.len());
        let end = start
            .saturating_add(count.unwrap_or(DEFAULT_SCAN_COUNT).max(1))
            .min(keys.len());
        let next = if end >= keys.len() { 0 } else { end as u64 };

        Ok(ScanPage::new(next, keys[start..end].to_vec()))
    }

    async fn ping(&self) -> Result<(), DomainError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Translates a Redis glob (`* ? [..] \x`) into an anchored regex
fn glob_to_regex(pattern: &str) -> Result<Regex, DomainError> {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => match chars.next() {
                Some(escaped) => out.push_str(&regex::escape(&escaped.to_string())),
                None => out.push_str(r"\\"),
            },
            '[' => {
                out.push('[');
                for class_char in chars.by_ref() {
                    if class_char == ']' {
                        break;
                    }
                    match class_char {
                        '^' => out.push('^'),
                        '\\' | '[' | '&' | '~' => {
                            out.push('\\');
                            out.push(class_char);
                        }
                        other => out.push(other),
                    }
                }
                out.push(']');
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }

    out.push('$');

    Regex::new(&out)
        .map_err(|e| DomainError::validation(format!("Invalid pattern '{}': {}", pattern, e)))
}
