//! Key-value store port

use async_trait::async_trait;

use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// One page of a cursor-based SCAN
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next call; zero once iteration is complete
    pub cursor: u64,
    /// Keys returned by this call (may be empty, may repeat across pages)
    pub keys: Vec<String>,
}

impl ScanPage {
    pub fn new(cursor: u64, keys: Vec<String>) -> Self {
        Self { cursor, keys }
    }

    pub fn is_last(&self) -> bool {
        self.cursor == 0
    }
}

/// Minimal command set the cache needs from a remote store
///
/// Keys passed here are already namespaced. Implementations map each method
/// onto one store command and acquire a connection per call.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// `EXISTS key`
    async fn exists(&self, key: &str) -> Result<bool, DomainError>;

    /// `GET key`; `None` when the key is absent
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DomainError>;

    /// `SETEX key seconds value`
    async fn set_ex(&self, key: &str, seconds: u64, value: &[u8]) -> Result<(), DomainError>;

    /// `DEL key`, returning the number of keys removed
    async fn del(&self, key: &str) -> Result<u64, DomainError>;

    /// `SCAN cursor MATCH pattern [COUNT count]`
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: Option<usize>,
    ) -> Result<ScanPage, DomainError>;

    /// `PING`
    async fn ping(&self) -> Result<(), DomainError>;

    /// Short backend name for logs
    fn backend(&self) -> &'static str;
}
