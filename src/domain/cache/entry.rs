//! Entry codec
//!
//! An entry is a single-key mapping from the namespaced key to the cached
//! value. It only exists while a value is being written or read; the store
//! holds the encoded envelope:
//!
//! ```text
//! {"v":1,"entry":{"app:user:1":{"name":"a"}}}
//! ```

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Wire format version written into every envelope
pub const CODEC_VERSION: u8 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a, V> {
    v: u8,
    entry: BTreeMap<&'a str, &'a V>,
}

#[derive(Deserialize)]
struct EnvelopeOwned {
    v: u8,
    entry: serde_json::Map<String, serde_json::Value>,
}

/// A cached value paired with the namespaced key it is stored under
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<V> {
    key: String,
    value: V,
}

impl<V> Entry<V> {
    pub fn new(key: impl Into<String>, value: V) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn into_value(self) -> V {
        self.value
    }
}

impl<V: Serialize> Entry<V> {
    /// Serializes the entry into a versioned envelope
    pub fn encode(&self) -> Result<Vec<u8>, DomainError> {
        let mut entry = BTreeMap::new();
        entry.insert(self.key.as_str(), &self.value);

        let envelope = EnvelopeRef {
            v: CODEC_VERSION,
            entry,
        };

        serde_json::to_vec(&envelope).map_err(|e| {
            DomainError::encode(format!("Failed to encode entry '{}': {}", self.key, e))
        })
    }
}

impl<V: DeserializeOwned> Entry<V> {
    /// Decodes an envelope and extracts the value stored under `expected_key`
    pub fn decode(bytes: &[u8], expected_key: &str) -> Result<Self, DomainError> {
        let envelope: EnvelopeOwned = serde_json::from_slice(bytes).map_err(|e| {
            DomainError::decode(format!(
                "Malformed entry for '{}': {}",
                expected_key, e
            ))
        })?;

        if envelope.v != CODEC_VERSION {
            return Err(DomainError::decode(format!(
                "Unsupported entry version {} for '{}' (expected {})",
                envelope.v, expected_key, CODEC_VERSION
            )));
        }

        if envelope.entry.len() != 1 {
            return Err(DomainError::decode(format!(
                "Entry for '{}' holds {} keys, expected exactly one",
                expected_key,
                envelope.entry.len()
            )));
        }

        let (key, raw) = envelope
            .entry
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::decode(format!("Empty entry for '{}'", expected_key)))?;

        if key != expected_key {
            return Err(DomainError::decode(format!(
                "Entry key mismatch: stored '{}', requested '{}'",
                key, expected_key
            )));
        }

        let value = serde_json::from_value(raw).map_err(|e| {
            DomainError::decode(format!(
                "Entry value for '{}' has an unexpected shape: {}",
                expected_key, e
            ))
        })?;

        Ok(Self { key, value })
    }
}
