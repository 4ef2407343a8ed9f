//! Cache key namespacing

use std::fmt;

use crate::domain::DomainError;

/// Separator between the namespace prefix and the logical key
pub const KEY_SEPARATOR: char = ':';

/// Namespace prefix scoping every key a cache instance reads or writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    prefix: String,
}

impl Namespace {
    /// Creates a namespace, rejecting an empty prefix
    pub fn new(prefix: impl Into<String>) -> Result<Self, DomainError> {
        let prefix = prefix.into();

        if prefix.is_empty() {
            return Err(DomainError::configuration(
                "Cache namespace prefix must not be empty",
            ));
        }

        Ok(Self { prefix })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Builds `prefix:key` for a logical key
    pub fn key(&self, logical_key: &str) -> Result<String, DomainError> {
        if logical_key.is_empty() {
            return Err(DomainError::validation("Cache key must not be empty"));
        }

        Ok(format!("{}{}{}", self.prefix, KEY_SEPARATOR, logical_key))
    }

    /// Builds the SCAN pattern `prefix:pattern*`
    ///
    /// The prefix is glob-escaped so it only ever matches itself; the caller's
    /// pattern keeps its glob meaning.
    pub fn match_pattern(&self, logical_pattern: &str) -> String {
        format!(
            "{}{}{}*",
            escape_glob(&self.prefix),
            KEY_SEPARATOR,
            logical_pattern
        )
    }

    /// SCAN pattern covering the whole namespace
    pub fn all_pattern(&self) -> String {
        self.match_pattern("")
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix)
    }
}

/// Escapes Redis glob metacharacters (`* ? [ ] \`)
pub fn escape_glob(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());

    for c in input.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}
