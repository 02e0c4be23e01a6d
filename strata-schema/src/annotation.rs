//! Parsing of field annotation strings.
//!
//! An annotation is a `;`-separated list of tags, each either a bare flag or a
//! `key:value` pair:
//!
//! ```text
//! primary_key;default:gen_random_uuid()
//! unique;not_null;old_name:EmailAddress
//! fk:User
//! ```
//!
//! Only `:` separates a key from its value. Anything else that looks like a
//! separator (`=`) is rejected rather than guessed at.

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{SchemaError, SchemaResult};

/// Tags that never take a value.
const FLAG_KEYS: &[&str] = &["primary_key", "unique", "not_null", "null", "index"];

/// Tags that always take a value.
const VALUE_KEYS: &[&str] = &[
    "default",
    "old_name",
    "column",
    "fk",
    "references",
    "type",
];

/// Parsed annotation tags in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    entries: IndexMap<String, Option<String>>,
}

impl Tags {
    /// Parse an annotation string for the given entity field.
    pub fn parse(entity: &str, field: &str, annotation: &str) -> SchemaResult<Self> {
        let mut entries = IndexMap::new();
        let malformed =
            |message: String| SchemaError::malformed_annotation(entity, field, annotation, message);

        for raw in annotation.split(';') {
            let tag = raw.trim();
            if tag.is_empty() {
                continue;
            }

            let (key, value) = match tag.split_once(':') {
                Some((k, v)) => (k.trim(), Some(v.trim())),
                None => (tag, None),
            };

            if key.contains('=') {
                return Err(malformed(format!(
                    "unknown key/value separator in `{}`, expected `key:value`",
                    tag
                )));
            }
            if key.is_empty() {
                return Err(malformed(format!("empty tag key in `{}`", tag)));
            }

            let key = key.to_ascii_lowercase();
            if FLAG_KEYS.contains(&key.as_str()) && value.is_some() {
                return Err(malformed(format!("tag `{}` does not take a value", key)));
            }
            if VALUE_KEYS.contains(&key.as_str()) && value.is_none_or(str::is_empty) {
                return Err(malformed(format!("tag `{}` requires a value", key)));
            }
            if !FLAG_KEYS.contains(&key.as_str()) && !VALUE_KEYS.contains(&key.as_str()) {
                debug!(entity, field, tag = %key, "keeping unrecognised annotation tag");
            }

            entries.insert(key, value.map(str::to_string));
        }

        Ok(Self { entries })
    }

    /// Whether a tag is present.
    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Get the value of a `key:value` tag.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|v| v.as_deref())
    }

    /// Iterate over all tags.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no tags.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
