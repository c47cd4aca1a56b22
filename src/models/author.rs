//! Author query model.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One author to resolve, plus caller-supplied tags copied onto every output record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorQuery {
    /// External author identifier (a Google Scholar profile id such as `secQmYUAAAAJ`)
    pub author_id: String,

    /// Pass-through tags, forwarded verbatim
    #[serde(default)]
    pub tags: BTreeMap<String, Value>,
}

impl AuthorQuery {
    /// Create a query with no tags
    pub fn new(author_id: impl Into<String>) -> Self {
        Self {
            author_id: author_id.into(),
            tags: BTreeMap::new(),
        }
    }

    /// Add a pass-through tag
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Parse a `key=value` pair as given on the command line.
    ///
    /// Values that parse as JSON (numbers, booleans, arrays, objects) keep their type;
    /// anything else is stored as a string.
    pub fn parse_tag(raw: &str) -> Option<(String, Value)> {
        let (key, value) = raw.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        let value = value.trim();
        let parsed = serde_json::from_str::<Value>(value)
            .ok()
            .filter(|v| !v.is_string())
            .unwrap_or_else(|| Value::String(value.to_string()));
        Some((key.to_string(), parsed))
    }
}
