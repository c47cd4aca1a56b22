//! Raw publication items as returned by the search provider.
//!
//! Items are kept as untyped JSON and only read through the accessors below, so a
//! provider adding or dropping fields never breaks deserialization of a whole page.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single publication record from the provider, read-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawPublication(Value);

impl RawPublication {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The underlying JSON value
    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn is_object(&self) -> bool {
        self.0.is_object()
    }

    /// Look up a field, following nested objects for each key in `path`
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(&self.0, |value, key| value.get(key))
    }

    /// A non-empty, trimmed string field
    pub fn str_at(&self, path: &[&str]) -> Option<&str> {
        self.get(path)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Provider-stable id for the listing itself
    pub fn citation_id(&self) -> Option<&str> {
        self.str_at(&["citation_id"])
            .or_else(|| self.str_at(&["cite_id"]))
    }

    /// Cluster id used for the secondary detail lookup.
    ///
    /// `cited_by.cites_id` may hold several comma-separated clusters; the first is used.
    pub fn cluster_id(&self) -> Option<&str> {
        const PATHS: &[&[&str]] = &[
            &["cluster_id"],
            &["result_id"],
            &["cited_by", "cites_id"],
            &["inline_links", "versions", "cluster_id"],
        ];

        PATHS.iter().find_map(|path| {
            self.str_at(path)
                .and_then(|raw| raw.split(',').map(str::trim).find(|s| !s.is_empty()))
        })
    }

    /// The author field in whichever shape the provider sent it
    pub fn authors(&self) -> Option<AuthorsField> {
        ["authors", "author"]
            .iter()
            .filter_map(|key| self.0.get(key))
            .find(|v| !v.is_null())
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl From<Value> for RawPublication {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Accepted shapes of the author field.
///
/// - `Text`: a single display string, comma separated (`"A Smith, B Jones"`)
/// - `List`: a list whose entries are names or author objects
/// - `Single`: one author object
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AuthorsField {
    Text(String),
    List(Vec<AuthorEntry>),
    Single(AuthorObject),
}

/// One entry of an author list
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AuthorEntry {
    Name(String),
    Object(AuthorObject),
    /// Anything else (numbers, nested lists); carries no usable name
    Other(Value),
}

/// An author object; the first present of `name`, `full_name`, `display_name` wins
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AuthorObject {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl AuthorObject {
    pub fn display(&self) -> Option<&str> {
        [&self.name, &self.full_name, &self.display_name]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }
}
