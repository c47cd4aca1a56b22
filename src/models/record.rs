//! Canonical identifiers and normalized output records.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Typed reference to a publication, derived from exactly one observed link
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum CanonicalId {
    /// Lowercased DOI, e.g. `10.1234/abcd`
    Doi(String),
    /// arXiv id without version suffix, e.g. `2301.01234`
    Arxiv(String),
    /// A non-aggregator HTTP(S) link
    Url(String),
    /// No usable link was observed
    Unresolved,
}

impl CanonicalId {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, CanonicalId::Unresolved)
    }

    /// Text form consumed by the citation renderer (`doi:...`, `arxiv:...`, `url:...`)
    pub fn source_id(&self) -> Option<String> {
        match self {
            CanonicalId::Doi(doi) => Some(format!("doi:{}", doi)),
            CanonicalId::Arxiv(id) => Some(format!("arxiv:{}", id)),
            CanonicalId::Url(url) => Some(format!("url:{}", url)),
            CanonicalId::Unresolved => None,
        }
    }

    /// Key used to merge records describing the same registered work.
    ///
    /// Only DOIs and arXiv ids qualify; bare URLs are too unstable to merge on.
    pub fn merge_key(&self) -> Option<String> {
        match self {
            CanonicalId::Doi(_) | CanonicalId::Arxiv(_) => {
                self.source_id().map(|id| id.to_lowercase())
            }
            CanonicalId::Url(_) | CanonicalId::Unresolved => None,
        }
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source_id() {
            Some(id) => write!(f, "{}", id),
            None => write!(f, "unresolved"),
        }
    }
}

/// A publication in the uniform output shape
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    /// Whitespace-collapsed title, possibly empty
    pub title: String,

    /// Display names in upstream order
    pub authors: Vec<String>,

    /// Venue or publisher summary, possibly empty
    pub publisher: String,

    /// `YYYY-01-01` when a plausible year was found, else empty
    pub date: String,

    /// Best available link; may be an aggregator link when nothing else exists
    pub link: String,

    pub identifier: CanonicalId,

    /// Caller tags from the author query
    pub tags: BTreeMap<String, Value>,
}

impl NormalizedRecord {
    /// Fields derived from the upstream item, before tags are applied
    pub fn derived_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        if let Some(id) = self.identifier.source_id() {
            fields.insert("id".to_string(), Value::String(id));
        }
        fields.insert("title".to_string(), Value::String(self.title.clone()));
        fields.insert(
            "authors".to_string(),
            Value::Array(self.authors.iter().cloned().map(Value::String).collect()),
        );
        fields.insert("publisher".to_string(), Value::String(self.publisher.clone()));
        fields.insert("date".to_string(), Value::String(self.date.clone()));
        fields.insert("link".to_string(), Value::String(self.link.clone()));
        fields
    }

    /// The record as emitted downstream: derived fields, then tags on top
    pub fn to_output(&self) -> Map<String, Value> {
        merge_fields(self.derived_fields(), &self.tags)
    }
}

impl Serialize for NormalizedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_output().serialize(serializer)
    }
}

/// Ordered merge with later-wins precedence: every key in `overrides` replaces the
/// same key in `base`.
pub fn merge_fields(mut base: Map<String, Value>, overrides: &BTreeMap<String, Value>) -> Map<String, Value> {
    for (key, value) in overrides {
        base.insert(key.clone(), value.clone());
    }
    base
}
