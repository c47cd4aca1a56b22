//! Core data models: author queries, raw provider items, identifiers and output records.

mod author;
mod publication;
mod record;

pub use author::AuthorQuery;
pub use publication::{AuthorEntry, AuthorObject, AuthorsField, RawPublication};
pub use record::{merge_fields, CanonicalId, NormalizedRecord};
