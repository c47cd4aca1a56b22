//! Input validation utilities for author ids and links.
//!
//! Author ids end up in cache and trace file names, so they are restricted to a
//! conservative character set.

use thiserror::Error;
use url::Url;

/// Validation error types
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Invalid author ID: {0}")]
    InvalidAuthorId(String),

    #[error("Path traversal detected: {0}")]
    PathTraversal(String),
}

/// Validate an author id before it is used in requests or file names.
///
/// Returns the trimmed id. Allowed characters are ASCII letters, digits, `-` and `_`.
/// Dots are refused because `<id>.author.json` and `<id>.resolved.json` share the
/// cache directory with `<id>.json`.
pub fn validate_author_id(id: &str) -> Result<String, ValidationError> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::InvalidAuthorId("empty ID".to_string()));
    }

    if id.contains("..") || id.contains('/') || id.contains('\\') {
        return Err(ValidationError::PathTraversal(id.to_string()));
    }

    if let Some(ch) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_')))
    {
        return Err(ValidationError::InvalidAuthorId(format!(
            "contains disallowed character: {:?}",
            ch
        )));
    }

    Ok(id.to_string())
}

/// Parse a well-formed absolute HTTP(S) URL with a host
pub fn parse_http_url(link: &str) -> Option<Url> {
    let parsed = Url::parse(link.trim()).ok()?;
    match parsed.scheme() {
        "http" | "https" => {}
        _ => return None,
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return None;
    }
    Some(parsed)
}

/// Lowercased host of an HTTP(S) URL
pub fn http_host(link: &str) -> Option<String> {
    parse_http_url(link).and_then(|u| u.host_str().map(str::to_ascii_lowercase))
}
