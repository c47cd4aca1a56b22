//! Resolution traces, written next to the cache for offline inspection.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

use crate::models::CanonicalId;
use crate::utils::{validate_author_id, write_json};

/// What happened to one item on its way through the resolver
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionTrace {
    pub title: String,
    pub year: Option<u32>,

    /// Cluster looked up for extra links, if escalation fired
    pub cluster_id: Option<String>,

    pub candidates: Vec<String>,
    pub chosen: Option<String>,
    pub escalated: bool,
    pub identifier: CanonicalId,
}

#[derive(Debug, Serialize)]
struct TraceFile<'a> {
    author_id: &'a str,
    generated_at: DateTime<Utc>,
    items: &'a [ResolutionTrace],
}

/// Accumulates traces for one run and writes them once at the end.
///
/// A sink without a directory only collects.
#[derive(Debug, Default)]
pub struct DebugSink {
    directory: Option<PathBuf>,
    traces: Vec<ResolutionTrace>,
}

impl DebugSink {
    pub fn new(directory: Option<PathBuf>) -> Self {
        Self {
            directory,
            traces: Vec::new(),
        }
    }

    pub fn record(&mut self, trace: ResolutionTrace) {
        self.traces.push(trace);
    }

    pub fn traces(&self) -> &[ResolutionTrace] {
        &self.traces
    }

    /// Write `<dir>/<author_id>.resolved.json`; returns the path on success.
    ///
    /// Write failures, and ids that are not file-name safe, are logged and otherwise ignored.
    pub fn flush(&self, author_id: &str) -> Option<PathBuf> {
        let dir = self.directory.as_ref()?;
        let Ok(id) = validate_author_id(author_id) else {
            tracing::debug!("Not writing resolution trace for {:?}", author_id);
            return None;
        };
        let path = dir.join(format!("{}.resolved.json", id));

        let file = TraceFile {
            author_id,
            generated_at: Utc::now(),
            items: &self.traces,
        };

        match write_json(&path, &file) {
            Ok(()) => {
                tracing::debug!("Wrote {} traces to {}", self.traces.len(), path.display());
                Some(path)
            }
            Err(e) => {
                tracing::debug!("Could not write resolution trace {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn trace(title: &str) -> ResolutionTrace {
        ResolutionTrace {
            title: title.to_string(),
            year: Some(2020),
            cluster_id: None,
            candidates: vec!["https://doi.org/10.1/x".to_string()],
            chosen: Some("https://doi.org/10.1/x".to_string()),
            escalated: false,
            identifier: CanonicalId::Doi("10.1/x".to_string()),
        }
    }

    #[test]
    fn test_flush_writes_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let mut sink = DebugSink::new(Some(temp_dir.path().to_path_buf()));
        sink.record(trace("A"));
        sink.record(trace("B"));

        let path = sink.flush("author1").unwrap();
        assert_eq!(path, temp_dir.path().join("author1.resolved.json"));

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written["author_id"], "author1");
        assert_eq!(written["items"].as_array().unwrap().len(), 2);
        assert_eq!(written["items"][0]["identifier"]["kind"], "doi");
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();

        let mut sink = DebugSink::new(Some(blocker.join("nested")));
        sink.record(trace("A"));
        assert_eq!(sink.flush("author1"), None);
        assert_eq!(sink.traces().len(), 1);
    }

    #[test]
    fn test_sink_without_directory() {
        let mut sink = DebugSink::default();
        sink.record(trace("A"));
        assert_eq!(sink.flush("author1"), None);
    }

    #[test]
    fn test_flush_refuses_dotted_author_id() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("x.json"), "[]").unwrap();

        let mut sink = DebugSink::new(Some(temp_dir.path().to_path_buf()));
        sink.record(trace("A"));
        assert_eq!(sink.flush("x.resolved"), None);
        assert_eq!(sink.flush("../x"), None);
        assert!(!temp_dir.path().join("x.resolved.resolved.json").exists());
        assert_eq!(std::fs::read_to_string(temp_dir.path().join("x.json")).unwrap(), "[]");
    }
}
