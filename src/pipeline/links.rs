//! Link collection for one publication item.
//!
//! Links are first extracted from the item itself. When none of them leads outside
//! the aggregator and the item names a cluster, the cluster is looked up once and its
//! listings' links are appended. The detail lookup is retried like any provider call
//! but a final failure only means "no extra links".

use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use crate::models::RawPublication;
use crate::pipeline::resolver::LinkPolicy;
use crate::sources::ScholarProvider;
use crate::utils::{parse_http_url, with_retry, RetryConfig};

/// Fields holding a single link
const LINK_FIELDS: &[&str] = &["link", "url", "pdf", "html_version", "href"];

/// Fields holding nested link-bearing values (objects, lists of objects, lists of strings)
const NESTED_FIELDS: &[&str] = &[
    "publication_info",
    "resources",
    "inline_links",
    "versions",
    "related_pages",
    "links",
];

/// Deepest nesting followed from the item root
const MAX_DEPTH: usize = 4;

/// Candidate links for one item
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedLinks {
    /// Unique links in discovery order; item links before cluster links
    pub candidates: Vec<String>,

    /// Whether the cluster lookup was attempted
    pub escalated: bool,

    /// Cluster id, when the lookup was attempted
    pub cluster_id: Option<String>,
}

/// Extract every HTTP(S) link from an item, in a fixed field order
pub fn extract_links(item: &Value) -> Vec<String> {
    let mut out = Vec::new();
    walk(item, 0, &mut out);
    out
}

fn walk(value: &Value, depth: usize, out: &mut Vec<String>) {
    if depth > MAX_DEPTH {
        return;
    }

    match value {
        Value::String(s) => push_link(s, out),
        Value::Array(items) => {
            for item in items {
                walk(item, depth + 1, out);
            }
        }
        Value::Object(map) => {
            for field in LINK_FIELDS {
                if let Some(Value::String(s)) = map.get(*field) {
                    push_link(s, out);
                }
            }
            // e.g. `related_pages_link`; the provider's own API links are skipped
            for (key, v) in map {
                if key.ends_with("_link") && !key.starts_with("serpapi") {
                    if let Value::String(s) = v {
                        push_link(s, out);
                    }
                }
            }
            for field in NESTED_FIELDS {
                if let Some(nested) = map.get(*field) {
                    walk(nested, depth + 1, out);
                }
            }
        }
        _ => {}
    }
}

fn push_link(raw: &str, out: &mut Vec<String>) {
    let link = raw.trim();
    if parse_http_url(link).is_some() {
        out.push(link.to_string());
    }
}

/// Remove repeated links, keeping the first occurrence
pub fn dedupe_preserving_order(links: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    links
        .into_iter()
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

/// Collects candidate links, escalating to a cluster lookup when needed
#[derive(Debug, Clone)]
pub struct LinkCollector {
    provider: Arc<dyn ScholarProvider>,
    retry: RetryConfig,
    policy: LinkPolicy,
}

impl LinkCollector {
    pub fn new(provider: Arc<dyn ScholarProvider>, retry: RetryConfig, policy: LinkPolicy) -> Self {
        Self {
            provider,
            retry,
            policy,
        }
    }

    /// True when no link leads outside the aggregator
    pub fn needs_escalation(&self, links: &[String]) -> bool {
        !links.iter().any(|link| self.policy.is_external(link))
    }

    /// Collect the candidate link set for one item
    pub async fn collect(&self, item: &RawPublication) -> CollectedLinks {
        let mut candidates = extract_links(item.value());

        let cluster_id = match item.cluster_id() {
            Some(id) if self.needs_escalation(&candidates) => Some(id.to_string()),
            _ => None,
        };

        if let Some(id) = &cluster_id {
            let extra = self.cluster_links(id).await;
            tracing::debug!("Cluster {} contributed {} links", id, extra.len());
            candidates.extend(extra);
        }

        CollectedLinks {
            candidates: dedupe_preserving_order(candidates),
            escalated: cluster_id.is_some(),
            cluster_id,
        }
    }

    async fn cluster_links(&self, cluster_id: &str) -> Vec<String> {
        let result = with_retry(self.retry, "cluster lookup", || {
            let provider = Arc::clone(&self.provider);
            let cluster_id = cluster_id.to_string();
            async move { provider.fetch_cluster(&cluster_id).await }
        })
        .await;

        match result {
            Ok(listings) => listings.iter().flat_map(extract_links).collect(),
            Err(e) => {
                tracing::warn!(
                    "Cluster lookup for {} failed, continuing without extra links: {}",
                    cluster_id,
                    e
                );
                Vec::new()
            }
        }
    }
}
