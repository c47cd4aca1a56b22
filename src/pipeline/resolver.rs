//! Identifier resolution: pick the most authoritative link and classify it.
//!
//! Preference order, first match wins:
//!
//! 1. a link on a DOI resolver (`doi.org`, `dx.doi.org`)
//! 2. a link on arXiv
//! 3. any other well-formed HTTP(S) link outside the aggregator's domains
//!
//! The order is absolute: a DOI link anywhere in the candidate set beats an arXiv
//! link earlier in the set. Nothing here touches the network.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::config::default_aggregator_hosts;
use crate::models::CanonicalId;
use crate::utils::{http_host, parse_http_url};

static DOI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^10\.\d{4,9}/\S+$").expect("valid DOI regex"));

static ARXIV_NEW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/(?:abs|pdf)/(\d{4}\.\d{4,5})(?:v\d+)?(?:\.pdf)?/?$").expect("valid arXiv regex")
});

static ARXIV_OLD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/(?:abs|pdf)/([a-z\-]+(?:\.[A-Za-z]{2})?/\d{7})(?:v\d+)?(?:\.pdf)?/?$")
        .expect("valid arXiv regex")
});

/// Characters stripped from the end of an extracted DOI
const DOI_TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', ')', ']', '}', '"', '\''];

/// Which hosts belong to the aggregator itself
#[derive(Debug, Clone, PartialEq)]
pub struct LinkPolicy {
    aggregator_hosts: Vec<String>,
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self::new(default_aggregator_hosts())
    }
}

impl LinkPolicy {
    /// Host patterns are matched against the lowercased host. A pattern ending in
    /// `.` (e.g. `scholar.google.`) matches any suffix; others match the host
    /// exactly or as a parent domain.
    pub fn new(aggregator_hosts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            aggregator_hosts: aggregator_hosts
                .into_iter()
                .map(|h| h.into().trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    /// Whether a link points at the aggregator.
    ///
    /// Links that are not parseable URLs are checked by substring.
    pub fn is_aggregator(&self, link: &str) -> bool {
        match http_host(link) {
            Some(host) => self.aggregator_hosts.iter().any(|p| host_matches(&host, p)),
            None => {
                let lower = link.to_ascii_lowercase();
                self.aggregator_hosts.iter().any(|p| lower.contains(p.as_str()))
            }
        }
    }

    /// Whether a link is a well-formed HTTP(S) URL outside the aggregator
    pub fn is_external(&self, link: &str) -> bool {
        parse_http_url(link).is_some() && !self.is_aggregator(link)
    }
}

fn host_matches(host: &str, pattern: &str) -> bool {
    if pattern.ends_with('.') {
        host.starts_with(pattern) || host.contains(&format!(".{}", pattern))
    } else {
        host == pattern || host.ends_with(&format!(".{}", pattern))
    }
}

fn is_on_domain(link: &str, domain: &str) -> bool {
    match http_host(link) {
        Some(host) => host == domain || host.ends_with(&format!(".{}", domain)),
        None => false,
    }
}

/// Whether a link is served by a DOI resolver
pub fn is_doi_link(link: &str) -> bool {
    is_on_domain(link, "doi.org")
}

/// Whether a link is served by arXiv
pub fn is_arxiv_link(link: &str) -> bool {
    is_on_domain(link, "arxiv.org")
}

/// Outcome of resolving one candidate set
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// The chosen link, if any qualified
    pub chosen: Option<String>,

    pub identifier: CanonicalId,
}

/// Pick the best original link from a candidate set
pub fn choose_link<'a>(links: &'a [String], policy: &LinkPolicy) -> Option<&'a str> {
    let predicates: [&dyn Fn(&str) -> bool; 3] = [
        &is_doi_link,
        &is_arxiv_link,
        &|link: &str| policy.is_external(link),
    ];

    predicates
        .iter()
        .find_map(|accept| links.iter().find(|link| accept(link.as_str())))
        .map(String::as_str)
}

/// Classify a chosen link into a canonical identifier
pub fn classify(link: &str, policy: &LinkPolicy) -> CanonicalId {
    let Some(url) = parse_http_url(link) else {
        return CanonicalId::Unresolved;
    };

    if is_doi_link(link) {
        if let Some(doi) = doi_from_url(&url) {
            return CanonicalId::Doi(doi);
        }
    } else if is_arxiv_link(link) {
        if let Some(id) = arxiv_id_from_url(&url) {
            return CanonicalId::Arxiv(id);
        }
    }

    if policy.is_aggregator(link) {
        CanonicalId::Unresolved
    } else {
        CanonicalId::Url(link.trim().to_string())
    }
}

/// Choose and classify in one step
pub fn resolve(links: &[String], policy: &LinkPolicy) -> Resolution {
    match choose_link(links, policy) {
        Some(link) => Resolution {
            chosen: Some(link.to_string()),
            identifier: classify(link, policy),
        },
        None => Resolution {
            chosen: None,
            identifier: CanonicalId::Unresolved,
        },
    }
}

/// The DOI in a resolver URL's path: percent-decoded, lowercased, trailing
/// punctuation removed
fn doi_from_url(url: &Url) -> Option<String> {
    let path = url.path().trim_start_matches('/');
    let decoded = urlencoding::decode(path).ok()?;
    let doi = decoded
        .trim()
        .trim_end_matches(DOI_TRAILING_PUNCTUATION)
        .to_lowercase();
    DOI_RE.is_match(&doi).then_some(doi)
}

/// The arXiv id in an `/abs/` or `/pdf/` path, without version suffix
fn arxiv_id_from_url(url: &Url) -> Option<String> {
    let path = url.path();
    ARXIV_NEW_RE
        .captures(path)
        .or_else(|| ARXIV_OLD_RE.captures(path))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> LinkPolicy {
        LinkPolicy::new(["scholar.google.", "scholar.aggregator.example"])
    }

    fn links(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_doi_beats_earlier_links() {
        let set = links(&[
            "https://arxiv.org/abs/2301.01234",
            "https://publisher.example/article/1",
            "https://doi.org/10.1234/ABCD.",
        ]);
        let res = resolve(&set, &policy());
        assert_eq!(res.chosen.as_deref(), Some("https://doi.org/10.1234/ABCD."));
        assert_eq!(res.identifier, CanonicalId::Doi("10.1234/abcd".to_string()));
    }

    #[test]
    fn test_arxiv_beats_generic() {
        let set = links(&[
            "https://publisher.example/article/1",
            "https://arxiv.org/pdf/2301.01234v2.pdf",
        ]);
        let res = resolve(&set, &policy());
        assert_eq!(res.identifier, CanonicalId::Arxiv("2301.01234".to_string()));
    }

    #[test]
    fn test_arxiv_version_stripped() {
        let set = links(&["https://arxiv.org/abs/2301.01234v2"]);
        assert_eq!(
            resolve(&set, &policy()).identifier.source_id().as_deref(),
            Some("arxiv:2301.01234")
        );

        let set = links(&["http://export.arxiv.org/abs/hep-th/9901001v1"]);
        assert_eq!(
            resolve(&set, &policy()).identifier,
            CanonicalId::Arxiv("hep-th/9901001".to_string())
        );
    }

    #[test]
    fn test_generic_url_skips_aggregator() {
        let set = links(&[
            "https://scholar.google.com/citations?view_op=view_citation&citation_for_view=X",
            "https://www.nature.com/articles/nature14539",
        ]);
        let res = resolve(&set, &policy());
        assert_eq!(
            res.identifier,
            CanonicalId::Url("https://www.nature.com/articles/nature14539".to_string())
        );
    }

    #[test]
    fn test_aggregator_only_is_unresolved() {
        let set = links(&[
            "https://scholar.aggregator.example/citations?id=X",
            "https://scholar.google.de/scholar?cluster=1",
        ]);
        let res = resolve(&set, &policy());
        assert_eq!(res.chosen, None);
        assert_eq!(res.identifier, CanonicalId::Unresolved);

        assert_eq!(resolve(&[], &policy()).identifier, CanonicalId::Unresolved);
    }

    #[test]
    fn test_malformed_links_ignored() {
        let set = links(&["not a url", "ftp://files.example/paper.pdf"]);
        assert_eq!(resolve(&set, &policy()).chosen, None);
    }

    #[test]
    fn test_odd_resolver_paths_fall_back_to_url() {
        let set = links(&["https://doi.org/"]);
        assert_eq!(
            resolve(&set, &policy()).identifier,
            CanonicalId::Url("https://doi.org/".to_string())
        );

        let set = links(&["https://arxiv.org/list/cs.LG/recent"]);
        assert_eq!(
            resolve(&set, &policy()).identifier,
            CanonicalId::Url("https://arxiv.org/list/cs.LG/recent".to_string())
        );
    }

    #[test]
    fn test_percent_encoded_doi() {
        let set = links(&["https://dx.doi.org/10.1002%2F(SICI)1097-4571"]);
        assert_eq!(
            resolve(&set, &policy()).identifier,
            CanonicalId::Doi("10.1002/(sici)1097-4571".to_string())
        );
    }

    #[test]
    fn test_datacite_arxiv_doi_stays_doi() {
        let set = links(&[
            "https://arxiv.org/abs/2301.01234",
            "https://doi.org/10.48550/arXiv.2301.01234",
        ]);
        assert_eq!(
            resolve(&set, &policy()).identifier,
            CanonicalId::Doi("10.48550/arxiv.2301.01234".to_string())
        );
    }

    #[test]
    fn test_host_patterns() {
        let policy = policy();
        assert!(policy.is_aggregator("https://scholar.google.co.uk/x"));
        assert!(policy.is_aggregator("https://www.scholar.aggregator.example/x"));
        assert!(!policy.is_aggregator("https://notscholar.aggregator.example.org/x"));
        assert!(!policy.is_aggregator("https://doi.org/10.1/x"));
        assert!(!is_doi_link("https://notdoi.org/10.1/x"));
    }
}
