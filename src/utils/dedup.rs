//! Deduplication of normalized records for one author.
//!
//! Records are grouped by normalized title (lowercased, whitespace-collapsed). Records
//! without a usable title fall back to an exact `(identifier, date, link)` key. A
//! second pass then merges records that carry the same DOI or arXiv id.
//!
//! Within a group exactly one whole record survives; fields are never combined. The
//! survivor takes the output position of the group's first-seen record.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::NormalizedRecord;

/// Key a record is deduplicated under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupeKey {
    /// Normalized title
    Title(String),
    /// Identifier, date and link, for records without a title
    Composite(String, String, String),
}

impl DedupeKey {
    pub fn for_record(record: &NormalizedRecord) -> Self {
        match title_key(&record.title) {
            Some(title) => DedupeKey::Title(title),
            None => DedupeKey::Composite(
                record.identifier.source_id().unwrap_or_default(),
                record.date.clone(),
                record.link.clone(),
            ),
        }
    }
}

/// Lowercased, whitespace-collapsed title, or `None` when nothing remains
pub fn title_key(title: &str) -> Option<String> {
    let key = title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    (!key.is_empty()).then_some(key)
}

/// Whether `candidate` should replace `incumbent` in a title or identifier group.
///
/// A later date wins. With equal (or both missing) dates a resolved identifier beats
/// an unresolved one. Otherwise the incumbent, which was seen first, stays.
pub fn prefer(candidate: &NormalizedRecord, incumbent: &NormalizedRecord) -> bool {
    // Dates are zero-padded ISO strings, so lexicographic order is chronological.
    match candidate.date.cmp(&incumbent.date) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => {
            candidate.identifier.is_resolved() && !incumbent.identifier.is_resolved()
        }
    }
}

/// Collapse records that describe the same publication
pub fn merge_records(records: Vec<NormalizedRecord>) -> Vec<NormalizedRecord> {
    let before = records.len();
    let by_title = merge_by(records, |r| Some(DedupeKey::for_record(r)), |key| {
        matches!(key, DedupeKey::Title(_))
    });
    let merged = merge_by(by_title, |r| r.identifier.merge_key(), |_| true);

    if merged.len() < before {
        tracing::debug!(
            "Merged {} records into {} ({} dropped)",
            before,
            merged.len(),
            before - merged.len()
        );
    }
    merged
}

/// One merge pass.
///
/// Records with no key pass through. For keys where `contested` is true the
/// [`prefer`] rule picks the survivor; for the rest the first-seen record wins.
fn merge_by<K, F, C>(records: Vec<NormalizedRecord>, key_of: F, contested: C) -> Vec<NormalizedRecord>
where
    K: Eq + std::hash::Hash + std::fmt::Debug,
    F: Fn(&NormalizedRecord) -> Option<K>,
    C: Fn(&K) -> bool,
{
    let mut slots: Vec<Option<NormalizedRecord>> = Vec::with_capacity(records.len());
    let mut index: HashMap<K, usize> = HashMap::new();

    for record in records {
        let Some(key) = key_of(&record) else {
            slots.push(Some(record));
            continue;
        };

        match index.get(&key) {
            Some(&slot) => {
                let replace = contested(&key)
                    && slots[slot]
                        .as_ref()
                        .is_some_and(|incumbent| prefer(&record, incumbent));
                if replace {
                    tracing::debug!("Replacing earlier duplicate for {:?}", key);
                    slots[slot] = Some(record);
                } else {
                    tracing::debug!("Dropping duplicate for {:?}", key);
                }
            }
            None => {
                index.insert(key, slots.len());
                slots.push(Some(record));
            }
        }
    }

    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CanonicalId;
    use std::collections::BTreeMap;

    fn rec(title: &str, date: &str, id: CanonicalId) -> NormalizedRecord {
        NormalizedRecord {
            title: title.to_string(),
            authors: vec![],
            publisher: String::new(),
            date: date.to_string(),
            link: String::new(),
            identifier: id,
            tags: BTreeMap::new(),
        }
    }

    fn doi(s: &str) -> CanonicalId {
        CanonicalId::Doi(s.to_string())
    }

    #[test]
    fn test_title_key_normalization() {
        assert_eq!(
            title_key("  Deep   Learning\tFor\nAll "),
            Some("deep learning for all".to_string())
        );
        assert_eq!(title_key("   "), None);
    }

    #[test]
    fn test_later_date_wins() {
        let merged = merge_records(vec![
            rec("Same Paper", "2023-01-01", CanonicalId::Unresolved),
            rec("same  paper", "2024-01-01", CanonicalId::Unresolved),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].date, "2024-01-01");

        let merged = merge_records(vec![
            rec("Same Paper", "2024-01-01", CanonicalId::Unresolved),
            rec("Same Paper", "2023-01-01", doi("10.1/x")),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].date, "2024-01-01");
    }

    #[test]
    fn test_dated_beats_undated() {
        let merged = merge_records(vec![
            rec("Paper", "", doi("10.1/x")),
            rec("Paper", "2020-01-01", CanonicalId::Unresolved),
        ]);
        assert_eq!(merged[0].date, "2020-01-01");
    }

    #[test]
    fn test_resolved_wins_on_equal_dates() {
        let merged = merge_records(vec![
            rec("Paper", "", CanonicalId::Unresolved),
            rec("Paper", "", doi("10.1/x")),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].identifier, doi("10.1/x"));
    }

    #[test]
    fn test_first_seen_wins_on_full_tie() {
        let merged = merge_records(vec![
            rec("Paper", "2020-01-01", CanonicalId::Url("https://a.org".into())),
            rec("Paper", "2020-01-01", CanonicalId::Url("https://b.org".into())),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].identifier, CanonicalId::Url("https://a.org".into()));
    }

    #[test]
    fn test_untitled_records_use_composite_key() {
        let mut a = rec("", "2020-01-01", CanonicalId::Unresolved);
        a.link = "https://x.org/1".to_string();
        let mut b = a.clone();
        b.authors = vec!["Someone".to_string()];
        let mut c = a.clone();
        c.link = "https://x.org/2".to_string();

        let merged = merge_records(vec![a.clone(), b, c.clone()]);
        assert_eq!(merged, vec![a, c]);
    }

    #[test]
    fn test_survivor_keeps_first_position() {
        let merged = merge_records(vec![
            rec("Alpha", "2020-01-01", CanonicalId::Unresolved),
            rec("Beta", "2020-01-01", CanonicalId::Unresolved),
            rec("alpha", "2021-01-01", CanonicalId::Unresolved),
        ]);
        let titles: Vec<_> = merged.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["alpha", "Beta"]);
    }

    #[test]
    fn test_identifier_pass_merges_different_titles() {
        let merged = merge_records(vec![
            rec("Preprint title", "2021-01-01", doi("10.1/X")),
            rec("Published title", "2022-01-01", doi("10.1/x")),
            rec("Other", "2022-01-01", CanonicalId::Arxiv("2301.01234".into())),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].title, "Published title");
        assert_eq!(merged[1].title, "Other");
    }
}
