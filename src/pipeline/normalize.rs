//! Record normalization.
//!
//! Accepted author shapes (see [`AuthorsField`]):
//!
//! - a display string, split on `,` and ` and `
//! - a list of names and/or author objects, in order
//! - a single author object
//!
//! Entries with no usable name, and the truncation markers `…` / `...`, are skipped.

use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;

use crate::models::{AuthorEntry, AuthorsField, NormalizedRecord, RawPublication};
use crate::pipeline::resolver::Resolution;

static DIGIT_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("valid digit regex"));

/// Fields a year may be read from, in order
const YEAR_FIELDS: &[&[&str]] = &[
    &["year"],
    &["pub_year"],
    &["publication_year"],
    &["publication_date"],
    &["date"],
    &["publication"],
    &["publication_info", "summary"],
];

/// Fields the publisher may be read from, in order
const PUBLISHER_FIELDS: &[&[&str]] = &[
    &["publication"],
    &["publisher"],
    &["publication_info", "summary"],
    &["publication_info", "name"],
];

const YEAR_RANGE: std::ops::RangeInclusive<u32> = 1800..=2100;

/// Why an item could not be normalized at all
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    #[error("item is not an object")]
    NotAnObject,

    #[error("item has neither a title nor any link")]
    Empty,
}

/// Build the output record for one item
pub fn normalize(
    item: &RawPublication,
    resolution: &Resolution,
    candidates: &[String],
    tags: &BTreeMap<String, Value>,
) -> Result<NormalizedRecord, NormalizeError> {
    if !item.is_object() {
        return Err(NormalizeError::NotAnObject);
    }

    let title = title(item);
    let link = resolution
        .chosen
        .as_deref()
        .or_else(|| candidates.first().map(String::as_str))
        .unwrap_or_default()
        .to_string();

    if title.is_empty() && link.is_empty() {
        return Err(NormalizeError::Empty);
    }

    Ok(NormalizedRecord {
        title,
        authors: item.authors().map(author_names).unwrap_or_default(),
        publisher: publisher(item),
        date: year(item).map(|y| format!("{:04}-01-01", y)).unwrap_or_default(),
        link,
        identifier: resolution.identifier.clone(),
        tags: tags.clone(),
    })
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First of `title`, `name`, whitespace-collapsed
pub fn title(item: &RawPublication) -> String {
    ["title", "name"]
        .iter()
        .find_map(|key| item.str_at(&[*key]))
        .map(collapse_whitespace)
        .unwrap_or_default()
}

/// Flatten any accepted author shape into display names
pub fn author_names(field: AuthorsField) -> Vec<String> {
    let names: Vec<String> = match field {
        AuthorsField::Text(text) => text
            .split(',')
            .flat_map(|part| part.split(" and "))
            .map(str::to_string)
            .collect(),
        AuthorsField::List(entries) => entries
            .into_iter()
            .filter_map(|entry| match entry {
                AuthorEntry::Name(name) => Some(name),
                AuthorEntry::Object(obj) => obj.display().map(str::to_string),
                AuthorEntry::Other(_) => None,
            })
            .collect(),
        AuthorsField::Single(obj) => obj.display().map(str::to_string).into_iter().collect(),
    };

    names
        .iter()
        .map(|name| collapse_whitespace(name))
        .filter(|name| !name.is_empty() && name != "…" && name != "...")
        .collect()
}

/// First plausible four-digit year from the candidate fields
pub fn year(item: &RawPublication) -> Option<u32> {
    YEAR_FIELDS
        .iter()
        .filter_map(|path| item.get(path))
        .find_map(year_in_value)
}

fn year_in_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|y| u32::try_from(y).ok())
            .filter(|y| YEAR_RANGE.contains(y)),
        Value::String(s) => DIGIT_RUN_RE
            .find_iter(s)
            .filter(|m| m.as_str().len() == 4)
            .filter_map(|m| m.as_str().parse::<u32>().ok())
            .find(|y| YEAR_RANGE.contains(y)),
        _ => None,
    }
}

/// First of the explicit publication field and the nested publication-info summary/name
pub fn publisher(item: &RawPublication) -> String {
    PUBLISHER_FIELDS
        .iter()
        .find_map(|path| item.str_at(path))
        .map(collapse_whitespace)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CanonicalId;
    use serde_json::json;

    fn unresolved() -> Resolution {
        Resolution {
            chosen: None,
            identifier: CanonicalId::Unresolved,
        }
    }

    #[test]
    fn test_full_item() {
        let item = RawPublication::new(json!({
            "title": "  Deep\n  Residual   Learning ",
            "authors": "K He, X Zhang and S Ren, ...",
            "publication": "CVPR, 2016",
            "year": "2016"
        }));
        let resolution = Resolution {
            chosen: Some("https://doi.org/10.1109/cvpr.2016.90".to_string()),
            identifier: CanonicalId::Doi("10.1109/cvpr.2016.90".to_string()),
        };
        let mut tags = BTreeMap::new();
        tags.insert("group".to_string(), json!("vision"));

        let record = normalize(&item, &resolution, &[], &tags).unwrap();
        assert_eq!(record.title, "Deep Residual Learning");
        assert_eq!(record.authors, vec!["K He", "X Zhang", "S Ren"]);
        assert_eq!(record.publisher, "CVPR, 2016");
        assert_eq!(record.date, "2016-01-01");
        assert_eq!(record.link, "https://doi.org/10.1109/cvpr.2016.90");
        assert_eq!(record.tags["group"], json!("vision"));
    }

    #[test]
    fn test_author_list_shapes() {
        let item = RawPublication::new(json!({
            "authors": ["A Smith", {"name": " "}, {"full_name": "B Jones"}, 3, "…"]
        }));
        assert_eq!(
            item.authors().map(author_names),
            Some(vec!["A Smith".to_string(), "B Jones".to_string()])
        );

        let item = RawPublication::new(json!({"author": {"display_name": "C Lee"}}));
        assert_eq!(item.authors().map(author_names), Some(vec!["C Lee".to_string()]));
    }

    #[test]
    fn test_year_parsing() {
        let item = RawPublication::new(json!({"year": 1750, "pub_year": "circa 2019/03"}));
        assert_eq!(year(&item), Some(2019));

        let item = RawPublication::new(json!({"year": 2021}));
        assert_eq!(year(&item), Some(2021));

        let item = RawPublication::new(json!({"year": "12345", "publication": "Vol 3"}));
        assert_eq!(year(&item), None);

        let item = RawPublication::new(json!({
            "publication_info": {"summary": "A Smith - Nature, 2015 - nature.com"}
        }));
        assert_eq!(year(&item), Some(2015));
    }

    #[test]
    fn test_publisher_fallback() {
        let item = RawPublication::new(json!({
            "publication_info": {"summary": "A Smith - Science, 2001"}
        }));
        assert_eq!(publisher(&item), "A Smith - Science, 2001");

        let item = RawPublication::new(json!({"publication_info": {"name": "JMLR"}}));
        assert_eq!(publisher(&item), "JMLR");
    }

    #[test]
    fn test_display_link_falls_back_to_first_candidate() {
        let item = RawPublication::new(json!({"name": "Only a name"}));
        let candidates = vec![
            "https://scholar.google.com/x".to_string(),
            "https://scholar.google.com/y".to_string(),
        ];
        let record = normalize(&item, &unresolved(), &candidates, &BTreeMap::new()).unwrap();
        assert_eq!(record.title, "Only a name");
        assert_eq!(record.link, "https://scholar.google.com/x");
        assert_eq!(record.date, "");
        assert!(record.authors.is_empty());
    }

    #[test]
    fn test_unusable_items() {
        let item = RawPublication::new(json!("just a string"));
        assert_eq!(
            normalize(&item, &unresolved(), &[], &BTreeMap::new()),
            Err(NormalizeError::NotAnObject)
        );

        let item = RawPublication::new(json!({"title": "   ", "year": 2020}));
        assert_eq!(
            normalize(&item, &unresolved(), &[], &BTreeMap::new()),
            Err(NormalizeError::Empty)
        );
    }
}
