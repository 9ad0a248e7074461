use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ColumnConfig;
use crate::error::Error;

const DEFAULT_ITEM_ID_COLUMN: usize = 0;
const DEFAULT_TITLE_COLUMN: usize = 1;
const DEFAULT_START_DATE_COLUMN: usize = 2;

/// Zero-based column positions of the fields the detector reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    pub title: usize,
    pub item_id: usize,
    pub start_date: Option<usize>,
    pub listing_site: Option<usize>,
}

impl ColumnMap {
    /// Resolve columns by substring match against lower-cased, whitespace-free
    /// headers, falling back to positional defaults for id, title and date.
    ///
    /// Fails with [`Error::MissingColumns`] when the id or title column cannot
    /// be placed inside the header.
    pub fn resolve(header: &[String], config: &ColumnConfig) -> Result<Self, Error> {
        let keys: Vec<String> = header.iter().map(|h| header_key(h)).collect();

        let title = find_column(&keys, &config.title).or_else(|| positional(&keys, DEFAULT_TITLE_COLUMN));
        let item_id =
            find_column(&keys, &config.item_id).or_else(|| positional(&keys, DEFAULT_ITEM_ID_COLUMN));

        let (title, item_id) = match (title, item_id) {
            (Some(title), Some(item_id)) => (title, item_id),
            (title, item_id) => {
                let mut missing = Vec::new();
                if item_id.is_none() {
                    missing.push("item id");
                }
                if title.is_none() {
                    missing.push("title");
                }
                return Err(Error::MissingColumns(missing.join(", ")));
            }
        };

        let start_date = find_column(&keys, &config.start_date)
            .or_else(|| positional(&keys, DEFAULT_START_DATE_COLUMN))
            .filter(|&idx| idx != title && idx != item_id);
        if start_date.is_none() {
            warn!("No start date column found; duplicate members keep input order");
        }

        let listing_site = find_column(&keys, &config.listing_site)
            .filter(|&idx| idx != title && idx != item_id);

        let map = ColumnMap {
            title,
            item_id,
            start_date,
            listing_site,
        };
        debug!("Resolved columns: {:?}", map);
        Ok(map)
    }
}

fn header_key(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn find_column(keys: &[String], keywords: &[String]) -> Option<usize> {
    keywords
        .iter()
        .find_map(|keyword| keys.iter().position(|key| key.contains(keyword.as_str())))
}

fn positional(keys: &[String], index: usize) -> Option<usize> {
    (index < keys.len()).then_some(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_resolves_by_header_text() {
        let map = ColumnMap::resolve(
            &header(&["Start Date", "Listing Site", "Item Title", "Item ID"]),
            &ColumnConfig::default(),
        )
        .unwrap();
        assert_eq!(map.title, 2);
        assert_eq!(map.item_id, 3);
        assert_eq!(map.start_date, Some(0));
        assert_eq!(map.listing_site, Some(1));
    }

    #[test]
    fn test_header_matching_ignores_case_and_spacing() {
        let map = ColumnMap::resolve(&header(&["ITEM  id", "t i t l e"]), &ColumnConfig::default()).unwrap();
        assert_eq!(map.item_id, 0);
        assert_eq!(map.title, 1);
    }

    #[test]
    fn test_positional_fallback() {
        let map = ColumnMap::resolve(&header(&["a", "b", "c"]), &ColumnConfig::default()).unwrap();
        assert_eq!(map.item_id, 0);
        assert_eq!(map.title, 1);
        assert_eq!(map.start_date, Some(2));
        assert_eq!(map.listing_site, None);
    }

    #[test]
    fn test_optional_columns_degrade() {
        let map = ColumnMap::resolve(&header(&["Item ID", "Title"]), &ColumnConfig::default()).unwrap();
        assert_eq!(map.start_date, None);
        assert_eq!(map.listing_site, None);
    }

    #[test]
    fn test_single_column_header_is_missing_title() {
        let err = ColumnMap::resolve(&header(&["foo"]), &ColumnConfig::default()).unwrap_err();
        match err {
            Error::MissingColumns(msg) => assert_eq!(msg, "title"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_header_is_missing_both() {
        let err = ColumnMap::resolve(&[], &ColumnConfig::default()).unwrap_err();
        assert!(matches!(err, Error::MissingColumns(ref m) if m == "item id, title"));
    }
}
