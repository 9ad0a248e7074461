//! Exact-key duplicate grouping.
//!
//! Rows are keyed by their basic-normalized title. Keys with more than one
//! member form duplicate groups. [`GroupAccumulator`] holds the partial
//! grouping so the same code serves the one-pass path and the chunked
//! controller, which persists the accumulator between invocations.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::columns::ColumnMap;
use super::dates::parse_start_date;
use super::normalize::basic_normalize;
use crate::config::{AppConfig, DetectionConfig};
use crate::error::Error;
use crate::ingest::{Row, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Keep,
    End,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Keep => f.write_str("Keep"),
            Decision::End => f.write_str("End"),
        }
    }
}

impl FromStr for Decision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" => Ok(Decision::Keep),
            "end" => Ok(Decision::End),
            other => Err(Error::Other(format!("unknown decision '{}'", other))),
        }
    }
}

/// A listing taking part in a duplicate group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub row_index: usize,
    pub item_id: String,
    pub raw_title: String,
    pub normalized_title: String,
    pub start_date: Option<String>,
    pub decision: Decision,
    pub row: Row,
}

/// Listings sharing one normalized title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub normalized_title: String,
    pub members: Vec<Item>,
}

impl Group {
    pub fn is_duplicate(&self) -> bool {
        self.members.len() > 1
    }

    pub fn keeper(&self) -> Option<&Item> {
        self.members.iter().find(|m| m.decision == Decision::Keep)
    }
}

/// Partial grouping state: normalized key to member row indices, in first-seen order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupAccumulator {
    keys: Vec<String>,
    members: Vec<Vec<usize>>,
    pub rows_considered: usize,
    pub rows_skipped: usize,
    pub rows_filtered: usize,
    #[serde(skip)]
    index: AHashMap<String, usize>,
}

impl GroupAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, key: String, row_index: usize) {
        if self.index.len() != self.keys.len() {
            self.rebuild_index();
        }
        match self.index.get(&key) {
            Some(&slot) => self.members[slot].push(row_index),
            None => {
                self.index.insert(key.clone(), self.keys.len());
                self.keys.push(key);
                self.members.push(vec![row_index]);
            }
        }
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .keys
            .iter()
            .enumerate()
            .map(|(slot, key)| (key.clone(), slot))
            .collect();
    }

    /// Number of keys that currently have more than one member.
    pub fn duplicate_key_count(&self) -> usize {
        self.members.iter().filter(|m| m.len() > 1).count()
    }

    pub fn distinct_titles(&self) -> usize {
        self.keys.len()
    }
}

/// Outcome of a detection pass. Zero groups is a successful result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub groups: Vec<Group>,
    pub duplicate_groups: usize,
    pub duplicate_items: usize,
    pub rows_considered: usize,
    pub rows_skipped: usize,
    pub rows_filtered: usize,
}

impl DetectionReport {
    pub fn has_duplicates(&self) -> bool {
        self.duplicate_groups > 0
    }

    pub fn message(&self) -> String {
        if self.has_duplicates() {
            format!(
                "Found {} duplicate groups covering {} listings",
                self.duplicate_groups, self.duplicate_items
            )
        } else {
            format!(
                "No duplicate listings found among {} rows",
                self.rows_considered
            )
        }
    }
}

pub struct DuplicateGrouper {
    columns: ColumnMap,
    site_filter: Option<String>,
}

impl DuplicateGrouper {
    pub fn new(columns: ColumnMap, config: &DetectionConfig) -> Self {
        let site_filter = match (&config.site_filter, columns.listing_site) {
            (Some(site), Some(_)) => Some(site.trim().to_lowercase()),
            (Some(site), None) => {
                warn!("Site filter '{}' ignored: no listing site column", site);
                None
            }
            (None, _) => None,
        };
        Self {
            columns,
            site_filter,
        }
    }

    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    /// Feed the data rows in `range` into the accumulator.
    pub fn ingest(&self, acc: &mut GroupAccumulator, table: &Table, range: Range<usize>) {
        let end = range.end.min(table.len());
        for row_index in range.start..end {
            if let Some(site) = &self.site_filter {
                let row_site = self
                    .columns
                    .listing_site
                    .map(|col| table.cell(row_index, col).trim().to_lowercase())
                    .unwrap_or_default();
                if &row_site != site {
                    acc.rows_filtered += 1;
                    continue;
                }
            }

            let item_id = table.cell(row_index, self.columns.item_id);
            let key = basic_normalize(table.cell(row_index, self.columns.title));
            if key.is_empty() || item_id.trim().is_empty() {
                acc.rows_skipped += 1;
                continue;
            }

            acc.rows_considered += 1;
            acc.insert(key, row_index);
        }
    }

    /// Build ordered, tagged duplicate groups from a completed accumulator.
    pub fn finish(&self, acc: &GroupAccumulator, table: &Table) -> DetectionReport {
        let mut groups: Vec<Group> = acc
            .keys
            .iter()
            .zip(acc.members.iter())
            .filter(|(_, rows)| rows.len() > 1)
            .map(|(key, rows)| {
                let members = rows.iter().map(|&r| self.item(table, r, key)).collect();
                Group {
                    normalized_title: key.clone(),
                    members,
                }
            })
            .collect();

        // stable: equal-size groups stay in first-seen order
        groups.sort_by(|a, b| b.members.len().cmp(&a.members.len()));

        for group in &mut groups {
            order_members(&mut group.members);
            for (position, member) in group.members.iter_mut().enumerate() {
                member.decision = if position == 0 {
                    Decision::Keep
                } else {
                    Decision::End
                };
            }
        }

        let duplicate_items = groups.iter().map(|g| g.members.len()).sum();
        DetectionReport {
            duplicate_groups: groups.len(),
            duplicate_items,
            groups,
            rows_considered: acc.rows_considered,
            rows_skipped: acc.rows_skipped,
            rows_filtered: acc.rows_filtered,
        }
    }

    /// Single pass over the whole table.
    pub fn group(&self, table: &Table) -> DetectionReport {
        let mut acc = GroupAccumulator::new();
        self.ingest(&mut acc, table, 0..table.len());
        let report = self.finish(&acc, table);
        debug!(
            "Grouped {} rows into {} distinct titles ({} skipped)",
            acc.rows_considered,
            acc.distinct_titles(),
            acc.rows_skipped
        );
        report
    }

    fn item(&self, table: &Table, row_index: usize, key: &str) -> Item {
        let start_date = self
            .columns
            .start_date
            .map(|col| table.cell(row_index, col).to_string())
            .filter(|d| !d.trim().is_empty());
        Item {
            row_index,
            item_id: table.cell(row_index, self.columns.item_id).trim().to_string(),
            raw_title: table.cell(row_index, self.columns.title).to_string(),
            normalized_title: key.to_string(),
            start_date,
            decision: Decision::End,
            row: table.rows.get(row_index).cloned().unwrap_or_default(),
        }
    }
}

/// Most recent start date first. Members without a parseable date are
/// unranked: they keep their slot, and only dated members are reordered
/// among the remaining slots.
fn order_members(members: &mut Vec<Item>) {
    let dates: Vec<_> = members
        .iter()
        .map(|m| m.start_date.as_deref().and_then(parse_start_date))
        .collect();

    let dated_slots: Vec<usize> = (0..dates.len()).filter(|&i| dates[i].is_some()).collect();
    let mut sorted_slots = dated_slots.clone();
    sorted_slots.sort_by(|&a, &b| dates[b].cmp(&dates[a]));

    let mut source: Vec<Option<Item>> = std::mem::take(members).into_iter().map(Some).collect();
    let mut next_dated = sorted_slots.into_iter();
    let mut ordered = Vec::with_capacity(source.len());

    for (slot, date) in dates.iter().enumerate() {
        let from = match date {
            Some(_) => next_dated.next().unwrap_or(slot),
            None => slot,
        };
        if let Some(item) = source[from].take() {
            ordered.push(item);
        }
    }

    *members = ordered;
}

/// Resolve columns and run a single detection pass.
///
/// Returns [`Error::MissingColumns`] when the id or title column cannot be
/// resolved; a table without duplicates is an `Ok` report with zero groups.
pub fn detect_duplicates(table: &Table, config: &AppConfig) -> Result<DetectionReport, Error> {
    let columns = ColumnMap::resolve(&table.header, &config.columns)?;
    let grouper = DuplicateGrouper::new(columns, &config.detection);
    let report = grouper.group(table);
    info!("{}", report.message());
    Ok(report)
}
