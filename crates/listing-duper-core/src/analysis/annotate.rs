use serde::{Deserialize, Serialize};
use tracing::warn;

use super::grouping::{Decision, Group};
use crate::error::Error;
use crate::ingest::Row;

pub const GROUP_HEADER: &str = "Group";
pub const POSITION_HEADER: &str = "Position";
pub const DECISION_HEADER: &str = "Decision";

/// One duplicate-group member with its original cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedRow {
    pub group_id: usize,
    pub position: usize,
    pub group_size: usize,
    pub decision: Decision,
    pub row: Row,
}

impl AnnotatedRow {
    /// "N of M", 1-based.
    pub fn position_label(&self) -> String {
        format!("{} of {}", self.position, self.group_size)
    }
}

/// Flattened view of all duplicate groups: group id, position label and
/// decision, followed by the original columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedTable {
    pub header: Row,
    pub rows: Vec<AnnotatedRow>,
    /// Rendered rows dropped on read-back because their decision or
    /// position cell could not be read.
    #[serde(default)]
    pub skipped_rows: usize,
}

impl AnnotatedTable {
    pub fn from_groups(header: &[String], groups: &[Group]) -> Self {
        let rows = groups
            .iter()
            .enumerate()
            .flat_map(|(g, group)| {
                let size = group.members.len();
                group
                    .members
                    .iter()
                    .enumerate()
                    .map(move |(i, item)| AnnotatedRow {
                        group_id: g + 1,
                        position: i + 1,
                        group_size: size,
                        decision: item.decision,
                        row: item.row.clone(),
                    })
            })
            .collect();
        Self {
            header: header.to_vec(),
            rows,
            skipped_rows: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn count(&self, decision: Decision) -> usize {
        self.rows.iter().filter(|r| r.decision == decision).count()
    }

    /// Render to plain rows, header first.
    pub fn to_rows(&self) -> Vec<Row> {
        let mut header = vec![
            GROUP_HEADER.to_string(),
            POSITION_HEADER.to_string(),
            DECISION_HEADER.to_string(),
        ];
        header.extend(self.header.iter().cloned());

        let mut out = Vec::with_capacity(self.rows.len() + 1);
        out.push(header);
        for r in &self.rows {
            let mut cells = vec![r.group_id.to_string(), r.position_label(), r.decision.to_string()];
            cells.extend(r.row.iter().cloned());
            out.push(cells);
        }
        out
    }

    /// Read back a table produced by [`to_rows`](Self::to_rows), possibly with
    /// decisions edited by hand. A row whose decision or position cell cannot
    /// be read is skipped and counted in `skipped_rows`; only a missing
    /// Decision column rejects the table.
    pub fn from_rendered(rows: &[Row]) -> Result<Self, Error> {
        let Some((header, data)) = rows.split_first() else {
            return Ok(Self::default());
        };
        if header.len() < 3 || !header[2].trim().eq_ignore_ascii_case(DECISION_HEADER) {
            return Err(Error::MissingColumns(
                "annotated table needs Group, Position and Decision columns".to_string(),
            ));
        }

        let mut parsed = Vec::with_capacity(data.len());
        let mut skipped_rows = 0;
        for (line, cells) in data.iter().enumerate() {
            let decision_cell = cells.get(2).map(String::as_str).unwrap_or("");
            let decision = match decision_cell.parse::<Decision>() {
                Ok(decision) => decision,
                Err(e) => {
                    warn!("Annotated row {} skipped: {}", line + 2, e);
                    skipped_rows += 1;
                    continue;
                }
            };
            let Some((position, group_size)) =
                parse_position(cells.get(1).map(String::as_str).unwrap_or(""))
            else {
                warn!("Annotated row {} skipped: bad position label", line + 2);
                skipped_rows += 1;
                continue;
            };
            parsed.push(AnnotatedRow {
                group_id: cells.first().and_then(|g| g.trim().parse().ok()).unwrap_or(0),
                position,
                group_size,
                decision,
                row: cells.iter().skip(3).cloned().collect(),
            });
        }

        Ok(Self {
            header: header[3..].to_vec(),
            rows: parsed,
            skipped_rows,
        })
    }
}

fn parse_position(label: &str) -> Option<(usize, usize)> {
    let (n, m) = label.split_once(" of ")?;
    Some((n.trim().parse().ok()?, m.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::grouping::Item;

    fn item(id: &str, decision: Decision) -> Item {
        Item {
            row_index: 0,
            item_id: id.to_string(),
            raw_title: "Lamp".to_string(),
            normalized_title: "lamp".to_string(),
            start_date: None,
            decision,
            row: vec![id.to_string(), "Lamp".to_string()],
        }
    }

    fn sample() -> AnnotatedTable {
        let groups = vec![Group {
            normalized_title: "lamp".to_string(),
            members: vec![item("1", Decision::Keep), item("2", Decision::End)],
        }];
        AnnotatedTable::from_groups(&["Item ID".to_string(), "Title".to_string()], &groups)
    }

    #[test]
    fn test_flattened_rows() {
        let rendered = sample().to_rows();
        assert_eq!(rendered[0], vec!["Group", "Position", "Decision", "Item ID", "Title"]);
        assert_eq!(rendered[1], vec!["1", "1 of 2", "Keep", "1", "Lamp"]);
        assert_eq!(rendered[2], vec!["1", "2 of 2", "End", "2", "Lamp"]);
    }

    #[test]
    fn test_rendered_rows_read_back() {
        let table = sample();
        assert_eq!(AnnotatedTable::from_rendered(&table.to_rows()).unwrap(), table);
    }

    #[test]
    fn test_unreadable_decision_skips_only_that_row() {
        let mut rendered = sample().to_rows();
        let mut blank = rendered[2].clone();
        blank[2] = String::new();
        blank[3] = "3".to_string();
        rendered.push(blank);

        let table = AnnotatedTable::from_rendered(&rendered).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.skipped_rows, 1);
        assert_eq!(table.count(Decision::End), 1);
        assert_eq!(table.rows[1].row[0], "2");
    }

    #[test]
    fn test_bad_position_label_is_skipped() {
        let mut rendered = sample().to_rows();
        rendered[1][1] = "first".to_string();
        let table = AnnotatedTable::from_rendered(&rendered).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.skipped_rows, 1);
    }

    #[test]
    fn test_rendered_rows_need_decision_column() {
        let rows = vec![vec!["Item ID".to_string(), "Title".to_string()]];
        assert!(AnnotatedTable::from_rendered(&rows).is_err());
    }
}
