use serde::{Deserialize, Serialize};

use super::columns::ColumnMap;
use crate::ingest::{ParseReport, Table};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnQuality {
    pub header: String,
    pub empty_cells: usize,
    pub empty_ratio: f64,
}

/// Summary of repairs and gaps in the imported data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQualityReport {
    pub total_rows: usize,
    pub column_count: usize,
    pub fallback_lines: usize,
    pub padded_rows: usize,
    pub truncated_rows: usize,
    pub missing_titles: usize,
    pub missing_item_ids: usize,
    pub columns: Vec<ColumnQuality>,
}

impl DataQualityReport {
    pub fn build(table: &Table, parse: &ParseReport, columns: &ColumnMap) -> Self {
        let width = table.width();
        let mut empty = vec![0usize; width];
        let mut missing_titles = 0;
        let mut missing_item_ids = 0;

        for row in &table.rows {
            for (col, cell) in row.iter().enumerate().take(width) {
                if cell.trim().is_empty() {
                    empty[col] += 1;
                }
            }
            if row.get(columns.title).map_or(true, |c| c.trim().is_empty()) {
                missing_titles += 1;
            }
            if row.get(columns.item_id).map_or(true, |c| c.trim().is_empty()) {
                missing_item_ids += 1;
            }
        }

        let total = table.len();
        let columns = table
            .header
            .iter()
            .zip(empty)
            .map(|(header, empty_cells)| ColumnQuality {
                header: header.clone(),
                empty_cells,
                empty_ratio: if total == 0 {
                    0.0
                } else {
                    empty_cells as f64 / total as f64
                },
            })
            .collect();

        Self {
            total_rows: total,
            column_count: width,
            fallback_lines: parse.fallback_lines,
            padded_rows: parse.padded_rows,
            truncated_rows: parse.truncated_rows,
            missing_titles,
            missing_item_ids,
            columns,
        }
    }

    pub fn repaired_rows(&self) -> usize {
        self.padded_rows + self.truncated_rows
    }
}
