//! End-item export: the listings to close, in the marketplace's bulk-upload shape.

use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::{debug, info};

use crate::analysis::{AnnotatedRow, AnnotatedTable, ColumnMap, Decision};
use crate::batch::optimal_chunk_size;
use crate::config::ExportConfig;
use crate::error::Error;
use crate::ingest::Row;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub action: String,
    pub item_id: String,
    pub end_code: String,
}

/// Export rows plus a summary. An empty export is a successful outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOutcome {
    pub rows: Vec<ExportRow>,
}

impl ExportOutcome {
    pub fn item_count(&self) -> usize {
        self.rows.len()
    }

    pub fn message(&self) -> String {
        match self.rows.len() {
            0 => "No listings marked End; nothing to export".to_string(),
            n => format!("{} listings ready to end", n),
        }
    }

    /// Render with a header row.
    pub fn to_rows(&self, config: &ExportConfig) -> Vec<Row> {
        let mut out = Vec::with_capacity(self.rows.len() + 1);
        out.push(vec![
            config.action_header.clone(),
            config.item_id_header.clone(),
            config.end_code_header.clone(),
        ]);
        out.extend(
            self.rows
                .iter()
                .map(|r| vec![r.action.clone(), r.item_id.clone(), r.end_code.clone()]),
        );
        out
    }
}

pub struct ExportFilter<'a> {
    columns: ColumnMap,
    config: &'a ExportConfig,
}

impl<'a> ExportFilter<'a> {
    pub fn new(columns: ColumnMap, config: &'a ExportConfig) -> Self {
        Self { columns, config }
    }

    /// Project one annotated row, if it is an End row with an item id.
    pub fn select(&self, row: &AnnotatedRow) -> Option<ExportRow> {
        if row.decision != Decision::End {
            return None;
        }
        let item_id = row.row.get(self.columns.item_id)?.trim();
        if item_id.is_empty() {
            return None;
        }
        Some(ExportRow {
            action: self.config.action.clone(),
            item_id: item_id.to_string(),
            end_code: self.config.end_code.clone(),
        })
    }

    pub fn extend(&self, outcome: &mut ExportOutcome, rows: &[AnnotatedRow]) {
        outcome.rows.extend(rows.iter().filter_map(|r| self.select(r)));
    }

    pub fn filter(&self, table: &AnnotatedTable) -> ExportOutcome {
        let mut outcome = ExportOutcome::default();
        self.extend(&mut outcome, &table.rows);
        info!("{}", outcome.message());
        outcome
    }
}

/// Write rows as CSV, flushing every [`optimal_chunk_size`] rows.
pub fn write_csv<W: Write>(writer: W, rows: &[Row]) -> Result<usize, Error> {
    let mut csv_writer = csv::WriterBuilder::new().flexible(true).from_writer(writer);
    let batch = optimal_chunk_size(rows.len());

    for chunk in rows.chunks(batch) {
        for row in chunk {
            csv_writer.write_record(row)?;
        }
        csv_writer.flush()?;
        debug!("Wrote batch of {} rows", chunk.len());
    }

    Ok(rows.len())
}
