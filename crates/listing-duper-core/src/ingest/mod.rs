pub mod csv_parser;

use serde::{Deserialize, Serialize};

pub use csv_parser::{
    count_data_rows, parse, parse_bytes, parse_with_report, ParseReport, ParsedCsv,
};

/// One line of the export: ordered string cells.
pub type Row = Vec<String>;

/// A header row plus data rows, every data row the same width as the header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub header: Row,
    pub rows: Vec<Row>,
}

impl Table {
    /// Split parsed rows into header and data. Returns `None` when there is no header.
    pub fn from_rows(rows: Vec<Row>) -> Option<Self> {
        let mut iter = rows.into_iter();
        let header = iter.next()?;
        Some(Self {
            header,
            rows: iter.collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.header.len()
    }

    /// Cell text, or `""` when the row or column is out of range.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }
}
