//! Line-oriented CSV tokenizer for marketplace exports.
//!
//! Lines without a quote take a plain comma split. Quoted lines go through a
//! small state machine; a line the state machine rejects falls back to the
//! plain split so one malformed line never costs the rest of the file.
//! After parsing, every data row is padded or truncated to the header width.

use tracing::{debug, warn};

use super::Row;

const BOM: char = '\u{feff}';

/// Rows plus counters describing the repairs made while parsing.
#[derive(Debug, Clone, Default)]
pub struct ParsedCsv {
    pub rows: Vec<Row>,
    pub report: ParseReport,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ParseReport {
    pub lines_read: usize,
    pub fallback_lines: usize,
    pub padded_rows: usize,
    pub truncated_rows: usize,
}

/// Why the quote-aware tokenizer rejected a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineIssue {
    UnterminatedQuote,
}

pub fn parse(text: &str) -> Vec<Row> {
    parse_with_report(text).rows
}

/// Parse raw bytes. Input that is not UTF-8 yields no rows; callers treat an
/// empty result as "nothing usable", not as a valid empty file.
pub fn parse_bytes(bytes: &[u8]) -> Vec<Row> {
    match std::str::from_utf8(bytes) {
        Ok(text) => parse(text),
        Err(e) => {
            warn!("CSV input is not valid UTF-8: {}", e);
            Vec::new()
        }
    }
}

pub fn parse_with_report(text: &str) -> ParsedCsv {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut report = ParseReport::default();
    let mut rows: Vec<Row> = Vec::new();

    for line in normalized.split('\n') {
        if line.trim().is_empty() {
            continue;
        }
        report.lines_read += 1;

        if !line.contains('"') {
            rows.push(split_naive(line));
            continue;
        }

        match parse_quoted_line(line) {
            Ok(row) => rows.push(row),
            Err(issue) => {
                debug!("Line {} fell back to plain split: {:?}", report.lines_read, issue);
                report.fallback_lines += 1;
                rows.push(split_naive(line));
            }
        }
    }

    let (padded, truncated) = normalize_row_lengths(&mut rows);
    report.padded_rows = padded;
    report.truncated_rows = truncated;

    if report.fallback_lines > 0 || padded > 0 || truncated > 0 {
        warn!(
            "Repaired CSV input: {} fallback lines, {} padded rows, {} truncated rows",
            report.fallback_lines, padded, truncated
        );
    }

    ParsedCsv { rows, report }
}

/// Number of data rows [`parse`] would return, without tokenizing any cells.
/// Follows the same rules: BOM stripped, blank lines skipped, header excluded.
pub fn count_data_rows(text: &str) -> usize {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    text.split(['\n', '\r'])
        .filter(|line| !line.trim().is_empty())
        .count()
        .saturating_sub(1)
}

fn split_naive(line: &str) -> Row {
    line.split(',').map(|cell| cell.trim().to_string()).collect()
}

fn parse_quoted_line(line: &str) -> Result<Row, LineIssue> {
    let mut cells: Row = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                cells.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if in_quotes {
        return Err(LineIssue::UnterminatedQuote);
    }
    cells.push(current.trim().to_string());
    Ok(cells)
}

/// Pad or truncate every data row to the header width.
/// Returns `(padded, truncated)` row counts.
pub fn normalize_row_lengths(rows: &mut [Row]) -> (usize, usize) {
    let Some((header, data)) = rows.split_first_mut() else {
        return (0, 0);
    };
    let width = header.len();
    let mut padded = 0;
    let mut truncated = 0;

    for row in data.iter_mut() {
        if row.len() < width {
            row.resize(width, String::new());
            padded += 1;
        } else if row.len() > width {
            row.truncate(width);
            truncated += 1;
        }
    }

    (padded, truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_fast_path_trims_cells() {
        let rows = parse("id , title\n 1 , Widget \n");
        assert_eq!(rows, vec![row(&["id", "title"]), row(&["1", "Widget"])]);
    }

    #[test]
    fn test_strips_bom_and_normalizes_line_endings() {
        let rows = parse("\u{feff}id,title\r\n1,A\r2,B\r\n");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], "id");
        assert_eq!(rows[2], row(&["2", "B"]));
    }

    #[test]
    fn test_skips_blank_lines() {
        let rows = parse("id,title\n\n   \n1,A\n");
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_quoted_field_with_comma_and_escaped_quote() {
        let rows = parse("id,title\n1,\"Widget, \"\"Deluxe\"\" Edition\"\n");
        assert_eq!(rows[1], row(&["1", "Widget, \"Deluxe\" Edition"]));
    }

    #[test]
    fn test_empty_quoted_field() {
        let rows = parse("a,b,c\n\"\",x,\"\"\n");
        assert_eq!(rows[1], row(&["", "x", ""]));
    }

    #[test]
    fn test_unterminated_quote_falls_back_to_plain_split() {
        let parsed = parse_with_report("id,title\n1,\"Broken, line\n2,Fine\n");
        assert_eq!(parsed.report.fallback_lines, 1);
        assert_eq!(parsed.rows[1], row(&["1", "\"Broken"]));
        assert_eq!(parsed.rows[2], row(&["2", "Fine"]));
    }

    #[test]
    fn test_short_row_padded_long_row_truncated() {
        let parsed = parse_with_report("a,b,c,d,e\n1,2\n1,2,3,4,5,6,7\n");
        assert_eq!(parsed.rows[1], row(&["1", "2", "", "", ""]));
        assert_eq!(parsed.rows[2], row(&["1", "2", "3", "4", "5"]));
        assert_eq!(parsed.report.padded_rows, 1);
        assert_eq!(parsed.report.truncated_rows, 1);
    }

    #[test]
    fn test_count_data_rows_matches_parse() {
        let text = "\u{feff}id,title\r\n\r\n1,A\n   \n2,\"B, C\"\r3,D\n\n";
        assert_eq!(count_data_rows(text), 3);
        assert_eq!(count_data_rows(text), parse(text).len() - 1);
        assert_eq!(count_data_rows(""), 0);
        assert_eq!(count_data_rows("id,title\n"), 0);
    }

    #[test]
    fn test_invalid_utf8_yields_no_rows() {
        assert!(parse_bytes(&[0xff, 0xfe, 0x00, 0x41]).is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").is_empty());
        assert!(parse("\u{feff}").is_empty());
    }
}
