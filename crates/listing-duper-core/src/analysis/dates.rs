use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%b-%d-%y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%b-%d-%y"];

/// Parse a listing start date as exported by the marketplace.
///
/// A trailing time-zone abbreviation ("Mar-01-24 10:00:00 PST") is ignored.
/// Returns `None` for anything unrecognised; callers rank such rows as unordered.
pub fn parse_start_date(raw: &str) -> Option<NaiveDateTime> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }

    let text = strip_zone_suffix(text);
    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn strip_zone_suffix(text: &str) -> &str {
    match text.rsplit_once(' ') {
        Some((head, zone))
            if (2..=5).contains(&zone.len()) && zone.chars().all(|c| c.is_ascii_uppercase()) =>
        {
            head
        }
        _ => text,
    }
}
