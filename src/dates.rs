// Date formats, cell parsing and date field detection

use crate::data::{is_missing, Dataset};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Share of non-missing cells that must parse for a column to count as dates
pub const DETECTION_THRESHOLD: f64 = 0.6;

/// Selectable formats, numbered from 1, with an example of each
pub const DATE_FORMAT_PRESETS: [(&str, &str); 13] = [
    ("%Y-%m-%d", "2025-12-13"),
    ("%d-%m-%Y", "13-12-2025"),
    ("%m-%d-%Y", "12-13-2025"),
    ("%Y/%m/%d", "2025/12/13"),
    ("%d/%m/%Y", "13/12/2025"),
    ("%m/%d/%Y", "12/13/2025"),
    ("%Y.%m.%d", "2025.12.13"),
    ("%d.%m.%Y", "13.12.2025"),
    ("%m.%d.%Y", "12.13.2025"),
    ("%Y%m%d", "20251213"),
    ("%d%m%Y", "13122025"),
    ("%m%d%Y", "12132025"),
    ("epoch", "Unix timestamp, e.g. 1694649600"),
];

/// Formats tried when no date format was chosen for the session
const INFERRED_FORMATS: [&str; 5] = [
    "%Y-%m-%d",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d",
];

/// How date cells are read: a strftime pattern or numeric Unix seconds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DateFormat {
    Pattern(String),
    Epoch,
}

impl DateFormat {
    /// Interpret a user choice: a preset number, `epoch`, or a custom pattern
    pub fn from_choice(choice: &str) -> Option<DateFormat> {
        let choice = choice.trim();
        if choice.is_empty() {
            return None;
        }
        if let Ok(n) = choice.parse::<usize>() {
            // a bare number must name a preset
            return DATE_FORMAT_PRESETS
                .get(n.wrapping_sub(1))
                .map(|(fmt, _)| DateFormat::from_pattern(fmt));
        }
        Some(DateFormat::from_pattern(choice))
    }

    pub fn from_pattern(pattern: &str) -> DateFormat {
        if pattern.eq_ignore_ascii_case("epoch") {
            DateFormat::Epoch
        } else {
            DateFormat::Pattern(pattern.to_string())
        }
    }

    /// Parse a whole cell; missing or malformed cells give `None`
    pub fn parse(&self, cell: &str) -> Option<NaiveDateTime> {
        if is_missing(cell) {
            return None;
        }
        let text = cell.trim();
        match self {
            DateFormat::Epoch => parse_epoch(text),
            DateFormat::Pattern(pattern) => parse_pattern(text, pattern),
        }
    }

    /// Parse a cell, falling back to its leading whitespace-separated token
    /// so that `2024-01-05 10:30` still reads under `%Y-%m-%d`.
    pub fn parse_lenient(&self, cell: &str) -> Option<NaiveDateTime> {
        self.parse(cell).or_else(|| {
            let token = cell.split_whitespace().next()?;
            self.parse(token)
        })
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateFormat::Pattern(p) => f.write_str(p),
            DateFormat::Epoch => f.write_str("epoch"),
        }
    }
}

fn parse_pattern(text: &str, pattern: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, pattern) {
        return Some(dt);
    }
    NaiveDate::parse_from_str(text, pattern)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn parse_epoch(text: &str) -> Option<NaiveDateTime> {
    let seconds = text.parse::<f64>().ok()?;
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999)).map(|dt| dt.naive_utc())
}

/// Parse a label with the session format, or a few ISO-style layouts when
/// no format was chosen.
pub fn parse_date_label(format: Option<&DateFormat>, text: &str) -> Option<NaiveDateTime> {
    match format {
        Some(f) => f.parse_lenient(text),
        None => {
            if is_missing(text) {
                return None;
            }
            let text = text.trim();
            INFERRED_FORMATS.iter().find_map(|p| parse_pattern(text, p))
        }
    }
}

/// Share of non-missing cells in a column that parse under `format`
pub fn parse_ratio(data: &Dataset, index: usize, format: &DateFormat) -> f64 {
    let mut present = 0usize;
    let mut parsed = 0usize;
    for cell in data.column(index) {
        if is_missing(cell) {
            continue;
        }
        present += 1;
        if format.parse_lenient(cell).is_some() {
            parsed += 1;
        }
    }
    if present == 0 {
        0.0
    } else {
        parsed as f64 / present as f64
    }
}

/// Names of the columns that look like dates under `format`, in column order.
///
/// Each column is first screened with its first non-missing value: for
/// `epoch` a numeric sample qualifies outright, otherwise the sample's
/// leading token must parse before the whole column is checked against
/// [`DETECTION_THRESHOLD`].
pub fn detect_date_fields(data: &Dataset, format: &DateFormat) -> Vec<String> {
    let mut detected = Vec::new();

    for (index, name) in data.headers().iter().enumerate() {
        let Some(sample) = data.first_present(index) else {
            continue;
        };

        let is_date = match format {
            DateFormat::Epoch => parse_epoch(sample.trim()).is_some(),
            DateFormat::Pattern(_) => {
                let leading = sample.split_whitespace().next().unwrap_or(sample);
                if format.parse(leading).is_none() {
                    false
                } else {
                    let ratio = parse_ratio(data, index, format);
                    debug!("Column '{}' parses as '{}' for {:.0}% of values", name, format, ratio * 100.0);
                    ratio >= DETECTION_THRESHOLD
                }
            }
        };

        if is_date {
            detected.push(name.clone());
        }
    }

    detected
}

/// Detection results remembered per format for the length of a session
#[derive(Debug, Default)]
pub struct DateFieldCache {
    entries: HashMap<DateFormat, Vec<String>>,
}

impl DateFieldCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_detect(&mut self, data: &Dataset, format: &DateFormat) -> &[String] {
        self.entries
            .entry(format.clone())
            .or_insert_with(|| detect_date_fields(data, format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn dataset(headers: &[&str], rows: &[&[&str]]) -> Dataset {
        Dataset::new(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect(),
        )
    }

    fn ymd() -> DateFormat {
        DateFormat::Pattern("%Y-%m-%d".to_string())
    }

    #[test]
    fn test_from_choice_presets() {
        assert_eq!(DateFormat::from_choice("1"), Some(ymd()));
        assert_eq!(DateFormat::from_choice("10"), Some(DateFormat::Pattern("%Y%m%d".into())));
        assert_eq!(DateFormat::from_choice("13"), Some(DateFormat::Epoch));
        assert_eq!(DateFormat::from_choice("epoch"), Some(DateFormat::Epoch));
        assert_eq!(DateFormat::from_choice("%d %b %Y"), Some(DateFormat::Pattern("%d %b %Y".into())));
        assert_eq!(DateFormat::from_choice("99"), None);
        assert_eq!(DateFormat::from_choice(""), None);
    }

    #[test]
    fn test_parse_pattern_variants() {
        let d = ymd().parse("2024-02-29").unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2024, 2, 29));

        let compact = DateFormat::Pattern("%Y%m%d".into()).parse("20251213").unwrap();
        assert_eq!((compact.year(), compact.month(), compact.day()), (2025, 12, 13));

        let with_time = DateFormat::Pattern("%Y-%m-%d %H:%M".into()).parse("2024-01-01 08:15").unwrap();
        assert_eq!(with_time.hour(), 8);

        assert!(ymd().parse("2024-13-01").is_none());
        assert!(ymd().parse("").is_none());
    }

    #[test]
    fn test_parse_lenient_uses_leading_token() {
        assert!(ymd().parse("2024-01-05 10:30").is_none());
        assert!(ymd().parse_lenient("2024-01-05 10:30").is_some());
    }

    #[test]
    fn test_parse_epoch() {
        let d = DateFormat::Epoch.parse("1694649600").unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2023, 9, 14));
        assert!(DateFormat::Epoch.parse("yesterday").is_none());
    }

    #[test]
    fn test_detects_column_at_threshold() {
        let data = dataset(
            &["when", "what"],
            &[
                &["2024-01-01", "x"],
                &["2024-02-15", "y"],
                &["not-a-date", "2024-01-01"],
                &["2024-03-03", "z"],
            ],
        );
        assert_eq!(detect_date_fields(&data, &ymd()), vec!["when".to_string()]);
    }

    #[test]
    fn test_mostly_text_column_is_not_detected() {
        // sample passes but only 40% of the column parses
        let data = dataset(
            &["d"],
            &[&["2024-01-01"], &["x"], &["y"], &["2024-01-02"], &["z"]],
        );
        assert!(detect_date_fields(&data, &ymd()).is_empty());
    }

    #[test]
    fn test_exact_sixty_percent_is_detected() {
        let data = dataset(
            &["d"],
            &[&["2024-01-01"], &["2024-01-02"], &["2024-01-03"], &["x"], &["y"]],
        );
        assert_eq!(detect_date_fields(&data, &ymd()), vec!["d".to_string()]);
    }

    #[test]
    fn test_missing_cells_are_ignored_for_ratio() {
        let data = dataset(&["d"], &[&[""], &["2024-01-01"], &["NA"], &["2024-01-02"], &["bad"]]);
        let ratio = parse_ratio(&data, 0, &ymd());
        assert!((ratio - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(detect_date_fields(&data, &ymd()), vec!["d".to_string()]);
    }

    #[test]
    fn test_epoch_detects_numeric_samples() {
        let data = dataset(&["ts", "name"], &[&["1694649600", "a"], &["1694736000", "b"]]);
        assert_eq!(detect_date_fields(&data, &DateFormat::Epoch), vec!["ts".to_string()]);
    }

    #[test]
    fn test_detection_preserves_column_order() {
        let data = dataset(
            &["b", "a", "n"],
            &[&["2024-01-01", "2023-05-05", "1"]],
        );
        assert_eq!(detect_date_fields(&data, &ymd()), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_cache_reuses_results() {
        let data = dataset(&["d"], &[&["2024-01-01"]]);
        let mut cache = DateFieldCache::new();
        assert_eq!(cache.get_or_detect(&data, &ymd()), &["d".to_string()][..]);
        // a changed dataset does not invalidate the remembered result
        let other = dataset(&["d"], &[&["nope"]]);
        assert_eq!(cache.get_or_detect(&other, &ymd()), &["d".to_string()][..]);
        assert!(cache.get_or_detect(&data, &DateFormat::Epoch).is_empty());
    }

    #[test]
    fn test_parse_date_label_without_format() {
        assert!(parse_date_label(None, "2024-05-01").is_some());
        assert!(parse_date_label(None, "East").is_none());
        assert!(parse_date_label(None, "2024").is_none());
    }
}
