// Data source: load a Dataset from CSV, delimited text, stdin or JSON

use crate::data::Dataset;
use anyhow::{bail, Context, Result};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use tracing::info;

/// Delimiters considered when sniffing `.txt` files
const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Number of leading lines inspected by the delimiter sniffer
const SNIFF_LINES: usize = 20;

/// Load a dataset from a path; `-` reads CSV from stdin
pub fn load_dataset(path: &str) -> Result<Dataset> {
    if path == "-" {
        return read_csv_from_stdin();
    }

    let file_path = Path::new(path);
    let extension = file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let text = fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read '{}'", path))?;

    let dataset = match extension.as_str() {
        "csv" => parse_delimited(&text, b',')?,
        "txt" | "tsv" => {
            let delimiter = sniff_delimiter(&text);
            info!("Auto-detected delimiter: '{}'", delimiter as char);
            parse_delimited(&text, delimiter)?
        }
        "json" => {
            let value: serde_json::Value = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse JSON in '{}'", path))?;
            Dataset::from_json(&value)?
        }
        other => bail!(
            "Unsupported file format '{}'. Please provide a CSV, TXT or JSON file.",
            other
        ),
    };

    info!(
        "Data loaded successfully with {} records and {} columns",
        dataset.row_count(),
        dataset.column_count()
    );
    Ok(dataset)
}

/// Read comma-separated data from stdin
pub fn read_csv_from_stdin() -> Result<Dataset> {
    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read stdin")?;
    parse_delimited(&text, b',')
}

/// Parse delimited text whose first record is the header row
pub fn parse_delimited(text: &str, delimiter: u8) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read header row")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        bail!("Input has no header row");
    }

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to parse record {}", idx + 1))?;
        rows.push(record.iter().map(|c| c.to_string()).collect());
    }

    Ok(Dataset::new(headers, rows))
}

/// Pick the delimiter that splits the leading lines most consistently.
///
/// A candidate must appear the same non-zero number of times on every
/// sampled line; ties go to the higher count. Falls back to a comma.
pub fn sniff_delimiter(text: &str) -> u8 {
    let lines: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();

    let mut best: Option<(u8, usize)> = None;
    for &delimiter in &CANDIDATE_DELIMITERS {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| line.bytes().filter(|&b| b == delimiter).count())
            .collect();
        let Some(&first) = counts.first() else { continue };
        if first == 0 || counts.iter().any(|&c| c != first) {
            continue;
        }
        if best.map_or(true, |(_, n)| first > n) {
            best = Some((delimiter, first));
        }
    }

    best.map(|(d, _)| d).unwrap_or(b',')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delimited_csv() {
        let data = parse_delimited("Region,Sales\nEast,100\nWest,50\n", b',').unwrap();
        assert_eq!(data.headers(), &["Region".to_string(), "Sales".to_string()][..]);
        assert_eq!(data.row_count(), 2);
    }

    #[test]
    fn test_parse_delimited_ragged_rows() {
        let data = parse_delimited("a,b,c\n1,2\n4,5,6\n", b',').unwrap();
        assert_eq!(data.rows()[0], vec!["1".to_string(), "2".to_string(), String::new()]);
    }

    #[test]
    fn test_sniff_semicolon() {
        let text = "date;amount;city\n2024-01-01;10;Paris\n2024-01-02;12;Lyon\n";
        assert_eq!(sniff_delimiter(text), b';');
    }

    #[test]
    fn test_sniff_tab() {
        let text = "a\tb\n1\t2\n3\t4\n";
        assert_eq!(sniff_delimiter(text), b'\t');
    }

    #[test]
    fn test_sniff_falls_back_to_comma() {
        assert_eq!(sniff_delimiter("single\nvalue\n"), b',');
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.xlsx");
        fs::write(&path, "x").unwrap();
        let result = load_dataset(path.to_str().unwrap());
        assert!(result.unwrap_err().to_string().contains("Unsupported file format"));
    }

    #[test]
    fn test_load_txt_with_sniffed_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, "a|b\n1|2\n3|4\n").unwrap();
        let data = load_dataset(path.to_str().unwrap()).unwrap();
        assert_eq!(data.column_count(), 2);
        assert_eq!(data.row_count(), 2);
    }
}
