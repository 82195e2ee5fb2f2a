//! Delimited-text table reader
//!
//! Reads reactor logs exported as tab-separated text. Files come from lab PCs
//! with mixed locales, so decoding tries UTF-8 first and falls back to a
//! Latin-1 byte mapping.

use crate::error::ProcessError;
use crate::types::RawTable;
use std::path::Path;
use tracing::debug;

/// Default field separator of reactor log exports
pub const DEFAULT_DELIMITER: u8 = b'\t';

/// Text encoding a file was decoded with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
}

/// Reader for header-first delimited text files
#[derive(Debug, Clone)]
pub struct TableReader {
    delimiter: u8,
}

impl Default for TableReader {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITER)
    }
}

impl TableReader {
    /// Create a reader for the given field separator
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Read and parse a file from disk
    pub fn read_path(&self, path: &Path) -> Result<RawTable, ProcessError> {
        let bytes = std::fs::read(path)?;
        let (text, encoding) = decode_text(&bytes);
        debug!(path = %path.display(), ?encoding, "decoded input file");
        self.read_str(&text)
    }

    /// Parse raw bytes, decoding them first
    pub fn read_bytes(&self, bytes: &[u8]) -> Result<RawTable, ProcessError> {
        let (text, _) = decode_text(bytes);
        self.read_str(&text)
    }

    /// Parse already-decoded text
    pub fn read_str(&self, text: &str) -> Result<RawTable, ProcessError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut records = reader.records();

        let headers: Vec<String> = match records.next() {
            Some(record) => record?.iter().map(|s| s.trim().to_string()).collect(),
            None => return Err(ProcessError::ReadError("input is empty".to_string())),
        };

        let width = headers.len();
        let mut rows = Vec::new();

        for record in records {
            let record = record?;
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            let mut row: Vec<String> = record
                .iter()
                .take(width)
                .map(|s| s.trim().to_string())
                .collect();
            row.resize(width, String::new());
            rows.push(row);
        }

        Ok(RawTable { headers, rows })
    }
}

/// Decode file bytes, falling back to Latin-1 when they are not valid UTF-8.
///
/// A leading UTF-8 byte-order mark is dropped.
pub fn decode_text(bytes: &[u8]) -> (String, TextEncoding) {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), TextEncoding::Utf8),
        // Latin-1: each byte maps to the same Unicode code point
        Err(_) => (bytes.iter().map(|&b| b as char).collect(), TextEncoding::Latin1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_tab_separated() {
        let text = "DateTime\tStage\tR1/2 T read [°C]\n\
                    01/02/23 10:00:00\t1\t250.5\n\
                    01/02/23 10:01:00\t1\t251.0\n";
        let table = TableReader::default().read_str(text).unwrap();

        assert_eq!(table.headers, vec!["DateTime", "Stage", "R1/2 T read [°C]"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column(2), vec!["250.5", "251.0"]);
    }

    #[test]
    fn test_short_rows_padded_and_blank_rows_skipped() {
        let text = "a\tb\tc\n1\t2\n\t\t\n4\t5\t6\t7\n";
        let table = TableReader::default().read_str(text).unwrap();

        assert_eq!(
            table.rows,
            vec![
                vec!["1".to_string(), "2".to_string(), String::new()],
                vec!["4".to_string(), "5".to_string(), "6".to_string()],
            ]
        );
    }

    #[test]
    fn test_latin1_fallback() {
        // "T [°C]" with the degree sign encoded as a single Latin-1 byte
        let bytes = b"Time\tT [\xB0C]\n0\t1.5\n";
        let (text, encoding) = decode_text(bytes);
        assert_eq!(encoding, TextEncoding::Latin1);
        assert!(text.contains("°C"));

        let table = TableReader::default().read_bytes(bytes).unwrap();
        assert_eq!(table.headers[1], "T [°C]");
    }

    #[test]
    fn test_bom_stripped() {
        let bytes = b"\xEF\xBB\xBFTime\tValue\n0\t1\n";
        let table = TableReader::default().read_bytes(bytes).unwrap();
        assert_eq!(table.headers[0], "Time");
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(TableReader::default().read_str("").is_err());
    }

    #[test]
    fn test_custom_delimiter() {
        let table = TableReader::new(b',').read_str("t,v\n0,1\n").unwrap();
        assert_eq!(table.headers, vec!["t", "v"]);
        assert_eq!(table.rows[0], vec!["0", "1"]);
    }
}
