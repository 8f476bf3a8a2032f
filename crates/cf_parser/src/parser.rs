//! Strict CSV parsing — spec.md §4.1.
//!
//! The parser never coerces, infers, or repairs. A structurally invalid file
//! fails the whole file; there is no partial/poisoned-row output.

use std::io::{Cursor, Read};
use std::path::Path;

use crate::error::{ParseError, ParseResult};

const VALIDATION_PREFIX_BYTES: usize = 4096;

/// Headers and rows in on-disk order. `rows[i][j]` is the value for
/// `headers[j]` in the i-th data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ParsedFile {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// spec.md §4.1 calls for leading-whitespace trimming only; the `csv` crate
/// has no leading-only trim mode, so each field is trimmed manually here
/// after reading rather than via `csv::Trim::Fields` (which would also trim
/// trailing whitespace and alter the raw cell text spec.md §3 preserves).
fn trim_leading(field: &str) -> String {
    field.trim_start().to_string()
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        rest
    } else {
        bytes
    }
}

fn read_file(path: &Path) -> ParseResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| ParseError::Read {
        path: path.display().to_string(),
        source,
    })
}

/// 4 KiB pre-pass: reject files that don't contain the configured delimiter
/// byte anywhere in their first 4 KiB. Catches binary files and
/// wrong-delimiter inputs before the full parse runs.
pub fn validate(path: &Path, delimiter: u8) -> ParseResult<()> {
    let file = std::fs::File::open(path).map_err(|source| ParseError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let mut prefix = vec![0u8; VALIDATION_PREFIX_BYTES];
    let mut reader = file.take(VALIDATION_PREFIX_BYTES as u64);
    let n = reader.read(&mut prefix).map_err(|source| ParseError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let prefix = strip_bom(&prefix[..n]);
    if !prefix.contains(&delimiter) {
        return Err(ParseError::structural("missing delimiter"));
    }
    Ok(())
}

/// Parse `path` into an ordered `(headers, rows)` structure.
///
/// `has_header = false` synthesizes `col_0..col_{N-1}` from the arity of the
/// first record, which is itself kept as a data row.
pub fn parse_ordered(
    path: &Path,
    delimiter: u8,
    quote: u8,
    has_header: bool,
) -> ParseResult<ParsedFile> {
    let bytes = read_file(path)?;
    let bytes = strip_bom(&bytes);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .quote(quote)
        .flexible(true)
        .has_headers(false)
        .from_reader(Cursor::new(bytes));

    let mut records = reader.records();

    let (headers, first_data_row) = if has_header {
        let header_record = match records.next() {
            Some(result) => result.map_err(|e| ParseError::structural(e.to_string()))?,
            None => return Err(ParseError::structural("no data rows")),
        };
        let headers: Vec<String> = header_record.iter().map(trim_leading).collect();
        (headers, None)
    } else {
        let first = match records.next() {
            Some(result) => result.map_err(|e| ParseError::structural(e.to_string()))?,
            None => return Err(ParseError::structural("no data rows")),
        };
        let arity = first.len();
        let headers: Vec<String> = (0..arity).map(|i| format!("col_{i}")).collect();
        let row: Vec<String> = first.iter().map(trim_leading).collect();
        (headers, Some(row))
    };

    let mut rows = Vec::new();
    if let Some(row) = first_data_row {
        rows.push(row);
    }

    let mut row_number = rows.len();
    for result in records {
        row_number += 1;
        let record = result.map_err(|e| ParseError::structural(e.to_string()))?;
        if record.len() != headers.len() {
            return Err(ParseError::structural(format!(
                "row {} has {} columns, expected {}",
                row_number,
                record.len(),
                headers.len()
            )));
        }
        rows.push(record.iter().map(trim_leading).collect());
    }

    if rows.is_empty() {
        return Err(ParseError::structural("no data rows"));
    }

    Ok(ParsedFile { headers, rows })
}
