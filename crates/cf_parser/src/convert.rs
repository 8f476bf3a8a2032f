//! Ordered-map JSON conversion — spec.md §4.2.
//!
//! Every cell serializes as a JSON string; no numeric, boolean, or null
//! coercion. Keys follow header order, not a map's natural iteration order.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::parser::ParsedFile;

/// Serialize `(headers, rows)` to a top-level JSON array of objects, one per
/// row, with keys in header order.
pub fn to_json_value(parsed: &ParsedFile) -> Value {
    let records: Vec<Value> = parsed
        .rows
        .iter()
        .map(|row| {
            let mut obj = Map::with_capacity(parsed.headers.len());
            for (key, value) in parsed.headers.iter().zip(row.iter()) {
                obj.insert(key.clone(), Value::String(value.clone()));
            }
            Value::Object(obj)
        })
        .collect();
    Value::Array(records)
}

/// Serialize `(headers, rows)` to a JSON byte sequence.
pub fn to_json_bytes(parsed: &ParsedFile) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&to_json_value(parsed))
}

/// Legacy entry point for callers that never passed through the ordered
/// parser and only have a plain key→value row set. Key order is whatever the
/// caller's map iteration yields — the ordered entry point above is
/// preferred.
pub fn convert_unordered(rows: &[HashMap<String, String>]) -> Value {
    let records: Vec<Value> = rows
        .iter()
        .map(|row| {
            let mut obj = Map::with_capacity(row.len());
            for (key, value) in row {
                obj.insert(key.clone(), Value::String(value.clone()));
            }
            Value::Object(obj)
        })
        .collect();
    Value::Array(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_order_is_preserved_in_output_keys() {
        let parsed = ParsedFile {
            headers: vec!["price".to_string(), "id".to_string(), "name".to_string()],
            rows: vec![vec!["9.99".to_string(), "1".to_string(), "Widget".to_string()]],
        };
        let value = to_json_value(&parsed);
        let bytes = serde_json::to_vec(&value).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let price_pos = text.find("price").unwrap();
        let id_pos = text.find("\"id\"").unwrap();
        let name_pos = text.find("name").unwrap();
        assert!(price_pos < id_pos);
        assert!(id_pos < name_pos);
    }

    #[test]
    fn empty_cell_serializes_as_empty_string_never_null() {
        let parsed = ParsedFile {
            headers: vec!["a".to_string(), "b".to_string()],
            rows: vec![vec!["".to_string(), "x".to_string()]],
        };
        let value = to_json_value(&parsed);
        assert_eq!(value[0]["a"], Value::String(String::new()));
        assert_ne!(value[0]["a"], Value::Null);
    }

    #[test]
    fn row_order_matches_on_disk_order() {
        let parsed = ParsedFile {
            headers: vec!["n".to_string()],
            rows: vec![vec!["1".to_string()], vec!["2".to_string()], vec!["3".to_string()]],
        };
        let value = to_json_value(&parsed);
        assert_eq!(value[0]["n"], Value::String("1".to_string()));
        assert_eq!(value[1]["n"], Value::String("2".to_string()));
        assert_eq!(value[2]["n"], Value::String("3".to_string()));
    }
}
