//! Property coverage for spec.md §8 testable properties #4 (header-order
//! preservation) and #5 (row-order preservation).

use cf_parser::{to_json_value, ParsedFile};
use proptest::collection::vec;
use proptest::prelude::*;

/// Header/cell text free of the characters that would make a generated
/// value ambiguous as a JSON key/value pair in this test's own assertions.
fn cell_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,8}"
}

proptest! {
    #[test]
    fn header_and_row_order_survive_conversion(
        headers in vec(cell_strategy(), 1..6).prop_filter("unique headers", |h| {
            let mut sorted = h.clone();
            sorted.sort();
            sorted.dedup();
            sorted.len() == h.len()
        }),
        row_count in 0usize..12,
    ) {
        let rows: Vec<Vec<String>> = (0..row_count)
            .map(|i| headers.iter().map(|h| format!("{h}-{i}")).collect())
            .collect();
        let parsed = ParsedFile { headers: headers.clone(), rows: rows.clone() };

        let value = to_json_value(&parsed);
        let array = value.as_array().unwrap();
        prop_assert_eq!(array.len(), rows.len());

        for (i, record) in array.iter().enumerate() {
            let obj = record.as_object().unwrap();
            // Header-order preservation: the object's key iteration order
            // (insertion order, per cf_parser::convert's design) matches
            // the header order exactly.
            let keys: Vec<&String> = obj.keys().collect();
            prop_assert_eq!(keys, headers.iter().collect::<Vec<_>>());

            // Row-order preservation: row i's values correspond to the i-th
            // on-disk row, not some other ordering.
            for header in &headers {
                prop_assert_eq!(
                    obj[header].as_str().unwrap(),
                    format!("{header}-{i}")
                );
            }
        }
    }
}
