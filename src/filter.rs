//! Drops rows that cannot be inventory records.
//!
//! The primary key column is found with the same substring rule the mapper
//! uses for `ProductCode`. Rows whose key is empty, the literal `nan`, or
//! contains one of the footer markers (repeated header rows, subtotal and
//! grand total lines) are removed. Without a key column nothing is touched.

use crate::{data::Table, events::EventSink, mapping};

pub const FOOTER_MARKERS: &[&str] = &["grand total", "total", "productcode"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterReport {
    pub key_column: Option<String>,
    pub removed: usize,
}

pub fn is_invalid_key(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "nan" {
        return true;
    }
    let lowered = trimmed.to_lowercase();
    FOOTER_MARKERS.iter().any(|marker| lowered.contains(marker))
}

pub fn filter_rows(table: &mut Table) -> FilterReport {
    let Some(key) = mapping::find_source_column(&table.columns, mapping::PRODUCT_CODE_PATTERNS)
    else {
        return FilterReport {
            key_column: None,
            removed: 0,
        };
    };
    let before = table.rows.len();
    table.rows.retain(|row| {
        row.get(key)
            .map(|cell| !is_invalid_key(&cell.as_display()))
            .unwrap_or(false)
    });
    FilterReport {
        key_column: Some(table.columns[key].clone()),
        removed: before - table.rows.len(),
    }
}

/// Filters `table` in place and reports the outcome on `sink`.
pub fn apply(mut table: Table, sink: &EventSink) -> Table {
    let report = filter_rows(&mut table);
    match &report.key_column {
        Some(_) if report.removed > 0 => {
            sink.info(format!("Filtered out {} invalid rows", report.removed))
        }
        Some(column) => sink.debug(format!("No invalid rows found in '{column}'")),
        None => sink.debug("No product code column found; row filter skipped"),
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    fn table(keys: &[&str]) -> Table {
        Table::from_rows(
            vec!["ProductCode".into(), "SOH".into()],
            keys.iter()
                .enumerate()
                .map(|(idx, key)| vec![Value::from(*key), Value::Integer(idx as i64)])
                .collect(),
        )
    }

    #[test]
    fn removes_blank_nan_and_footer_rows_in_order() {
        let mut t = table(&["A1", "", "nan", "B2", "Grand Total", "ProductCode", "C3", "  "]);
        let report = filter_rows(&mut t);
        assert_eq!(report.removed, 5);
        assert_eq!(report.key_column.as_deref(), Some("ProductCode"));
        let keys = t.rows.iter().map(|r| r[0].as_display()).collect::<Vec<_>>();
        assert_eq!(keys, vec!["A1", "B2", "C3"]);
        let soh = t.rows.iter().map(|r| r[1].clone()).collect::<Vec<_>>();
        assert_eq!(soh, vec![Value::Integer(0), Value::Integer(3), Value::Integer(6)]);
    }

    #[test]
    fn markers_match_case_insensitively_as_substrings() {
        assert!(is_invalid_key("SUBTOTAL"));
        assert!(is_invalid_key("branch total"));
        assert!(is_invalid_key("productcode"));
        assert!(!is_invalid_key("TOT-100"));
        assert!(!is_invalid_key("0"));
    }

    #[test]
    fn missing_key_column_is_a_no_op() {
        let mut t = Table::from_rows(
            vec!["Branch".into()],
            vec![vec![Value::from("")], vec![Value::from("Total")]],
        );
        let report = filter_rows(&mut t);
        assert_eq!(report.key_column, None);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn numeric_keys_are_compared_by_display() {
        let mut t = Table::from_rows(
            vec!["product_code".into()],
            vec![vec![Value::Integer(1001)], vec![Value::from("nan")]],
        );
        assert_eq!(filter_rows(&mut t).removed, 1);
        assert_eq!(t.rows[0][0], Value::Integer(1001));
    }
}
