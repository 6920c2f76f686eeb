//! Numeric coercion for quantity-like columns.
//!
//! A column is numeric-semantic when its name is one of the canonical
//! quantity names or contains a quantity/value keyword. Cells in those
//! columns are cleaned and parsed into numbers, falling back to zero; all
//! other cells become strings. Already-numeric cells are left untouched, so
//! the pass is idempotent.

use std::sync::LazyLock;

use regex::Regex;

use crate::{
    data::{Table, Value},
    error::MappingError,
    events::EventSink,
};

pub const NUMERIC_COLUMNS: &[&str] = &[
    "SOH",
    "Incoming NOT paid",
    "Open Sales",
    "Grand Total",
    "Available",
];

pub const NUMERIC_KEYWORDS: &[&str] = &[
    "stock qty",
    "stock value",
    "qty",
    "total",
    "incoming",
    "sales",
];

const NULL_TOKENS: &[&str] = &["", "nan", "None", "null"];

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,$\s]").expect("valid separator pattern"));
static NON_NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\d.\-]").expect("valid numeric pattern"));

pub fn is_numeric_column(name: &str) -> bool {
    if NUMERIC_COLUMNS.contains(&name) {
        return true;
    }
    let lowered = name.to_lowercase();
    NUMERIC_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

pub fn clean_numeric_text(raw: &str) -> String {
    let without_separators = SEPARATORS.replace_all(raw, "");
    let digits = NON_NUMERIC.replace_all(&without_separators, "");
    if NULL_TOKENS.contains(&digits.as_ref()) {
        "0".to_string()
    } else {
        digits.into_owned()
    }
}

pub fn parse_number(raw: &str) -> Value {
    let cleaned = clean_numeric_text(raw);
    if let Ok(integer) = cleaned.parse::<i64>() {
        Value::Integer(integer)
    } else {
        match cleaned.parse::<f64>() {
            Ok(float) if float.is_finite() => Value::Float(float),
            _ => Value::Integer(0),
        }
    }
}

pub fn coerce_value(value: &Value) -> Value {
    match value {
        Value::Integer(_) => value.clone(),
        Value::Float(f) if f.is_finite() => value.clone(),
        Value::Float(_) => Value::Integer(0),
        Value::String(s) => parse_number(s),
    }
}

/// Coerces every column of `table`. Problems are reported per column and
/// never abort the pass.
pub fn coerce_table(mut table: Table, sink: &EventSink) -> Table {
    let numeric = table
        .columns
        .iter()
        .enumerate()
        .filter(|(_, name)| is_numeric_column(name))
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();
    if !numeric.is_empty() {
        let names = numeric
            .iter()
            .map(|idx| table.columns[*idx].as_str())
            .collect::<Vec<_>>();
        sink.info(format!("Cleaning numeric data in columns: {names:?}"));
    }

    for idx in 0..table.columns.len() {
        let is_numeric = numeric.contains(&idx);
        match coerce_column(&mut table, idx, is_numeric) {
            Ok(_) if is_numeric => sink.info(format!(
                "  - Cleaned column '{}': numeric values ready",
                table.columns[idx]
            )),
            Ok(_) => {}
            Err(err) => sink.warning(format!(
                "  - Warning: Could not clean column '{}': {err}",
                table.columns[idx]
            )),
        }
    }
    table
}

fn coerce_column(table: &mut Table, idx: usize, numeric: bool) -> Result<usize, MappingError> {
    let column = table.columns[idx].clone();
    let mut converted = Vec::with_capacity(table.rows.len());
    for (row_idx, row) in table.rows.iter().enumerate() {
        let cell = row.get(idx).ok_or_else(|| MappingError::MissingCell {
            row: row_idx,
            column: column.clone(),
        })?;
        converted.push(if numeric {
            coerce_value(cell)
        } else {
            cell.clone().into_string_value()
        });
    }
    let count = converted.len();
    for (row, value) in table.rows.iter_mut().zip(converted) {
        row[idx] = value;
    }
    Ok(count)
}
