//! Canonical column mapping.
//!
//! Each canonical target owns an ordered list of lower-case substring
//! patterns. Targets are resolved in schema order: the source columns are
//! scanned left to right and the first column whose lower-cased label
//! contains any of the target's patterns wins. Targets are not exclusive:
//! two targets may resolve to the same source column (`product` also
//! matches `ProductCode`, even when a `Product` column exists further right).

use crate::{
    coerce,
    data::{Table, Value},
    error::MappingError,
    events::EventSink,
};

#[derive(Debug, Clone, Copy)]
pub struct CanonicalColumn {
    pub name: &'static str,
    pub patterns: &'static [&'static str],
    /// Quantity targets default to `"0"` instead of `"N/A"` when unmatched.
    pub quantity: bool,
}

impl CanonicalColumn {
    pub fn default_value(&self) -> Value {
        if self.quantity {
            Value::from("0")
        } else {
            Value::from("N/A")
        }
    }
}

pub const PRODUCT_CODE: &str = "ProductCode";
pub const BRANCH: &str = "Branch";
pub const SOH: &str = "SOH";
pub const OPEN_SALES: &str = "Open Sales";
pub const AVAILABLE: &str = "Available";

pub const PRODUCT_CODE_PATTERNS: &[&str] = &["productcode", "product_code", "product code"];

pub const CANONICAL_COLUMNS: &[CanonicalColumn] = &[
    CanonicalColumn {
        name: PRODUCT_CODE,
        patterns: PRODUCT_CODE_PATTERNS,
        quantity: false,
    },
    CanonicalColumn {
        name: "Product",
        patterns: &["product", "description", "product description"],
        quantity: false,
    },
    CanonicalColumn {
        name: BRANCH,
        patterns: &["branch", "location", "warehouse"],
        quantity: false,
    },
    CanonicalColumn {
        name: SOH,
        patterns: &["soh", "4 - soh", "stock on hand", "soh_stock qty"],
        quantity: true,
    },
    CanonicalColumn {
        name: "Incoming NOT paid",
        patterns: &[
            "incoming",
            "5 -",
            "open po",
            "incoming not paid",
            "incoming_not_paid_stock qty",
        ],
        quantity: true,
    },
    CanonicalColumn {
        name: OPEN_SALES,
        patterns: &["open sales", "6 -", "allocated", "open_sales_stock qty"],
        quantity: true,
    },
    CanonicalColumn {
        name: "Grand Total",
        patterns: &["grand total", "7 -", "total", "grand_total_stock qty"],
        quantity: true,
    },
];

/// Index of the first column whose lower-cased label contains any pattern.
pub fn find_source_column(columns: &[String], patterns: &[&str]) -> Option<usize> {
    columns.iter().position(|column| {
        let lowered = column.to_lowercase();
        patterns.iter().any(|pattern| lowered.contains(pattern))
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSource {
    Mapped(String),
    Defaulted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMatch {
    pub target: &'static str,
    pub source: ColumnSource,
}

#[derive(Debug, Clone)]
pub struct MappingReport {
    pub table: Table,
    pub matches: Vec<ColumnMatch>,
    pub available_computed: bool,
}

/// Maps `table` onto the canonical schema, emitting one event per target.
/// Falls back to the unmapped table if mapping fails as a whole.
pub fn map_columns(table: &Table, sink: &EventSink) -> Table {
    sink.info("Applying column mapping...");
    match try_map_columns(table) {
        Ok(report) => {
            for column_match in &report.matches {
                match &column_match.source {
                    ColumnSource::Mapped(source) => {
                        sink.info(format!("  - {} <- {source}", column_match.target))
                    }
                    ColumnSource::Defaulted => sink.warning(format!(
                        "  - {} <- Default value (column not found)",
                        column_match.target
                    )),
                }
            }
            if report.available_computed {
                sink.info(format!("  - {AVAILABLE} <- Calculated ({SOH} - {OPEN_SALES})"));
            } else {
                sink.warning(format!("  - {AVAILABLE} <- Default (calculation failed)"));
            }
            sink.success(format!(
                "Column mapping complete: {} columns mapped",
                report.matches.len()
            ));
            report.table
        }
        Err(err) => {
            sink.warning(format!("Error applying column mapping: {err}"));
            table.clone()
        }
    }
}

pub fn try_map_columns(table: &Table) -> Result<MappingReport, MappingError> {
    let mut columns = Vec::with_capacity(CANONICAL_COLUMNS.len() + 1);
    let mut matches = Vec::with_capacity(CANONICAL_COLUMNS.len());
    let mut sources = Vec::with_capacity(CANONICAL_COLUMNS.len());

    for target in CANONICAL_COLUMNS {
        let source = find_source_column(&table.columns, target.patterns);
        matches.push(ColumnMatch {
            target: target.name,
            source: match source {
                Some(idx) => ColumnSource::Mapped(table.columns[idx].clone()),
                None => ColumnSource::Defaulted,
            },
        });
        columns.push(target.name.to_string());
        sources.push((source, target));
    }

    let mut rows = Vec::with_capacity(table.rows.len());
    for (row_idx, row) in table.rows.iter().enumerate() {
        let mut mapped = Vec::with_capacity(columns.len() + 1);
        for (source, target) in &sources {
            let value = match source {
                Some(idx) => row
                    .get(*idx)
                    .cloned()
                    .ok_or_else(|| MappingError::MissingCell {
                        row: row_idx,
                        column: table.columns[*idx].clone(),
                    })?,
                None => target.default_value(),
            };
            mapped.push(value);
        }
        rows.push(mapped);
    }

    let soh = position(&columns, SOH)?;
    let open_sales = position(&columns, OPEN_SALES)?;
    let available = compute_available(&rows, soh, open_sales);
    let available_computed = available.is_ok();
    let available = available.unwrap_or_else(|_| vec![Value::from("0"); rows.len()]);
    for (row, value) in rows.iter_mut().zip(available) {
        row.push(value);
    }
    columns.push(AVAILABLE.to_string());

    Ok(MappingReport {
        table: Table::from_rows(columns, rows),
        matches,
        available_computed,
    })
}

/// `SOH - Open Sales` per row, with both operands coerced (failures count
/// as zero).
pub fn available_for(soh: &Value, open_sales: &Value) -> Value {
    match (coerce::coerce_value(soh), coerce::coerce_value(open_sales)) {
        (Value::Integer(a), Value::Integer(b)) => match a.checked_sub(b) {
            Some(diff) => Value::Integer(diff),
            None => Value::Float(a as f64 - b as f64),
        },
        (a, b) => {
            let diff = a.as_f64().unwrap_or(0.0) - b.as_f64().unwrap_or(0.0);
            Value::Float(diff)
        }
    }
}

fn compute_available(
    rows: &[Vec<Value>],
    soh: usize,
    open_sales: usize,
) -> Result<Vec<Value>, MappingError> {
    rows.iter()
        .enumerate()
        .map(|(row_idx, row)| {
            let missing = |column: &str| MappingError::MissingCell {
                row: row_idx,
                column: column.to_string(),
            };
            let soh = row.get(soh).ok_or_else(|| missing(SOH))?;
            let open_sales = row.get(open_sales).ok_or_else(|| missing(OPEN_SALES))?;
            Ok(available_for(soh, open_sales))
        })
        .collect()
}

fn position(columns: &[String], name: &str) -> Result<usize, MappingError> {
    columns
        .iter()
        .position(|column| column == name)
        .ok_or_else(|| MappingError::MissingColumn(name.to_string()))
}
