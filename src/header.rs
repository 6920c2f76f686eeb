//! Header reconciliation for dual-header exports.
//!
//! Inventory exports stack two label rows over every column: a category row
//! (`4 - SOH`, often merged across several columns) and a detail row
//! (`Stock Qty`, `Stock Value`). [`reconcile`] collapses both rows into one
//! flat label per column:
//!
//! - outer and inner both present and different: `outer_inner`
//! - otherwise: whichever is present, inner first
//!
//! Labels that end up blank are named `column_{n}`; repeated labels get a
//! `.1`, `.2`, ... suffix so every column stays addressable by name.

use std::collections::{HashMap, HashSet};

use crate::data::{Table, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnLabel {
    Single(String),
    Pair { outer: String, inner: String },
}

impl ColumnLabel {
    pub fn flatten(&self) -> String {
        match self {
            ColumnLabel::Single(label) => label.trim().to_string(),
            ColumnLabel::Pair { outer, inner } => reconcile_pair(outer, inner),
        }
    }
}

/// One reading of an input file: labels plus data rows, unmodified.
#[derive(Debug, Clone, Default)]
pub struct RawSheet {
    pub labels: Vec<ColumnLabel>,
    pub rows: Vec<Vec<Value>>,
}

/// Both readings of an input. `dual` is absent when the format cannot carry
/// two header rows or the sheet is too short for them.
#[derive(Debug, Clone, Default)]
pub struct SheetReading {
    pub single: RawSheet,
    pub dual: Option<RawSheet>,
}

pub fn reconcile_pair(outer: &str, inner: &str) -> String {
    let outer = outer.trim();
    let inner = inner.trim();
    match (outer.is_empty(), inner.is_empty()) {
        (false, false) if outer != inner => format!("{outer}_{inner}"),
        (_, false) => inner.to_string(),
        _ => outer.to_string(),
    }
}

/// Blank outer cells inherit the nearest non-blank label to their left, the
/// way a merged category cell spans its detail columns. Leading blanks stay
/// blank.
pub fn forward_fill_outer(outer: &[String]) -> Vec<String> {
    let mut last: Option<&str> = None;
    outer
        .iter()
        .map(|label| {
            let trimmed = label.trim();
            if trimmed.is_empty() {
                last.unwrap_or("").to_string()
            } else {
                last = Some(trimmed);
                trimmed.to_string()
            }
        })
        .collect()
}

pub fn pair_labels(outer: &[String], inner: &[String]) -> Vec<ColumnLabel> {
    let width = outer.len().max(inner.len());
    let mut outer = outer.to_vec();
    outer.resize(width, String::new());
    let filled = forward_fill_outer(&outer);
    (0..width)
        .map(|idx| ColumnLabel::Pair {
            outer: filled[idx].clone(),
            inner: inner.get(idx).cloned().unwrap_or_default(),
        })
        .collect()
}

pub fn reconcile(sheet: &RawSheet) -> Table {
    let width = sheet
        .rows
        .iter()
        .map(Vec::len)
        .max()
        .unwrap_or(0)
        .max(sheet.labels.len());
    let mut flat = sheet
        .labels
        .iter()
        .map(ColumnLabel::flatten)
        .collect::<Vec<_>>();
    flat.resize(width, String::new());
    let columns = disambiguate(
        flat.into_iter()
            .enumerate()
            .map(|(idx, label)| {
                if label.is_empty() {
                    format!("column_{}", idx + 1)
                } else {
                    label
                }
            })
            .collect(),
    );
    Table::from_rows(columns, sheet.rows.clone())
}

/// Picks the reading to process. Verbatim runs prefer the dual-header
/// reading; otherwise, or when no dual reading exists, the single-header
/// reading is used as-is. Returns whether the dual reading was chosen.
pub fn select_reading(reading: &SheetReading, prefer_dual: bool) -> (Table, bool) {
    match (&reading.dual, prefer_dual) {
        (Some(dual), true) => (reconcile(dual), true),
        _ => (reconcile(&reading.single), false),
    }
}

fn disambiguate(labels: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    labels
        .into_iter()
        .map(|label| {
            let name = if taken.contains(&label) {
                let suffix = next_suffix.entry(label.clone()).or_insert(1);
                // a suffixed candidate may already be a real label
                while taken.contains(&format!("{label}.{suffix}")) {
                    *suffix += 1;
                }
                let name = format!("{label}.{suffix}");
                *suffix += 1;
                name
            } else {
                label
            };
            taken.insert(name.clone());
            name
        })
        .collect()
}
