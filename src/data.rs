//! Cell values and the in-memory table every pipeline stage works on.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
}

impl Value {
    pub fn empty() -> Self {
        Value::String(String::new())
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// True for cells that carry nothing worth sending: empty or whitespace
    /// strings and the literal `nan` spreadsheet exports leave behind.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::String(s) => {
                let trimmed = s.trim();
                trimmed.is_empty() || trimmed == "nan"
            }
            Value::Integer(_) => false,
            Value::Float(f) => f.is_nan(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(_) => None,
        }
    }

    pub fn into_string_value(self) -> Value {
        match self {
            Value::String(_) => self,
            other => Value::String(other.as_display()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

/// Rectangular table of named columns. Rows are positionally aligned with
/// `columns`; constructors pad short rows with empty strings and drop
/// surplus cells so every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::empty());
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().filter_map(move |row| row.get(idx))
    }

    /// Renders every cell with [`Value::as_display`], for table previews.
    pub fn display_rows(&self, limit: usize) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| row.iter().map(Value::as_display).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_floats_display_without_fraction() {
        assert_eq!(Value::Float(12.0).as_display(), "12");
        assert_eq!(Value::Float(-0.5).as_display(), "-0.5");
        assert_eq!(Value::Integer(7).as_display(), "7");
    }

    #[test]
    fn blank_detection_covers_nan_and_whitespace() {
        assert!(Value::from("  ").is_blank());
        assert!(Value::from("nan").is_blank());
        assert!(!Value::from("0").is_blank());
        assert!(!Value::Integer(0).is_blank());
        assert!(Value::Float(f64::NAN).is_blank());
    }

    #[test]
    fn table_rows_are_padded_and_truncated() {
        let table = Table::from_rows(
            vec!["a".into(), "b".into()],
            vec![
                vec![Value::from("1")],
                vec![Value::from("1"), Value::from("2"), Value::from("3")],
            ],
        );
        assert_eq!(table.rows[0], vec![Value::from("1"), Value::empty()]);
        assert_eq!(table.rows[1].len(), 2);
        assert_eq!(table.cell(1, "b"), Some(&Value::from("2")));
    }
}
