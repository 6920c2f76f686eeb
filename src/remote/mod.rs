//! Remote table abstraction.
//!
//! The sync engine only needs four calls from a remote spreadsheet: read the
//! column schema, list row ids, delete rows and append rows. [`RemoteTable`]
//! captures exactly that so the engine can run against the Smartsheet client
//! in production and an in-memory fake in tests.

pub mod smartsheet;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

pub use smartsheet::SmartsheetClient;

pub type RowId = u64;
pub type ColumnId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteColumn {
    pub id: ColumnId,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSchema {
    pub sheet_name: String,
    pub columns: Vec<RemoteColumn>,
    pub total_row_count: usize,
}

impl RemoteSchema {
    /// Column id for `title`. When the sheet carries the same title twice
    /// the right-most column wins.
    pub fn column_id(&self, title: &str) -> Option<ColumnId> {
        self.columns
            .iter()
            .rev()
            .find(|column| column.title == title)
            .map(|column| column.id)
    }

    pub fn titles(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.title.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCell {
    pub column_id: ColumnId,
    pub value: CellValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRow {
    pub to_bottom: bool,
    pub cells: Vec<RemoteCell>,
}

impl RemoteRow {
    pub fn new(cells: Vec<RemoteCell>) -> Self {
        Self {
            to_bottom: true,
            cells,
        }
    }
}

pub trait RemoteTable: Send + Sync {
    fn schema(&self) -> Result<RemoteSchema, RemoteError>;
    fn row_ids(&self) -> Result<Vec<RowId>, RemoteError>;
    fn delete_rows(&self, ids: &[RowId]) -> Result<(), RemoteError>;
    fn add_rows(&self, rows: &[RemoteRow]) -> Result<(), RemoteError>;
}

static NINETEEN_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{19}").expect("valid sheet id pattern"));
static LONG_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{10,}").expect("valid sheet id pattern"));

/// Pulls a sheet id out of a sheet URL, a publish link, or a bare id.
pub fn extract_sheet_id(url: &str) -> Option<String> {
    let url = url.trim();
    let segment = if let Some((_, rest)) = url.split_once("/sheets/") {
        rest.split(['?', '/', '#']).next()
    } else if let Some((_, rest)) = url.split_once("EQBCT=") {
        rest.split('&').next()
    } else {
        NINETEEN_DIGITS
            .find(url)
            .or_else(|| LONG_DIGITS.find(url))
            .map(|m| m.as_str())
    };
    segment
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_ids_come_from_urls_and_bare_ids() {
        assert_eq!(
            extract_sheet_id("https://app.smartsheet.com/sheets/AbC123xyz?view=grid").as_deref(),
            Some("AbC123xyz")
        );
        assert_eq!(
            extract_sheet_id("https://publish.smartsheet.com/b/publish?EQBCT=f00d&x=1").as_deref(),
            Some("f00d")
        );
        assert_eq!(
            extract_sheet_id("sheet 1234567890123456789 copy").as_deref(),
            Some("1234567890123456789")
        );
        assert_eq!(extract_sheet_id("id=4455667788").as_deref(), Some("4455667788"));
        assert_eq!(extract_sheet_id("https://example.com/nothing"), None);
        assert_eq!(extract_sheet_id("https://app.smartsheet.com/sheets/"), None);
    }

    #[test]
    fn duplicate_titles_resolve_to_the_last_column() {
        let schema = RemoteSchema {
            sheet_name: "Stock".into(),
            columns: vec![
                RemoteColumn { id: 1, title: "SOH".into() },
                RemoteColumn { id: 2, title: "Branch".into() },
                RemoteColumn { id: 3, title: "SOH".into() },
            ],
            total_row_count: 0,
        };
        assert_eq!(schema.column_id("SOH"), Some(3));
        assert_eq!(schema.column_id("Branch"), Some(2));
        assert_eq!(schema.column_id("Missing"), None);
    }

    #[test]
    fn rows_serialize_in_api_shape() {
        let row = RemoteRow::new(vec![
            RemoteCell { column_id: 7, value: CellValue::Integer(12) },
            RemoteCell { column_id: 8, value: CellValue::Text("Main".into()) },
        ]);
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "toBottom": true,
                "cells": [
                    {"columnId": 7, "value": 12},
                    {"columnId": 8, "value": "Main"}
                ]
            })
        );
    }
}
