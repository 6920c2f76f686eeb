#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rust_xlsxwriter::Workbook;
use stock_sync::cancel::CancelToken;
use stock_sync::data::{Table, Value};
use stock_sync::error::RemoteError;
use stock_sync::remote::{RemoteColumn, RemoteRow, RemoteSchema, RemoteTable, RowId};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Settings file inside the workspace, so tests never touch the home
    /// directory.
    pub fn settings_path(&self) -> PathBuf {
        self.temp_dir.path().join("settings.json")
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes a single-sheet workbook. Cells that parse as numbers are
    /// stored as numbers, empty cells are left blank.
    pub fn write_xlsx(&self, name: &str, rows: &[&[&str]]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if cell.is_empty() {
                    continue;
                }
                let (r, c) = (r as u32, c as u16);
                match cell.parse::<f64>() {
                    Ok(number) => sheet.write_number(r, c, number),
                    Err(_) => sheet.write_string(r, c, *cell),
                }
                .expect("write cell");
            }
        }
        workbook.save(&path).expect("save workbook");
        path
    }
}

/// Typical inventory export: a category row over a detail row, then data
/// and a grand total footer.
pub const EXPORT_ROWS: &[&[&str]] = &[
    &[
        "ProductCode",
        "Description",
        "Branch",
        "4 - SOH",
        "5 - Incoming",
        "6 - Open Sales",
        "7 - Grand Total",
    ],
    &["", "", "", "Stock Qty", "Stock Qty", "Stock Qty", "Stock Qty"],
    &["A100", "Widget", "Main", "1,200", "10", "50", "1,160"],
    &["B200", "Gadget", "North", "abc", "0", "5", "0"],
    &["C300", "Gizmo", "Main", "7.5", "", "2", "5.5"],
    &["Grand Total", "", "", "1207.5", "10", "57", "1165.5"],
];

pub fn export_csv() -> String {
    EXPORT_ROWS
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| {
                    if cell.contains(',') {
                        format!("\"{cell}\"")
                    } else {
                        cell.to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub const CANONICAL_TITLES: &[&str] = &[
    "ProductCode",
    "Product",
    "Branch",
    "SOH",
    "Incoming NOT paid",
    "Open Sales",
    "Grand Total",
    "Available",
];

/// Canonical table with `rows` generated inventory lines.
pub fn inventory_table(rows: usize) -> Table {
    Table::from_rows(
        CANONICAL_TITLES.iter().map(|t| t.to_string()).collect(),
        (0..rows)
            .map(|idx| {
                vec![
                    Value::from(format!("P{idx:04}")),
                    Value::from(format!("Product {idx}")),
                    Value::from(if idx % 2 == 0 { "Main" } else { "North" }),
                    Value::Integer(idx as i64 + 10),
                    Value::Integer(0),
                    Value::Integer(3),
                    Value::Integer(idx as i64 + 10),
                    Value::Integer(idx as i64 + 7),
                ]
            })
            .collect(),
    )
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub existing_ids: Vec<RowId>,
    pub stored: Vec<RemoteRow>,
    /// Row count of every successful add call, in order.
    pub add_batches: Vec<usize>,
    /// Id count of every successful delete call, in order.
    pub delete_batches: Vec<usize>,
    pub add_attempts: usize,
    pub schema_attempts: usize,
    /// The next N add attempts time out.
    pub transient_add_failures: usize,
    /// The next N schema reads fail.
    pub schema_failures: usize,
    /// Every attempt at this (1-based) add batch fails.
    pub failing_add_batch: Option<usize>,
    /// Cancels the token once this many batches are stored.
    pub cancel_after_adds: Option<(usize, CancelToken)>,
    pub delete_attempts: usize,
    /// The next N delete attempts time out.
    pub transient_delete_failures: usize,
    /// Every attempt at this (1-based) delete batch fails.
    pub failing_delete_batch: Option<usize>,
    /// Cancels the token once this many delete batches succeed.
    pub cancel_after_deletes: Option<(usize, CancelToken)>,
}

/// In-memory remote sheet with failure injection.
pub struct FakeRemote {
    pub schema: RemoteSchema,
    pub state: Mutex<FakeState>,
}

impl FakeRemote {
    pub fn new(titles: &[&str]) -> Self {
        Self {
            schema: RemoteSchema {
                sheet_name: "Inventory".into(),
                columns: titles
                    .iter()
                    .enumerate()
                    .map(|(idx, title)| RemoteColumn {
                        id: 1000 + idx as u64,
                        title: title.to_string(),
                    })
                    .collect(),
                total_row_count: 0,
            },
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn canonical() -> Self {
        Self::new(CANONICAL_TITLES)
    }

    pub fn with_existing_rows(self, count: usize) -> Self {
        self.state.lock().unwrap().existing_ids = (1..=count as u64).collect();
        self
    }

    pub fn configure(&self, f: impl FnOnce(&mut FakeState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn snapshot<T>(&self, f: impl FnOnce(&FakeState) -> T) -> T {
        f(&self.state.lock().unwrap())
    }
}

impl RemoteTable for FakeRemote {
    fn schema(&self) -> Result<RemoteSchema, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.schema_attempts += 1;
        if state.schema_failures > 0 {
            state.schema_failures -= 1;
            return Err(RemoteError::Network("connection reset".into()));
        }
        Ok(RemoteSchema {
            total_row_count: state.existing_ids.len(),
            ..self.schema.clone()
        })
    }

    fn row_ids(&self) -> Result<Vec<RowId>, RemoteError> {
        Ok(self.state.lock().unwrap().existing_ids.clone())
    }

    fn delete_rows(&self, ids: &[RowId]) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.delete_attempts += 1;
        if state.transient_delete_failures > 0 {
            state.transient_delete_failures -= 1;
            return Err(RemoteError::Timeout("read timed out".into()));
        }
        let batch = state.delete_batches.len() + 1;
        if state.failing_delete_batch == Some(batch) {
            return Err(RemoteError::Service {
                status: 429,
                message: "rate limit exceeded".into(),
            });
        }
        state.existing_ids.retain(|id| !ids.contains(id));
        state.delete_batches.push(ids.len());
        if let Some((after, token)) = &state.cancel_after_deletes
            && state.delete_batches.len() == *after
        {
            token.cancel();
        }
        Ok(())
    }

    fn add_rows(&self, rows: &[RemoteRow]) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.add_attempts += 1;
        if state.transient_add_failures > 0 {
            state.transient_add_failures -= 1;
            return Err(RemoteError::Timeout("read timed out".into()));
        }
        let batch = state.add_batches.len() + 1;
        if state.failing_add_batch == Some(batch) {
            return Err(RemoteError::Service {
                status: 500,
                message: "internal error".into(),
            });
        }
        state.stored.extend_from_slice(rows);
        state.add_batches.push(rows.len());
        if let Some((after, token)) = &state.cancel_after_adds
            && state.add_batches.len() == *after
        {
            token.cancel();
        }
        Ok(())
    }
}
