//! Clear-then-upload synchronization against a [`RemoteTable`].
//!
//! A run walks `Idle -> Processing -> AwaitingConfirmation -> Clearing ->
//! Uploading -> Finished`, with `Clearing` only in overwrite mode and
//! `Cancelled` reachable from confirmation onward. Every remote call goes
//! through the shared [`RetryPolicy`]; exhausting it aborts the phase and
//! leaves whatever already reached the remote side in place. Cancellation is
//! checked before every batch, before every attempt, during backoff sleeps
//! and while waiting for confirmation.

use std::{
    fmt,
    sync::{
        Arc,
        mpsc::{Receiver, TryRecvError},
    },
    time::{Duration, Instant},
};

use itertools::Itertools;

use crate::{
    cancel::CancelToken,
    coerce,
    data::{Table, Value},
    error::{RemoteError, SyncError, SyncPhase},
    events::{EventSink, SyncEvent},
    mapping::BRANCH,
    remote::{CellValue, ColumnId, RemoteCell, RemoteRow, RemoteSchema, RemoteTable},
    retry::{RetryError, RetryPolicy},
};

/// Upper bound on ids per delete call imposed by the remote API.
pub const DELETE_BATCH_LIMIT: usize = 400;
pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(30);
pub const CONFIRMATION_POLL: Duration = Duration::from_millis(100);
pub const RATE_LIMIT_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Processing,
    AwaitingConfirmation,
    Clearing,
    Uploading,
    Finished,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    Overwrite,
    Append,
}

impl fmt::Display for UploadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadMode::Overwrite => write!(f, "OVERWRITE (clears sheet first)"),
            UploadMode::Append => write!(f, "APPEND (adds to existing data)"),
        }
    }
}

/// What the user is asked to confirm before anything touches the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub rows: usize,
    pub unique_products: usize,
    pub unique_branches: usize,
    pub columns: Vec<String>,
    pub mode: UploadMode,
}

impl UploadSummary {
    pub fn from_table(table: &Table, mode: UploadMode) -> Self {
        let distinct = |idx: usize| {
            table
                .column_values(idx)
                .map(Value::as_display)
                .unique()
                .count()
        };
        Self {
            rows: table.len(),
            unique_products: if table.width() > 0 { distinct(0) } else { 0 },
            unique_branches: table.column_index(BRANCH).map(distinct).unwrap_or(0),
            columns: table.columns.clone(),
            mode,
        }
    }
}

impl fmt::Display for UploadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ready to upload {} rows.", self.rows)?;
        writeln!(f)?;
        writeln!(f, "Data summary:")?;
        writeln!(f, "  - Total rows: {}", self.rows)?;
        writeln!(f, "  - Unique products: {}", self.unique_products)?;
        writeln!(f, "  - Unique branches: {}", self.unique_branches)?;
        writeln!(f, "  - Upload mode: {}", self.mode)?;
        writeln!(f)?;
        writeln!(f, "Columns to upload:")?;
        write!(f, "{}", self.columns.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Success { rows_uploaded: usize },
    Cancelled,
    Failure { reason: String },
}

impl SyncOutcome {
    fn failure(reason: impl Into<String>) -> Self {
        SyncOutcome::Failure {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearReport {
    pub rows: usize,
    pub batches: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    pub batch_size: usize,
    pub retry: RetryPolicy,
    pub rate_limit_delay: Duration,
    pub mode: UploadMode,
    pub confirmation_timeout: Duration,
    pub confirmation_poll: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::default(),
            rate_limit_delay: RATE_LIMIT_DELAY,
            mode: UploadMode::Overwrite,
            confirmation_timeout: CONFIRMATION_TIMEOUT,
            confirmation_poll: CONFIRMATION_POLL,
        }
    }
}

/// Source of the yes/no decision taken before an upload starts.
pub trait Confirm: Send {
    /// Called once with the summary before polling begins.
    fn ask(&mut self, _summary: &UploadSummary) {}

    /// `Some(answer)` once a decision exists.
    fn poll(&mut self) -> Option<bool>;
}

#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    fn poll(&mut self) -> Option<bool> {
        Some(self.0)
    }
}

/// Answers arrive on a channel from another thread. A sender that hangs up
/// without answering counts as a decline.
#[derive(Debug)]
pub struct ChannelConfirm {
    rx: Receiver<bool>,
}

impl ChannelConfirm {
    pub fn new(rx: Receiver<bool>) -> Self {
        Self { rx }
    }
}

impl Confirm for ChannelConfirm {
    fn poll(&mut self) -> Option<bool> {
        match self.rx.try_recv() {
            Ok(answer) => Some(answer),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(false),
        }
    }
}

pub struct SyncEngine {
    remote: Arc<dyn RemoteTable>,
    schema: RemoteSchema,
    settings: SyncSettings,
    sink: EventSink,
    cancel: CancelToken,
}

impl SyncEngine {
    pub fn new(
        remote: Arc<dyn RemoteTable>,
        schema: RemoteSchema,
        settings: SyncSettings,
        sink: EventSink,
        cancel: CancelToken,
    ) -> Self {
        Self {
            remote,
            schema,
            settings,
            sink,
            cancel,
        }
    }

    /// Fetches the remote schema (retried) and builds an engine around it.
    pub fn connect(
        remote: Arc<dyn RemoteTable>,
        settings: SyncSettings,
        sink: EventSink,
        cancel: CancelToken,
    ) -> Result<Self, SyncError> {
        let schema = fetch_schema(remote.as_ref(), &settings.retry, &sink, &cancel)?;
        Ok(Self::new(remote, schema, settings, sink, cancel))
    }

    pub fn schema(&self) -> &RemoteSchema {
        &self.schema
    }

    /// Runs the whole session. `source` produces the normalized table; the
    /// returned outcome is also emitted as [`SyncEvent::Finished`].
    pub fn run<F, E>(&self, source: F, confirm: &mut dyn Confirm) -> SyncOutcome
    where
        F: FnOnce(&EventSink) -> Result<Table, E>,
        E: fmt::Display,
    {
        self.sink.state(SyncState::Idle);
        self.sink.info("=== Starting upload ===");
        let outcome = self.run_phases(source, confirm);
        match &outcome {
            SyncOutcome::Success { rows_uploaded } => {
                self.sink.success("=== Upload completed successfully ===");
                self.sink
                    .progress(format!("Complete! {rows_uploaded} rows uploaded"), 100.0);
                self.sink.state(SyncState::Finished);
            }
            SyncOutcome::Cancelled => {
                self.sink.warning("Upload cancelled by user");
                self.sink.state(SyncState::Cancelled);
            }
            SyncOutcome::Failure { reason } => {
                self.sink.error(format!("Upload failed: {reason}"));
                self.sink.state(SyncState::Finished);
            }
        }
        self.sink.emit(SyncEvent::Finished(outcome.clone()));
        outcome
    }

    fn run_phases<F, E>(&self, source: F, confirm: &mut dyn Confirm) -> SyncOutcome
    where
        F: FnOnce(&EventSink) -> Result<Table, E>,
        E: fmt::Display,
    {
        self.sink.state(SyncState::Processing);
        self.sink.progress("Processing data...", 10.0);
        let table = match source(&self.sink) {
            Ok(table) if table.is_empty() => {
                self.sink.error("No data to upload");
                return SyncOutcome::failure("no data to upload");
            }
            Ok(table) => table,
            Err(err) => {
                self.sink.error(format!("Error processing input: {err}"));
                return SyncOutcome::failure(err.to_string());
            }
        };
        self.sink
            .success(format!("Processed {} rows for upload", table.len()));

        self.sink.progress("Awaiting confirmation...", 20.0);
        if !self.await_confirmation(&table, confirm) {
            return SyncOutcome::Cancelled;
        }
        self.sink.info("Upload confirmed - proceeding...");

        match self.transfer(&table) {
            Ok(rows_uploaded) => SyncOutcome::Success { rows_uploaded },
            Err(SyncError::Cancelled) => SyncOutcome::Cancelled,
            Err(err) => SyncOutcome::failure(err.to_string()),
        }
    }

    fn transfer(&self, table: &Table) -> Result<usize, SyncError> {
        if self.settings.mode == UploadMode::Overwrite {
            self.sink.progress("Clearing existing sheet data...", 30.0);
            self.clear()?;
        }
        self.sink.progress("Uploading data...", 40.0);
        self.upload(table)
    }

    /// Blocks the worker until a decision arrives, the timeout passes, or
    /// the run is cancelled. Only an explicit yes returns `true`.
    fn await_confirmation(&self, table: &Table, confirm: &mut dyn Confirm) -> bool {
        self.sink.state(SyncState::AwaitingConfirmation);
        let summary = UploadSummary::from_table(table, self.settings.mode);
        self.sink
            .emit(SyncEvent::ConfirmationRequested(summary.clone()));
        confirm.ask(&summary);

        let deadline = Instant::now() + self.settings.confirmation_timeout;
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            if let Some(answer) = confirm.poll() {
                return answer;
            }
            if Instant::now() >= deadline {
                self.sink
                    .warning("No confirmation received in time; upload not started");
                return false;
            }
            if !self.cancel.sleep(self.settings.confirmation_poll) {
                return false;
            }
        }
    }

    /// Deletes every existing row in batches of at most
    /// [`DELETE_BATCH_LIMIT`] ids.
    pub fn clear(&self) -> Result<ClearReport, SyncError> {
        self.sink.state(SyncState::Clearing);
        self.sink.info("Clearing existing sheet data...");
        let ids = self.with_retry(SyncPhase::Clear, "getting sheet rows", |_| {
            self.remote.row_ids()
        })?;
        if ids.is_empty() {
            self.sink.info("No existing rows to clear");
            return Ok(ClearReport {
                rows: 0,
                batches: 0,
            });
        }

        let batches = ids.len().div_ceil(DELETE_BATCH_LIMIT);
        self.sink
            .info(format!("Clearing {} rows in {batches} batches", ids.len()));
        for (idx, chunk) in ids.chunks(DELETE_BATCH_LIMIT).enumerate() {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let what = format!("deleting batch {}/{batches}", idx + 1);
            self.with_retry(SyncPhase::Clear, &what, |_| self.remote.delete_rows(chunk))?;
            self.sink.info(format!(
                "Cleared batch {}/{batches}: {} rows",
                idx + 1,
                chunk.len()
            ));
            if idx + 1 < batches {
                self.pause()?;
            }
        }
        self.sink.success(format!(
            "Successfully cleared all {} existing rows",
            ids.len()
        ));
        Ok(ClearReport {
            rows: ids.len(),
            batches,
        })
    }

    /// Appends `table` in batches of `batch_size` rows and returns the number
    /// of rows submitted.
    pub fn upload(&self, table: &Table) -> Result<usize, SyncError> {
        self.sink.state(SyncState::Uploading);
        let total = table.len();
        let batch_size = self.settings.batch_size.max(1);
        let batches = total.div_ceil(batch_size);
        self.sink
            .info(format!("Starting upload: {total} rows in {batches} batches"));

        let targets = column_targets(&table.columns, &self.schema);
        let skipped = table
            .columns
            .iter()
            .zip(&targets)
            .filter(|(_, target)| target.is_none())
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>();
        if !skipped.is_empty() {
            self.sink.warning(format!(
                "Columns not present in the sheet will be skipped: {}",
                skipped.join(", ")
            ));
        }

        let mut processed = 0;
        let mut submitted = 0;
        for (idx, chunk) in table.rows.chunks(batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let rows = chunk
                .iter()
                .filter_map(|row| build_remote_row(row, &targets))
                .collect::<Vec<_>>();
            if rows.is_empty() {
                self.sink.debug(format!(
                    "Batch {}/{batches} has no cells to send; skipped",
                    idx + 1
                ));
            } else {
                let what = format!("uploading batch {}/{batches}", idx + 1);
                self.with_retry(SyncPhase::Upload, &what, |_| self.remote.add_rows(&rows))?;
            }

            processed += chunk.len();
            submitted += rows.len();
            let percent = processed as f64 / total as f64 * 100.0;
            self.sink.success(format!(
                "Batch {}/{batches}: {} rows uploaded (Total: {submitted}, {percent:.1}%)",
                idx + 1,
                rows.len()
            ));
            self.sink.emit(SyncEvent::BatchUploaded {
                uploaded: processed,
                total,
                percent,
            });
            self.sink.progress(
                format!("Uploading: {processed}/{total} rows"),
                40.0 + percent * 0.5,
            );
            if idx + 1 < batches {
                self.pause()?;
            }
        }
        Ok(submitted)
    }

    fn pause(&self) -> Result<(), SyncError> {
        if self.cancel.sleep(self.settings.rate_limit_delay) {
            Ok(())
        } else {
            Err(SyncError::Cancelled)
        }
    }

    fn with_retry<T>(
        &self,
        phase: SyncPhase,
        what: &str,
        op: impl FnMut(u32) -> Result<T, RemoteError>,
    ) -> Result<T, SyncError> {
        retry_phase(&self.settings.retry, &self.sink, &self.cancel, phase, what, op)
    }
}

/// Reads the remote schema with the retry budget of the connect phase.
pub fn fetch_schema(
    remote: &dyn RemoteTable,
    retry: &RetryPolicy,
    sink: &EventSink,
    cancel: &CancelToken,
) -> Result<RemoteSchema, SyncError> {
    let schema = retry_phase(retry, sink, cancel, SyncPhase::Connect, "getting sheet", |_| {
        remote.schema()
    })?;
    sink.success(format!("Connected to: {}", schema.sheet_name));
    sink.info(format!("Sheet has {} columns", schema.columns.len()));
    sink.info(format!("Sheet columns: {}", schema.titles().join(", ")));
    Ok(schema)
}

fn retry_phase<T>(
    retry: &RetryPolicy,
    sink: &EventSink,
    cancel: &CancelToken,
    phase: SyncPhase,
    what: &str,
    op: impl FnMut(u32) -> Result<T, RemoteError>,
) -> Result<T, SyncError> {
    retry.run(cancel, sink, what, op).map_err(|err| match err {
        RetryError::Cancelled => SyncError::Cancelled,
        RetryError::Exhausted { attempts, last } => {
            if last.is_timeout() {
                sink.error(format!("Timed out {what} after {attempts} attempt(s)"));
            }
            SyncError::RetriesExhausted {
                phase,
                context: what.to_string(),
                attempts,
                source: last,
            }
        }
    })
}

/// Remote column id and numeric flag for each table column, `None` when the
/// sheet has no column by that name.
pub fn column_targets(columns: &[String], schema: &RemoteSchema) -> Vec<Option<(ColumnId, bool)>> {
    columns
        .iter()
        .map(|name| {
            schema
                .column_id(name)
                .map(|id| (id, coerce::is_numeric_column(name)))
        })
        .collect()
}

/// One remote row per table row, or `None` when no cell survives.
pub fn build_remote_row(row: &[Value], targets: &[Option<(ColumnId, bool)>]) -> Option<RemoteRow> {
    let cells = row
        .iter()
        .zip(targets)
        .filter_map(|(value, target)| {
            let (column_id, numeric) = (*target)?;
            if value.is_blank() {
                return None;
            }
            let value = if numeric {
                numeric_cell(value)
            } else {
                CellValue::Text(value.as_display().trim().to_string())
            };
            Some(RemoteCell { column_id, value })
        })
        .collect::<Vec<_>>();
    (!cells.is_empty()).then(|| RemoteRow::new(cells))
}

fn numeric_cell(value: &Value) -> CellValue {
    let number = match value {
        Value::Integer(i) => return CellValue::Integer(*i),
        Value::Float(f) => *f,
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => f,
            _ => return CellValue::Text(s.trim().to_string()),
        },
    };
    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        CellValue::Integer(number as i64)
    } else {
        CellValue::Float(number)
    }
}
