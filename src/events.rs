//! Progress and log events emitted by pipeline workers.
//!
//! Workers never talk to a front end directly. They push [`SyncEvent`]s into
//! an [`EventSink`], which wraps the producer half of an mpsc channel; the
//! caller drains the receiver on its own loop. Log events are mirrored into
//! the `log` facade as they are emitted, so a sink without a receiver still
//! leaves a trail in the process log.

use std::{fmt, sync::mpsc::Sender};

use log::Level;

use crate::sync::{SyncOutcome, SyncState, UploadSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
    Debug,
}

impl Severity {
    fn log_level(self) -> Level {
        match self {
            Severity::Info | Severity::Success => Level::Info,
            Severity::Warning => Level::Warn,
            Severity::Error => Level::Error,
            Severity::Debug => Level::Debug,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "INFO",
            Severity::Success => "SUCCESS",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Debug => "DEBUG",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Log {
        severity: Severity,
        message: String,
    },
    /// Overall stage progress, 0-100.
    Progress {
        status: String,
        percent: f64,
    },
    /// Emitted after every successful upload batch.
    BatchUploaded {
        uploaded: usize,
        total: usize,
        percent: f64,
    },
    State(SyncState),
    ConfirmationRequested(UploadSummary),
    Finished(SyncOutcome),
}

#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<Sender<SyncEvent>>,
}

impl EventSink {
    pub fn new(tx: Sender<SyncEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink with no consumer; events only reach the process log.
    pub fn detached() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: SyncEvent) {
        if let Some(tx) = &self.tx {
            // A consumer that hung up is not the worker's problem.
            let _ = tx.send(event);
        }
    }

    pub fn log(&self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        log::log!(target: "stock_sync", severity.log_level(), "{message}");
        self.emit(SyncEvent::Log { severity, message });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Severity::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(Severity::Success, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(Severity::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(Severity::Error, message);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(Severity::Debug, message);
    }

    pub fn progress(&self, status: impl Into<String>, percent: f64) {
        self.emit(SyncEvent::Progress {
            status: status.into(),
            percent,
        });
    }

    pub fn state(&self, state: SyncState) {
        log::debug!(target: "stock_sync", "sync state -> {state:?}");
        self.emit(SyncEvent::State(state));
    }
}
