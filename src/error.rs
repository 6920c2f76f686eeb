//! Error taxonomy for the normalization and sync pipeline.
//!
//! Each family carries its own recovery policy:
//!
//! - [`InputError`]: reading failed. Dual-header problems fall back to the
//!   single-header reading; anything else surfaces as an empty result.
//! - [`MappingError`]: a single column could not be mapped or coerced. The
//!   column gets a default and the pass continues.
//! - [`RemoteError`]: a remote call failed. Always retried with linear
//!   backoff up to the configured budget.
//! - [`SyncError`]: a phase aborted. Retries exhausted or cancellation.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Opening input file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Reading delimited input {path:?}: {source}")]
    Delimited {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Reading workbook {path:?}: {message}")]
    Workbook { path: PathBuf, message: String },
    #[error("Workbook {path:?} does not contain any worksheet")]
    NoWorksheet { path: PathBuf },
    #[error("Failed to decode text with encoding {encoding}")]
    Decode { encoding: &'static str },
    #[error("Unknown encoding '{0}'")]
    UnknownEncoding(String),
    #[error("Input {path:?} has no header row")]
    Empty { path: PathBuf },
}

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Row {row} has no cell for column '{column}'")]
    MissingCell { row: usize, column: String },
    #[error("Column '{0}' not found")]
    MissingColumn(String),
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Service returned {status}: {message}")]
    Service { status: u16, message: String },
    #[error("Unexpected response payload: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RemoteError::Timeout(_))
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout(err.to_string())
        } else if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            RemoteError::Service {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            RemoteError::Network(err.to_string())
        }
    }
}

/// Phase of the sync that a fatal error aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Connect,
    Clear,
    Upload,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncPhase::Connect => write!(f, "connect"),
            SyncPhase::Clear => write!(f, "clear"),
            SyncPhase::Upload => write!(f, "upload"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{phase} failed after {attempts} attempt(s) ({context}): {source}")]
    RetriesExhausted {
        phase: SyncPhase,
        context: String,
        attempts: u32,
        #[source]
        source: RemoteError,
    },
    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Reading settings from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Writing settings to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Parsing settings in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
