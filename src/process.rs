//! The normalization pipeline: reading selection, mapping, coercion and row
//! filtering, plus the lightweight file analysis used before an upload.

use std::path::Path;

use crate::{
    coerce,
    data::Table,
    error::InputError,
    events::EventSink,
    filter,
    header::{self, SheetReading},
    io_utils::{self, ReadOptions},
    mapping,
};

const INDICATOR_PATTERNS: &[&str] = &["productcode", "branch", "soh", "stock qty", "grand total"];
const INDICATORS_SHOWN: usize = 5;

/// Toggles for one processing run. Verbatim mode keeps the reconciled
/// dual-header table and skips mapping and filtering; `column_mapping` only
/// matters when verbatim mode is off.
#[derive(Debug, Clone, Copy)]
pub struct ProcessOptions {
    pub verbatim: bool,
    pub column_mapping: bool,
    pub read: ReadOptions,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            verbatim: true,
            column_mapping: true,
            read: ReadOptions::default(),
        }
    }
}

pub fn process_reading(
    reading: &SheetReading,
    options: &ProcessOptions,
    sink: &EventSink,
) -> Table {
    let (mut table, dual) = header::select_reading(reading, options.verbatim);
    if options.verbatim {
        sink.info("Using verbatim mode - preserving all data structure");
    } else {
        sink.info("Using standard mode with header processing");
    }
    if dual {
        sink.info("Processed multi-level headers");
    }

    if !options.verbatim && options.column_mapping {
        table = mapping::map_columns(&table, sink);
    }
    table = coerce::coerce_table(table, sink);
    if !options.verbatim {
        table = filter::apply(table, sink);
    }

    sink.success(format!(
        "Final processed data: {} rows, {} columns",
        table.len(),
        table.width()
    ));
    table
}

pub fn process_file(
    path: &Path,
    options: &ProcessOptions,
    sink: &EventSink,
) -> Result<Table, InputError> {
    sink.info(format!("Processing '{}'", path.display()));
    let reading = io_utils::read_input(path, &options.read)?;
    Ok(process_reading(&reading, options, sink))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAnalysis {
    pub rows: usize,
    pub columns: usize,
    pub dual_header: bool,
    pub indicators: Vec<String>,
}

/// Labels of the single-header reading that look like inventory columns.
pub fn detect_indicators(columns: &[String]) -> Vec<String> {
    columns
        .iter()
        .filter(|column| {
            let lowered = column.to_lowercase();
            INDICATOR_PATTERNS
                .iter()
                .any(|pattern| lowered.contains(pattern))
        })
        .cloned()
        .collect()
}

pub fn analyze_reading(reading: &SheetReading, sink: &EventSink) -> FileAnalysis {
    let dual_header = reading.dual.is_some();
    if dual_header {
        sink.success("Detected dual-header structure");
    } else {
        sink.info("Using single-header structure");
    }
    let table = header::reconcile(&reading.single);
    let analysis = FileAnalysis {
        rows: table.len(),
        columns: table.width(),
        dual_header,
        indicators: detect_indicators(&table.columns),
    };

    sink.success("File analysis complete:");
    sink.info(format!("  - Total rows: {}", analysis.rows));
    sink.info(format!("  - Total columns: {}", analysis.columns));
    if analysis.indicators.is_empty() {
        sink.warning("  - Warning: Standard inventory columns not clearly detected");
    } else {
        sink.success(format!(
            "  - Inventory columns detected: {}",
            analysis.indicators.len()
        ));
        for column in analysis.indicators.iter().take(INDICATORS_SHOWN) {
            sink.info(format!("    * {column}"));
        }
        if analysis.indicators.len() > INDICATORS_SHOWN {
            sink.info(format!(
                "    ... and {} more",
                analysis.indicators.len() - INDICATORS_SHOWN
            ));
        }
    }
    analysis
}

pub fn analyze(
    path: &Path,
    options: &ReadOptions,
    sink: &EventSink,
) -> Result<FileAnalysis, InputError> {
    sink.info("Analyzing file structure...");
    let reading = io_utils::read_input(path, options)?;
    Ok(analyze_reading(&reading, sink))
}
