mod common;

use std::sync::mpsc;

use common::{EXPORT_ROWS, TestWorkspace, export_csv};
use stock_sync::data::Value;
use stock_sync::events::{EventSink, Severity, SyncEvent};
use stock_sync::io_utils::{self, ReadOptions};
use stock_sync::process::{self, ProcessOptions};

fn standard() -> ProcessOptions {
    ProcessOptions {
        verbatim: false,
        column_mapping: true,
        read: ReadOptions::default(),
    }
}

fn display(value: Option<&Value>) -> String {
    value.map(Value::as_display).unwrap_or_default()
}

#[test]
fn workbook_export_is_mapped_coerced_and_filtered() {
    let ws = TestWorkspace::new();
    let path = ws.write_xlsx("stock.xlsx", EXPORT_ROWS);
    let table = process::process_file(&path, &standard(), &EventSink::detached()).unwrap();

    assert_eq!(
        table.columns,
        vec![
            "ProductCode",
            "Product",
            "Branch",
            "SOH",
            "Incoming NOT paid",
            "Open Sales",
            "Grand Total",
            "Available"
        ]
    );
    assert_eq!(table.len(), 3);
    let codes = table
        .rows
        .iter()
        .map(|row| row[0].as_display())
        .collect::<Vec<_>>();
    assert_eq!(codes, vec!["A100", "B200", "C300"]);
    assert_eq!(display(table.cell(0, "SOH")), "1200");
    assert_eq!(display(table.cell(0, "Available")), "1150");
    assert_eq!(display(table.cell(1, "Available")), "-5");
    assert_eq!(display(table.cell(2, "Available")), "5.5");
    assert!(table.cell(0, "SOH").is_some_and(Value::is_numeric));
    assert!(table.cell(0, "Branch").is_some_and(|v| !v.is_numeric()));
}

#[test]
fn workbook_verbatim_mode_keeps_reconciled_headers() {
    let ws = TestWorkspace::new();
    let path = ws.write_xlsx("stock.xlsx", EXPORT_ROWS);
    let table =
        process::process_file(&path, &ProcessOptions::default(), &EventSink::detached()).unwrap();
    assert_eq!(table.columns[0], "ProductCode");
    assert_eq!(table.columns[3], "4 - SOH_Stock Qty");
    assert_eq!(table.columns[6], "7 - Grand Total_Stock Qty");
    // footer rows are kept verbatim
    assert_eq!(table.len(), 4);
    assert_eq!(display(table.cell(3, "ProductCode")), "Grand Total");
}

#[test]
fn csv_export_uses_the_single_header_reading() {
    let ws = TestWorkspace::new();
    let path = ws.write("stock.csv", &export_csv());
    let reading = io_utils::read_input(&path, &ReadOptions::default()).unwrap();
    assert!(reading.dual.is_none());

    let table = process::process_file(&path, &standard(), &EventSink::detached()).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(display(table.cell(0, "SOH")), "1200");
    assert_eq!(display(table.cell(2, "Incoming NOT paid")), "0");
}

#[test]
fn missing_canonical_columns_warn_and_default() {
    let ws = TestWorkspace::new();
    let path = ws.write("partial.csv", "ProductCode,Qty On Hand\nA1,4\nB2,5\n");
    let (tx, rx) = mpsc::channel();
    let table = process::process_file(&path, &standard(), &EventSink::new(tx)).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(display(table.cell(0, "Branch")), "N/A");
    assert_eq!(display(table.cell(0, "SOH")), "0");

    let warnings = rx
        .try_iter()
        .filter_map(|event| match event {
            SyncEvent::Log {
                severity: Severity::Warning,
                message,
            } => Some(message),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert!(
        warnings
            .iter()
            .any(|m| m.contains("Branch") && m.contains("Default value"))
    );
}

#[test]
fn analysis_reports_structure_and_indicators() {
    let ws = TestWorkspace::new();
    let path = ws.write_xlsx("stock.xlsx", EXPORT_ROWS);
    let analysis =
        process::analyze(&path, &ReadOptions::default(), &EventSink::detached()).unwrap();
    assert!(analysis.dual_header);
    assert_eq!(analysis.rows, 5);
    assert_eq!(analysis.columns, 7);
    assert_eq!(
        analysis.indicators,
        vec!["ProductCode", "Branch", "4 - SOH", "7 - Grand Total"]
    );
}

#[test]
fn latin1_text_input_is_decoded() {
    let ws = TestWorkspace::new();
    let path = ws.path().join("latin1.csv");
    let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode("ProductCode,Description\nA1,Caf\u{e9}\n");
    std::fs::write(&path, bytes).unwrap();
    let options = ProcessOptions {
        read: ReadOptions {
            delimiter: None,
            encoding: io_utils::resolve_encoding(Some("windows-1252")).unwrap(),
        },
        column_mapping: false,
        ..standard()
    };
    let table = process::process_file(&path, &options, &EventSink::detached()).unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(display(table.cell(0, "Description")), "Caf\u{e9}");
}

#[test]
fn unreadable_input_is_an_error() {
    let ws = TestWorkspace::new();
    let missing = ws.path().join("absent.csv");
    assert!(process::process_file(&missing, &standard(), &EventSink::detached()).is_err());
}
