//! Input readers for inventory exports.
//!
//! Two families of input are supported:
//!
//! - **Workbooks** (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`) read through
//!   `calamine`. The first worksheet is read once and exposed both as a
//!   single-header reading and, when it has at least two rows, as a
//!   dual-header reading.
//! - **Delimited text** read through `csv`, with extension-based delimiter
//!   detection (`.tsv` → tab, anything else → comma), a manual override,
//!   and input decoding via `encoding_rs`. Delimited text only ever carries
//!   a single header row.
//!
//! The `-` path reads delimited text from stdin.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use calamine::{Data, Reader, open_workbook_auto};
use encoding_rs::{Encoding, UTF_8};

use crate::{
    data::Value,
    error::InputError,
    header::{ColumnLabel, RawSheet, SheetReading, pair_labels},
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Workbook,
    Delimited,
}

#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
        }
    }
}

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding, InputError> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| InputError::UnknownEncoding(value.to_string()))
    } else {
        Ok(UTF_8)
    }
}

pub fn detect_format(path: &Path) -> InputFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext)
            if WORKBOOK_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known)) =>
        {
            InputFormat::Workbook
        }
        _ => InputFormat::Delimited,
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn read_input(path: &Path, options: &ReadOptions) -> Result<SheetReading, InputError> {
    match detect_format(path) {
        InputFormat::Workbook => read_workbook(path),
        InputFormat::Delimited => read_delimited(path, options),
    }
}

pub fn read_workbook(path: &Path) -> Result<SheetReading, InputError> {
    let mut workbook = open_workbook_auto(path).map_err(|err| InputError::Workbook {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| InputError::NoWorksheet {
            path: path.to_path_buf(),
        })?
        .map_err(|err| InputError::Workbook {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
    let grid = range
        .rows()
        .map(|row| row.iter().map(cell_to_value).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    sheet_reading_from_grid(grid, true).ok_or_else(|| InputError::Empty {
        path: path.to_path_buf(),
    })
}

pub fn read_delimited(path: &Path, options: &ReadOptions) -> Result<SheetReading, InputError> {
    let delimiter = resolve_input_delimiter(path, options.delimiter);
    let source: Box<dyn Read> = if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(File::open(path).map_err(|source| {
            InputError::Open {
                path: path.to_path_buf(),
                source,
            }
        })?))
    };
    let mut reader = open_csv_reader(source, delimiter);
    let mut grid = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(|source| InputError::Delimited {
            path: path.to_path_buf(),
            source,
        })?;
        let fields = decode_record(&record, options.encoding)?;
        grid.push(fields.into_iter().map(Value::String).collect());
    }
    sheet_reading_from_grid(grid, false).ok_or_else(|| InputError::Empty {
        path: path.to_path_buf(),
    })
}

/// Exports are frequently ragged (footer rows with a single cell), so the
/// reader is flexible and headers are handled by the caller.
pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String, InputError> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(InputError::Decode {
            encoding: encoding.name(),
        })
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
) -> Result<Vec<String>, InputError> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::String(v) => Value::String(v.clone()),
        Data::Float(v) => Value::Float(*v),
        Data::Int(v) => Value::Integer(*v),
        Data::Bool(v) => Value::String(v.to_string()),
        Data::Empty => Value::empty(),
        Data::Error(v) => Value::String(format!("{v:?}")),
        other => Value::String(other.to_string()),
    }
}

/// Splits a raw grid into the single-header and (optionally) dual-header
/// readings. Returns `None` when the grid has no rows at all.
pub fn sheet_reading_from_grid(
    mut grid: Vec<Vec<Value>>,
    allow_dual: bool,
) -> Option<SheetReading> {
    while grid.last().is_some_and(|row| row.iter().all(Value::is_blank)) {
        grid.pop();
    }
    if grid.is_empty() {
        return None;
    }
    let header_text = |row: &[Value]| row.iter().map(Value::as_display).collect::<Vec<_>>();

    let dual = if allow_dual && grid.len() >= 2 {
        Some(RawSheet {
            labels: pair_labels(&header_text(&grid[0]), &header_text(&grid[1])),
            rows: grid[2..].to_vec(),
        })
    } else {
        None
    };
    let single = RawSheet {
        labels: header_text(&grid[0])
            .into_iter()
            .map(ColumnLabel::Single)
            .collect(),
        rows: grid.split_off(1),
    };
    Some(SheetReading { single, dual })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn format_follows_extension() {
        assert_eq!(detect_format(&PathBuf::from("stock.XLSX")), InputFormat::Workbook);
        assert_eq!(detect_format(&PathBuf::from("stock.ods")), InputFormat::Workbook);
        assert_eq!(detect_format(&PathBuf::from("stock.csv")), InputFormat::Delimited);
        assert_eq!(detect_format(&PathBuf::from("-")), InputFormat::Delimited);
    }

    #[test]
    fn delimiter_defaults_by_extension() {
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), None), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("a.csv"), None), b',');
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), Some(b';')), b';');
    }

    #[test]
    fn grid_produces_both_readings() {
        let grid = vec![
            vec![Value::empty(), Value::from("4 - SOH")],
            vec![Value::from("ProductCode"), Value::from("Stock Qty")],
            vec![Value::from("A1"), Value::Integer(4)],
            vec![Value::empty(), Value::empty()],
        ];
        let reading = sheet_reading_from_grid(grid, true).expect("reading");
        assert_eq!(reading.single.rows.len(), 2);
        let dual = reading.dual.expect("dual reading");
        assert_eq!(dual.rows.len(), 1);
        assert_eq!(dual.labels[1].flatten(), "4 - SOH_Stock Qty");
    }

    #[test]
    fn delimited_grids_never_have_dual_reading() {
        let grid = vec![vec![Value::from("a")], vec![Value::from("b")]];
        let reading = sheet_reading_from_grid(grid, false).expect("reading");
        assert!(reading.dual.is_none());
    }

    #[test]
    fn empty_grid_has_no_reading() {
        assert!(sheet_reading_from_grid(Vec::new(), true).is_none());
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        assert!(matches!(
            resolve_encoding(Some("not-an-encoding")),
            Err(InputError::UnknownEncoding(_))
        ));
        assert_eq!(resolve_encoding(Some("latin1")).unwrap().name(), "windows-1252");
    }
}
