//! Plain-text rendering of processed tables for the `preview` command.

use std::fmt::Write as _;

use crate::data::Table;

pub const PREVIEW_MAX_COLUMNS: usize = 8;
pub const PREVIEW_CELL_WIDTH: usize = 50;

#[derive(Debug, Clone, Copy)]
pub struct PreviewLayout {
    pub rows: usize,
    pub max_columns: usize,
    pub cell_width: usize,
}

impl Default for PreviewLayout {
    fn default() -> Self {
        Self {
            rows: 10,
            max_columns: PREVIEW_MAX_COLUMNS,
            cell_width: PREVIEW_CELL_WIDTH,
        }
    }
}

/// Renders the head of `table` with a leading 1-based row number column,
/// a summary line, and a note when columns were left out.
pub fn render_preview(table: &Table, layout: &PreviewLayout) -> String {
    let shown_columns = table.width().min(layout.max_columns.max(1));
    let mut headers = Vec::with_capacity(shown_columns + 1);
    headers.push("Row".to_string());
    headers.extend(table.columns.iter().take(shown_columns).cloned());

    let rows = table
        .display_rows(layout.rows)
        .into_iter()
        .enumerate()
        .map(|(idx, cells)| {
            let mut line = Vec::with_capacity(shown_columns + 1);
            line.push((idx + 1).to_string());
            line.extend(
                cells
                    .into_iter()
                    .take(shown_columns)
                    .map(|cell| truncate(&sanitize(&cell), layout.cell_width)),
            );
            line
        })
        .collect::<Vec<_>>();

    let mut output = format!(
        "Preview: first {} of {} rows\n",
        rows.len(),
        table.len()
    );
    let _ = writeln!(output, "Columns: {}", table.columns.join(", "));
    output.push('\n');
    output.push_str(&render_table(&headers, &rows));
    if table.width() > shown_columns {
        let _ = writeln!(
            output,
            "Showing first {shown_columns} of {} columns",
            table.width()
        );
    }
    output
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| width(h)).collect::<Vec<_>>();
    for row in rows {
        for (slot, cell) in widths.iter_mut().zip(row) {
            *slot = (*slot).max(width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let rule = widths
        .iter()
        .map(|w| "-".repeat((*w).max(3)))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .map(|(value, w)| format!("{value:<w$}", w = *w))
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

fn width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize(value: &str) -> String {
    value.replace(['\n', '\r', '\t'], " ")
}

fn truncate(value: &str, limit: usize) -> String {
    value.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    #[test]
    fn table_columns_are_aligned() {
        let rendered = render_table(
            &["Row".into(), "SOH".into()],
            &[vec!["1".into(), "1200".into()], vec!["2".into(), "5".into()]],
        );
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "Row  SOH");
        assert_eq!(lines[1], "---  ----");
        assert_eq!(lines[2], "1    1200");
        assert_eq!(lines[3], "2    5");
    }

    #[test]
    fn preview_limits_rows_columns_and_cell_width() {
        let columns = (1..=10).map(|n| format!("c{n}")).collect::<Vec<_>>();
        let rows = (0..5)
            .map(|_| {
                let mut row = vec![Value::from("x".repeat(80))];
                row.extend((1..10).map(|n| Value::Integer(n)));
                row
            })
            .collect();
        let table = Table::from_rows(columns, rows);
        let rendered = render_preview(
            &table,
            &PreviewLayout {
                rows: 2,
                ..PreviewLayout::default()
            },
        );
        assert!(rendered.starts_with("Preview: first 2 of 5 rows"));
        assert!(rendered.contains("Showing first 8 of 10 columns"));
        assert!(!rendered.contains(&"x".repeat(51)));
        assert!(rendered.contains(&"x".repeat(50)));
        assert!(!rendered.lines().any(|l| l.starts_with("3 ")));
    }
}
