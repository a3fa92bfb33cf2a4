use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::fmt::Write as _;
use std::io::Cursor;

use super::{ExtractError, ExtractMetadata, Extracted};

/// Sheets with at most this many data rows are rendered in full.
const FULL_SHEET_ROWS: usize = 100;
/// Rows kept from each end of a larger sheet.
const EDGE_ROWS: usize = 50;

pub(super) fn extract(bytes: &[u8]) -> Result<Extracted, ExtractError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ExtractError::Spreadsheet(e.to_string()))?;

    let names = workbook.sheet_names();
    let mut text = String::new();

    for name in &names {
        let range = workbook
            .worksheet_range(name)
            .map_err(|e| ExtractError::Spreadsheet(format!("sheet {}: {}", name, e)))?;
        let rows: Vec<Vec<Data>> = range.rows().map(|r| r.to_vec()).collect();
        text.push_str(&render_sheet(name, &rows));
    }

    Ok(Extracted {
        text,
        metadata: ExtractMetadata {
            sheet_count: Some(names.len()),
            ..Default::default()
        },
    })
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string().replace('|', "\\|"),
    }
}

fn cell_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Int(i) => Some(*i as f64),
        Data::Float(f) => Some(*f),
        _ => None,
    }
}

fn render_row(row: &[Data], width: usize) -> String {
    let cells: Vec<String> = (0..width)
        .map(|i| row.get(i).map(cell_text).unwrap_or_default())
        .collect();
    format!("| {} |", cells.join(" | "))
}

/// Render one sheet: header, rows (elided in the middle for large sheets),
/// then summary statistics for numeric columns.
fn render_sheet(name: &str, rows: &[Vec<Data>]) -> String {
    let mut out = format!("\nSheet: {}\n", name);

    let Some((header, data)) = rows.split_first() else {
        out.push_str("(empty sheet)\n");
        return out;
    };
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let columns: Vec<String> = (0..width)
        .map(|i| match header.get(i).map(cell_text) {
            Some(h) if !h.is_empty() => h,
            _ => format!("Column {}", i + 1),
        })
        .collect();

    let _ = writeln!(out, "Columns: {}", columns.join(", "));
    let _ = writeln!(out, "Rows: {}", data.len());
    let _ = writeln!(out, "| {} |", columns.join(" | "));
    let _ = writeln!(out, "|{}", " --- |".repeat(width));

    if data.len() <= FULL_SHEET_ROWS {
        for row in data {
            let _ = writeln!(out, "{}", render_row(row, width));
        }
    } else {
        for row in &data[..EDGE_ROWS] {
            let _ = writeln!(out, "{}", render_row(row, width));
        }
        let omitted = data.len() - 2 * EDGE_ROWS;
        let _ = writeln!(out, "... [{} rows omitted] ...", omitted);
        for row in &data[data.len() - EDGE_ROWS..] {
            let _ = writeln!(out, "{}", render_row(row, width));
        }
    }

    let stats: Vec<String> = (0..width)
        .filter_map(|i| {
            let values = numeric_column(data, i)?;
            describe(&values).map(|d| format!("{}: {}", columns[i], d))
        })
        .collect();

    if !stats.is_empty() {
        out.push_str("\nSummary statistics:\n");
        for line in stats {
            let _ = writeln!(out, "{}", line);
        }
    }

    out
}

/// Values of a column when every non-empty cell is numeric.
fn numeric_column(rows: &[Vec<Data>], index: usize) -> Option<Vec<f64>> {
    let mut values = Vec::new();
    for row in rows {
        match row.get(index) {
            None | Some(Data::Empty) => continue,
            Some(cell) => values.push(cell_number(cell)?),
        }
    }
    (!values.is_empty()).then_some(values)
}

/// count/mean/std/min/quartiles/max, with sample standard deviation and
/// linearly interpolated quartiles.
fn describe(values: &[f64]) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let std = if sorted.len() > 1 {
        (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        f64::NAN
    };

    Some(format!(
        "count={} mean={} std={} min={} 25%={} 50%={} 75%={} max={}",
        sorted.len(),
        fmt_num(mean),
        fmt_num(std),
        fmt_num(sorted[0]),
        fmt_num(quantile(&sorted, 0.25)),
        fmt_num(quantile(&sorted, 0.5)),
        fmt_num(quantile(&sorted, 0.75)),
        fmt_num(sorted[sorted.len() - 1]),
    ))
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let weight = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

fn fmt_num(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else {
        let s = format!("{:.4}", v);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
