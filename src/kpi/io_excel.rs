// Primitives for reading Excel observation files.

use calamine::{open_workbook, DataType, Reader, Xlsx};
use log::{debug, warn};
use snafu::prelude::*;

use crate::kpi::config_reader::FileSource;
use crate::kpi::io_common::parse_value_cell;
use crate::kpi::{EmptyExcelSnafu, OpeningExcelSnafu, ParsedEntry, ReportResult};

/// Same fixed column layout as the CSV reader. The first worksheet is used
/// unless the file source names one.
pub fn read_excel_entries(path: String, cfs: &FileSource) -> ReportResult<Vec<ParsedEntry>> {
    let p = path.clone();
    let mut workbook: Xlsx<_> =
        open_workbook(p).context(OpeningExcelSnafu { path: path.clone() })?;
    let wrange = match &cfs.worksheet_name {
        Some(name) => workbook
            .worksheet_range(name)
            .context(EmptyExcelSnafu {})?
            .context(OpeningExcelSnafu { path: path.clone() })?,
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu {})?
            .context(OpeningExcelSnafu { path: path.clone() })?,
    };

    let first_row = cfs.first_data_row_index()?;
    let mut res: Vec<ParsedEntry> = Vec::new();
    for (idx, row) in wrange.rows().enumerate() {
        let lineno = idx + 1;
        if lineno < first_row {
            continue;
        }
        debug!("read_excel_entries: {:?} {:?}", lineno, row);

        let indicator_id = cell_str(row, 0);
        if indicator_id.is_empty() {
            debug!("read_excel_entries: skipping blank row {:?}", lineno);
            continue;
        }

        let fiscal_year = match row.get(1) {
            Some(DataType::Int(i)) => Some(*i as i32),
            Some(DataType::Float(f)) => Some(*f as i32),
            Some(DataType::String(s)) if !s.trim().is_empty() => match s.trim().parse::<i32>() {
                Ok(y) => Some(y),
                Err(_) => {
                    warn!(
                        "read_excel_entries: row {}: unreadable fiscal year {:?}",
                        lineno, s
                    );
                    None
                }
            },
            _ => None,
        };

        res.push(ParsedEntry {
            lineno,
            indicator_id,
            fiscal_year,
            period: cell_str(row, 2),
            value: cell_num(row, 3, &path, lineno),
            target: cell_num(row, 4, &path, lineno),
            dimension: cell_opt(row, 5),
            dimension_value: cell_opt(row, 6),
            unit: cell_str(row, 7),
            notes: cell_str(row, 8),
            submitted_by: cell_str(row, 9),
            submitted_at: cell_str(row, 10),
            status: cell_opt(row, 11),
            rejection_reason: cell_opt(row, 12),
        });
    }
    Ok(res)
}

fn cell_str(row: &[DataType], idx: usize) -> String {
    match row.get(idx) {
        Some(DataType::String(s)) => s.trim().to_string(),
        Some(DataType::Int(i)) => i.to_string(),
        // Spreadsheet tools routinely store labels as numbers.
        Some(DataType::Float(f)) if f.fract() == 0.0 => format!("{}", *f as i64),
        Some(DataType::Float(f)) => f.to_string(),
        Some(DataType::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn cell_opt(row: &[DataType], idx: usize) -> Option<String> {
    let s = cell_str(row, idx);
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn cell_num(row: &[DataType], idx: usize, file: &str, lineno: usize) -> Option<f64> {
    match row.get(idx) {
        Some(DataType::Float(f)) => Some(*f),
        Some(DataType::Int(i)) => Some(*i as f64),
        Some(DataType::String(s)) => parse_value_cell(s, file, lineno),
        _ => None,
    }
}
