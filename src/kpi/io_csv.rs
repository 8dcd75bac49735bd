// Primitives for reading CSV observation files.

use std::fs::File;

use log::{debug, warn};
use snafu::prelude::*;

use crate::kpi::config_reader::FileSource;
use crate::kpi::io_common::parse_value_cell;
use crate::kpi::{
    CsvLineParseSnafu, CsvLineTooShortSnafu, CsvOpenSnafu, ParsedEntry, ReportResult,
};

/// Reads observation rows in the fixed column layout described in the
/// manual: indicator_id, fiscal_year, period, value, target, dimension,
/// dimension_value, unit, notes, submitted_by, submitted_at, status,
/// rejection_reason. Trailing columns may be omitted.
pub fn read_csv_entries(path: String, cfs: &FileSource) -> ReportResult<Vec<ParsedEntry>> {
    let mut res: Vec<ParsedEntry> = Vec::new();
    let (records, row_offset) = get_records(&path, cfs)?;

    for (idx, line_r) in records.enumerate() {
        let lineno = idx + row_offset;
        let line = line_r.context(CsvLineParseSnafu {})?;
        debug!("read_csv_entries: {:?} {:?}", lineno, line);

        let indicator_id = line
            .get(0)
            .context(CsvLineTooShortSnafu { lineno })?
            .trim()
            .to_string();
        if indicator_id.is_empty() {
            debug!("read_csv_entries: skipping blank row {:?}", lineno);
            continue;
        }

        let col = |i: usize| line.get(i).unwrap_or("").trim().to_string();
        let opt_col = |i: usize| {
            let s = col(i);
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        };

        let fiscal_year = match col(1).as_str() {
            "" => None,
            s => match s.parse::<i32>() {
                Ok(y) => Some(y),
                Err(_) => {
                    warn!("read_csv_entries: row {}: unreadable fiscal year {:?}", lineno, s);
                    None
                }
            },
        };

        res.push(ParsedEntry {
            lineno,
            indicator_id,
            fiscal_year,
            period: col(2),
            value: parse_value_cell(&col(3), &path, lineno),
            target: parse_value_cell(&col(4), &path, lineno),
            dimension: opt_col(5),
            dimension_value: opt_col(6),
            unit: col(7),
            notes: col(8),
            submitted_by: col(9),
            submitted_at: col(10),
            status: opt_col(11),
            rejection_reason: opt_col(12),
        });
    }
    Ok(res)
}

fn get_records(
    path: &String,
    cfs: &FileSource,
) -> ReportResult<(csv::StringRecordsIntoIter<File>, usize)> {
    let first_row = cfs.first_data_row_index()?;
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu {})?;
    let mut records = rdr.into_records();
    // The index starts at 1 to respect most conventions in the excel world
    for _ in 1..first_row {
        _ = records.next();
    }
    Ok((records, first_row))
}
