use std::path::Path;

use log::warn;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Blank cells are recorded-but-non-numeric observations; an unparseable
/// cell is kept as non-numeric too, with a warning. The row still counts
/// for presence either way.
pub fn parse_value_cell(s: &str, file: &str, lineno: usize) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    match t.parse::<f64>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(
                "{}: row {}: unreadable numeric cell {:?}",
                simplify_file_name(file),
                lineno,
                t
            );
            None
        }
    }
}
