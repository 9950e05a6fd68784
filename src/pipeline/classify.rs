//! Cell classifier / CSV assembler.
//!
//! Each row's cell texts are normalised, then the row is tagged with a
//! [`RowShape`]. Shapes are tested in a fixed order and the first match
//! decides the output; see [`RowShape::of`].

use super::rows::Row;
use crate::config::ExtractionConfig;
use crate::output::CsvRow;

/// Separators tried, in order, when a single cell has no `:`.
const DASH_SEPARATORS: [&str; 3] = [" - ", " — ", "–"];

/// How a row is turned into a CSV row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    /// Three or more short cells: a table row, emitted verbatim.
    ShortMultiCell,
    /// One cell: split into key and value when it looks like a label.
    SingleCell,
    /// Two or more cells, the first ending in `:`: a label followed by a
    /// value spread across cells.
    KeyPrefixedMultiCell,
    /// Anything else, emitted verbatim.
    Generic,
}

impl RowShape {
    /// Classify normalised cell texts.
    pub fn of(cells: &[String], config: &ExtractionConfig) -> Self {
        if cells.len() >= config.table_min_cells && mean_len(cells) <= config.table_max_mean_len {
            RowShape::ShortMultiCell
        } else if cells.len() == 1 {
            RowShape::SingleCell
        } else if cells.len() >= 2 && cells[0].ends_with(':') {
            RowShape::KeyPrefixedMultiCell
        } else {
            RowShape::Generic
        }
    }
}

fn mean_len(cells: &[String]) -> f32 {
    if cells.is_empty() {
        return 0.0;
    }
    let total: usize = cells.iter().map(|c| c.chars().count()).sum();
    total as f32 / cells.len() as f32
}

/// Replace non-breaking spaces, collapse whitespace runs, trim.
///
/// Digits, units, punctuation and dates are left untouched.
pub fn normalize_cell(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a label cell into `(key, value)`, both trimmed.
///
/// The first `:` wins; failing that, ` - `, ` — ` and `–` are tried in
/// that order, each splitting at its first occurrence. Returns `None` when
/// no separator is present.
pub fn split_key_value(text: &str) -> Option<(&str, &str)> {
    if let Some((k, v)) = text.split_once(':') {
        return Some((k.trim(), v.trim()));
    }
    DASH_SEPARATORS
        .iter()
        .find_map(|sep| text.split_once(sep))
        .map(|(k, v)| (k.trim(), v.trim()))
}

fn strip_colon(s: &str) -> String {
    s.trim_end_matches(':').to_string()
}

/// Turn one row of normalised cells into a CSV row.
pub fn classify_cells(cells: Vec<String>, config: &ExtractionConfig) -> CsvRow {
    match RowShape::of(&cells, config) {
        RowShape::ShortMultiCell | RowShape::Generic => cells,
        RowShape::SingleCell => match split_key_value(&cells[0]) {
            Some((key, value)) if !key.is_empty() && (!value.is_empty() || key.ends_with(':')) => {
                vec![strip_colon(key), value.to_string()]
            }
            _ => cells,
        },
        RowShape::KeyPrefixedMultiCell => {
            vec![strip_colon(&cells[0]), cells[1..].join(" ")]
        }
    }
}

/// Convert grouped rows into CSV rows, one for one.
pub fn assemble(rows: &[Row], config: &ExtractionConfig) -> Vec<CsvRow> {
    rows.iter()
        .map(|row| {
            let cells = row.texts().map(normalize_cell).collect();
            classify_cells(cells, config)
        })
        .collect()
}
