//! Section merger: reattach a standalone heading to the table under it.
//!
//! One forward pass with one row of lookahead. A single-cell row directly
//! followed by a row of three or more cells becomes one row: the prefixed
//! heading, then the following row's cells. The consumed row is not emitted
//! again, so a heading can never swallow a second table row.

use crate::output::CsvRow;

/// Minimum width of the row a heading may be merged into.
const MIN_TABLE_CELLS: usize = 3;

/// Merge section titles. Returns the rows and the number of merges made.
pub fn merge_sections(rows: Vec<CsvRow>, prefix: &str) -> (Vec<CsvRow>, usize) {
    let mut out = Vec::with_capacity(rows.len());
    let mut merged = 0;
    let mut iter = rows.into_iter().peekable();

    while let Some(row) = iter.next() {
        let is_heading = row.len() == 1
            && iter
                .peek()
                .is_some_and(|next| next.len() >= MIN_TABLE_CELLS);

        if is_heading {
            if let (Some(title), Some(next)) = (row.into_iter().next(), iter.next()) {
                let mut combined = Vec::with_capacity(next.len() + 1);
                combined.push(format!("{prefix}{title}"));
                combined.extend(next);
                out.push(combined);
                merged += 1;
            }
        } else {
            out.push(row);
        }
    }

    (out, merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "[Section] ";

    fn rows(spec: &[&[&str]]) -> Vec<CsvRow> {
        spec.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn title_merges_into_following_table_row() {
        let (out, n) = merge_sections(rows(&[&["Title"], &["A", "B", "C"]]), PREFIX);
        assert_eq!(out, rows(&[&["[Section] Title", "A", "B", "C"]]));
        assert_eq!(n, 1);
    }

    #[test]
    fn two_cell_follower_is_not_a_table() {
        let input = rows(&[&["Title"], &["Qty", "5"]]);
        let (out, n) = merge_sections(input.clone(), PREFIX);
        assert_eq!(out, input);
        assert_eq!(n, 0);
    }

    #[test]
    fn consumed_row_is_not_reexamined() {
        // "B" follows a consumed row and is itself followed by a table row.
        let input = rows(&[&["A"], &["1", "2", "3"], &["B"], &["4", "5", "6"], &["7", "8", "9"]]);
        let (out, n) = merge_sections(input, PREFIX);
        assert_eq!(
            out,
            rows(&[
                &["[Section] A", "1", "2", "3"],
                &["[Section] B", "4", "5", "6"],
                &["7", "8", "9"],
            ])
        );
        assert_eq!(n, 2);
    }

    #[test]
    fn stacked_titles_merge_only_the_last() {
        let input = rows(&[&["Order"], &["Ring"], &["Size", "Metal", "Qty"]]);
        let (out, _) = merge_sections(input, PREFIX);
        assert_eq!(
            out,
            rows(&[&["Order"], &["[Section] Ring", "Size", "Metal", "Qty"]])
        );
    }

    #[test]
    fn trailing_title_passes_through() {
        let input = rows(&[&["a", "b", "c"], &["Notes"]]);
        let (out, n) = merge_sections(input.clone(), PREFIX);
        assert_eq!(out, input);
        assert_eq!(n, 0);
    }

    #[test]
    fn empty_input() {
        let (out, n) = merge_sections(Vec::new(), PREFIX);
        assert!(out.is_empty());
        assert_eq!(n, 0);
    }
}
