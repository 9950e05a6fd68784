//! Row grouper: cluster reading-ordered detections into text lines.
//!
//! A single greedy pass over the sorted detections keeps a running vertical
//! anchor. A detection joins the open row when its centre lies within
//! `y_tol` of the anchor (boundary inclusive), and the anchor then moves
//! halfway towards it. This lets a slightly skewed line drift across a wide
//! page without being cut in two. Otherwise the open row is closed and a new
//! one starts with the anchor reset.
//!
//! `y_tol = max(min_row_tolerance, median_height * row_tolerance_factor)`,
//! 6 px and 0.6 by default.

use super::layout::Detection;
use crate::config::ExtractionConfig;
use tracing::debug;

/// Detections believed to lie on one text line, sorted by `x_min`.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    cells: Vec<Detection>,
}

impl Row {
    fn close(mut cells: Vec<Detection>) -> Self {
        // Stable: equal x_min keeps reading order.
        cells.sort_by(|a, b| a.x_min().total_cmp(&b.x_min()));
        Self { cells }
    }

    pub fn cells(&self) -> &[Detection] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell texts in left-to-right order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(Detection::text)
    }

    pub fn mean_center_y(&self) -> f32 {
        if self.cells.is_empty() {
            return 0.0;
        }
        self.cells.iter().map(Detection::center_y).sum::<f32>() / self.cells.len() as f32
    }
}

/// Median detection height. For an even count the upper of the two middle
/// values is taken.
pub fn median_height(detections: &[Detection]) -> Option<f32> {
    if detections.is_empty() {
        return None;
    }
    let mut heights: Vec<f32> = detections.iter().map(Detection::height).collect();
    heights.sort_by(f32::total_cmp);
    Some(heights[heights.len() / 2])
}

/// Group detections (already in reading order) into rows.
///
/// Every input detection lands in exactly one row. Empty input yields no rows.
pub fn group_rows(detections: Vec<Detection>, config: &ExtractionConfig) -> Vec<Row> {
    let Some(median_h) = median_height(&detections) else {
        return Vec::new();
    };
    let y_tol = config.row_tolerance(median_h);
    debug!("Row grouping: median height {:.1}px, y_tol {:.1}px", median_h, y_tol);

    let mut rows = Vec::new();
    let mut open: Vec<Detection> = Vec::new();
    let mut anchor_y = 0.0f32;

    for d in detections {
        let cy = d.center_y();
        if open.is_empty() {
            anchor_y = cy;
            open.push(d);
        } else if (cy - anchor_y).abs() <= y_tol {
            anchor_y = (anchor_y + cy) / 2.0;
            open.push(d);
        } else {
            rows.push(Row::close(std::mem::take(&mut open)));
            anchor_y = cy;
            open.push(d);
        }
    }
    if !open.is_empty() {
        rows.push(Row::close(open));
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::layout::build_layout;
    use crate::ocr::RawDetection;

    /// Box of height 10 whose centre sits at `cy`.
    fn at(x: f32, cy: f32, text: &str) -> RawDetection {
        RawDetection::from_rect(x, cy - 5.0, 40.0, 10.0, text, 0.9)
    }

    fn group(raw: Vec<RawDetection>) -> Vec<Vec<String>> {
        let layout = build_layout(raw, None);
        group_rows(layout.detections, &ExtractionConfig::default())
            .iter()
            .map(|r| r.texts().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn empty_input_yields_no_rows() {
        assert!(group_rows(Vec::new(), &ExtractionConfig::default()).is_empty());
    }

    #[test]
    fn upper_median_for_even_count() {
        let layout = build_layout(
            vec![
                RawDetection::from_rect(0.0, 0.0, 5.0, 8.0, "a", 1.0),
                RawDetection::from_rect(0.0, 50.0, 5.0, 20.0, "b", 1.0),
            ],
            None,
        );
        assert_eq!(median_height(&layout.detections), Some(20.0));
    }

    #[test]
    fn two_lines_split_and_cells_sorted_by_x() {
        let rows = group(vec![
            at(300.0, 101.0, "C"),
            at(10.0, 100.0, "A"),
            at(150.0, 99.0, "B"),
            at(10.0, 140.0, "D"),
        ]);
        assert_eq!(rows, vec![vec!["A", "B", "C"], vec!["D"]]);
    }

    #[test]
    fn boundary_distance_joins() {
        // Heights are 10, so y_tol = max(6, 6) = 6.
        let rows = group(vec![at(0.0, 100.0, "A"), at(50.0, 106.0, "B")]);
        assert_eq!(rows, vec![vec!["A", "B"]]);
    }

    #[test]
    fn just_past_boundary_splits() {
        let rows = group(vec![at(0.0, 100.0, "A"), at(50.0, 106.5, "B")]);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn anchor_is_smoothed_not_reset() {
        // 100 → anchor 100; 106 joins → anchor 103; 109 joins (|Δ| = 6)
        // although it is 9 px from the first cell.
        let rows = group(vec![
            at(0.0, 100.0, "A"),
            at(50.0, 106.0, "B"),
            at(100.0, 109.0, "C"),
        ]);
        assert_eq!(rows, vec![vec!["A", "B", "C"]]);
    }

    #[test]
    fn anchor_resets_on_new_row() {
        // 100 → row 1. 120 opens row 2 with anchor 120; 125 joins it.
        let rows = group(vec![
            at(0.0, 100.0, "A"),
            at(0.0, 120.0, "B"),
            at(50.0, 125.0, "C"),
        ]);
        assert_eq!(rows, vec![vec!["A"], vec!["B", "C"]]);
    }

    #[test]
    fn tolerance_scales_with_text_height() {
        // Height 40 → y_tol 24: a 20 px offset stays on one line.
        let tall = |x: f32, cy: f32, t: &str| RawDetection::from_rect(x, cy - 20.0, 60.0, 40.0, t, 1.0);
        let rows = group(vec![tall(0.0, 200.0, "Name"), tall(100.0, 220.0, "Value")]);
        assert_eq!(rows, vec![vec!["Name", "Value"]]);
    }

    #[test]
    fn partition_and_row_order_hold() {
        let raw: Vec<RawDetection> = (0..40)
            .map(|i| {
                let line = (i % 7) as f32;
                let jitter = ((i * 13) % 5) as f32 - 2.0;
                at((i * 37 % 500) as f32, 30.0 + line * 25.0 + jitter, &format!("t{i}"))
            })
            .collect();
        let layout = build_layout(raw, None);
        let total = layout.detections.len();
        let rows = group_rows(layout.detections, &ExtractionConfig::default());

        let mut seen: Vec<String> = rows
            .iter()
            .flat_map(|r| r.texts().map(str::to_string))
            .collect();
        assert_eq!(seen.len(), total);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), total, "no detection duplicated");

        for pair in rows.windows(2) {
            assert!(pair[0].mean_center_y() < pair[1].mean_center_y());
        }
        for row in &rows {
            for pair in row.cells().windows(2) {
                assert!(pair[0].x_min() <= pair[1].x_min());
            }
        }
    }
}
