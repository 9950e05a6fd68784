//! Extraction results and CSV serialisation.

use crate::error::Img2CsvError;
use serde::Serialize;
use std::io::Write;

/// One output line: normalised cell strings in column order.
pub type CsvRow = Vec<String>;

/// Result of extracting one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionOutput {
    /// CSV rows in top-to-bottom order.
    pub rows: Vec<CsvRow>,
    pub stats: ExtractionStats,
}

/// Counters and timings for one extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionStats {
    /// Detections kept after filtering.
    pub detections: usize,
    pub dropped_empty: usize,
    pub dropped_low_confidence: usize,
    /// Text lines found by the row grouper.
    pub text_rows: usize,
    pub csv_rows: usize,
    pub sections_merged: usize,
    /// Size of the raster handed to the OCR engine.
    pub image_width: u32,
    pub image_height: u32,
    pub load_duration_ms: u64,
    pub preprocess_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub reconstruct_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl ExtractionOutput {
    /// Write every row as CSV.
    ///
    /// Rows may differ in length. Fields containing commas, quotes or line
    /// breaks are quoted; every record ends with `\n`.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), Img2CsvError> {
        let mut wtr = csv::WriterBuilder::new()
            .flexible(true)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    /// Render every row as a CSV string.
    pub fn to_csv(&self) -> Result<String, Img2CsvError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf).map_err(|e| Img2CsvError::Internal(format!("CSV is not UTF-8: {e}")))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
