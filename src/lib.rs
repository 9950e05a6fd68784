//! # edgequake-img2csv
//!
//! Recover tables and key/value pairs from scanned or photographed
//! documents as CSV.
//!
//! ## Why this crate?
//!
//! OCR engines return loose fragments of text with bounding boxes and no
//! notion of rows, columns or labels. Spec sheets, order forms and invoices
//! still carry that structure in their geometry: cells of one table row sit
//! on one horizontal line, labels end with a colon, section headings stand
//! alone above their table. This crate rebuilds the rows from the geometry
//! alone, with no schema for the document.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image
//!  │
//!  ├─ 1. Load        resolve local file or download from URL, decode
//!  ├─ 2. Preprocess  grayscale, median, adaptive threshold, closing, upscale
//!  ├─ 3. OCR         pluggable engine → detections in reading order
//!  ├─ 4. Group       greedy clustering into text rows
//!  ├─ 5. Classify    table row / key:value / generic
//!  └─ 6. Sections    fold standalone headings into the next table row
//! ```
//!
//! Stages 4–6 are pure; [`reconstruct`] runs them on detections you already
//! have.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_img2csv::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // OCR provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ExtractionConfig::default();
//!     let output = extract("spec-sheet.jpg", &config).await?;
//!     print!("{}", output.to_csv()?);
//!     eprintln!("{} rows from {} detections",
//!         output.stats.csv_rows,
//!         output.stats.detections);
//!     Ok(())
//! }
//! ```
//!
//! ## OCR Engines
//!
//! Any type implementing [`OcrEngine`] can be plugged in through
//! [`ExtractionConfigBuilder::engine`]. Two ship with the crate:
//! [`VlmOcrEngine`] (a vision LLM via `edgequake-llm`, used by default) and
//! [`ReplayOcrEngine`] (a recorded detection dump, no network).
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `img2csv` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-img2csv = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod ocr;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{ImageLoadError, Img2CsvError, OcrError};
pub use extract::{
    extract, extract_from_bytes, extract_image, extract_sync, extract_to_file, reconstruct,
    resolve_engine,
};
pub use ocr::{OcrEngine, Point, Quad, RawDetection, ReplayOcrEngine, VlmOcrEngine};
pub use output::{CsvRow, ExtractionOutput, ExtractionStats};
pub use pipeline::layout::Detection;
pub use pipeline::rows::Row;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
