//! Progress-callback trait for per-stage extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to be told
//! when each pipeline stage starts and finishes. The OCR stage dominates
//! wall-clock time, so a spinner keyed on these events is usually enough.
//!
//! # Example
//!
//! ```rust
//! use edgequake_img2csv::{ExtractionConfig, ExtractionProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Log;
//!
//! impl ExtractionProgressCallback for Log {
//!     fn on_stage_complete(&self, stage: Stage, items: usize) {
//!         eprintln!("{stage}: {items}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(Log) as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// A pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Resolve and decode the input image.
    Load,
    /// Denoise, binarise and upscale.
    Preprocess,
    /// Run the OCR engine and establish reading order.
    Ocr,
    /// Cluster detections into text rows.
    Group,
    /// Classify rows into CSV rows.
    Assemble,
    /// Fold section titles into the following table row.
    MergeSections,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Preprocess => "preprocess",
            Stage::Ocr => "ocr",
            Stage::Group => "group",
            Stage::Assemble => "assemble",
            Stage::MergeSections => "merge-sections",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Called by the extraction pipeline as it runs.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync` because one
/// config may be shared by concurrent extractions.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called just before `stage` runs.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called after `stage` finishes.
    ///
    /// `items` is the stage's output size: pixels on the long side for
    /// image stages, detections for OCR, rows for the rest.
    fn on_stage_complete(&self, stage: Stage, items: usize) {
        let _ = (stage, items);
    }

    /// Called once after the last stage with the number of CSV rows produced.
    fn on_extraction_complete(&self, csv_rows: usize) {
        let _ = csv_rows;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
