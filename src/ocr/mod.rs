//! The OCR capability: a pluggable engine turning an RGB raster into raw
//! `(quad, text, confidence)` triples.
//!
//! Everything downstream of [`OcrEngine::detect`] (geometry, row grouping,
//! classification, section merging) is deterministic and never talks to a
//! model, so it can be unit-tested with synthetic detections.
//!
//! Two backends ship with the crate:
//!
//! * [`vlm::VlmOcrEngine`] — asks a vision LLM for a JSON list of text spans
//!   with pixel quadrilaterals.
//! * [`replay::ReplayOcrEngine`] — replays a recorded detection dump, for
//!   offline runs and reproducible tests.

pub mod encode;
pub mod replay;
pub mod vlm;

use crate::error::OcrError;
use async_trait::async_trait;
use image::RgbImage;
use serde::{Deserialize, Serialize};

pub use replay::ReplayOcrEngine;
pub use vlm::VlmOcrEngine;

/// A point in image pixel coordinates.
pub type Point = [f32; 2];

/// Four corner points, clockwise from the top-left:
/// top-left, top-right, bottom-right, bottom-left.
pub type Quad = [Point; 4];

/// One text span as reported by an OCR engine, before any geometry is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub quad: Quad,
    pub text: String,
    pub confidence: f32,
}

impl RawDetection {
    pub fn new(quad: Quad, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            quad,
            text: text.into(),
            confidence,
        }
    }

    /// Build an axis-aligned detection from a top-left corner and a size.
    pub fn from_rect(x: f32, y: f32, width: f32, height: f32, text: impl Into<String>, confidence: f32) -> Self {
        Self::new(
            [
                [x, y],
                [x + width, y],
                [x + width, y + height],
                [x, y + height],
            ],
            text,
            confidence,
        )
    }
}

/// An OCR backend.
///
/// Implementations must be `Send + Sync`: the same engine handle may be
/// shared by callers extracting several images concurrently.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short identifier used in logs and error messages.
    fn name(&self) -> &str;

    /// Recognise every text span in `image`.
    ///
    /// Order of the returned detections is irrelevant; the layout reader
    /// establishes reading order itself.
    async fn detect(&self, image: &RgbImage) -> Result<Vec<RawDetection>, OcrError>;
}
