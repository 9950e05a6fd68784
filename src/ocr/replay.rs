//! Replay a recorded detection dump instead of running OCR.
//!
//! Two record shapes are accepted, and may be mixed in one file:
//!
//! ```json
//! [
//!   [[[10,20],[48,20],[48,34],[10,34]], "Qty:", 0.97],
//!   {"quad": [[60,20],[90,20],[90,34],[60,34]], "text": "12", "confidence": 0.9}
//! ]
//! ```
//!
//! The tuple form is what common OCR libraries print for their results, so a
//! dump from any of them can be replayed as-is. The image passed to
//! [`OcrEngine::detect`] is ignored.

use super::{OcrEngine, Quad, RawDetection};
use crate::error::OcrError;
use async_trait::async_trait;
use image::RgbImage;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize)]
#[serde(untagged)]
enum Record {
    Tuple(Quad, String, f32),
    Object {
        quad: Quad,
        text: String,
        #[serde(default = "full_confidence")]
        confidence: f32,
    },
}

fn full_confidence() -> f32 {
    1.0
}

impl From<Record> for RawDetection {
    fn from(r: Record) -> Self {
        match r {
            Record::Tuple(quad, text, confidence) => RawDetection::new(quad, text, confidence),
            Record::Object {
                quad,
                text,
                confidence,
            } => RawDetection::new(quad, text, confidence),
        }
    }
}

/// An [`OcrEngine`] returning a fixed list of detections.
#[derive(Debug, Clone)]
pub struct ReplayOcrEngine {
    detections: Vec<RawDetection>,
    source: Option<PathBuf>,
}

impl ReplayOcrEngine {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self {
            detections,
            source: None,
        }
    }

    /// Parse a JSON dump held in memory.
    pub fn from_json(json: &str) -> Result<Self, OcrError> {
        Self::parse(json, Path::new("<memory>"))
    }

    /// Read and parse a JSON dump from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, OcrError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| OcrError::ReplayUnreadable {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let mut engine = Self::parse(&json, path)?;
        engine.source = Some(path.to_path_buf());
        debug!(
            "Loaded {} recorded detections from {}",
            engine.detections.len(),
            path.display()
        );
        Ok(engine)
    }

    fn parse(json: &str, origin: &Path) -> Result<Self, OcrError> {
        let records: Vec<Record> =
            serde_json::from_str(json).map_err(|e| OcrError::ReplayUnreadable {
                path: origin.to_path_buf(),
                detail: e.to_string(),
            })?;
        Ok(Self::new(records.into_iter().map(RawDetection::from).collect()))
    }

    pub fn detections(&self) -> &[RawDetection] {
        &self.detections
    }

    /// The dump file this engine was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

#[async_trait]
impl OcrEngine for ReplayOcrEngine {
    fn name(&self) -> &str {
        "replay"
    }

    async fn detect(&self, _image: &RgbImage) -> Result<Vec<RawDetection>, OcrError> {
        Ok(self.detections.clone())
    }
}
