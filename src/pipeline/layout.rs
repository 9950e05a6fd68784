//! Layout reader: run the OCR engine and turn its raw triples into
//! [`Detection`]s in reading order.
//!
//! Reading order is ascending `(center_y, x_min)`. Every later stage relies
//! on it, most importantly the single-pass row grouper.

use crate::error::OcrError;
use crate::ocr::{OcrEngine, Quad, RawDetection};
use image::{DynamicImage, GrayImage, RgbImage};
use serde::Serialize;
use std::cmp::Ordering;
use std::time::Duration;
use tracing::{debug, info};

/// One recognised text span with its derived geometry.
///
/// Fields are private: a detection is immutable once the layout reader has
/// produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    text: String,
    quad: Quad,
    confidence: f32,
    center_x: f32,
    center_y: f32,
    height: f32,
    x_min: f32,
}

impl Detection {
    /// Derive geometry from a quad: centre is the mean of the corners,
    /// height the mean of the two vertical edges (at least 1.0), `x_min`
    /// the leftmost corner. `text` is stored trimmed.
    pub fn new(text: impl AsRef<str>, quad: Quad, confidence: f32) -> Self {
        let center_x = quad.iter().map(|p| p[0]).sum::<f32>() / 4.0;
        let center_y = quad.iter().map(|p| p[1]).sum::<f32>() / 4.0;
        let height =
            ((quad[0][1] - quad[3][1]).abs() + (quad[1][1] - quad[2][1]).abs()) / 2.0;
        let x_min = quad.iter().map(|p| p[0]).fold(f32::INFINITY, f32::min);

        Self {
            text: text.as_ref().trim().to_string(),
            quad,
            confidence,
            center_x,
            center_y,
            height: height.max(1.0),
            x_min,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn quad(&self) -> &Quad {
        &self.quad
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn center_x(&self) -> f32 {
        self.center_x
    }

    pub fn center_y(&self) -> f32 {
        self.center_y
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn x_min(&self) -> f32 {
        self.x_min
    }
}

/// Reading-order comparison: top to bottom, then left to right.
pub fn reading_order(a: &Detection, b: &Detection) -> Ordering {
    a.center_y
        .total_cmp(&b.center_y)
        .then(a.x_min.total_cmp(&b.x_min))
}

/// Detections that survived filtering, plus what was discarded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    pub detections: Vec<Detection>,
    pub dropped_empty: usize,
    pub dropped_low_confidence: usize,
}

/// Convert raw engine output into sorted detections.
///
/// Triples whose trimmed text is empty are discarded. When `min_confidence`
/// is set, triples scoring below it are discarded too.
pub fn build_layout(raw: Vec<RawDetection>, min_confidence: Option<f32>) -> Layout {
    let mut layout = Layout::default();

    for r in raw {
        if r.text.trim().is_empty() {
            layout.dropped_empty += 1;
            continue;
        }
        if let Some(threshold) = min_confidence {
            if r.confidence < threshold {
                debug!(
                    "Dropping '{}' (confidence {:.2} < {:.2})",
                    r.text, r.confidence, threshold
                );
                layout.dropped_low_confidence += 1;
                continue;
            }
        }
        layout.detections.push(Detection::new(&r.text, r.quad, r.confidence));
    }

    layout.detections.sort_by(reading_order);
    layout
}

/// Run `engine` over a normalised image and establish reading order.
///
/// The engine sees a 3-channel copy of the image. When `timeout` is set the
/// call is abandoned after that long with [`OcrError::Timeout`].
pub async fn read_layout(
    engine: &dyn OcrEngine,
    image: &GrayImage,
    min_confidence: Option<f32>,
    timeout: Option<Duration>,
) -> Result<Layout, OcrError> {
    let rgb: RgbImage = DynamicImage::ImageLuma8(image.clone()).to_rgb8();
    let (w, h) = rgb.dimensions();
    if w == 0 || h == 0 {
        return Err(OcrError::InvalidDimensions(w, h));
    }

    info!("Running OCR engine '{}' on {}x{}", engine.name(), w, h);

    let raw = match timeout {
        Some(limit) => tokio::time::timeout(limit, engine.detect(&rgb))
            .await
            .map_err(|_| OcrError::Timeout {
                secs: limit.as_secs(),
            })??,
        None => engine.detect(&rgb).await?,
    };

    let layout = build_layout(raw, min_confidence);
    debug!(
        "Layout: {} detections ({} empty, {} low-confidence dropped)",
        layout.detections.len(),
        layout.dropped_empty,
        layout.dropped_low_confidence
    );
    Ok(layout)
}
