//! Prompts for VLM-based text detection.
//!
//! Every prompt lives here so that tweaking the instructions touches exactly
//! one place, and so unit tests can inspect prompts without a live model.
//!
//! Callers can override the default via
//! [`crate::config::ExtractionConfig::system_prompt`]; the constants here are
//! used only when no override is provided.

/// Default system prompt asking a vision model to behave like a text
/// detector: one entry per text span, with a pixel quadrilateral.
pub const DEFAULT_OCR_PROMPT: &str = r#"You are an OCR engine. Detect every span of text in the image and report where it is.

Follow these rules precisely:

1. GRANULARITY
   - Report one entry per visually separate text span (a word group, a table cell, a label)
   - Never merge text from different table cells into one entry
   - Never split a single cell or label into several entries

2. TEXT
   - Transcribe exactly what is printed, character for character
   - Keep numbers, units, dates and punctuation exactly as shown
   - Do NOT translate, correct or reformat anything

3. GEOMETRY
   - Give coordinates in pixels of the image as sent, origin at the top-left
   - "quad" lists 4 corners: top-left, top-right, bottom-right, bottom-left
   - Each corner is an [x, y] pair of numbers

4. CONFIDENCE
   - "confidence" is your certainty about the transcription, from 0.0 to 1.0

5. OUTPUT FORMAT
   - Output ONLY a JSON array, for example:
     [{"text": "Qty:", "quad": [[10,20],[48,20],[48,34],[10,34]], "confidence": 0.97}]
   - Output [] when the image contains no text
   - Do NOT wrap the JSON in ``` fences
   - Do NOT add commentary or explanations"#;

/// The user turn accompanying the image.
///
/// Stating the pixel size lets the model anchor its coordinates to the
/// raster we actually sent rather than to an internally resized copy.
pub fn image_size_hint(width: u32, height: u32) -> String {
    format!("The image is {width}x{height} pixels. Return the detections as JSON.")
}
