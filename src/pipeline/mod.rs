//! Pipeline stages for image-to-CSV extraction.
//!
//! Each submodule implements exactly one transformation step. Everything
//! after [`layout`] is a pure function of its input, so grouping,
//! classification and merging can be tested with synthetic detections.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ preprocess ──▶ layout ──▶ rows ──▶ classify ──▶ sections
//! (decode)   (binarise)    (OCR)     (lines)   (CSV rows)   (titles)
//! ```
//!
//! 1. [`input`]      — resolve a path or URL and decode the image; runs in
//!    `spawn_blocking` because decoding is CPU-bound
//! 2. [`preprocess`] — grayscale, median denoise, adaptive threshold,
//!    closing, upscale
//! 3. [`layout`]     — call the OCR engine, derive geometry, sort into
//!    reading order; the only stage that may touch the network
//! 4. [`rows`]       — greedy clustering into text lines
//! 5. [`classify`]   — one CSV row per text line via ordered row shapes
//! 6. [`sections`]   — fold standalone headings into the next table row

pub mod classify;
pub mod input;
pub mod layout;
pub mod preprocess;
pub mod rows;
pub mod sections;
