//! Error types for the edgequake-img2csv library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`ImageLoadError`] — **Bad input**: the image is missing, unreadable,
//!   not an image at all, or cannot be decoded. Always raised before any OCR
//!   call is made.
//!
//! * [`OcrError`] — **Engine failure**: the OCR capability is unavailable or
//!   returned something unusable. [`OcrError::is_transient`] tells callers
//!   whether a retry has a chance of succeeding.
//!
//! * [`Img2CsvError`] — the top-level fatal error returned by the `extract*`
//!   functions. It wraps both of the above so callers can tell "bad input"
//!   apart from "engine unavailable" with [`Img2CsvError::is_input_error`].
//!
//! An empty detection set is *not* an error: it yields zero CSV rows.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-img2csv library.
#[derive(Debug, Error)]
pub enum Img2CsvError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input image could not be located, read or decoded.
    #[error(transparent)]
    ImageLoad(#[from] ImageLoadError),

    // ── OCR errors ────────────────────────────────────────────────────────
    /// The OCR capability failed.
    #[error(transparent)]
    Ocr(#[from] OcrError),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output CSV file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV writer rejected a record.
    #[error("CSV serialisation failed: {0}")]
    Csv(#[from] csv::Error),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Img2CsvError {
    /// `true` when the failure lies with the input image rather than the
    /// OCR engine or the environment.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Img2CsvError::ImageLoad(_))
    }
}

/// The input image is missing, unreadable, or undecodable.
#[derive(Debug, Error)]
pub enum ImageLoadError {
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is neither a usable file path nor an HTTP/HTTPS URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were read but do not start with any known image signature.
    #[error("File is not a supported image: '{path}'\nFirst bytes: {magic:?}")]
    NotAnImage { path: PathBuf, magic: Vec<u8> },

    /// The image signature was recognised but decoding failed.
    #[error("Failed to decode image '{path}': {detail}")]
    DecodeFailed { path: PathBuf, detail: String },
}

/// A failure of the OCR capability.
#[derive(Debug, Clone, Error)]
pub enum OcrError {
    /// The engine (or the LLM provider behind it) is not configured.
    #[error("OCR engine '{engine}' is not available.\n{hint}")]
    Unavailable { engine: String, hint: String },

    /// The engine call itself failed.
    #[error("OCR engine '{engine}' failed after {attempts} attempt(s): {detail}")]
    EngineFailed {
        engine: String,
        attempts: u32,
        detail: String,
    },

    /// The engine answered, but not with a detection list.
    #[error("OCR engine returned an unusable response: {detail}")]
    MalformedResponse { detail: String },

    /// The engine did not answer within the configured bound.
    #[error("OCR call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// A recorded detection dump could not be read.
    #[error("Failed to read detection dump '{path}': {detail}")]
    ReplayUnreadable { path: PathBuf, detail: String },

    /// The input image has a zero-sized dimension.
    #[error("Invalid image dimensions: {0}x{1}")]
    InvalidDimensions(u32, u32),
}

impl OcrError {
    /// Whether retrying the same call may succeed.
    ///
    /// Network blips, overloaded backends, timeouts and garbled model output
    /// are transient; missing configuration and bad inputs are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            OcrError::EngineFailed { .. } | OcrError::MalformedResponse { .. } | OcrError::Timeout { .. }
        )
    }
}
