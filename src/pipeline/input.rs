//! Input resolution: turn a user-supplied path or URL into decoded pixels.
//!
//! URLs are downloaded into a `TempDir` that lives as long as the
//! [`ResolvedInput`], so the file is cleaned up even on early return.
//! Bytes are sniffed for a known image signature before decoding, so a
//! mistyped path to a PDF or text file yields a clear [`ImageLoadError`]
//! rather than a decoder error message.

use crate::error::ImageLoadError;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// A local path, or a temp file holding a downloaded image.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the image was downloaded to a temporary directory.
    /// The `TempDir` is kept alive to prevent cleanup until processing completes.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Get the path to the image file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local image file path.
///
/// If the input is a URL, download it to a temporary directory.
/// If the input is a local file, validate it exists and is readable.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, ImageLoadError> {
    if input.trim().is_empty() {
        return Err(ImageLoadError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Resolve a local file path, validating existence and readability.
fn resolve_local(path_str: &str) -> Result<ResolvedInput, ImageLoadError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(ImageLoadError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(ImageLoadError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    match std::fs::File::open(&path) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ImageLoadError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ImageLoadError::FileNotFound { path });
        }
    }

    debug!("Resolved local image: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, ImageLoadError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ImageLoadError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ImageLoadError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ImageLoadError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ImageLoadError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = extract_filename(url);

    let temp_dir = TempDir::new().map_err(|e| ImageLoadError::DownloadFailed {
        url: url.to_string(),
        reason: format!("cannot create temp dir: {e}"),
    })?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ImageLoadError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| ImageLoadError::DownloadFailed {
            url: url.to_string(),
            reason: format!("cannot write temp file: {e}"),
        })?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Extract a reasonable filename from the URL.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.img".to_string()
}

/// Decode raw bytes into an image, sniffing the format from its signature.
///
/// `origin` only labels errors.
pub fn decode_image(bytes: &[u8], origin: &Path) -> Result<DynamicImage, ImageLoadError> {
    let format = image::guess_format(bytes).map_err(|_| ImageLoadError::NotAnImage {
        path: origin.to_path_buf(),
        magic: bytes.iter().take(8).copied().collect(),
    })?;

    image::load_from_memory_with_format(bytes, format).map_err(|e| ImageLoadError::DecodeFailed {
        path: origin.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Read and decode an image file.
pub fn load_image(path: &Path) -> Result<DynamicImage, ImageLoadError> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => ImageLoadError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ImageLoadError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;
    let image = decode_image(&bytes, path)?;
    debug!(
        "Decoded {} → {}x{}",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(image)
}
