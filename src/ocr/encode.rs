//! Image encoding: `RgbImage` → base64 PNG wrapped in `ImageData`.
//!
//! VLM APIs accept images as base64 data-URIs embedded in the JSON request
//! body. PNG is lossless, which matters for the thin strokes of a binarised
//! scan far more than file size does.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::RgbImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a normalised scan as a base64 PNG ready for the VLM API.
///
/// `detail: "high"` keeps the provider from downscaling to a single overview
/// tile, which would erase the small print of table cells.
pub fn encode_image(img: &RgbImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} image → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn encode_small_image() {
        let img = RgbImage::from_pixel(12, 8, Rgb([255, 255, 255]));
        let data = encode_image(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        // PNG signature
        assert_eq!(&decoded[..4], b"\x89PNG");
    }
}
