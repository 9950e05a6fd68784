//! Image normalisation for OCR: grayscale → median denoise → adaptive
//! Gaussian threshold → morphological closing → upscale.
//!
//! Phone photos of spec sheets come with shadows, paper texture and JPEG
//! noise. A global threshold would black out the shadowed half of the page,
//! so each pixel is compared against the Gaussian-weighted mean of its own
//! neighbourhood instead. Small scans are upscaled last because most OCR
//! engines lose accuracy on glyphs only a dozen pixels tall.
//!
//! Every step is a pure function of its input; the same image and config
//! always produce the same raster.

use crate::config::{ExtractionConfig, MAX_CLOSING_KERNEL};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::filter::{median_filter, separable_filter_equal};
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask};
use tracing::debug;

/// Normalise a decoded image for OCR.
pub fn preprocess(image: &DynamicImage, config: &ExtractionConfig) -> GrayImage {
    let gray = image.to_luma8();
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray;
    }

    let radius = config.median_kernel / 2;
    let denoised = if radius > 0 {
        median_filter(&gray, radius, radius)
    } else {
        gray
    };

    let binary = adaptive_gaussian_threshold(
        &denoised,
        config.threshold_block_size,
        config.threshold_bias,
    );
    let closed = close(&binary, config.closing_kernel);
    let out = upscale_to_min_long_side(closed, config.min_long_side);

    debug!(
        "Preprocessed {}x{} → {}x{}",
        w,
        h,
        out.width(),
        out.height()
    );
    out
}

/// Gaussian sigma matching a square aperture of `block_size` pixels.
///
/// This is the usual rule of thumb for deriving a sigma from a kernel size,
/// so a block of 31 gives sigma 5.0.
fn sigma_for_block(block_size: u32) -> f32 {
    0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalised 1-D Gaussian with exactly `block_size` taps.
fn gaussian_taps(block_size: u32) -> Vec<f32> {
    let sigma = sigma_for_block(block_size);
    let centre = (block_size - 1) as f32 / 2.0;
    let taps: Vec<f32> = (0..block_size)
        .map(|i| {
            let d = i as f32 - centre;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = taps.iter().sum();
    taps.into_iter().map(|t| t / sum).collect()
}

/// Binarise against the Gaussian-weighted local mean minus `bias`.
///
/// The mean is taken over the full `block_size`×`block_size` window with
/// replicated borders and rounded to the nearest grey level. A pixel
/// becomes white (255) when it is brighter than its threshold, black (0)
/// otherwise.
pub fn adaptive_gaussian_threshold(image: &GrayImage, block_size: u32, bias: f32) -> GrayImage {
    let taps = gaussian_taps(block_size.max(3) | 1);
    let levels: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
            Luma([image.get_pixel(x, y)[0] as f32])
        });
    let local_mean = separable_filter_equal(&levels, &taps);

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let src = image.get_pixel(x, y)[0] as f32;
        let threshold = local_mean.get_pixel(x, y)[0].round() - bias;
        if src > threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Morphological closing (dilate, then erode) with a `k`×`k` square.
///
/// The anchor sits at `k / 2`, so an even kernel reaches one pixel further
/// up and left than down and right. Pixels outside the image never
/// participate. `k < 2` is the identity.
pub fn close(image: &GrayImage, k: u32) -> GrayImage {
    if k < 2 {
        return image.clone();
    }
    let k = k.min(MAX_CLOSING_KERNEL);
    let anchor = (k / 2) as u8;
    let mask = Mask::from_image(&GrayImage::from_pixel(k, k, Luma([255])), anchor, anchor);
    grayscale_erode(&grayscale_dilate(image, &mask), &mask)
}

/// Uniformly upscale (bicubic) so the longer side is exactly `min_long_side`.
/// Images already at least that large are returned untouched.
pub fn upscale_to_min_long_side(image: GrayImage, min_long_side: u32) -> GrayImage {
    let (w, h) = image.dimensions();
    let long = w.max(h);
    if long == 0 || long >= min_long_side {
        return image;
    }

    // Integer arithmetic keeps the short side free of float rounding drift.
    let scale_side = |side: u32| ((side as u64 * min_long_side as u64 / long as u64) as u32).max(1);
    let (nw, nh) = if w >= h {
        (min_long_side, scale_side(h))
    } else {
        (scale_side(w), min_long_side)
    };

    imageops::resize(&image, nw, nh, FilterType::CatmullRom)
}
