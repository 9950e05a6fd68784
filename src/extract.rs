//! Extraction entry points.
//!
//! [`extract`] runs the whole pipeline on a path or URL. The other entry
//! points start later in the pipeline: [`extract_from_bytes`] from encoded
//! bytes, [`extract_image`] from decoded pixels, and [`reconstruct`] from
//! detections an OCR engine has already produced.

use crate::config::ExtractionConfig;
use crate::error::Img2CsvError;
use crate::ocr::{OcrEngine, RawDetection, VlmOcrEngine};
use crate::output::{ExtractionOutput, ExtractionStats};
use crate::pipeline::layout::{self, Layout};
use crate::pipeline::{classify, input, preprocess, rows, sections};
use crate::progress::{ExtractionProgressCallback, Stage};
use image::{DynamicImage, GrayImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Extract CSV rows from an image file or URL.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// - [`Img2CsvError::ImageLoad`] when the input is missing or not a
///   decodable image. No OCR call has been made in that case.
/// - [`Img2CsvError::Ocr`] when no engine is available or the engine fails.
///
/// An image without any text is not an error: the output has zero rows.
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Img2CsvError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);

    // ── Step 1: Resolve and decode ───────────────────────────────────────
    notify(config, |cb| cb.on_stage_start(Stage::Load));
    let load_start = Instant::now();
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let path = resolved.path().to_path_buf();
    let image = tokio::task::spawn_blocking(move || input::load_image(&path))
        .await
        .map_err(|e| Img2CsvError::Internal(format!("decode task failed: {e}")))??;
    let load_duration_ms = load_start.elapsed().as_millis() as u64;
    notify(config, |cb| {
        cb.on_stage_complete(Stage::Load, image.width().max(image.height()) as usize)
    });

    // ── Step 2: Everything after decoding ────────────────────────────────
    let mut output = extract_image(image, config).await?;
    output.stats.load_duration_ms = load_duration_ms;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    Ok(output)
}

/// Extract CSV rows from an already-decoded image.
pub async fn extract_image(
    image: DynamicImage,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Img2CsvError> {
    let start = Instant::now();
    let engine = resolve_engine(config)?;

    // ── Preprocess ───────────────────────────────────────────────────────
    notify(config, |cb| cb.on_stage_start(Stage::Preprocess));
    let pre_start = Instant::now();
    let normalized: GrayImage = if config.preprocess {
        let cfg = config.clone();
        tokio::task::spawn_blocking(move || preprocess::preprocess(&image, &cfg))
            .await
            .map_err(|e| Img2CsvError::Internal(format!("preprocess task failed: {e}")))?
    } else {
        image.to_luma8()
    };
    let preprocess_duration_ms = pre_start.elapsed().as_millis() as u64;
    let (width, height) = normalized.dimensions();
    notify(config, |cb| {
        cb.on_stage_complete(Stage::Preprocess, width.max(height) as usize)
    });

    // ── OCR ──────────────────────────────────────────────────────────────
    notify(config, |cb| cb.on_stage_start(Stage::Ocr));
    let ocr_start = Instant::now();
    let timeout = config.ocr_timeout_secs.map(Duration::from_secs);
    let layout =
        layout::read_layout(engine.as_ref(), &normalized, config.min_confidence, timeout).await?;
    let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;
    info!(
        "OCR found {} detections in {}ms",
        layout.detections.len(),
        ocr_duration_ms
    );
    notify(config, |cb| cb.on_stage_complete(Stage::Ocr, layout.detections.len()));

    // ── Rows → CSV ───────────────────────────────────────────────────────
    let mut output = reconstruct_layout(layout, config);
    output.stats.image_width = width;
    output.stats.image_height = height;
    output.stats.preprocess_duration_ms = preprocess_duration_ms;
    output.stats.ocr_duration_ms = ocr_duration_ms;
    output.stats.total_duration_ms = start.elapsed().as_millis() as u64;

    info!(
        "Extraction complete: {} CSV rows from {} text rows, {}ms total",
        output.stats.csv_rows, output.stats.text_rows, output.stats.total_duration_ms
    );
    notify(config, |cb| cb.on_extraction_complete(output.rows.len()));

    Ok(output)
}

/// Extract CSV rows from encoded image bytes held in memory.
///
/// # Example
/// ```rust,no_run
/// use edgequake_img2csv::{extract_from_bytes, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("spec-sheet.jpg")?;
/// let output = extract_from_bytes(&bytes, &ExtractionConfig::default()).await?;
/// print!("{}", output.to_csv()?);
/// # Ok(())
/// # }
/// ```
pub async fn extract_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Img2CsvError> {
    let total_start = Instant::now();
    notify(config, |cb| cb.on_stage_start(Stage::Load));
    let owned = bytes.to_vec();
    let image = tokio::task::spawn_blocking(move || {
        input::decode_image(&owned, Path::new("<memory>"))
    })
    .await
    .map_err(|e| Img2CsvError::Internal(format!("decode task failed: {e}")))??;
    let load_duration_ms = total_start.elapsed().as_millis() as u64;
    notify(config, |cb| {
        cb.on_stage_complete(Stage::Load, image.width().max(image.height()) as usize)
    });

    let mut output = extract_image(image, config).await?;
    output.stats.load_duration_ms = load_duration_ms;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    Ok(output)
}

/// Extract and write the CSV directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn extract_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionStats, Img2CsvError> {
    let output = extract(input_str, config).await?;
    let path = output_path.as_ref();
    let csv_text = output.to_csv()?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| write_failed(path, e))?;
    }

    let tmp_path = path.with_extension("csv.tmp");
    tokio::fs::write(&tmp_path, csv_text.as_bytes())
        .await
        .map_err(|e| write_failed(path, e))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| write_failed(path, e))?;

    debug!("Wrote {} CSV rows to {}", output.rows.len(), path.display());
    Ok(output.stats)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Img2CsvError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Img2CsvError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input_str, config))
}

/// Rebuild CSV rows from OCR detections without touching any image.
///
/// Applies the confidence filter, reading order, row grouping,
/// classification and section merging. Deterministic.
pub fn reconstruct(detections: Vec<RawDetection>, config: &ExtractionConfig) -> ExtractionOutput {
    let layout = layout::build_layout(detections, config.min_confidence);
    reconstruct_layout(layout, config)
}

/// The engine `config` asks for: an explicit one, or a VLM resolved from
/// the provider settings and environment.
pub fn resolve_engine(config: &ExtractionConfig) -> Result<Arc<dyn OcrEngine>, Img2CsvError> {
    if let Some(ref engine) = config.engine {
        return Ok(Arc::clone(engine));
    }
    let engine = VlmOcrEngine::from_config(config)?;
    Ok(Arc::new(engine))
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn reconstruct_layout(layout: Layout, config: &ExtractionConfig) -> ExtractionOutput {
    let start = Instant::now();
    let mut stats = ExtractionStats {
        detections: layout.detections.len(),
        dropped_empty: layout.dropped_empty,
        dropped_low_confidence: layout.dropped_low_confidence,
        ..Default::default()
    };

    notify(config, |cb| cb.on_stage_start(Stage::Group));
    let text_rows = rows::group_rows(layout.detections, config);
    stats.text_rows = text_rows.len();
    notify(config, |cb| cb.on_stage_complete(Stage::Group, text_rows.len()));

    notify(config, |cb| cb.on_stage_start(Stage::Assemble));
    let mut csv_rows = classify::assemble(&text_rows, config);
    notify(config, |cb| cb.on_stage_complete(Stage::Assemble, csv_rows.len()));

    if config.merge_sections {
        notify(config, |cb| cb.on_stage_start(Stage::MergeSections));
        let (merged, count) = sections::merge_sections(csv_rows, &config.section_prefix);
        csv_rows = merged;
        stats.sections_merged = count;
        notify(config, |cb| {
            cb.on_stage_complete(Stage::MergeSections, csv_rows.len())
        });
    }

    stats.csv_rows = csv_rows.len();
    stats.reconstruct_duration_ms = start.elapsed().as_millis() as u64;
    debug!(
        "Reconstructed {} text rows into {} CSV rows ({} sections merged)",
        stats.text_rows, stats.csv_rows, stats.sections_merged
    );

    ExtractionOutput {
        rows: csv_rows,
        stats,
    }
}

fn notify(config: &ExtractionConfig, f: impl FnOnce(&dyn ExtractionProgressCallback)) {
    if let Some(ref cb) = config.progress_callback {
        f(cb.as_ref());
    }
}

fn write_failed(path: &Path, source: std::io::Error) -> Img2CsvError {
    Img2CsvError::OutputWriteFailed {
        path: PathBuf::from(path),
        source,
    }
}
