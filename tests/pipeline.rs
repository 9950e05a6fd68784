//! Integration tests driving the public API with a fixture OCR engine.
//!
//! No model is involved: the fixture returns canned detections, so these
//! tests run offline and are deterministic.

use async_trait::async_trait;
use edgequake_img2csv::{
    extract, extract_from_bytes, extract_sync, reconstruct, ExtractionConfig,
    ExtractionProgressCallback, ImageLoadError, Img2CsvError, OcrEngine, OcrError, RawDetection,
    Stage,
};
use image::{GrayImage, ImageFormat, Luma, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Fixtures ─────────────────────────────────────────────────────────────────

/// Returns canned detections and remembers what it was shown.
#[derive(Default)]
struct FixtureEngine {
    detections: Vec<RawDetection>,
    calls: AtomicUsize,
    seen_size: Mutex<Option<(u32, u32)>>,
}

impl FixtureEngine {
    fn new(detections: Vec<RawDetection>) -> Arc<Self> {
        Arc::new(Self {
            detections,
            ..Default::default()
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrEngine for FixtureEngine {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn detect(&self, image: &RgbImage) -> Result<Vec<RawDetection>, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_size.lock().unwrap() = Some(image.dimensions());
        Ok(self.detections.clone())
    }
}

struct BrokenEngine;

#[async_trait]
impl OcrEngine for BrokenEngine {
    fn name(&self) -> &str {
        "broken"
    }

    async fn detect(&self, _image: &RgbImage) -> Result<Vec<RawDetection>, OcrError> {
        Err(OcrError::EngineFailed {
            engine: "broken".into(),
            attempts: 1,
            detail: "HTTP 503".into(),
        })
    }
}

#[derive(Default)]
struct StageRecorder {
    events: Mutex<Vec<String>>,
}

impl ExtractionProgressCallback for StageRecorder {
    fn on_stage_start(&self, stage: Stage) {
        self.events.lock().unwrap().push(format!("+{stage}"));
    }

    fn on_stage_complete(&self, stage: Stage, _items: usize) {
        self.events.lock().unwrap().push(format!("-{stage}"));
    }

    fn on_extraction_complete(&self, csv_rows: usize) {
        self.events.lock().unwrap().push(format!("done {csv_rows}"));
    }
}

fn cell(x: f32, y: f32, w: f32, text: &str) -> RawDetection {
    RawDetection::from_rect(x, y, w, 24.0, text, 0.93)
}

/// A jewellery spec sheet as an OCR engine would see it at 1400 px.
fn spec_sheet() -> Vec<RawDetection> {
    vec![
        cell(40.0, 30.0, 400.0, "Acme Jewellery Ltd"),
        cell(40.0, 90.0, 300.0, "Order No: 4471-B"),
        cell(40.0, 150.0, 300.0, "Date:  2023-01-01"),
        cell(40.0, 230.0, 200.0, "Stones"),
        // Header row, slightly skewed.
        cell(40.0, 290.0, 90.0, "Type"),
        cell(300.0, 292.0, 90.0, "Ct"),
        cell(560.0, 294.0, 90.0, "Qty"),
        cell(40.0, 340.0, 90.0, "Diamond"),
        cell(300.0, 341.0, 90.0, "0.25"),
        cell(560.0, 339.0, 90.0, "12"),
        cell(40.0, 420.0, 120.0, "Finish:"),
        cell(300.0, 421.0, 200.0, "High polish,"),
        cell(560.0, 419.0, 260.0, "rhodium plated finish"),
        cell(40.0, 480.0, 120.0, "Qty:"),
        cell(300.0, 481.0, 40.0, "5"),
    ]
}

fn expected_rows() -> Vec<Vec<String>> {
    [
        vec!["Acme Jewellery Ltd"],
        vec!["Order No", "4471-B"],
        vec!["Date", "2023-01-01"],
        vec!["[Section] Stones", "Type", "Ct", "Qty"],
        vec!["Diamond", "0.25", "12"],
        vec!["Finish", "High polish, rhodium plated finish"],
        vec!["Qty", "5"],
    ]
    .into_iter()
    .map(|r| r.into_iter().map(String::from).collect())
    .collect()
}

/// A white page with a few dark bars standing in for text.
fn write_scan(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let img = GrayImage::from_fn(width, height, |x, y| {
        if y % 40 < 8 && x % 120 < 80 {
            Luma([30])
        } else {
            Luma([235])
        }
    });
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}

/// Route library logs through the test harness; run with `--nocapture` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("edgequake_img2csv=debug")
        .with_test_writer()
        .try_init();
}

fn config_with(engine: Arc<dyn OcrEngine>) -> ExtractionConfig {
    ExtractionConfig::builder().engine(engine).build().unwrap()
}

// ── Full pipeline ────────────────────────────────────────────────────────────

#[tokio::test]
async fn extract_spec_sheet_from_png() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = write_scan(dir.path(), "sheet.png", 700, 400);
    let engine = FixtureEngine::new(spec_sheet());

    let output = extract(path.to_string_lossy(), &config_with(engine.clone()))
        .await
        .expect("extraction succeeds");

    assert_eq!(output.rows, expected_rows());
    assert_eq!(engine.calls(), 1);
    assert_eq!(
        *engine.seen_size.lock().unwrap(),
        Some((1400, 800)),
        "engine sees the upscaled raster"
    );
    assert_eq!(output.stats.image_width, 1400);
    assert_eq!(output.stats.detections, 15);
    assert_eq!(output.stats.sections_merged, 1);
}

#[tokio::test]
async fn csv_output_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scan(dir.path(), "sheet.png", 1500, 600);
    let engine = FixtureEngine::new(spec_sheet());

    let output = extract(path.to_string_lossy(), &config_with(engine))
        .await
        .unwrap();
    let text = output.to_csv().unwrap();
    assert!(text.contains("\"High polish, rhodium plated finish\""));
    assert!(text.ends_with('\n'));

    let parsed: Vec<Vec<String>> = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes())
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    assert_eq!(parsed, output.rows);
}

#[tokio::test]
async fn extract_from_in_memory_png() {
    let mut bytes = Vec::new();
    RgbImage::from_pixel(1600, 900, image::Rgb([240, 240, 240]))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    let engine = FixtureEngine::new(spec_sheet());

    let output = extract_from_bytes(&bytes, &config_with(engine.clone()))
        .await
        .unwrap();
    assert_eq!(output.rows.len(), 7);
    assert_eq!(*engine.seen_size.lock().unwrap(), Some((1600, 900)));
}

#[tokio::test]
async fn no_text_means_no_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scan(dir.path(), "blank.png", 200, 200);
    let engine = FixtureEngine::new(Vec::new());

    let output = extract(path.to_string_lossy(), &config_with(engine))
        .await
        .expect("an empty page is not an error");
    assert!(output.rows.is_empty());
    assert_eq!(output.to_csv().unwrap(), "");
}

#[tokio::test]
async fn confidence_threshold_drops_faint_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scan(dir.path(), "sheet.png", 1400, 700);
    let mut detections = spec_sheet();
    detections.push(RawDetection::from_rect(900.0, 600.0, 80.0, 24.0, "~~", 0.05));

    let engine = FixtureEngine::new(detections);
    let config = ExtractionConfig::builder()
        .engine(engine)
        .min_confidence(0.3)
        .build()
        .unwrap();

    let output = extract(path.to_string_lossy(), &config).await.unwrap();
    assert_eq!(output.rows, expected_rows());
    assert_eq!(output.stats.dropped_low_confidence, 1);
}

#[tokio::test]
async fn stages_reported_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scan(dir.path(), "sheet.png", 300, 300);
    let recorder = Arc::new(StageRecorder::default());
    let config = ExtractionConfig::builder()
        .engine(FixtureEngine::new(spec_sheet()))
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    extract(path.to_string_lossy(), &config).await.unwrap();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "+load",
            "-load",
            "+preprocess",
            "-preprocess",
            "+ocr",
            "-ocr",
            "+group",
            "-group",
            "+assemble",
            "-assemble",
            "+merge-sections",
            "-merge-sections",
            "done 7",
        ]
    );
}

#[tokio::test]
async fn concurrent_extractions_share_one_engine() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FixtureEngine::new(spec_sheet());
    let config = config_with(engine.clone());

    let mut handles = Vec::new();
    for i in 0..4 {
        let path = write_scan(dir.path(), &format!("sheet-{i}.png"), 400 + i * 10, 300);
        let config = config.clone();
        handles.push(tokio::spawn(async move {
            extract(path.to_string_lossy(), &config).await
        }));
    }
    for h in handles {
        assert_eq!(h.await.unwrap().unwrap().rows, expected_rows());
    }
    assert_eq!(engine.calls(), 4);
}

#[test]
fn sync_wrapper_runs_outside_a_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scan(dir.path(), "sheet.png", 500, 500);
    let output = extract_sync(
        path.to_string_lossy(),
        &config_with(FixtureEngine::new(spec_sheet())),
    )
    .unwrap();
    assert_eq!(output.rows.len(), 7);
}

// ── Error kinds ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_image_fails_before_ocr() {
    let engine = FixtureEngine::new(spec_sheet());
    let err = extract("/no/such/scan.jpg", &config_with(engine.clone()))
        .await
        .unwrap_err();

    assert!(err.is_input_error(), "got {err:?}");
    assert!(matches!(
        err,
        Img2CsvError::ImageLoad(ImageLoadError::FileNotFound { .. })
    ));
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn non_image_file_fails_before_ocr() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.jpg");
    std::fs::write(&path, "Qty: 5\nDate: 2023-01-01\n").unwrap();
    let engine = FixtureEngine::new(spec_sheet());

    let err = extract(path.to_string_lossy(), &config_with(engine.clone()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Img2CsvError::ImageLoad(ImageLoadError::NotAnImage { .. })
    ));
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn engine_failure_is_not_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scan(dir.path(), "sheet.png", 300, 300);

    let err = extract(path.to_string_lossy(), &config_with(Arc::new(BrokenEngine)))
        .await
        .unwrap_err();
    assert!(!err.is_input_error());
    match err {
        Img2CsvError::Ocr(e) => assert!(e.is_transient()),
        other => panic!("expected OCR error, got {other:?}"),
    }
}

// ── Pure reconstruction ──────────────────────────────────────────────────────

#[test]
fn reconstruct_is_order_independent() {
    let forward = reconstruct(spec_sheet(), &ExtractionConfig::default());
    let mut shuffled = spec_sheet();
    shuffled.reverse();
    shuffled.swap(2, 9);
    let backward = reconstruct(shuffled, &ExtractionConfig::default());
    assert_eq!(forward.rows, backward.rows);
    assert_eq!(forward.rows, expected_rows());
}

#[test]
fn reconstruct_is_deterministic() {
    let config = ExtractionConfig::default();
    let a = reconstruct(spec_sheet(), &config);
    let b = reconstruct(spec_sheet(), &config);
    assert_eq!(a.rows, b.rows);
}
