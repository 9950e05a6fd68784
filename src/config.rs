//! Configuration types for image-to-CSV extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Every threshold the layout heuristics
//! use lives here with its documented default, so two runs can be diffed by
//! diffing their configs.

use crate::error::Img2CsvError;
use crate::ocr::OcrEngine;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Largest closing structuring element accepted; its anchor must fit a `u8`.
pub const MAX_CLOSING_KERNEL: u32 = 255;

/// Configuration for one extraction.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_img2csv::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .min_confidence(0.4)
///     .ocr_timeout_secs(60)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    // ── Preprocessing ────────────────────────────────────────────────────
    /// Run the denoise/binarise/upscale pass before OCR. Default: true.
    ///
    /// Disable for clean, born-digital screenshots where binarisation only
    /// thins strokes.
    pub preprocess: bool,

    /// Aperture of the median denoise filter, in pixels. Default: 3.
    pub median_kernel: u32,

    /// Neighbourhood size of the adaptive Gaussian threshold. Odd, ≥ 3. Default: 31.
    pub threshold_block_size: u32,

    /// Constant subtracted from the local Gaussian mean. Default: 5.0.
    pub threshold_bias: f32,

    /// Side of the square structuring element used for closing. Default: 2.
    pub closing_kernel: u32,

    /// Images whose longer side is below this are upscaled to it. Default: 1400.
    pub min_long_side: u32,

    // ── Row grouping ─────────────────────────────────────────────────────
    /// Lower bound of the vertical row tolerance, in pixels. Default: 6.0.
    pub min_row_tolerance: f32,

    /// Row tolerance as a fraction of the median detection height. Default: 0.6.
    pub row_tolerance_factor: f32,

    // ── Classification ───────────────────────────────────────────────────
    /// Minimum cells for a row to be emitted as a table row. Default: 3.
    pub table_min_cells: usize,

    /// Maximum mean cell length (characters) of a table row. Default: 12.0.
    pub table_max_mean_len: f32,

    // ── Section merging ──────────────────────────────────────────────────
    /// Fold standalone titles into the following table row. Default: true.
    pub merge_sections: bool,

    /// Prefix of a merged section title cell. Default: `"[Section] "`.
    pub section_prefix: String,

    // ── OCR ──────────────────────────────────────────────────────────────
    /// Drop detections whose confidence is below this value. Default: None.
    ///
    /// Engines disagree wildly on what their scores mean, so nothing is
    /// filtered unless the caller picks a threshold for their engine.
    pub min_confidence: Option<f32>,

    /// Upper bound on a single OCR call, in seconds. Default: Some(120).
    pub ocr_timeout_secs: Option<u64>,

    /// Pre-constructed OCR engine. Takes precedence over every VLM setting.
    pub engine: Option<Arc<dyn OcrEngine>>,

    /// LLM model identifier for the VLM engine, e.g. "gpt-4.1-mini".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider for the VLM engine. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the VLM engine. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the VLM may generate per image. Default: 4096.
    ///
    /// A dense spec sheet yields a few hundred detections at ~25 tokens each.
    pub max_tokens: usize,

    /// Retries on a transient VLM failure. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds; doubles after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom VLM system prompt. If None, uses the built-in detector prompt.
    pub system_prompt: Option<String>,

    // ── Input ────────────────────────────────────────────────────────────
    /// Download timeout for URL inputs in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Receives stage events as the pipeline runs. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            preprocess: true,
            median_kernel: 3,
            threshold_block_size: 31,
            threshold_bias: 5.0,
            closing_kernel: 2,
            min_long_side: 1400,
            min_row_tolerance: 6.0,
            row_tolerance_factor: 0.6,
            table_min_cells: 3,
            table_max_mean_len: 12.0,
            merge_sections: true,
            section_prefix: "[Section] ".to_string(),
            min_confidence: None,
            ocr_timeout_secs: Some(120),
            engine: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 2,
            retry_backoff_ms: 500,
            system_prompt: None,
            download_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("preprocess", &self.preprocess)
            .field("median_kernel", &self.median_kernel)
            .field("threshold_block_size", &self.threshold_block_size)
            .field("threshold_bias", &self.threshold_bias)
            .field("closing_kernel", &self.closing_kernel)
            .field("min_long_side", &self.min_long_side)
            .field("min_row_tolerance", &self.min_row_tolerance)
            .field("row_tolerance_factor", &self.row_tolerance_factor)
            .field("table_min_cells", &self.table_min_cells)
            .field("table_max_mean_len", &self.table_max_mean_len)
            .field("merge_sections", &self.merge_sections)
            .field("section_prefix", &self.section_prefix)
            .field("min_confidence", &self.min_confidence)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("engine", &self.engine.as_ref().map(|e| e.name().to_string()))
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Vertical tolerance for row grouping given the median detection height.
    pub fn row_tolerance(&self, median_height: f32) -> f32 {
        self.min_row_tolerance
            .max(median_height * self.row_tolerance_factor)
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn preprocess(mut self, v: bool) -> Self {
        self.config.preprocess = v;
        self
    }

    pub fn median_kernel(mut self, px: u32) -> Self {
        self.config.median_kernel = px;
        self
    }

    pub fn threshold_block_size(mut self, px: u32) -> Self {
        self.config.threshold_block_size = px;
        self
    }

    pub fn threshold_bias(mut self, bias: f32) -> Self {
        self.config.threshold_bias = bias;
        self
    }

    pub fn closing_kernel(mut self, px: u32) -> Self {
        self.config.closing_kernel = px;
        self
    }

    pub fn min_long_side(mut self, px: u32) -> Self {
        self.config.min_long_side = px;
        self
    }

    pub fn min_row_tolerance(mut self, px: f32) -> Self {
        self.config.min_row_tolerance = px.max(0.0);
        self
    }

    pub fn row_tolerance_factor(mut self, factor: f32) -> Self {
        self.config.row_tolerance_factor = factor.max(0.0);
        self
    }

    pub fn table_min_cells(mut self, n: usize) -> Self {
        self.config.table_min_cells = n.max(2);
        self
    }

    pub fn table_max_mean_len(mut self, chars: f32) -> Self {
        self.config.table_max_mean_len = chars;
        self
    }

    pub fn merge_sections(mut self, v: bool) -> Self {
        self.config.merge_sections = v;
        self
    }

    pub fn section_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.section_prefix = prefix.into();
        self
    }

    pub fn min_confidence(mut self, threshold: f32) -> Self {
        self.config.min_confidence = Some(threshold.clamp(0.0, 1.0));
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = Some(secs);
        self
    }

    /// Let the OCR call run for as long as the engine needs.
    pub fn no_ocr_timeout(mut self) -> Self {
        self.config.ocr_timeout_secs = None;
        self
    }

    pub fn engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.engine = Some(engine);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Img2CsvError> {
        let c = &self.config;
        if c.threshold_block_size < 3 || c.threshold_block_size % 2 == 0 {
            return Err(Img2CsvError::InvalidConfig(format!(
                "Threshold block size must be odd and ≥ 3, got {}",
                c.threshold_block_size
            )));
        }
        if c.median_kernel % 2 == 0 {
            return Err(Img2CsvError::InvalidConfig(format!(
                "Median kernel must be odd, got {}",
                c.median_kernel
            )));
        }
        if c.closing_kernel > MAX_CLOSING_KERNEL {
            return Err(Img2CsvError::InvalidConfig(format!(
                "Closing kernel must be ≤ {MAX_CLOSING_KERNEL} px, got {}",
                c.closing_kernel
            )));
        }
        if c.min_long_side == 0 {
            return Err(Img2CsvError::InvalidConfig(
                "Minimum long side must be ≥ 1 px".into(),
            ));
        }
        if c.ocr_timeout_secs == Some(0) {
            return Err(Img2CsvError::InvalidConfig(
                "OCR timeout must be ≥ 1s (use no_ocr_timeout() to disable it)".into(),
            ));
        }
        Ok(self.config)
    }
}
