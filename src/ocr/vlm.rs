//! Vision-LLM text detection.
//!
//! The normalised scan is sent as a PNG attachment together with a prompt
//! asking for a JSON array of `{text, quad, confidence}` objects. The reply
//! is parsed leniently: models like to wrap JSON in code fences or in a
//! `{"detections": [...]}` object even when told not to.
//!
//! ## Retry Strategy
//!
//! Provider errors (HTTP 429 / 503) and unparseable replies are both retried
//! with exponential backoff (`retry_backoff_ms * 2^attempt`). With 500 ms
//! base and 2 retries the wait sequence is 500 ms → 1 s.

use super::encode::encode_image;
use super::{OcrEngine, Quad, RawDetection};
use crate::config::ExtractionConfig;
use crate::error::OcrError;
use crate::prompts::{image_size_hint, DEFAULT_OCR_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use image::RgbImage;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// An [`OcrEngine`] backed by a vision-capable LLM provider.
pub struct VlmOcrEngine {
    provider: Arc<dyn LLMProvider>,
    name: String,
    system_prompt: String,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl VlmOcrEngine {
    /// Wrap an already-configured provider, taking generation and retry
    /// settings from `config`.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        let name = format!("vlm:{}", provider.name());
        Self {
            provider,
            name,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_OCR_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    /// Resolve a provider from `config` (see [`resolve_provider`]) and wrap it.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, OcrError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl OcrEngine for VlmOcrEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn detect(&self, image: &RgbImage) -> Result<Vec<RawDetection>, OcrError> {
        let start = Instant::now();
        let image_data = encode_image(image).map_err(|e| OcrError::EngineFailed {
            engine: self.name.clone(),
            attempts: 0,
            detail: format!("PNG encoding failed: {e}"),
        })?;

        let messages = vec![
            ChatMessage::system(&self.system_prompt),
            ChatMessage::user_with_images(
                image_size_hint(image.width(), image.height()),
                vec![image_data],
            ),
        ];
        let options = self.options();

        let mut last_err = String::from("no attempt made");

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    self.name, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        self.name,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    match parse_detections(&response.content) {
                        Ok(detections) => return Ok(detections),
                        Err(e) => {
                            warn!("{}: attempt {} unusable: {}", self.name, attempt + 1, e);
                            last_err = e.to_string();
                        }
                    }
                }
                Err(e) => {
                    warn!("{}: attempt {} failed: {}", self.name, attempt + 1, e);
                    last_err = e.to_string();
                }
            }
        }

        Err(OcrError::EngineFailed {
            engine: self.name.clone(),
            attempts: self.max_retries + 1,
            detail: last_err,
        })
    }
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the API key is
///    read from the environment by [`ProviderFactory::create_llm_provider`].
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set, otherwise full auto-detection
///    via [`ProviderFactory::from_env`].
pub fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, OcrError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| OcrError::Unavailable {
            engine: "vlm:auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --detections to replay a dump.\n\
                Error: {e}"
            ),
        })?;

    Ok(llm_provider)
}

fn create_vision_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, OcrError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| OcrError::Unavailable {
        engine: format!("vlm:{provider_name}"),
        hint: format!("{e}"),
    })
}

/// Matches a reply wrapped entirely in a ``` fence, with optional language tag.
static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*```[A-Za-z]*\s*\n(.*?)\n?\s*```\s*$").unwrap());

#[derive(Deserialize)]
struct WireDetection {
    text: String,
    quad: Quad,
    #[serde(default = "full_confidence")]
    confidence: f32,
}

fn full_confidence() -> f32 {
    1.0
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireReply {
    List(Vec<WireDetection>),
    Wrapped { detections: Vec<WireDetection> },
}

/// Parse a model reply into raw detections.
///
/// Accepts a bare JSON array, the same array inside a code fence, or an
/// object with a `detections` array. Missing confidences default to 1.0.
pub fn parse_detections(content: &str) -> Result<Vec<RawDetection>, OcrError> {
    let body = match RE_OUTER_FENCES.captures(content) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => content,
    }
    .trim();

    let reply: WireReply = serde_json::from_str(body).map_err(|e| OcrError::MalformedResponse {
        detail: format!("{e} in reply starting {:?}", preview(body)),
    })?;

    let wire = match reply {
        WireReply::List(list) => list,
        WireReply::Wrapped { detections } => detections,
    };

    Ok(wire
        .into_iter()
        .map(|w| RawDetection::new(w.quad, w.text, w.confidence.clamp(0.0, 1.0)))
        .collect())
}

fn preview(s: &str) -> String {
    s.chars().take(40).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: &str =
        r#"[{"text": "Qty:", "quad": [[10,20],[48,20],[48,34],[10,34]], "confidence": 0.97}]"#;

    #[test]
    fn parses_bare_array() {
        let d = parse_detections(ONE).unwrap();
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].text, "Qty:");
        assert_eq!(d[0].quad[2], [48.0, 34.0]);
        assert!((d[0].confidence - 0.97).abs() < 1e-6);
    }

    #[test]
    fn strips_code_fence() {
        let fenced = format!("```json\n{ONE}\n```");
        assert_eq!(parse_detections(&fenced).unwrap().len(), 1);
    }

    #[test]
    fn accepts_wrapped_object() {
        let wrapped = format!("{{\"detections\": {ONE}}}");
        assert_eq!(parse_detections(&wrapped).unwrap()[0].text, "Qty:");
    }

    #[test]
    fn empty_array_is_fine() {
        assert!(parse_detections("  []  ").unwrap().is_empty());
    }

    #[test]
    fn missing_confidence_defaults_to_one() {
        let d = parse_detections(r#"[{"text":"A","quad":[[0,0],[1,0],[1,1],[0,1]]}]"#).unwrap();
        assert_eq!(d[0].confidence, 1.0);
    }

    #[test]
    fn out_of_range_confidence_is_clamped() {
        let d = parse_detections(r#"[{"text":"A","quad":[[0,0],[1,0],[1,1],[0,1]],"confidence":97}]"#)
            .unwrap();
        assert_eq!(d[0].confidence, 1.0);
    }

    #[test]
    fn prose_is_malformed() {
        let err = parse_detections("I can see a table with three columns.").unwrap_err();
        assert!(matches!(err, OcrError::MalformedResponse { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn three_point_quad_is_malformed() {
        let err = parse_detections(r#"[{"text":"A","quad":[[0,0],[1,0],[1,1]]}]"#).unwrap_err();
        assert!(matches!(err, OcrError::MalformedResponse { .. }));
    }
}
