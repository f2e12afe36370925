//! Extraction entry points: image bytes → normalized invoice.
//!
//! [`extract_invoice`] runs preprocessing, the bounded model call and
//! normalization for one image. [`resolve_model`] builds the
//! [`VisionModel`] once at startup; the server shares it between requests.

use crate::config::ServiceConfig;
use crate::error::InvoiceError;
use crate::pipeline::llm::{self, GenerationLimits, LlmVisionModel, VisionModel};
use crate::pipeline::{encode, normalize};
use crate::prompts::EXTRACTION_PROMPT;
use crate::record::{InvoiceRecord, NormalizationReport};
use edgequake_llm::{LLMProvider, ProviderFactory};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Default model when the provider is chosen by name or by `GEMINI_API_KEY`.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-pro";

/// Vision-capable default model for a named provider.
pub fn default_model(provider_name: &str) -> &'static str {
    match provider_name {
        "openai" | "azure" => "gpt-4.1-mini",
        "anthropic" => "claude-sonnet-4-20250514",
        "mistral" => "pixtral-12b-2409",
        "ollama" | "lmstudio" => "llava",
        _ => DEFAULT_GEMINI_MODEL,
    }
}

/// Result of extracting one invoice.
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    pub record: InvoiceRecord,
    pub report: NormalizationReport,
    pub duration_ms: u64,
}

impl Extraction {
    /// Wall-clock time formatted as seconds, e.g. `"3.42s"`.
    pub fn processing_time(&self) -> String {
        format!("{:.2}s", self.duration_ms as f64 / 1000.0)
    }
}

/// Extract an invoice record from raw image bytes.
///
/// # Errors
/// - [`InvoiceError::ImageDecode`] when the bytes are not a PNG/JPEG image
/// - [`InvoiceError::InvocationTimeout`] / [`InvoiceError::Invocation`] when
///   the model call fails
///
/// A malformed model reply is not an error: it yields an empty record with
/// `report.malformed` set.
pub async fn extract_invoice(
    model: &dyn VisionModel,
    image_bytes: Vec<u8>,
    config: &ServiceConfig,
) -> Result<Extraction, InvoiceError> {
    let start = Instant::now();

    // ── Step 1: Preprocess image (CPU-bound) ─────────────────────────────
    let max_dimension = config.max_image_dimension;
    let quality = config.jpeg_quality;
    let image = tokio::task::spawn_blocking(move || {
        encode::prepare_image(&image_bytes, max_dimension, quality)
    })
    .await
    .map_err(|e| InvoiceError::Internal(format!("image task failed: {e}")))?
    .map_err(|e| InvoiceError::ImageDecode(e.to_string()))?;

    // ── Step 2: Call the model ───────────────────────────────────────────
    let instruction = config.instruction.as_deref().unwrap_or(EXTRACTION_PROMPT);
    let raw = llm::invoke(
        model,
        image,
        instruction,
        &GenerationLimits::from(config),
        Duration::from_secs(config.model_timeout_secs),
    )
    .await?;

    // ── Step 3: Normalize ────────────────────────────────────────────────
    let (record, report) = normalize::normalize_with_report(&raw);
    if !report.discrepancies.is_empty() {
        warn!(
            "{} line total(s) recomputed from quantity × price",
            report.discrepancies.len()
        );
    }

    let duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Total processing time: {:.2}s ({} line items)",
        duration_ms as f64 / 1000.0,
        record.line_items.len()
    );

    Ok(Extraction {
        record,
        report,
        duration_ms,
    })
}

/// Build the vision model from config and environment.
///
/// Resolution order:
/// 1. `config.provider_name` (+ `config.model`)
/// 2. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
/// 3. Gemini, when `GEMINI_API_KEY` is set
/// 4. `ProviderFactory::from_env()` auto-detection
pub fn resolve_model(config: &ServiceConfig) -> Result<Arc<dyn VisionModel>, InvoiceError> {
    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(default_model(name));
        return create_vision_model(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_model(&prov, &model);
        }
    }

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
            return create_vision_model("gemini", model);
        }
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| InvoiceError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or ANTHROPIC_API_KEY.\n\
                Error: {}",
                e
            ),
        })?;
    Ok(wrap_provider(provider, "auto"))
}

fn create_vision_model(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn VisionModel>, InvoiceError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        InvoiceError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok(wrap_provider(provider, &format!("{provider_name}/{model}")))
}

fn wrap_provider(provider: Arc<dyn LLMProvider>, label: &str) -> Arc<dyn VisionModel> {
    info!("Initialized vision model: {}", label);
    Arc::new(LlmVisionModel::new(provider, label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InvocationFailure, MalformedReason};
    use async_trait::async_trait;
    use edgequake_llm::ImageData;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;

    struct Canned(&'static str);

    #[async_trait]
    impl VisionModel for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn generate(
            &self,
            _image: ImageData,
            _instruction: &str,
            _limits: &GenerationLimits,
        ) -> Result<String, InvocationFailure> {
            Ok(self.0.to_string())
        }
    }

    fn png() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([200, 200, 200])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn extracts_and_normalizes() {
        let model = Canned(
            r#"Sure! {"company_details":{"name":"A"},"invoice_details":{},"line_items":[{"quantity":"2.20","price":160.00,"total":"999"}],"totals":{}}"#,
        );
        let out = extract_invoice(&model, png(), &ServiceConfig::default())
            .await
            .expect("extraction");
        assert_eq!(out.record.totals.total, 411.84);
        assert_eq!(out.report.discrepancies.len(), 1);
        assert!(out.processing_time().ends_with('s'));
    }

    #[tokio::test]
    async fn malformed_reply_is_not_an_error() {
        let model = Canned("Sorry, I cannot process this image.");
        let out = extract_invoice(&model, png(), &ServiceConfig::default())
            .await
            .expect("extraction");
        assert!(out.record.is_empty());
        assert_eq!(out.report.malformed, Some(MalformedReason::NoJsonObject));
    }

    #[tokio::test]
    async fn undecodable_image_is_rejected() {
        let model = Canned("{}");
        let err = extract_invoice(&model, b"GIF89a....".to_vec(), &ServiceConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, InvoiceError::ImageDecode(_)));
    }

    #[test]
    fn default_models_per_provider() {
        assert_eq!(default_model("gemini"), DEFAULT_GEMINI_MODEL);
        assert_eq!(default_model("openai"), "gpt-4.1-mini");
        assert_eq!(default_model("ollama"), "llava");
    }

    #[test]
    fn processing_time_format() {
        let e = Extraction {
            record: InvoiceRecord::empty(),
            report: NormalizationReport::default(),
            duration_ms: 3421,
        };
        assert_eq!(e.processing_time(), "3.42s");
    }
}
