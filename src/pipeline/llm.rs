//! Vision model invocation: one bounded call per invoice image.
//!
//! [`VisionModel`] is the seam between the pipeline and a hosted model.
//! [`LlmVisionModel`] implements it over any `edgequake_llm` provider;
//! tests substitute their own implementation. [`invoke`] adds the hard
//! wall-clock bound and rejects empty replies. There is no retry: a failed
//! or slow call surfaces to the caller as an [`InvocationFailure`].

use crate::config::ServiceConfig;
use crate::error::InvocationFailure;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Generation constraints for the extraction call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationLimits {
    pub temperature: f32,
    pub max_output_tokens: usize,
}

impl Default for GenerationLimits {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_output_tokens: 800,
        }
    }
}

impl From<&ServiceConfig> for GenerationLimits {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

/// A multimodal model that answers an instruction about one image.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Provider/model label for logs and the health endpoint.
    fn name(&self) -> &str;

    /// Send the instruction and image, returning the model's raw text.
    async fn generate(
        &self,
        image: ImageData,
        instruction: &str,
        limits: &GenerationLimits,
    ) -> Result<String, InvocationFailure>;
}

/// [`VisionModel`] backed by an `edgequake_llm` provider.
pub struct LlmVisionModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl LlmVisionModel {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

#[async_trait]
impl VisionModel for LlmVisionModel {
    fn name(&self) -> &str {
        &self.label
    }

    /// The instruction goes in the system message; the user turn carries
    /// only the image.
    async fn generate(
        &self,
        image: ImageData,
        instruction: &str,
        limits: &GenerationLimits,
    ) -> Result<String, InvocationFailure> {
        let messages = vec![
            ChatMessage::system(instruction),
            ChatMessage::user_with_images("", vec![image]),
        ];
        let options = build_options(limits);

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| InvocationFailure::Invocation {
                detail: e.to_string(),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Build `CompletionOptions` from the generation limits.
fn build_options(limits: &GenerationLimits) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(limits.temperature),
        max_tokens: Some(limits.max_output_tokens),
        ..Default::default()
    }
}

/// Call the model once, bounded by `timeout`.
///
/// Returns the raw reply text, [`InvocationFailure::Timeout`] when the bound
/// is exceeded, or [`InvocationFailure::Invocation`] when the call fails or
/// the reply is blank.
pub async fn invoke(
    model: &dyn VisionModel,
    image: ImageData,
    instruction: &str,
    limits: &GenerationLimits,
    timeout: Duration,
) -> Result<String, InvocationFailure> {
    let start = Instant::now();

    let outcome = tokio::time::timeout(timeout, model.generate(image, instruction, limits)).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Err(_) => {
            error!("{}: model call timed out after {}ms", model.name(), elapsed_ms);
            Err(InvocationFailure::Timeout { elapsed_ms })
        }
        Ok(Err(failure)) => {
            error!("{}: model call failed after {}ms: {}", model.name(), elapsed_ms, failure);
            Err(failure)
        }
        Ok(Ok(text)) if text.trim().is_empty() => {
            error!("{}: empty reply after {}ms", model.name(), elapsed_ms);
            Err(InvocationFailure::Invocation {
                detail: "Empty response from model".to_string(),
            })
        }
        Ok(Ok(text)) => {
            info!(
                "{}: model replied in {}ms ({} chars)",
                model.name(),
                elapsed_ms,
                text.len()
            );
            Ok(text)
        }
    }
}
