//! Configuration types for the invoice extraction service.
//!
//! All service behaviour is controlled through [`ServiceConfig`], built via
//! its [`ServiceConfigBuilder`]. The binary maps CLI flags and environment
//! variables onto the builder; library users set only what they need and rely
//! on the defaults for the rest.

use crate::error::InvoiceError;
use serde::{Deserialize, Serialize};

/// Configuration for the invoice extraction service.
///
/// # Example
/// ```rust
/// use invoice_lens::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .port(8080)
///     .model("gemini-1.5-pro")
///     .model_timeout_secs(20)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Bind address. Default: "127.0.0.1".
    pub host: String,

    /// Bind port. Default: 5000.
    pub port: u16,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic").
    /// If None, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// LLM model identifier, e.g. "gemini-1.5-pro", "gpt-4.1-mini".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// Sampling temperature for the extraction call. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per invoice. Default: 800.
    ///
    /// A full invoice JSON with a dozen line items stays well under this.
    pub max_output_tokens: usize,

    /// Wall-clock bound on a single model call in seconds. Default: 28.
    ///
    /// Must be shorter than `request_timeout_secs` so normalization and
    /// response serialisation still fit inside the request budget.
    pub model_timeout_secs: u64,

    /// Overall `/upload` bound in seconds, covering form read, download,
    /// preprocessing and the model call. Default: 30.
    pub request_timeout_secs: u64,

    /// Timeout for downloading a remote image (`firebase_url`). Default: 30.
    ///
    /// May not exceed `request_timeout_secs`; a download that eats into the
    /// model's share is cut off by the request bound instead.
    pub download_timeout_secs: u64,

    /// Maximum accepted image size in bytes. Default: 5 MiB.
    pub max_file_bytes: usize,

    /// Maximum HTTP request body size in bytes. Default: 6 MiB.
    pub max_body_bytes: usize,

    /// Longest edge, in pixels, of the image sent to the model. Default: 600.
    pub max_image_dimension: u32,

    /// JPEG quality (1–100) of the image sent to the model. Default: 70.
    pub jpeg_quality: u8,

    /// CORS allowed origins. Empty means any origin. Default: empty.
    pub allowed_origins: Vec<String>,

    /// Custom extraction instruction. If None, uses the built-in prompt.
    pub instruction: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            provider_name: None,
            model: None,
            temperature: 0.1,
            max_output_tokens: 800,
            model_timeout_secs: 28,
            request_timeout_secs: 30,
            download_timeout_secs: 30,
            max_file_bytes: 5 * 1024 * 1024,
            max_body_bytes: 6 * 1024 * 1024,
            max_image_dimension: 600,
            jpeg_quality: 70,
            allowed_origins: Vec::new(),
            instruction: None,
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// `host:port` string for binding the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn model_timeout_secs(mut self, secs: u64) -> Self {
        self.config.model_timeout_secs = secs;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_file_bytes(mut self, n: usize) -> Self {
        self.config.max_file_bytes = n;
        self
    }

    pub fn max_body_bytes(mut self, n: usize) -> Self {
        self.config.max_body_bytes = n;
        self
    }

    pub fn max_image_dimension(mut self, px: u32) -> Self {
        self.config.max_image_dimension = px.max(64);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.config.allowed_origins = origins;
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.instruction = Some(instruction.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, InvoiceError> {
        let c = &self.config;
        if c.model_timeout_secs == 0 {
            return Err(InvoiceError::InvalidConfig(
                "Model timeout must be ≥ 1s".into(),
            ));
        }
        if c.model_timeout_secs >= c.request_timeout_secs {
            return Err(InvoiceError::InvalidConfig(format!(
                "Model timeout ({}s) must be shorter than the request timeout ({}s)",
                c.model_timeout_secs, c.request_timeout_secs
            )));
        }
        if c.download_timeout_secs == 0 || c.download_timeout_secs > c.request_timeout_secs {
            return Err(InvoiceError::InvalidConfig(format!(
                "Download timeout ({}s) must be between 1s and the request timeout ({}s)",
                c.download_timeout_secs, c.request_timeout_secs
            )));
        }
        if c.max_file_bytes == 0 || c.max_output_tokens == 0 {
            return Err(InvoiceError::InvalidConfig(
                "File size and output token limits must be > 0".into(),
            ));
        }
        if c.max_body_bytes < c.max_file_bytes {
            return Err(InvoiceError::InvalidConfig(format!(
                "Body limit ({} bytes) must be at least the file limit ({} bytes)",
                c.max_body_bytes, c.max_file_bytes
            )));
        }
        Ok(self.config)
    }
}
