//! HTTP server binary for invoice-lens.
//!
//! Maps CLI flags and `INVOICE_LENS_*` environment variables onto
//! `ServiceConfig`, resolves the vision model and serves the router.

use anyhow::{Context, Result};
use clap::Parser;
use invoice_lens::{build_router, resolve_model, AppState, ServiceConfig};
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on the default address (127.0.0.1:5000)
  invoice-lens

  # Listen on all interfaces, allow one web origin
  invoice-lens --host 0.0.0.0 --allowed-origin https://app.example.com

  # Use a specific provider and model
  invoice-lens --provider openai --model gpt-4.1-mini

  # Extract an invoice
  curl -F file=@invoice.jpg http://127.0.0.1:5000/upload

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Log filter, e.g. invoice_lens=debug,tower_http=debug

The server starts without a model when no provider is configured;
/upload then answers 503 until it is restarted with credentials.
"#;

/// Extract structured data from Hebrew invoice images over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "invoice-lens",
    version,
    about = "Extract structured data from Hebrew invoice images using Vision LLMs",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to bind.
    #[arg(long, env = "INVOICE_LENS_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind.
    #[arg(short, long, env = "INVOICE_LENS_PORT", default_value_t = 5000)]
    port: u16,

    /// LLM provider: gemini, openai, anthropic, mistral, ollama, azure.
    #[arg(long, env = "INVOICE_LENS_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (e.g. gemini-1.5-pro, gpt-4.1-mini).
    #[arg(long, env = "INVOICE_LENS_MODEL")]
    model: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "INVOICE_LENS_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens per invoice.
    #[arg(long, env = "INVOICE_LENS_MAX_TOKENS", default_value_t = 800)]
    max_tokens: usize,

    /// Bound on a single model call, in seconds.
    #[arg(long, env = "INVOICE_LENS_MODEL_TIMEOUT", default_value_t = 28)]
    model_timeout: u64,

    /// Bound on a whole request, in seconds. Must exceed --model-timeout.
    #[arg(long, env = "INVOICE_LENS_REQUEST_TIMEOUT", default_value_t = 30)]
    request_timeout: u64,

    /// HTTP download timeout for firebase_url images, in seconds.
    #[arg(long, env = "INVOICE_LENS_DOWNLOAD_TIMEOUT", default_value_t = 30)]
    download_timeout: u64,

    /// Largest accepted image, in bytes.
    #[arg(long, env = "INVOICE_LENS_MAX_FILE_BYTES", default_value_t = 5 * 1024 * 1024)]
    max_file_bytes: usize,

    /// Largest accepted request body, in bytes.
    #[arg(long, env = "INVOICE_LENS_MAX_BODY_BYTES", default_value_t = 6 * 1024 * 1024)]
    max_body_bytes: usize,

    /// Longest image side after downscaling, in pixels.
    #[arg(long, env = "INVOICE_LENS_MAX_DIMENSION", default_value_t = 600)]
    max_dimension: u32,

    /// JPEG quality for the image sent to the model (1–100).
    #[arg(long, env = "INVOICE_LENS_JPEG_QUALITY", default_value_t = 70)]
    jpeg_quality: u8,

    /// CORS origin to allow; repeat for several. Any origin when omitted.
    #[arg(long = "allowed-origin", env = "INVOICE_LENS_ALLOWED_ORIGINS", value_delimiter = ',')]
    allowed_origins: Vec<String>,

    /// Path to a text file replacing the built-in extraction instruction.
    #[arg(long, env = "INVOICE_LENS_INSTRUCTION")]
    instruction: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INVOICE_LENS_VERBOSE")]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Result<ServiceConfig> {
        let mut builder = ServiceConfig::builder()
            .host(self.host)
            .port(self.port)
            .temperature(self.temperature)
            .max_output_tokens(self.max_tokens)
            .model_timeout_secs(self.model_timeout)
            .request_timeout_secs(self.request_timeout)
            .download_timeout_secs(self.download_timeout)
            .max_file_bytes(self.max_file_bytes)
            .max_body_bytes(self.max_body_bytes)
            .max_image_dimension(self.max_dimension)
            .jpeg_quality(self.jpeg_quality)
            .allowed_origins(self.allowed_origins);

        if let Some(provider) = self.provider {
            builder = builder.provider_name(provider);
        }
        if let Some(model) = self.model {
            builder = builder.model(model);
        }
        if let Some(path) = self.instruction {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read instruction file: {}", path.display()))?;
            builder = builder.instruction(text);
        }

        builder.build().context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = cli.into_config()?;

    // ── Model ────────────────────────────────────────────────────────────
    let model = match resolve_model(&config) {
        Ok(model) => {
            info!("Vision model ready: {}", model.name());
            Some(model)
        }
        Err(e) => {
            warn!("Starting without a vision model: {}", e);
            None
        }
    };

    // ── Serve ────────────────────────────────────────────────────────────
    let addr = config.bind_addr();
    let app = build_router(AppState::new(config, model));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
