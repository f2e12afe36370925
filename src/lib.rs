//! # invoice-lens
//!
//! Extract structured data from Hebrew invoice images using Vision Language
//! Models (VLMs).
//!
//! Scanned and photographed Hebrew invoices are right-to-left, often
//! skewed, and mix quantities with line totals in ways OCR tools misread.
//! This crate sends a downscaled image to a VLM with a schema-bearing
//! instruction, then normalizes whatever comes back into a fixed
//! [`InvoiceRecord`] whose line totals and VAT are recomputed locally.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (file | firebase_url)
//!  │
//!  ├─ 1. Input      validate extension and size, or download the URL
//!  ├─ 2. Encode     decode, downscale to 600 px, JPEG q70 → base64 (spawn_blocking)
//!  ├─ 3. VLM        one bounded call (28 s) to gemini / gpt / claude / …
//!  ├─ 4. Normalize  JSON extraction, numeric coercion, total recomputation
//!  └─ 5. Respond    record + processing time + recomputed-total discrepancies
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoice_lens::{build_router, resolve_model, AppState, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = ServiceConfig::default();
//!     let model = resolve_model(&config).ok();
//!     let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
//!     axum::serve(listener, build_router(AppState::new(config, model))).await?;
//!     Ok(())
//! }
//! ```
//!
//! Library use without the HTTP layer goes through [`extract_invoice`] or,
//! for an already obtained model reply, [`normalize`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `invoice-lens` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod prompts;
pub mod record;
pub mod report;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use error::{InvocationFailure, InvoiceError, MalformedReason};
pub use extract::{default_model, extract_invoice, resolve_model, Extraction};
pub use pipeline::llm::{GenerationLimits, LlmVisionModel, VisionModel};
pub use pipeline::normalize::{normalize, normalize_with_report};
pub use record::{
    CompanyDetails, InvoiceMeta, InvoiceRecord, LineItem, NormalizationReport, Totals,
    TotalDiscrepancy, VAT_RATE,
};
pub use report::{assemble_report, DiffReport};
pub use server::{build_router, AppState};
