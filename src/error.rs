//! Error types for the invoice-lens library.
//!
//! Three error types mirror three failure sources:
//!
//! * [`InvoiceError`]: **request-level**. The caller's upload or body is
//!   unusable, the model is not configured, or the model call failed. Each
//!   variant maps to one HTTP status through [`InvoiceError::status_code`].
//!
//! * [`InvocationFailure`]: **adapter-level**. Returned by
//!   [`crate::pipeline::llm::invoke`] when the vision model times out or the
//!   call itself fails. Converted into [`InvoiceError`] by the orchestration
//!   layer.
//!
//! * [`MalformedReason`]: **absorbed**. Describes why a model reply could not
//!   be used. The normalizer logs it and returns the empty record; it is never
//!   surfaced as an error.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All request-level errors returned by the invoice-lens library.
#[derive(Debug, Error)]
pub enum InvoiceError {
    // ── Caller input errors ───────────────────────────────────────────────
    /// The multipart form carried neither a `file` nor a `firebase_url` field.
    #[error("No file provided")]
    MissingFile,

    /// A `file` field was present but had an empty filename.
    #[error("No selected file")]
    EmptyFilename,

    /// The uploaded filename has an extension other than png/jpg/jpeg.
    #[error("File type not allowed: '{filename}'")]
    FileTypeNotAllowed { filename: String },

    /// The image payload exceeds the configured size limit.
    #[error("File too large ({size_kb:.2}KB > {limit_kb:.2}KB)")]
    FileTooLarge { size_kb: f64, limit_kb: f64 },

    /// The multipart body itself could not be read.
    #[error("Invalid multipart body: {0}")]
    InvalidMultipart(String),

    /// `firebase_url` was not an HTTP/HTTPS URL.
    #[error("Invalid image URL '{url}': not a valid HTTP/HTTPS URL")]
    InvalidUrl { url: String },

    /// The remote image could not be downloaded.
    #[error("Failed to download file from '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// The remote image download exceeded its timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The uploaded bytes are not a decodable PNG/JPEG image.
    #[error("Could not decode image: {0}")]
    ImageDecode(String),

    /// A caller-supplied JSON payload is missing required keys.
    #[error("{0}")]
    Validation(String),

    // ── Model errors ──────────────────────────────────────────────────────
    /// No vision model was configured at startup (missing API key etc.).
    #[error("Vision model is not configured")]
    ModelUnavailable,

    /// The model call or the whole upload exceeded its configured bound.
    #[error("Processing timeout")]
    InvocationTimeout { elapsed_ms: u64 },

    /// The vision model call failed (transport, auth, empty reply).
    #[error("Model invocation failed: {detail}")]
    Invocation { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The named provider could not be constructed.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InvoiceError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            InvoiceError::MissingFile
            | InvoiceError::EmptyFilename
            | InvoiceError::FileTypeNotAllowed { .. }
            | InvoiceError::FileTooLarge { .. }
            | InvoiceError::InvalidMultipart(_)
            | InvoiceError::InvalidUrl { .. }
            | InvoiceError::DownloadFailed { .. }
            | InvoiceError::DownloadTimeout { .. }
            | InvoiceError::ImageDecode(_)
            | InvoiceError::Validation(_) => StatusCode::BAD_REQUEST,
            InvoiceError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            InvoiceError::InvocationTimeout { .. } => StatusCode::REQUEST_TIMEOUT,
            InvoiceError::Invocation { .. }
            | InvoiceError::InvalidConfig(_)
            | InvoiceError::ProviderNotConfigured { .. }
            | InvoiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to an HTTP caller.
    ///
    /// Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            InvoiceError::Internal(_)
            | InvoiceError::InvalidConfig(_)
            | InvoiceError::ProviderNotConfigured { .. } => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<InvocationFailure> for InvoiceError {
    fn from(failure: InvocationFailure) -> Self {
        match failure {
            InvocationFailure::Timeout { elapsed_ms } => {
                InvoiceError::InvocationTimeout { elapsed_ms }
            }
            InvocationFailure::Invocation { detail } => InvoiceError::Invocation { detail },
        }
    }
}

/// Failure of a single vision-model call.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum InvocationFailure {
    /// The call exceeded the adapter's wall-clock bound.
    #[error("model call timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Transport, authentication, or malformed-response failure.
    #[error("model call failed: {detail}")]
    Invocation { detail: String },
}

/// Why a model reply could not be turned into an invoice record.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum MalformedReason {
    /// No `{ … }` span in the reply.
    #[error("no JSON object found in model reply")]
    NoJsonObject,

    /// The `{ … }` span is not valid JSON.
    #[error("JSON decode error: {detail}")]
    InvalidJson { detail: String },

    /// The JSON value is not an object.
    #[error("model reply is not a JSON object")]
    NotAnObject,

    /// One or more required top-level sections are absent.
    #[error("missing required keys in model reply: {}", missing.join(", "))]
    MissingSections { missing: Vec<String> },
}
