//! HTTP surface: one axum router over the extraction pipeline.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `POST /upload` | multipart `file` or `firebase_url` → invoice record |
//! | `POST /generate_report` | original vs. edited record → diff report |
//! | `POST /save_changes` | acknowledge an edited record (nothing is stored) |
//! | `GET /health` | liveness + model availability |
//!
//! Every JSON response carries `status: "success" | "error"`. Errors use
//! [`InvoiceError::status_code`] and [`InvoiceError::public_message`].
//! `/upload` runs under `request_timeout_secs` inside the handler, so an
//! overrun is answered with the same envelope (408 `"Processing timeout"`).

use crate::config::ServiceConfig;
use crate::error::InvoiceError;
use crate::extract::extract_invoice;
use crate::pipeline::input::{resolve_upload, UploadForm};
use crate::pipeline::llm::VisionModel;
use crate::record::{InvoiceRecord, TotalDiscrepancy};
use crate::report::{assemble_report, DiffReport};
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared, read-only state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    /// `None` when no provider could be configured at startup.
    pub model: Option<Arc<dyn VisionModel>>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: ServiceConfig, model: Option<Arc<dyn VisionModel>>) -> Self {
        Self {
            config: Arc::new(config),
            model,
            http: reqwest::Client::new(),
        }
    }
}

/// Build the router with all routes and layers.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes;
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/upload", post(upload))
        .route("/generate_report", post(generate_report))
        .route("/save_changes", post(save_changes))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin {:?}", o);
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}

// ── Response envelopes ───────────────────────────────────────────────────

/// Success body of `POST /upload`.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub invoice_data: InvoiceRecord,
    pub processing_time: String,
    /// Line items whose totals were recomputed.
    pub discrepancies: Vec<TotalDiscrepancy>,
}

/// Success body of `POST /generate_report`.
#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub status: &'static str,
    pub report: DiffReport,
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub model: &'static str,
    pub timestamp: DateTime<Utc>,
}

impl IntoResponse for InvoiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }
        let body = json!({
            "status": "error",
            "error": self.public_message(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<MultipartError> for InvoiceError {
    fn from(e: MultipartError) -> Self {
        InvoiceError::InvalidMultipart(e.body_text())
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, InvoiceError> {
    let Some(model) = state.model.as_deref() else {
        return Err(InvoiceError::ModelUnavailable);
    };
    let multipart = multipart.map_err(|e| InvoiceError::InvalidMultipart(e.body_text()))?;

    let budget = Duration::from_secs(state.config.request_timeout_secs);
    let start = Instant::now();
    match tokio::time::timeout(budget, process_upload(&state, model, multipart)).await {
        Ok(result) => result,
        Err(_) => {
            let elapsed_ms = start.elapsed().as_millis() as u64;
            error!("Upload exceeded the request bound after {}ms", elapsed_ms);
            Err(InvoiceError::InvocationTimeout { elapsed_ms })
        }
    }
}

async fn process_upload(
    state: &AppState,
    model: &dyn VisionModel,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, InvoiceError> {
    let form = read_upload_form(multipart).await?;
    let resolved = resolve_upload(
        form,
        &state.http,
        state.config.download_timeout_secs,
        state.config.max_file_bytes,
    )
    .await?;

    let extraction = extract_invoice(model, resolved.bytes, &state.config).await?;
    let processing_time = extraction.processing_time();

    Ok(Json(UploadResponse {
        status: "success",
        invoice_data: extraction.record,
        processing_time,
        discrepancies: extraction.report.discrepancies,
    }))
}

/// Collect the `file` and `firebase_url` fields; other fields are ignored.
async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, InvoiceError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                form.file = Some((filename, bytes.to_vec()));
            }
            Some("firebase_url") => {
                let url = field.text().await?;
                let url = url.trim();
                if !url.is_empty() {
                    form.image_url = Some(url.to_string());
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

async fn generate_report(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ReportResponse>, InvoiceError> {
    let Json(body) = body.map_err(|e| InvoiceError::Validation(e.body_text()))?;
    let report = assemble_report(&body)?;
    info!("Generated report");
    Ok(Json(ReportResponse {
        status: "success",
        report,
    }))
}

async fn save_changes(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, InvoiceError> {
    let Json(body) = body.map_err(|e| InvoiceError::Validation(e.body_text()))?;
    if !body.is_object() {
        return Err(InvoiceError::Validation("No data provided".into()));
    }
    info!(
        "Accepted edited invoice ({} top-level keys)",
        body.as_object().map_or(0, |o| o.len())
    );
    Ok(Json(json!({ "status": "success" })))
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "healthy",
        model: if state.model.is_some() {
            "active"
        } else {
            "inactive"
        },
        timestamp: Utc::now(),
    })
}
