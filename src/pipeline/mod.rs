//! Pipeline stages for invoice extraction.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ llm ──▶ normalize
//! (form/URL)  (JPEG)   (VLM)   (coerce + recompute)
//! ```
//!
//! 1. [`input`]: resolve the upload form to size-checked image bytes,
//!    downloading `firebase_url` when given
//! 2. [`encode`]: decode, downscale and JPEG/base64-wrap the image; runs in
//!    `spawn_blocking` because it is CPU-bound
//! 3. [`llm`]: one bounded call to the vision model; the only stage that
//!    talks to the model
//! 4. [`normalize`]: total function from raw reply text to an
//!    [`crate::record::InvoiceRecord`], using [`coerce`] for every number

pub mod coerce;
pub mod encode;
pub mod input;
pub mod llm;
pub mod normalize;
