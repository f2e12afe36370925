//! Output types: the invoice record and the normalization report.
//!
//! [`InvoiceRecord`] serialises with the same keys the model is instructed to
//! produce (`company_details`, `invoice_details`, `line_items`, `totals`), so
//! a serialised record can be fed back through the normalizer unchanged.

use crate::error::MalformedReason;
use serde::{Deserialize, Serialize};

/// Fixed VAT rate applied to the subtotal.
pub const VAT_RATE: f64 = 0.17;

/// A fully normalized invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    #[serde(rename = "company_details")]
    pub company: CompanyDetails,
    #[serde(rename = "invoice_details")]
    pub invoice_meta: InvoiceMeta,
    pub line_items: Vec<LineItem>,
    pub totals: Totals,
}

/// Issuing company.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyDetails {
    pub name: String,
    pub address: String,
    pub tax_id: String,
}

/// Invoice number and date, kept as free-form strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceMeta {
    pub invoice_number: String,
    pub date: String,
}

/// One invoice row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub item_code: String,
    pub description: String,
    pub quantity: f64,
    pub price: f64,
    pub total: f64,
}

/// Invoice totals, always derived from the line items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

impl InvoiceRecord {
    /// The record returned when a model reply is unusable.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when no field carries extracted data.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Totals {
    /// Derive subtotal, VAT and grand total from line-item totals.
    pub fn from_items(items: &[LineItem]) -> Self {
        let subtotal = round2(items.iter().map(|item| item.total).sum());
        let tax = round2(subtotal * VAT_RATE);
        let total = round2(subtotal + tax);
        Self {
            subtotal,
            tax,
            total,
        }
    }
}

/// Round to 2 decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    // normalise -0.0
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// A line item whose reported total was replaced by `quantity × price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalDiscrepancy {
    /// Position in the model's `line_items` array.
    pub index: usize,
    pub reported_total: f64,
    pub calculated_total: f64,
}

/// What the normalizer did to produce a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationReport {
    /// `None` when the reply parsed; otherwise why the empty record was used.
    pub malformed: Option<MalformedReason>,
    /// Line items whose totals were recomputed.
    pub discrepancies: Vec<TotalDiscrepancy>,
    /// Indices of `line_items` elements that were not objects.
    pub skipped_items: Vec<usize>,
}

impl NormalizationReport {
    pub(crate) fn malformed(reason: MalformedReason) -> Self {
        Self {
            malformed: Some(reason),
            ..Self::default()
        }
    }
}
