//! Normalization: turn a raw model reply into an [`InvoiceRecord`].
//!
//! The reply is untrusted. Models prepend commentary, wrap the JSON in
//! fences, rename or drop keys, quote numbers, and get the arithmetic wrong.
//! [`normalize`] never fails: an unusable reply yields
//! [`InvoiceRecord::empty`], and every number in a usable reply is coerced
//! and re-derived.
//!
//! ## Steps
//!
//! 1. Slice from the first `{` to the last `}`
//! 2. Parse as JSON
//! 3. Require `company_details`, `invoice_details`, `line_items`, `totals`
//! 4. Coerce each line item; recompute totals that disagree with
//!    `quantity × price` by more than 0.01
//! 5. Derive subtotal, 17 % VAT and grand total from the items
//! 6. Read company and invoice metadata as strings

use crate::error::MalformedReason;
use crate::pipeline::coerce::coerce_number;
use crate::record::{
    round2, CompanyDetails, InvoiceMeta, InvoiceRecord, LineItem, NormalizationReport,
    TotalDiscrepancy, Totals,
};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// Top-level sections a usable reply must contain.
pub const REQUIRED_SECTIONS: [&str; 4] =
    ["company_details", "invoice_details", "line_items", "totals"];

/// Largest accepted gap between a reported and a recomputed line total.
pub const TOTAL_TOLERANCE: f64 = 0.01;

/// Normalize a raw model reply into an invoice record.
pub fn normalize(raw: &str) -> InvoiceRecord {
    normalize_with_report(raw).0
}

/// Normalize a raw model reply, also reporting what was corrected.
pub fn normalize_with_report(raw: &str) -> (InvoiceRecord, NormalizationReport) {
    debug!(
        "Normalizing model reply ({} chars): {}",
        raw.len(),
        preview(raw, 500)
    );

    let root = match parse_reply(raw) {
        Ok(root) => root,
        Err(reason) => {
            warn!("Unusable model reply, returning empty record: {}", reason);
            return (
                InvoiceRecord::empty(),
                NormalizationReport::malformed(reason),
            );
        }
    };

    let mut report = NormalizationReport::default();
    let line_items = normalize_line_items(&root["line_items"], &mut report);
    let totals = Totals::from_items(&line_items);
    info!(
        "Normalized {} line items: subtotal={}, tax={}, total={}",
        line_items.len(),
        totals.subtotal,
        totals.tax,
        totals.total
    );

    let company = section(&root, "company_details");
    let meta = section(&root, "invoice_details");

    let record = InvoiceRecord {
        company: CompanyDetails {
            name: text_field(company, "name"),
            address: text_field(company, "address"),
            tax_id: text_field(company, "tax_id"),
        },
        invoice_meta: InvoiceMeta {
            invoice_number: text_field(meta, "invoice_number"),
            date: text_field(meta, "date"),
        },
        line_items,
        totals,
    };

    (record, report)
}

/// Steps 1–3: locate, parse and shape-check the JSON payload.
fn parse_reply(raw: &str) -> Result<Map<String, Value>, MalformedReason> {
    let json_text = extract_json_object(raw).ok_or(MalformedReason::NoJsonObject)?;

    let value: Value =
        serde_json::from_str(json_text).map_err(|e| MalformedReason::InvalidJson {
            detail: e.to_string(),
        })?;

    let Value::Object(root) = value else {
        return Err(MalformedReason::NotAnObject);
    };

    let missing: Vec<String> = REQUIRED_SECTIONS
        .iter()
        .filter(|key| !root.contains_key(**key))
        .map(|key| key.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(MalformedReason::MissingSections { missing });
    }

    Ok(root)
}

/// Slice from the first `{` to the last `}` inclusive.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Step 4: coerce each element; non-objects are skipped.
fn normalize_line_items(value: &Value, report: &mut NormalizationReport) -> Vec<LineItem> {
    let Some(elements) = value.as_array() else {
        warn!("line_items is not an array ({}), no items extracted", kind(value));
        return Vec::new();
    };

    let mut items = Vec::with_capacity(elements.len());
    for (idx, element) in elements.iter().enumerate() {
        let Some(obj) = element.as_object() else {
            warn!("Invalid line item format at index {}: {}", idx, element);
            report.skipped_items.push(idx);
            continue;
        };

        let quantity = coerce_number(obj.get("quantity"), &format!("quantity_{idx}"));
        let price = coerce_number(obj.get("price"), &format!("price_{idx}"));
        let mut total = coerce_number(obj.get("total"), &format!("total_{idx}"));

        let calculated = round2(quantity * price);
        if (calculated - total).abs() > TOTAL_TOLERANCE {
            warn!(
                "Total mismatch at index {}: quantity={}, price={}, calculated={}, given={}",
                idx, quantity, price, calculated, total
            );
            report.discrepancies.push(TotalDiscrepancy {
                index: idx,
                reported_total: total,
                calculated_total: calculated,
            });
            total = calculated;
        }

        items.push(LineItem {
            item_code: text_field(Some(obj), "item_code"),
            description: text_field(Some(obj), "description"),
            quantity,
            price,
            total,
        });
    }
    items
}

/// A metadata section, or `None` when it is not an object.
fn section<'a>(root: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    let value = root.get(key)?;
    if value.as_object().is_none() {
        warn!("{} is not an object ({}), using defaults", key, kind(value));
    }
    value.as_object()
}

/// Read a field as a string; absent or null becomes "".
fn text_field(obj: Option<&Map<String, Value>>, key: &str) -> String {
    match obj.and_then(|o| o.get(key)) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn preview(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
