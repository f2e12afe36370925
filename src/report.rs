//! Diff report: pair an extracted invoice with its user-edited version.
//!
//! Pure reshaping. The client keeps both versions and its own list of
//! change descriptors; this module only validates the shape and lays the
//! two side by side.

use crate::error::InvoiceError;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Keys every side of a report request must carry.
const REQUIRED_KEYS: [&str; 2] = ["line_items", "totals"];

/// An original/current pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Versions {
    pub original: Value,
    pub current: Value,
}

/// The assembled comparison report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffReport {
    pub line_items: Versions,
    pub totals: Versions,
    pub changes: Value,
    pub changes_by_item: Value,
    pub company_details: Value,
    pub invoice_details: Value,
}

/// Assemble a report from a `/generate_report` body.
///
/// The body must be a JSON object. `original_values` and `current_values`
/// default to `{}` and must each contain `line_items` and `totals`;
/// `changes` defaults to `[]` and `changes_by_item` to `{}`.
pub fn assemble_report(body: &Value) -> Result<DiffReport, InvoiceError> {
    let data = match body.as_object() {
        Some(obj) if !obj.is_empty() => obj,
        _ => return Err(InvoiceError::Validation("No data provided".into())),
    };

    let empty = Map::new();
    let original = side(data, "original_values", &empty)?;
    let current = side(data, "current_values", &empty)?;

    Ok(DiffReport {
        line_items: Versions {
            original: original["line_items"].clone(),
            current: current["line_items"].clone(),
        },
        totals: Versions {
            original: original["totals"].clone(),
            current: current["totals"].clone(),
        },
        changes: data.get("changes").cloned().unwrap_or_else(|| json!([])),
        changes_by_item: data
            .get("changes_by_item")
            .cloned()
            .unwrap_or_else(|| json!({})),
        company_details: original
            .get("company_details")
            .cloned()
            .unwrap_or_else(|| json!({})),
        invoice_details: original
            .get("invoice_details")
            .cloned()
            .unwrap_or_else(|| json!({})),
    })
}

fn side<'a>(
    data: &'a Map<String, Value>,
    key: &str,
    empty: &'a Map<String, Value>,
) -> Result<&'a Map<String, Value>, InvoiceError> {
    let values = match data.get(key) {
        None | Some(Value::Null) => empty,
        Some(Value::Object(obj)) => obj,
        Some(_) => {
            return Err(InvoiceError::Validation(format!(
                "{key} must be a JSON object"
            )))
        }
    };
    if REQUIRED_KEYS.iter().all(|k| values.contains_key(*k)) {
        Ok(values)
    } else {
        Err(InvoiceError::Validation(format!(
            "Missing required fields in {key}"
        )))
    }
}
