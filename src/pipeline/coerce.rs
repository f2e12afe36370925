//! Resilient numeric coercion for loosely-typed model output.
//!
//! Models return numbers as JSON numbers, quoted strings, strings with
//! thousands separators or currency signs (`"₪1,234.50"`), and placeholder
//! words (`"null"`, `"N/A"`). [`coerce_number`] maps all of them onto a
//! non-negative value rounded to 2 decimals and never fails.

use crate::record::round2;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

/// Placeholder strings treated as "no value".
const EMPTY_MARKERS: [&str; 5] = ["none", "null", "", "undefined", "nan"];

static RE_NON_NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9.\-]").unwrap());

/// Coerce an optional JSON value into a non-negative number.
///
/// `field` only labels the warning logged when a fallback is taken.
pub fn coerce_number(value: Option<&Value>, field: &str) -> f64 {
    match value {
        None | Some(Value::Null) => {
            warn!("Empty or missing value for {}, using 0.0", field);
            0.0
        }
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if f.is_finite() => round2(f.abs()),
            _ => {
                warn!("Non-finite number {} for {}, using 0.0", n, field);
                0.0
            }
        },
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Some(Value::String(s)) => coerce_str(s, field),
        Some(other) => coerce_str(&other.to_string(), field),
    }
}

/// Coerce a string into a non-negative number.
pub fn coerce_str(raw: &str, field: &str) -> f64 {
    let trimmed = raw.trim();
    if EMPTY_MARKERS
        .iter()
        .any(|marker| trimmed.eq_ignore_ascii_case(marker))
    {
        warn!("Empty or placeholder value {:?} for {}, using 0.0", raw, field);
        return 0.0;
    }

    let cleaned = RE_NON_NUMERIC.replace_all(trimmed, "");
    if cleaned.is_empty() {
        warn!("No numeric value found in {:?} for {}, using 0.0", raw, field);
        return 0.0;
    }

    match cleaned.parse::<f64>() {
        Ok(f) if f.is_finite() => round2(f.abs()),
        Ok(_) => 0.0,
        Err(e) => {
            warn!("Could not convert {:?} for {}: {}, using 0.0", raw, field, e);
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn c(v: Value) -> f64 {
        coerce_number(Some(&v), "test")
    }

    #[test]
    fn missing_and_null_are_zero() {
        assert_eq!(coerce_number(None, "test"), 0.0);
        assert_eq!(c(Value::Null), 0.0);
    }

    #[test]
    fn placeholder_strings_are_zero() {
        for s in ["none", "NULL", "", "  undefined ", "NaN", "None"] {
            assert_eq!(c(json!(s)), 0.0, "input {s:?}");
        }
    }

    #[test]
    fn numbers_are_rounded() {
        assert_eq!(c(json!(160)), 160.0);
        assert_eq!(c(json!(2.204)), 2.2);
        assert_eq!(c(json!(2.206)), 2.21);
    }

    #[test]
    fn negative_numbers_become_positive() {
        assert_eq!(c(json!(-12.5)), 12.5);
        assert_eq!(c(json!("-7")), 7.0);
    }

    #[test]
    fn thousands_separators_and_symbols_are_stripped() {
        assert_eq!(c(json!("1,234.50")), 1234.5);
        assert_eq!(c(json!("₪ 352.00")), 352.0);
        assert_eq!(c(json!("2.20 יח'")), 2.2);
        assert_eq!(c(json!("$ 1 000")), 1000.0);
    }

    #[test]
    fn unparsable_leftovers_are_zero() {
        assert_eq!(c(json!("N/A")), 0.0);
        assert_eq!(c(json!("abc")), 0.0);
        assert_eq!(c(json!("-")), 0.0);
        assert_eq!(c(json!("1.2.3")), 0.0);
        assert_eq!(c(json!("12-05")), 0.0);
    }

    #[test]
    fn booleans_and_containers() {
        assert_eq!(c(json!(true)), 1.0);
        assert_eq!(c(json!(false)), 0.0);
        assert_eq!(c(json!([7])), 7.0);
        assert_eq!(c(json!({})), 0.0);
    }

    #[test]
    fn result_is_never_negative() {
        let inputs = [
            json!(-0.0),
            json!("-0.001"),
            json!(-1e-9),
            json!("--5"),
            json!(-99999.999),
        ];
        for v in inputs {
            let out = c(v.clone());
            assert!(out >= 0.0 && out.is_sign_positive(), "{v} -> {out}");
        }
    }
}
