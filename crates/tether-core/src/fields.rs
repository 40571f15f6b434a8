//! Tolerant field extraction from daemon JSON payloads.
//!
//! The daemon is a separate process with its own release cadence; payloads
//! may carry missing, null, or wrongly-typed fields. Every volatile field is
//! read through one of these helpers so a malformed field degrades to a
//! defined default instead of failing the whole refresh. Callers that need
//! hard failure (detail-for-one-id) check presence explicitly instead.

use serde_json::Value;

/// Read an unsigned integer field, defaulting to 0.
///
/// Accepts integer and non-negative float representations; anything else
/// (missing, null, string, negative) yields the default.
#[must_use]
pub fn u64_or_zero(obj: &Value, key: &str) -> u64 {
    match obj.get(key) {
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        None => None,
    }
    .unwrap_or(0)
}

/// Read a signed integer field, defaulting to 0.
#[must_use]
pub fn i64_or_zero(obj: &Value, key: &str) -> i64 {
    obj.get(key).and_then(Value::as_i64).unwrap_or(0)
}

/// Read a float field clamped to `[0.0, 1.0]`, defaulting to 0.0.
#[must_use]
pub fn ratio_or_zero(obj: &Value, key: &str) -> f64 {
    obj.get(key)
        .and_then(Value::as_f64)
        .filter(|f| f.is_finite())
        .map_or(0.0, |f| f.clamp(0.0, 1.0))
}

/// Read a string field, defaulting to the empty string.
#[must_use]
pub fn string_or_empty(obj: &Value, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

/// Read an array field, defaulting to the empty slice.
#[must_use]
pub fn array_or_empty<'a>(obj: &'a Value, key: &str) -> &'a [Value] {
    obj.get(key).and_then(Value::as_array).map_or(&[], Vec::as_slice)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn u64_reads_integer() {
        let v = json!({"rateDown": 1024});
        assert_eq!(u64_or_zero(&v, "rateDown"), 1024);
    }

    #[test]
    fn u64_accepts_float_representation() {
        let v = json!({"rateDown": 1024.0});
        assert_eq!(u64_or_zero(&v, "rateDown"), 1024);
    }

    #[test]
    fn u64_defaults_on_missing_null_and_wrong_type() {
        let v = json!({"a": null, "b": "fast", "c": -5});
        assert_eq!(u64_or_zero(&v, "a"), 0);
        assert_eq!(u64_or_zero(&v, "b"), 0);
        assert_eq!(u64_or_zero(&v, "c"), 0);
        assert_eq!(u64_or_zero(&v, "missing"), 0);
    }

    #[test]
    fn i64_reads_negative() {
        let v = json!({"errorCode": -1});
        assert_eq!(i64_or_zero(&v, "errorCode"), -1);
    }

    #[test]
    fn ratio_clamps_out_of_range() {
        let v = json!({"a": 1.5, "b": -0.5, "c": 0.75});
        assert!((ratio_or_zero(&v, "a") - 1.0).abs() < f64::EPSILON);
        assert!((ratio_or_zero(&v, "b")).abs() < f64::EPSILON);
        assert!((ratio_or_zero(&v, "c") - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn ratio_rejects_nan() {
        let v = json!({"a": "NaN"});
        assert!((ratio_or_zero(&v, "a")).abs() < f64::EPSILON);
    }

    #[test]
    fn string_defaults_to_empty() {
        let v = json!({"name": "ubuntu.iso", "size": 42});
        assert_eq!(string_or_empty(&v, "name"), "ubuntu.iso");
        assert_eq!(string_or_empty(&v, "size"), "");
        assert_eq!(string_or_empty(&v, "missing"), "");
    }

    #[test]
    fn array_defaults_to_empty() {
        let v = json!({"removed": [1, 2], "name": "x"});
        assert_eq!(array_or_empty(&v, "removed").len(), 2);
        assert!(array_or_empty(&v, "name").is_empty());
        assert!(array_or_empty(&v, "missing").is_empty());
    }

    #[test]
    fn helpers_tolerate_non_object_root() {
        let v = json!([1, 2, 3]);
        assert_eq!(u64_or_zero(&v, "x"), 0);
        assert_eq!(string_or_empty(&v, "x"), "");
        assert!(array_or_empty(&v, "x").is_empty());
    }
}
