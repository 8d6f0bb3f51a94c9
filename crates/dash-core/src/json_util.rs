//! JSON field helpers shared by the exchange and stream parsers.
//!
//! Exchange payloads encode numbers inconsistently: prices and quantities are
//! usually strings (`"30000.5"`), ids and timestamps usually numbers. These
//! helpers accept either form.

use serde_json::Value;

/// Parse a JSON value (string or number) as `f64`.
#[inline]
pub fn parse_str_f64(v: Option<&Value>) -> Option<f64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        fast_float2::parse(s).ok()
    } else {
        v.as_f64()
    }
}

/// Parse a named field as `f64` (string or number).
#[inline]
pub fn parse_f64_field(v: &Value, key: &str) -> Option<f64> {
    parse_str_f64(v.get(key))
}

/// Parse a named field as `f64`, `0.0` when missing or malformed.
#[inline]
pub fn f64_or_zero(v: &Value, key: &str) -> f64 {
    parse_f64_field(v, key).unwrap_or(0.0)
}

/// Parse a named field as `i64` (string or number).
#[inline]
pub fn parse_i64_field(v: &Value, key: &str) -> Option<i64> {
    let v = v.get(key)?;
    if let Some(s) = v.as_str() {
        s.parse().ok()
    } else {
        v.as_i64()
    }
}

/// Read a named field as a string, stringifying numbers (`12345` → `"12345"`).
pub fn id_field(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read a named string field.
#[inline]
pub fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_in_either_form() {
        let v = json!({"p": "30000.5", "q": 1.25, "bad": "x", "t": "1700000000000", "n": 42});
        assert_eq!(parse_f64_field(&v, "p"), Some(30000.5));
        assert_eq!(parse_f64_field(&v, "q"), Some(1.25));
        assert_eq!(parse_f64_field(&v, "bad"), None);
        assert_eq!(f64_or_zero(&v, "missing"), 0.0);
        assert_eq!(parse_i64_field(&v, "t"), Some(1_700_000_000_000));
        assert_eq!(parse_i64_field(&v, "n"), Some(42));
    }

    #[test]
    fn ids_are_stringified() {
        let v = json!({"id": 12345, "orderId": "abc", "flag": true});
        assert_eq!(id_field(&v, "id").as_deref(), Some("12345"));
        assert_eq!(id_field(&v, "orderId").as_deref(), Some("abc"));
        assert_eq!(id_field(&v, "flag"), None);
        assert_eq!(str_field(&v, "orderId"), Some("abc"));
    }
}
