//! Canonical JSON for AgentPay
//!
//! Every body that gets hashed or signed is serialized the same way: a JSON
//! object with keys in lexicographic order and no whitespace. `serde_json`'s
//! default map is ordered (BTreeMap-backed), so object keys come out sorted
//! regardless of insertion order; this module is the single place that
//! property is relied on.

use crate::hash::sha256_hex;
use serde_json::Value;

/// Serialize a JSON value canonically: sorted object keys, no whitespace.
pub fn canonical_json(value: &Value) -> String {
    // Compact by default; key order is the map's (sorted) iteration order.
    value.to_string()
}

/// SHA-256 hex fingerprint of a JSON value's canonical form.
///
/// Used to detect idempotency-key reuse with a different request body.
pub fn fingerprint(value: &Value) -> String {
    sha256_hex(canonical_json(value).as_bytes())
}

/// Format a timestamp the way every canonical body expects:
/// `YYYY-MM-DDTHH:MM:SS.sssZ`.
pub fn iso8601_millis(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_are_sorted() {
        let v = json!({"zebra": 1, "apple": 2, "mango": {"z": 1, "a": 2}});
        assert_eq!(
            canonical_json(&v),
            r#"{"apple":2,"mango":{"a":2,"z":1},"zebra":1}"#
        );
    }

    #[test]
    fn test_no_whitespace() {
        let v = json!({"a": [1, 2, 3], "b": "x y"});
        assert_eq!(canonical_json(&v), r#"{"a":[1,2,3],"b":"x y"}"#);
    }

    #[test]
    fn test_fingerprint_is_key_order_invariant() {
        let a: Value = serde_json::from_str(r#"{"x":1,"y":2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"y":2,"x":1}"#).unwrap();
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_differs_on_value_change() {
        let a = json!({"amount": 199});
        let b = json!({"amount": 200});
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_null_serializes_as_literal() {
        let v = json!({"prev_hash": null});
        assert_eq!(canonical_json(&v), r#"{"prev_hash":null}"#);
    }
}
