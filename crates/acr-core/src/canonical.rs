//! # Canonical Serialization
//!
//! [`CanonicalBytes`] is the only input accepted by the digest functions in
//! [`crate::digest`]. Risk fingerprints stamped on compliance documents are
//! compared byte-for-byte across process restarts, so the bytes they are
//! computed from must not depend on field order, map iteration order, or
//! floating point formatting.
//!
//! ## Rules
//!
//! 1. Floats are rejected. Versions, counts and revisions are integers.
//! 2. Object keys are sorted and separators are compact (RFC 8785 via
//!    `serde_jcs`).
//! 3. Timestamps are expected to arrive already normalized by
//!    [`crate::Timestamp`] (UTC, second precision, `Z` suffix).

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced by JCS canonicalization with float rejection.
///
/// The inner `Vec<u8>` is private; the only constructor is
/// [`CanonicalBytes::new()`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonicalize any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalizationError::FloatRejected`] if the value contains
    /// a non-integer number, or [`CanonicalizationError::SerializationFailed`]
    /// if serialization fails.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        let checked = reject_floats(value)?;
        let s = serde_jcs::to_string(&checked)?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn reject_floats(value: Value) -> Result<Value, CanonicalizationError> {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(value),
        Value::Number(ref n) => {
            if n.is_f64() && !n.is_i64() && !n.is_u64() {
                if let Some(f) = n.as_f64() {
                    return Err(CanonicalizationError::FloatRejected(f));
                }
            }
            Ok(value)
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                out.insert(k, reject_floats(v)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(arr) => {
            let out: Result<Vec<_>, _> = arr.into_iter().map(reject_floats).collect();
            Ok(Value::Array(out?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct ApprovedEntry {
        reviewed_at: String,
        id: String,
    }

    #[test]
    fn struct_fields_are_sorted() {
        let entry = ApprovedEntry {
            reviewed_at: "2026-03-01T09:30:00Z".to_string(),
            id: "a1".to_string(),
        };
        let cb = CanonicalBytes::new(&entry).unwrap();
        assert_eq!(
            std::str::from_utf8(cb.as_bytes()).unwrap(),
            r#"{"id":"a1","reviewed_at":"2026-03-01T09:30:00Z"}"#
        );
    }

    #[test]
    fn nested_objects_sorted_and_arrays_keep_order() {
        let data = serde_json::json!({
            "regulation": "eu_ai_act",
            "approved": [{"z": 1, "a": 2}, {"m": 3}]
        });
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(
            std::str::from_utf8(cb.as_bytes()).unwrap(),
            r#"{"approved":[{"a":2,"z":1},{"m":3}],"regulation":"eu_ai_act"}"#
        );
    }

    #[test]
    fn float_is_rejected() {
        let data = serde_json::json!({"score": 0.75});
        match CanonicalBytes::new(&data) {
            Err(CanonicalizationError::FloatRejected(f)) => assert_eq!(f, 0.75),
            other => panic!("expected FloatRejected, got {other:?}"),
        }
    }

    #[test]
    fn deeply_nested_float_is_rejected() {
        let data = serde_json::json!({"a": {"b": [{"c": 2.5}]}});
        assert!(CanonicalBytes::new(&data).is_err());
    }

    #[test]
    fn integers_and_null_pass_through() {
        let data = serde_json::json!({"version": 3, "revision": -1, "note": null});
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(
            std::str::from_utf8(cb.as_bytes()).unwrap(),
            r#"{"note":null,"revision":-1,"version":3}"#
        );
    }

    #[test]
    fn empty_collections() {
        assert_eq!(
            CanonicalBytes::new(&serde_json::json!({})).unwrap().as_bytes(),
            b"{}"
        );
        let empty: Vec<u8> = Vec::new();
        let cb = CanonicalBytes::new(&empty).unwrap();
        assert_eq!(cb.as_bytes(), b"[]");
        assert!(!cb.is_empty());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn json_without_floats() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| serde_json::json!(n)),
            "[a-zA-Z0-9_ ]{0,40}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,8}", inner, 0..6)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn canonicalization_is_deterministic(value in json_without_floats()) {
            let a = CanonicalBytes::new(&value).unwrap();
            let b = CanonicalBytes::new(&value).unwrap();
            prop_assert_eq!(a.as_bytes(), b.as_bytes());
        }

        #[test]
        fn canonical_output_parses_back_to_same_value(value in json_without_floats()) {
            let cb = CanonicalBytes::new(&value).unwrap();
            let parsed: Value = serde_json::from_slice(cb.as_bytes()).unwrap();
            prop_assert_eq!(parsed, value);
        }
    }
}
