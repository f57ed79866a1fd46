//! Codec module - Position extraction and canonical keys
//!
//! Pulls the `position` array out of a raw JSON document and renders a
//! rounded vector as a byte-comparable [`CanonicalKey`] that decodes back to
//! the exact same components.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CodecError;
use crate::normalize::round_vector;

/// Name of the document field holding the position vector.
pub const POSITION_FIELD: &str = "position";

const KEY_OPEN: char = '[';
const KEY_CLOSE: char = ']';
const KEY_SEPARATOR: &str = ", ";

/// Parse a document and return its position vector.
///
/// `Ok(None)` covers every "no usable position" case: missing field, `null`,
/// a non-array value, an array holding a non-number, or a document that is
/// not an object at all. Only malformed JSON is an error, and that includes
/// numbers outside the `f64` range such as `1e400`, which the parser rejects.
pub fn extract(bytes: &[u8]) -> Result<Option<Vec<f64>>, CodecError> {
    let document: Value = serde_json::from_slice(bytes)?;
    Ok(position_of(&document))
}

/// Read the position vector from an already parsed document.
pub fn position_of(document: &Value) -> Option<Vec<f64>> {
    let items = document.get(POSITION_FIELD)?.as_array()?;
    items.iter().map(Value::as_f64).collect()
}

/// Round `vector` to `decimals` places and render its key.
pub fn key_of(vector: &[f64], decimals: i32) -> CanonicalKey {
    CanonicalKey::from_vector(&round_vector(vector, decimals))
}

/// Group identifier derived from a rounded position vector.
///
/// Rendering uses the shortest round-trip `f64` display, which is locale
/// independent, so [`CanonicalKey::decode`] recovers every component bit for
/// bit. Negative zero is folded into zero.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// Render an already rounded vector.
    pub fn from_vector(vector: &[f64]) -> Self {
        let mut key = String::with_capacity(vector.len() * 8 + 2);
        key.push(KEY_OPEN);
        for (i, component) in vector.iter().enumerate() {
            if i > 0 {
                key.push_str(KEY_SEPARATOR);
            }
            // -0.0 + 0.0 == +0.0
            key.push_str(&(component + 0.0).to_string());
        }
        key.push(KEY_CLOSE);
        Self(key)
    }

    /// Decode the key back into its vector.
    pub fn decode(&self) -> Result<Vec<f64>, CodecError> {
        let inner = self
            .0
            .strip_prefix(KEY_OPEN)
            .and_then(|s| s.strip_suffix(KEY_CLOSE))
            .ok_or_else(|| self.invalid("missing brackets"))?;

        if inner.trim().is_empty() {
            return Ok(Vec::new());
        }

        inner
            .split(KEY_SEPARATOR.trim())
            .map(|part| {
                part.trim()
                    .parse::<f64>()
                    .map_err(|e| self.invalid(&format!("component {:?}: {}", part.trim(), e)))
            })
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn invalid(&self, reason: &str) -> CodecError {
        CodecError::InvalidKey {
            key: self.0.clone(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CanonicalKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_number_is_malformed() {
        let err = extract(br#"{"position": [1e400, 2]}"#).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }

    #[test]
    fn test_extract_position() {
        let position = extract(br#"{"position": [1, 2.5, -3], "name": "a"}"#).unwrap();
        assert_eq!(position, Some(vec![1.0, 2.5, -3.0]));
    }

    #[test]
    fn test_extract_missing_or_invalid_position() {
        assert_eq!(extract(br#"{"name": "x"}"#).unwrap(), None);
        assert_eq!(extract(br#"{"position": null}"#).unwrap(), None);
        assert_eq!(extract(br#"{"position": "1,2"}"#).unwrap(), None);
        assert_eq!(extract(br#"{"position": [1, "2"]}"#).unwrap(), None);
        assert_eq!(extract(br#"[1, 2, 3]"#).unwrap(), None);
    }

    #[test]
    fn test_extract_empty_array_is_some() {
        // Emptiness is the normalizer's call, not the codec's.
        assert_eq!(extract(br#"{"position": []}"#).unwrap(), Some(vec![]));
    }

    #[test]
    fn test_extract_malformed() {
        let err = extract(b"{\"position\": [1, 2").unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }

    #[test]
    fn test_key_rendering() {
        assert_eq!(key_of(&[1.0, 2.0, 3.0], 2).as_str(), "[1, 2, 3]");
        assert_eq!(key_of(&[1.001, 2.001, 3.001], 2).as_str(), "[1, 2, 3]");
        assert_eq!(key_of(&[0.125], -1).as_str(), "[0.125]");
        assert_eq!(CanonicalKey::from_vector(&[]).as_str(), "[]");
    }

    #[test]
    fn test_negative_zero_shares_key() {
        assert_eq!(key_of(&[-0.001, 1.0], 2), key_of(&[0.0, 1.0], 2));
    }

    #[test]
    fn test_decode_inverts_rendering() {
        let vector = vec![0.1, -2.75, 1e-7, 123456789.5];
        let key = CanonicalKey::from_vector(&vector);
        assert_eq!(key.decode().unwrap(), vector);
        assert_eq!(CanonicalKey::from_vector(&[]).decode().unwrap(), Vec::<f64>::new());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let missing_brackets = CanonicalKey::from("1, 2".to_string());
        assert!(missing_brackets.decode().is_err());

        let bad_component = CanonicalKey::from("[1, two]".to_string());
        assert!(matches!(
            bad_component.decode(),
            Err(CodecError::InvalidKey { .. })
        ));
    }
}
