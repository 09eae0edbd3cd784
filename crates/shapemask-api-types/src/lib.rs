//! Shared request and reply types for the shapemask render service.
//!
//! These types describe the wire shape only. Validation and cache-key
//! derivation live in the service crate.

use serde::{Deserialize, Serialize};

/// Shape identifiers arrive either as JSON numbers or as numeric strings
/// (path segments forwarded verbatim by HTTP ingress).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShapeIdRepr {
    Number(u64),
    Text(String),
}

impl From<u64> for ShapeIdRepr {
    fn from(value: u64) -> Self {
        Self::Number(value)
    }
}

impl From<String> for ShapeIdRepr {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Raw render request descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShapeMaskRequest {
    pub shape_id: ShapeIdRepr,
    /// Explicit mask color (`RRGGBB` or `RRGGBBAA`, optional leading `#`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub flip_horizontal: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub flip_vertical: bool,
    /// Query-style flip (`h`, `v`, `hv`), combined with the boolean flags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flip: Option<String>,
    pub session_key: String,
}

impl ShapeMaskRequest {
    pub fn new(shape_id: impl Into<ShapeIdRepr>, session_key: impl Into<String>) -> Self {
        Self {
            shape_id: shape_id.into(),
            color: None,
            flip_horizontal: false,
            flip_vertical: false,
            flip: None,
            session_key: session_key.into(),
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_flip(mut self, horizontal: bool, vertical: bool) -> Self {
        self.flip_horizontal = horizontal;
        self.flip_vertical = vertical;
        self
    }

    /// Forward an unvalidated `flip` query value; the service rejects
    /// values it does not recognise.
    pub fn with_flip_param(mut self, flip: impl Into<String>) -> Self {
        self.flip = Some(flip.into());
        self
    }

    /// Serialize into the raw form accepted by the service ingress.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Failure reply body for clients that ask for JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureBody {
    pub code: u16,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_id_accepts_number_and_string() {
        let numeric: ShapeMaskRequest =
            serde_json::from_str(r#"{"shape_id":42,"session_key":"abc"}"#).unwrap();
        assert_eq!(numeric.shape_id, ShapeIdRepr::Number(42));

        let text: ShapeMaskRequest =
            serde_json::from_str(r#"{"shape_id":"42","session_key":"abc"}"#).unwrap();
        assert_eq!(text.shape_id, ShapeIdRepr::Text("42".into()));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<ShapeMaskRequest, _> =
            serde_json::from_str(r#"{"shape_id":1,"session_key":"a","zoom":2}"#);
        assert!(result.is_err());
    }

    #[test]
    fn defaults_are_omitted_when_serialized() {
        let request = ShapeMaskRequest::new(7u64, "key");
        let json = String::from_utf8(request.to_bytes().unwrap()).unwrap();
        assert_eq!(json, r#"{"shape_id":7,"session_key":"key"}"#);
    }

    #[test]
    fn flip_param_is_carried_verbatim() {
        let request = ShapeMaskRequest::new(7u64, "key").with_flip_param("sideways");
        let json = String::from_utf8(request.to_bytes().unwrap()).unwrap();
        assert_eq!(json, r#"{"shape_id":7,"flip":"sideways","session_key":"key"}"#);
    }
}
