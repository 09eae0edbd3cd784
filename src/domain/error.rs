use thiserror::Error;

/// Reasons a raw request descriptor could not become a [`ShapeMaskContext`].
///
/// [`ShapeMaskContext`]: super::mask::ShapeMaskContext
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed request descriptor: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl DecodeError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
