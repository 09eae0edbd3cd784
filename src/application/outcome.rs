//! Terminal result of one render request.

use bytes::Bytes;
use thiserror::Error;

pub const BAD_REQUEST: u16 = 400;
pub const NOT_FOUND: u16 = 404;
pub const INTERNAL_ERROR: u16 = 500;

const DECODE_FAILURE_MESSAGE: &str = "Illegal shape mask context";
const INTERNAL_FAILURE_MESSAGE: &str = "Internal error";

/// Caller-visible failure: a numeric code and a message safe to show.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct Failure {
    pub code: u16,
    pub message: String,
}

impl Failure {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn illegal_context() -> Self {
        Self::new(BAD_REQUEST, DECODE_FAILURE_MESSAGE)
    }

    pub fn cannot_render(shape_id: u64) -> Self {
        Self::new(NOT_FOUND, format!("Cannot render Mask:{shape_id}"))
    }

    pub fn internal() -> Self {
        Self::new(INTERNAL_ERROR, INTERNAL_FAILURE_MESSAGE)
    }
}

/// Exactly one outcome is produced per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(Bytes),
    Failure(Failure),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn into_result(self) -> Result<Bytes, Failure> {
        match self {
            Outcome::Success(bytes) => Ok(bytes),
            Outcome::Failure(failure) => Err(failure),
        }
    }
}

impl From<Failure> for Outcome {
    fn from(failure: Failure) -> Self {
        Outcome::Failure(failure)
    }
}
