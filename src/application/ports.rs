//! Collaborator traits the orchestrator depends on.
//!
//! Each collaborator is injected as `Arc<dyn Trait>` so the orchestration
//! logic can be exercised against fakes.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::mask::ShapeMaskContext;

use super::outcome::Failure;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache entry rejected: {0}")]
    Rejected(String),
}

/// Failures from the access check.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Downstream reported a reason; relayed to the caller verbatim.
    #[error("downstream failure {0}")]
    Downstream(Failure),
    /// Anything else. Logged, never shown to the caller.
    #[error("access check failed: {0}")]
    Internal(String),
}

impl AccessError {
    pub fn downstream(code: u16, message: impl Into<String>) -> Self {
        Self::Downstream(Failure::new(code, message))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("render upstream answered {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("render transport failed: {0}")]
    Transport(String),
}

/// Key-value store for rendered masks. A missing key is `Ok(None)`, never an error.
#[async_trait]
pub trait MaskCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;
    async fn set(&self, key: &str, value: Bytes) -> Result<(), CacheError>;
}

/// Answers whether the request's principal may read the shape.
#[async_trait]
pub trait AccessChecker: Send + Sync {
    async fn can_read(&self, context: &ShapeMaskContext) -> Result<bool, AccessError>;
}

/// Produces mask bytes, or `None` when nothing can be rendered.
#[async_trait]
pub trait MaskRenderer: Send + Sync {
    async fn render(&self, context: &ShapeMaskContext) -> Result<Option<Bytes>, RenderError>;
}
