use async_trait::async_trait;
use axum::http::StatusCode;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::{
    application::ports::{AccessChecker, AccessError},
    domain::mask::ShapeMaskContext,
};

use super::{UpstreamClient, join};

#[derive(Debug, Deserialize)]
struct ReadableResponse {
    readable: bool,
}

/// Asks the access service whether the session may read a shape.
///
/// Non-success statuses are relayed to the caller as classified failures;
/// everything else that goes wrong is unclassified.
#[derive(Debug, Clone)]
pub struct HttpAccessChecker {
    upstream: UpstreamClient,
    base: Url,
}

impl HttpAccessChecker {
    pub fn new(upstream: UpstreamClient, base: Url) -> Self {
        Self { upstream, base }
    }
}

#[async_trait]
impl AccessChecker for HttpAccessChecker {
    async fn can_read(&self, context: &ShapeMaskContext) -> Result<bool, AccessError> {
        let url = join(
            &self.base,
            &format!("shapes/{}/readable", context.shape_id()),
        )
        .map_err(AccessError::Internal)?;

        let response = self
            .upstream
            .get(url, context)
            .map_err(AccessError::Internal)?
            .send()
            .await
            .map_err(|err| AccessError::Internal(format!("access request failed: {err}")))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| AccessError::Internal(format!("access body unreadable: {err}")))?;

        if !status.is_success() {
            debug!(status = status.as_u16(), "Access service refused request");
            return Err(AccessError::downstream(
                status.as_u16(),
                failure_message(status, &body),
            ));
        }

        let parsed: ReadableResponse = serde_json::from_slice(&body)
            .map_err(|err| AccessError::Internal(format!("access body malformed: {err}")))?;
        Ok(parsed.readable)
    }
}

fn failure_message(status: StatusCode, body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Upstream error")
            .to_string()
    } else {
        text.to_string()
    }
}
