use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 64;

/// Correlation id for one HTTP exchange, echoed back in `x-request-id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(HeaderValue);

impl RequestId {
    /// Reuse a caller-supplied id when it is short and printable, otherwise mint one.
    fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(REQUEST_ID_HEADER)
            .filter(|value| {
                value.len() <= MAX_REQUEST_ID_LEN
                    && value
                        .to_str()
                        .is_ok_and(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_graphic()))
            })
            .cloned()
            .map(Self)
            .unwrap_or_else(Self::generate)
    }

    fn generate() -> Self {
        let id = Uuid::new_v4().to_string();
        // A hyphenated uuid is always a valid header value.
        Self(HeaderValue::from_str(&id).unwrap_or(HeaderValue::from_static("unknown")))
    }

    pub fn as_str(&self) -> &str {
        self.0.to_str().unwrap_or_default()
    }
}

/// Tags each exchange with a [`RequestId`] and logs its result. Mask replies
/// are logged at debug; failures carry the [`ErrorReport`] detail and the
/// outcome code. Query strings stay out of the log since a misbehaving client
/// could put a session there.
pub async fn trace_requests(mut request: Request<Body>, next: Next) -> Response {
    let request_id = RequestId::from_headers(request.headers());
    request.extensions_mut().insert(request_id.clone());

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let mut response = next.run(request).await;
    let elapsed_ms = start.elapsed().as_millis();
    let status = response.status();
    let report = response.extensions_mut().remove::<ErrorReport>();
    response
        .headers_mut()
        .insert(REQUEST_ID_HEADER, request_id.0.clone());

    if !(status.is_client_error() || status.is_server_error()) {
        debug!(
            target: "shapemask::http",
            request_id = request_id.as_str(),
            status = status.as_u16(),
            method = %method,
            path = %path,
            elapsed_ms,
            "mask request served"
        );
        return response;
    }

    let (source, failure_code, chain) = match report {
        Some(report) => (report.source, report.failure_code, report.messages),
        None => ("unknown", None, Vec::new()),
    };
    let failure_code = failure_code.unwrap_or(status.as_u16());
    let detail = chain.first().map(String::as_str).unwrap_or("no diagnostic");

    if status.is_server_error() {
        error!(
            target: "shapemask::http",
            request_id = request_id.as_str(),
            status = status.as_u16(),
            failure_code,
            method = %method,
            path = %path,
            elapsed_ms,
            source,
            detail,
            chain = ?chain,
            "mask request failed"
        );
    } else {
        warn!(
            target: "shapemask::http",
            request_id = request_id.as_str(),
            status = status.as_u16(),
            failure_code,
            method = %method,
            path = %path,
            elapsed_ms,
            source,
            detail,
            "mask request rejected"
        );
    }

    response
}
