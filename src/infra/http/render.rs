use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use shapemask_api_types::{FailureBody, ShapeIdRepr, ShapeMaskRequest};

use crate::application::{
    error::HttpError,
    orchestrator::ShapeMaskOrchestrator,
    outcome::{Failure, Outcome},
};

use super::middleware::trace_requests;

const MASK_CONTENT_TYPE: &str = "image/png";

#[derive(Clone)]
pub struct HttpState {
    pub masks: Arc<ShapeMaskOrchestrator>,
    pub session_header: HeaderName,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/render_shape_mask", post(render_from_body))
        .route("/render_shape_mask/{shape_id}", get(render_from_path))
        .route("/_health", get(health))
        .with_state(state)
        .layer(middleware::from_fn(trace_requests))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MaskQuery {
    color: Option<String>,
    flip: Option<String>,
}

async fn render_from_path(
    State(state): State<HttpState>,
    Path(shape_id): Path<String>,
    Query(query): Query<MaskQuery>,
    headers: HeaderMap,
) -> Response {
    let Some(session_key) = session_key(&headers, &state.session_header) else {
        return HttpError::new(
            "infra::http::render_from_path",
            StatusCode::FORBIDDEN,
            "Missing session",
            format!("header `{}` absent or empty", state.session_header),
        )
        .into_response();
    };

    let mut request = ShapeMaskRequest::new(ShapeIdRepr::Text(shape_id), session_key);
    if let Some(color) = query.color.filter(|color| !color.trim().is_empty()) {
        request = request.with_color(color);
    }
    if let Some(flip) = query.flip {
        request = request.with_flip_param(flip);
    }

    let raw = match request.to_bytes() {
        Ok(raw) => raw,
        Err(err) => {
            return HttpError::from_error(
                "infra::http::render_from_path",
                StatusCode::INTERNAL_SERVER_ERROR,
                Failure::internal().message,
                &err,
            )
            .into_response();
        }
    };

    mask_response(state.masks.handle(&raw).await, wants_json(&headers))
}

async fn render_from_body(
    State(state): State<HttpState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    mask_response(state.masks.handle(&body).await, wants_json(&headers))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

fn session_key(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"))
}

fn mask_response(outcome: Outcome, json_failures: bool) -> Response {
    match outcome {
        Outcome::Success(mask) => {
            let mut response = (StatusCode::OK, mask).into_response();
            let headers = response.headers_mut();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(MASK_CONTENT_TYPE));
            // Masks are gated per session.
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("private"));
            response
        }
        Outcome::Failure(failure) if json_failures => {
            let body = FailureBody {
                code: failure.code,
                message: failure.message.clone(),
            };
            HttpError::from(failure).into_response_with(Json(body))
        }
        Outcome::Failure(failure) => HttpError::from(failure).into_response(),
    }
}
