//! HTTP adapters for the access service and the mask renderer.

mod access;
mod render;

pub use access::HttpAccessChecker;
pub use render::HttpMaskRenderer;

use axum::http::{HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Url};

use crate::{config::UpstreamSettings, domain::mask::ShapeMaskContext};

use super::error::InfraError;

/// Shared reqwest client plus the header used to forward the caller's session.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    session_header: HeaderName,
}

impl UpstreamClient {
    pub fn new(settings: &UpstreamSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::upstream(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            session_header: settings.session_header.clone(),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("shapemask/", env!("CARGO_PKG_VERSION"))
    }

    /// GET `url` with the caller's session attached.
    fn get(&self, url: Url, context: &ShapeMaskContext) -> Result<RequestBuilder, String> {
        let session = HeaderValue::from_str(context.session_key())
            .map_err(|err| format!("session key is not a valid header value: {err}"))?;
        Ok(self
            .client
            .get(url)
            .header(self.session_header.clone(), session))
    }
}

fn join(base: &Url, path: &str) -> Result<Url, String> {
    base.join(path)
        .map_err(|err| format!("failed to build upstream url for `{path}`: {err}"))
}
