use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{StatusCode, Url};

use crate::{
    application::ports::{MaskRenderer, RenderError},
    domain::mask::ShapeMaskContext,
};

use super::{UpstreamClient, join};

/// Fetches rendered masks from the render service.
#[derive(Debug, Clone)]
pub struct HttpMaskRenderer {
    upstream: UpstreamClient,
    base: Url,
}

impl HttpMaskRenderer {
    pub fn new(upstream: UpstreamClient, base: Url) -> Self {
        Self { upstream, base }
    }

    fn mask_url(&self, context: &ShapeMaskContext) -> Result<Url, RenderError> {
        let mut url = join(&self.base, &format!("shapes/{}/mask", context.shape_id()))
            .map_err(RenderError::Transport)?;

        url.set_query(None);
        if context.color().is_some() || context.flip().as_param().is_some() {
            let mut query = url.query_pairs_mut();
            if let Some(color) = context.color() {
                query.append_pair("color", color);
            }
            if let Some(flip) = context.flip().as_param() {
                query.append_pair("flip", flip);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl MaskRenderer for HttpMaskRenderer {
    async fn render(&self, context: &ShapeMaskContext) -> Result<Option<Bytes>, RenderError> {
        let url = self.mask_url(context)?;

        let response = self
            .upstream
            .get(url, context)
            .map_err(RenderError::Transport)?
            .send()
            .await
            .map_err(|err| RenderError::Transport(err.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = response
                    .bytes()
                    .await
                    .map_err(|err| RenderError::Transport(err.to_string()))?;
                Ok((!body.is_empty()).then_some(body))
            }
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(RenderError::Upstream {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}
