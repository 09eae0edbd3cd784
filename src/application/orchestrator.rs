//! Cache-aside orchestration for shape mask render requests.
//!
//! One call to [`ShapeMaskOrchestrator::handle`] walks a request through
//! decode → {cache lookup, access check} → decide → render → reply, and
//! always ends in exactly one [`Outcome`]. The cache lookup and the access
//! check are independent and run concurrently; both are awaited before any
//! decision is made. A successful render with an explicit color is written
//! back to the cache by a detached task that the reply never waits on.

use std::{fmt, str::FromStr, sync::Arc};

use bytes::Bytes;
use metrics::counter;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::mask::ShapeMaskContext;

use super::{
    outcome::{Failure, Outcome},
    ports::{AccessChecker, AccessError, MaskCache, MaskRenderer},
    timing::RequestTimer,
};

pub const METRIC_CACHE_LOOKUP_TOTAL: &str = "shapemask_cache_lookup_total";
pub const METRIC_CACHE_WRITE_TOTAL: &str = "shapemask_cache_write_total";

const TIMER_TAG: &str = "render_shape_mask";

/// How a denied access check interacts with rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessPolicy {
    /// A denied check ends the request with 404 and the renderer is never called.
    #[default]
    Veto,
    /// A denied check only disables the cache hit; the renderer is trusted to
    /// enforce access on its own.
    Defer,
}

impl AccessPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessPolicy::Veto => "veto",
            AccessPolicy::Defer => "defer",
        }
    }
}

impl fmt::Display for AccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "veto" => Ok(AccessPolicy::Veto),
            "defer" => Ok(AccessPolicy::Defer),
            other => Err(format!("unknown access policy `{other}` (expected veto|defer)")),
        }
    }
}

/// Which terminal path a request took; used as the timer's outcome label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    CacheHit,
    Rendered,
    DecodeFailed,
    AccessFailed,
    AccessDenied,
    RenderMiss,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::CacheHit => "cache_hit",
            Resolution::Rendered => "rendered",
            Resolution::DecodeFailed => "decode_failed",
            Resolution::AccessFailed => "access_failed",
            Resolution::AccessDenied => "access_denied",
            Resolution::RenderMiss => "render_miss",
        }
    }
}

struct CacheWrite {
    key: String,
    value: Bytes,
}

struct Terminal {
    outcome: Outcome,
    resolution: Resolution,
    cache_write: Option<CacheWrite>,
}

impl Terminal {
    fn success(resolution: Resolution, mask: Bytes, cache_write: Option<CacheWrite>) -> Self {
        Self {
            outcome: Outcome::Success(mask),
            resolution,
            cache_write,
        }
    }

    fn failed(resolution: Resolution, failure: Failure) -> Self {
        Self {
            outcome: Outcome::Failure(failure),
            resolution,
            cache_write: None,
        }
    }
}

/// Drives one render request at a time; holds no per-request state and is
/// shared across concurrent requests.
pub struct ShapeMaskOrchestrator {
    cache: Arc<dyn MaskCache>,
    access: Arc<dyn AccessChecker>,
    renderer: Arc<dyn MaskRenderer>,
    policy: AccessPolicy,
}

impl ShapeMaskOrchestrator {
    pub fn new(
        cache: Arc<dyn MaskCache>,
        access: Arc<dyn AccessChecker>,
        renderer: Arc<dyn MaskRenderer>,
    ) -> Self {
        Self {
            cache,
            access,
            renderer,
            policy: AccessPolicy::default(),
        }
    }

    pub fn with_access_policy(mut self, policy: AccessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn access_policy(&self) -> AccessPolicy {
        self.policy
    }

    /// Handle one raw request descriptor and produce its single outcome.
    #[instrument(skip_all, fields(request_bytes = raw.len()))]
    pub async fn handle(&self, raw: &[u8]) -> Outcome {
        let timer = RequestTimer::start(TIMER_TAG);
        let terminal = self.resolve(raw).await;
        timer.stop(terminal.resolution.as_str());

        if let Some(write) = terminal.cache_write {
            self.dispatch_cache_write(write);
        }

        terminal.outcome
    }

    async fn resolve(&self, raw: &[u8]) -> Terminal {
        let context = match ShapeMaskContext::decode(raw) {
            Ok(context) => context,
            Err(err) => {
                error!(error = %err, request_bytes = raw.len(), "Illegal shape mask context");
                return Terminal::failed(Resolution::DecodeFailed, Failure::illegal_context());
            }
        };

        debug!(
            shape_id = context.shape_id(),
            color = context.color().unwrap_or(""),
            flip = context.flip().as_param().unwrap_or(""),
            session = %context.session_fingerprint(),
            cache_key = context.cache_key(),
            "Render shape mask request"
        );

        let (cached, readable) = tokio::join!(
            self.lookup(context.cache_key()),
            self.access.can_read(&context)
        );

        let readable = match readable {
            Ok(readable) => readable,
            Err(AccessError::Downstream(failure)) => {
                warn!(
                    shape_id = context.shape_id(),
                    code = failure.code,
                    message = %failure.message,
                    "Access check failed downstream; relaying failure"
                );
                return Terminal::failed(Resolution::AccessFailed, failure);
            }
            Err(AccessError::Internal(detail)) => {
                error!(shape_id = context.shape_id(), error = %detail, "Internal error");
                return Terminal::failed(Resolution::AccessFailed, Failure::internal());
            }
        };

        if readable && let Some(mask) = cached {
            debug!(cache_key = context.cache_key(), "Serving cached mask");
            return Terminal::success(Resolution::CacheHit, mask, None);
        }

        if !readable && self.policy == AccessPolicy::Veto {
            info!(
                shape_id = context.shape_id(),
                session = %context.session_fingerprint(),
                "Shape not readable for session; refusing to render"
            );
            return Terminal::failed(
                Resolution::AccessDenied,
                Failure::cannot_render(context.shape_id()),
            );
        }

        self.render(&context).await
    }

    async fn lookup(&self, key: &str) -> Option<Bytes> {
        match self.cache.get(key).await {
            Ok(Some(mask)) => {
                counter!(METRIC_CACHE_LOOKUP_TOTAL, "result" => "hit").increment(1);
                Some(mask)
            }
            Ok(None) => {
                counter!(METRIC_CACHE_LOOKUP_TOTAL, "result" => "miss").increment(1);
                None
            }
            Err(err) => {
                counter!(METRIC_CACHE_LOOKUP_TOTAL, "result" => "error").increment(1);
                warn!(cache_key = key, error = %err, "Cache lookup failed; treating as miss");
                None
            }
        }
    }

    async fn render(&self, context: &ShapeMaskContext) -> Terminal {
        let mask = match self.renderer.render(context).await {
            Ok(Some(mask)) if !mask.is_empty() => mask,
            Ok(_) => {
                info!(shape_id = context.shape_id(), "Renderer produced no mask");
                return Terminal::failed(
                    Resolution::RenderMiss,
                    Failure::cannot_render(context.shape_id()),
                );
            }
            Err(err) => {
                error!(shape_id = context.shape_id(), error = %err, "Exception while rendering mask");
                return Terminal::failed(
                    Resolution::RenderMiss,
                    Failure::cannot_render(context.shape_id()),
                );
            }
        };

        let cache_write = context.has_explicit_color().then(|| CacheWrite {
            key: context.cache_key().to_string(),
            value: mask.clone(),
        });

        Terminal::success(Resolution::Rendered, mask, cache_write)
    }

    /// Detach the cache write; its result never reaches the caller.
    fn dispatch_cache_write(&self, write: CacheWrite) {
        let cache = Arc::clone(&self.cache);
        let CacheWrite { key, value } = write;

        tokio::spawn(async move {
            match cache.set(&key, value).await {
                Ok(()) => {
                    counter!(METRIC_CACHE_WRITE_TOTAL, "result" => "ok").increment(1);
                    debug!(cache_key = %key, "Cached rendered mask");
                }
                Err(err) => {
                    counter!(METRIC_CACHE_WRITE_TOTAL, "result" => "error").increment(1);
                    warn!(cache_key = %key, error = %err, "Failed to cache rendered mask");
                }
            }
        });
    }
}
