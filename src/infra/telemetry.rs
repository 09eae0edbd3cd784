use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    application::{
        orchestrator::{METRIC_CACHE_LOOKUP_TOTAL, METRIC_CACHE_WRITE_TOTAL},
        timing::{METRIC_REQUEST_MS, METRIC_REQUESTS_TOTAL},
    },
    cache::{METRIC_CACHE_ENTRIES, METRIC_CACHE_EVICT_TOTAL},
    config::{LogFormat, LoggingSettings},
};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_histogram!(
            METRIC_REQUEST_MS,
            Unit::Milliseconds,
            "Render request latency from ingress to reply, labelled by outcome."
        );
        describe_counter!(
            METRIC_REQUESTS_TOTAL,
            Unit::Count,
            "Total number of render requests, labelled by outcome."
        );
        describe_counter!(
            METRIC_CACHE_LOOKUP_TOTAL,
            Unit::Count,
            "Mask cache lookups, labelled hit, miss or error."
        );
        describe_counter!(
            METRIC_CACHE_WRITE_TOTAL,
            Unit::Count,
            "Background mask cache writes, labelled ok or error."
        );
        describe_counter!(
            METRIC_CACHE_EVICT_TOTAL,
            Unit::Count,
            "Total number of cached masks evicted due to capacity."
        );
        describe_gauge!(
            METRIC_CACHE_ENTRIES,
            Unit::Count,
            "Current number of masks held in the in-memory cache."
        );
    });
}
