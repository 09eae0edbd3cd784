use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tracing::debug;

pub const METRIC_REQUEST_MS: &str = "shapemask_request_ms";
pub const METRIC_REQUESTS_TOTAL: &str = "shapemask_requests_total";

/// Stopwatch spanning one request from ingress to its terminal outcome.
///
/// `stop` consumes the timer, so a request can be recorded at most once.
#[must_use = "a request timer records nothing until it is stopped"]
#[derive(Debug)]
pub struct RequestTimer {
    tag: &'static str,
    started_at: Instant,
}

impl RequestTimer {
    pub fn start(tag: &'static str) -> Self {
        Self {
            tag,
            started_at: Instant::now(),
        }
    }

    /// Record the elapsed time under `outcome` and return it.
    pub fn stop(self, outcome: &'static str) -> Duration {
        let elapsed = self.started_at.elapsed();
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;

        histogram!(METRIC_REQUEST_MS, "outcome" => outcome).record(elapsed_ms);
        counter!(METRIC_REQUESTS_TOTAL, "outcome" => outcome).increment(1);
        debug!(tag = self.tag, outcome, elapsed_ms, "Request timer stopped");

        elapsed
    }
}
