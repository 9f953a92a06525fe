//! Prometheus metrics for the contest attempt session.
//!
//! All metrics follow the naming convention: `contest_<area>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // INTEGRITY
    // =========================================================================

    /// Fullscreen-loss violations recorded against sessions
    pub static ref VIOLATIONS_RECORDED: Counter = Counter::new(
        "contest_integrity_violations_total",
        "Total fullscreen-loss violations recorded"
    ).expect("metric creation failed");

    /// Back-navigation confirmations by answer
    pub static ref LEAVE_CONFIRMATIONS: CounterVec = CounterVec::new(
        Opts::new("contest_integrity_leave_confirmations_total", "Back-navigation prompts answered"),
        &["answer"]  // answer: confirmed/declined
    ).expect("metric creation failed");

    /// Sessions locked by the deadline monitor
    pub static ref SESSIONS_TIMED_OUT: Counter = Counter::new(
        "contest_deadline_timeouts_total",
        "Sessions locked because the contest window closed"
    ).expect("metric creation failed");

    // =========================================================================
    // FINALIZE
    // =========================================================================

    /// Guarded finalize dispatches by outcome
    pub static ref FINALIZE_DISPATCHES: CounterVec = CounterVec::new(
        Opts::new("contest_finalize_dispatches_total", "Guarded finalize requests sent"),
        &["outcome"]  // outcome: ok/already_finalized/failed
    ).expect("metric creation failed");

    /// Fire-and-forget finalize beacons sent on teardown
    pub static ref FINALIZE_BEACONS: Counter = Counter::new(
        "contest_finalize_beacons_total",
        "Best-effort finalize requests sent on page teardown"
    ).expect("metric creation failed");

    // =========================================================================
    // RUN / SUBMIT
    // =========================================================================

    /// Run/submit requests that reached the gateway
    pub static ref SUBMISSIONS: CounterVec = CounterVec::new(
        Opts::new("contest_submissions_total", "Run/submit requests sent to the gateway"),
        &["kind", "outcome"]  // kind: run/submit, outcome: ok/failed
    ).expect("metric creation failed");

    /// Run/submit requests rejected before any network call
    pub static ref LOCAL_REJECTIONS: CounterVec = CounterVec::new(
        Opts::new("contest_submissions_rejected_total", "Run/submit calls rejected locally"),
        &["reason"]
    ).expect("metric creation failed");

    /// Gateway round-trip time
    pub static ref GATEWAY_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "contest_gateway_request_duration_seconds",
            "Time spent waiting for the contest gateway"
        ).buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
    ).expect("metric creation failed");
}

/// Handle keeping the registry alive
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
///
/// Calling this more than once is harmless.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(VIOLATIONS_RECORDED.clone()),
        Box::new(LEAVE_CONFIRMATIONS.clone()),
        Box::new(SESSIONS_TIMED_OUT.clone()),
        Box::new(FINALIZE_DISPATCHES.clone()),
        Box::new(FINALIZE_BEACONS.clone()),
        Box::new(SUBMISSIONS.clone()),
        Box::new(LOCAL_REJECTIONS.clone()),
        Box::new(GATEWAY_LATENCY.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard observing elapsed seconds into a histogram on drop.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}
