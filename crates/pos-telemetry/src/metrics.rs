//! Prometheus metrics for the POS runtime.
//!
//! All metrics follow the naming convention: `rl_<area>_<metric>_<unit>`
//!
//! Counters only move forward; the session gauge tracks live actors.

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Private metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // SESSION METRICS
    // =========================================================================

    /// Sessions created
    pub static ref SESSIONS_CREATED: Counter = Counter::new(
        "rl_sessions_created_total",
        "Total number of POS sessions created"
    ).expect("metric creation failed");

    /// Live session actors
    pub static ref SESSIONS_ACTIVE: Gauge = Gauge::new(
        "rl_sessions_active",
        "Number of session actors currently running"
    ).expect("metric creation failed");

    /// Intents applied, by intent name
    pub static ref INTENTS_APPLIED: CounterVec = CounterVec::new(
        Opts::new("rl_intents_applied_total", "Intents that produced a new snapshot"),
        &["intent"]
    ).expect("metric creation failed");

    /// Intents rejected, by intent name
    pub static ref INTENTS_REJECTED: CounterVec = CounterVec::new(
        Opts::new("rl_intents_rejected_total", "Intents rejected without state change"),
        &["intent"]
    ).expect("metric creation failed");

    // =========================================================================
    // PERSISTENCE METRICS
    // =========================================================================

    /// Snapshot writes that failed
    pub static ref SNAPSHOT_WRITE_FAILURES: Counter = Counter::new(
        "rl_snapshot_write_failures_total",
        "Snapshot store writes that failed"
    ).expect("metric creation failed");

    /// Event appends that failed
    pub static ref EVENT_APPEND_FAILURES: Counter = Counter::new(
        "rl_event_append_failures_total",
        "Event log appends that failed"
    ).expect("metric creation failed");

    // =========================================================================
    // CHANNEL METRICS
    // =========================================================================

    /// Channel frames dropped as invalid or lagged
    pub static ref CHANNEL_FRAMES_DROPPED: Counter = Counter::new(
        "rl_channel_frames_dropped_total",
        "Session channel frames dropped by subscribers"
    ).expect("metric creation failed");

    // =========================================================================
    // RECEIPT METRICS
    // =========================================================================

    /// Issuance attempts
    pub static ref ISSUANCE_STARTED: Counter = Counter::new(
        "rl_issuance_started_total",
        "Receipt issuance attempts"
    ).expect("metric creation failed");

    /// Issuance failures, by error code
    pub static ref ISSUANCE_FAILED: CounterVec = CounterVec::new(
        Opts::new("rl_issuance_failed_total", "Receipt issuance failures"),
        &["code"]
    ).expect("metric creation failed");

    /// Issuance call duration
    pub static ref ISSUANCE_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "rl_issuance_duration_seconds",
            "Time spent waiting for the receipt backend"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 4.0, 8.0])
    ).expect("metric creation failed");

    /// Paper receipts printed, by reason
    pub static ref FALLBACK_PRINTS: CounterVec = CounterVec::new(
        Opts::new("rl_fallback_prints_total", "Paper receipts printed as fallback"),
        &["reason"]
    ).expect("metric creation failed");

    /// Snapshot size in bytes
    pub static ref SNAPSHOT_BYTES: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "rl_snapshot_size_bytes",
            "Serialized snapshot size"
        ).buckets(exponential_buckets(256.0, 2.0, 10).unwrap_or_default())
    ).expect("metric creation failed");
}

/// Register all metrics with the private registry. Idempotent.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Sessions
        Box::new(SESSIONS_CREATED.clone()),
        Box::new(SESSIONS_ACTIVE.clone()),
        Box::new(INTENTS_APPLIED.clone()),
        Box::new(INTENTS_REJECTED.clone()),
        // Persistence
        Box::new(SNAPSHOT_WRITE_FAILURES.clone()),
        Box::new(EVENT_APPEND_FAILURES.clone()),
        Box::new(SNAPSHOT_BYTES.clone()),
        // Channel
        Box::new(CHANNEL_FRAMES_DROPPED.clone()),
        // Receipts
        Box::new(ISSUANCE_STARTED.clone()),
        Box::new(ISSUANCE_FAILED.clone()),
        Box::new(ISSUANCE_DURATION.clone()),
        Box::new(FALLBACK_PRINTS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
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
