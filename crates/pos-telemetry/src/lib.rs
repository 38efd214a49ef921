//! # POS Telemetry
//!
//! Logging, tracing and metrics for the receiptless POS runtime.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` with an `EnvFilter`, pretty output in
//!   development and JSON inside containers
//! - **Traces**: OTLP span export behind the `otlp` feature
//! - **Metrics**: Prometheus counters in a private registry, rendered by
//!   [`gather_metrics`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pos_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).await?;
//!     // Logs and metrics are now being collected
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RL_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `RL_JSON_LOGS` | `false` (`true` in containers) | JSON output |
//! | `RL_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `OTEL_SERVICE_NAME` | `receiptless-pos` | Service name |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | unset | Collector endpoint (`otlp` feature) |

mod config;
pub mod metrics;
mod tracing_setup;

pub use config::{running_in_container, TelemetryConfig};
pub use metrics::{
    gather_metrics, register_metrics, HistogramTimer, CHANNEL_FRAMES_DROPPED,
    EVENT_APPEND_FAILURES, FALLBACK_PRINTS, INTENTS_APPLIED, INTENTS_REJECTED, ISSUANCE_DURATION,
    ISSUANCE_FAILED, ISSUANCE_STARTED, SESSIONS_ACTIVE, SESSIONS_CREATED, SNAPSHOT_BYTES,
    SNAPSHOT_WRITE_FAILURES,
};
pub use tracing_setup::TracingGuard;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging, tracing and metrics.
///
/// Returns a guard that must be held for the lifetime of the application.
/// When dropped, it flushes pending spans.
pub async fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first (synchronous)
    register_metrics()?;

    let tracing = tracing_setup::init_tracing(&config).await?;

    Ok(TelemetryGuard { _tracing: tracing })
}

/// Guard that keeps telemetry active. Drop to flush and shutdown.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}
