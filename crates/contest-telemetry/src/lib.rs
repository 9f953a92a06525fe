//! # Contest Telemetry
//!
//! Logging and metrics shared by the contest session crates.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use contest_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CONTEST_SERVICE_NAME` | `contest-session` | Service name attached to logs |
//! | `CONTEST_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `CONTEST_CONSOLE_OUTPUT` | `true` | Emit logs to stdout |
//! | `CONTEST_JSON_LOGS` | `false` (true in containers) | JSON formatted logs |

mod config;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{encode_metrics, register_metrics, MetricsHandle};
pub use tracing_setup::init_tracing;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Initialize logging and register the session metrics.
///
/// Hold the returned guard for as long as the session runs.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = register_metrics()?;
    init_tracing(config)?;

    Ok(TelemetryGuard { _metrics: metrics })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::debug!("Shutting down telemetry");
    }
}
