//! # Comm Telemetry
//!
//! Structured logging for server communicator processes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use comm_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).expect("Failed to init telemetry");
//!     // Application code; `tracing` events are now formatted and filtered
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `server-comm` | Service name in logs |
//! | `COMM_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `COMM_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `COMM_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::init_logging;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging for the process.
///
/// Returns a guard to hold for the lifetime of the application. Fails if a
/// global subscriber is already installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    logging::init_logging(&config)?;
    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Guard that marks the telemetry lifetime. Logs shutdown on drop.
pub struct TelemetryGuard {
    service_name: String,
}

impl TelemetryGuard {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry...");
    }
}

/// Convenience macro for creating a span with component context.
///
/// # Example
///
/// ```rust,ignore
/// let _span = comm_span!("serve", component = "server", address = "ep1").entered();
/// ```
#[macro_export]
macro_rules! comm_span {
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}
