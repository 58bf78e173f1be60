//! Logging and tracing setup shared by the bot binaries.
//!
//! `RUST_LOG` drives filtering, `LOG_FORMAT` picks JSON or text output, and
//! `ENABLE_OTEL` with `OTEL_EXPORTER_OTLP_ENDPOINT` adds an OTLP span exporter.

use anyhow::Result;

mod config;
mod context;
mod tracing_init;

pub use config::{TelemetryConfig, TelemetryProtocol};
pub use context::TurnLabels;
pub use tracing_init::init_telemetry;

/// Installs the global subscriber configured from the process environment.
pub fn install(service_name: &str) -> Result<()> {
    init_telemetry(TelemetryConfig::from_env(
        service_name,
        env!("CARGO_PKG_VERSION"),
    ))
}
