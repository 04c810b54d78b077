//! Tracing subscriber setup.

use tracing_subscriber::{EnvFilter, fmt};

use crate::PlanpokerError;
use crate::config::LogFormat;

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over `level` when set. An unparseable filter falls back
/// to `info`.
///
/// # Errors
///
/// Returns [`PlanpokerError::Telemetry`] if a global subscriber is already
/// installed.
pub fn init(level: &str, format: LogFormat) -> Result<(), PlanpokerError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    };
    installed.map_err(|e| PlanpokerError::Telemetry(e.to_string()))
}
