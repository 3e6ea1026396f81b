//! Tracing subscriber setup for the binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;
use crate::error::ClientError;

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "warn,agrilink=info";

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(format: LogFormat) -> Result<(), ClientError> {
    let registry = tracing_subscriber::registry().with(env_filter());
    let installed = match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };
    installed.map_err(|e| ClientError::Telemetry(e.to_string()))?;

    tracing::debug!(format = ?format, "Tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(DEFAULT_FILTER.parse::<EnvFilter>().is_ok());
    }

    #[test]
    fn test_second_init_fails() {
        let first = init_tracing(LogFormat::Json);
        let second = init_tracing(LogFormat::Pretty);
        // Another test in this binary may have won the first install.
        assert!(first.is_ok() || matches!(first, Err(ClientError::Telemetry(_))));
        assert!(matches!(second, Err(ClientError::Telemetry(_))));
    }
}
