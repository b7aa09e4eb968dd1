//! Structured logging.
//!
//! # Responsibilities
//! - Install the global `tracing` subscriber once at startup
//! - Pick text or JSON output from configuration
//! - Let `FRICU_LOG` override the configured filter
//!
//! Logs go to stderr so stdout stays free for tooling.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{LogFormat, ObservabilityConfig};

/// Environment variable holding an `EnvFilter` directive.
pub const ENV_LOG: &str = "FRICU_LOG";

/// Error raised when the subscriber cannot be installed.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter {directive:?}: {source}")]
    Filter {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("logging already initialized: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Build the filter: `FRICU_LOG` wins over the configured level.
fn build_filter(config: &ObservabilityConfig) -> Result<EnvFilter, LoggingError> {
    let directive = std::env::var(ENV_LOG).unwrap_or_else(|_| config.log_level.clone());
    EnvFilter::try_new(&directive).map_err(|source| LoggingError::Filter { directive, source })
}

/// Initialize the global subscriber.
pub fn init(config: &ObservabilityConfig) -> Result<(), LoggingError> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_thread_names(true))
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_thread_names(true),
            )
            .try_init()?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_parses() {
        let config = ObservabilityConfig {
            log_level: "fricu_server=debug,warn".into(),
            ..ObservabilityConfig::default()
        };
        assert!(build_filter(&config).is_ok());
    }
}
