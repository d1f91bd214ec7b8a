//! Structured logging with tracing.

use alloy_domain::{Error, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::LoggingConfig;

/// Environment variable overriding the configured log filter
pub const LOG_ENV_VAR: &str = "ALLOY_LOG";

/// Initialize logging with the provided configuration.
///
/// `ALLOY_LOG` overrides the configured level when set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = Registry::default().with(filter);
    let result = if config.json_format {
        registry
            .with(fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    result.map_err(|err| Error::config(format!("failed to initialize logging: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_initialization_is_an_error_not_a_panic() {
        let config = LoggingConfig::default();
        let first = init_logging(&config);
        let second = init_logging(&config);
        // Exactly one of the two calls can win the global subscriber slot;
        // the other must fail gracefully.
        assert!(first.is_ok() || second.is_err());
    }
}
