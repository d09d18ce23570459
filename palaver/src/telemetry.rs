//! Process-wide tracing subscriber setup.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;
use crate::error::ConfigError;

/// Installs a global `fmt` subscriber filtered by `config.filter`.
///
/// Fails when the filter does not parse or a global subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    installed.map_err(|error| {
        ConfigError::invalid(format!("failed to install tracing subscriber: {error}"))
    })
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, ConfigError> {
    EnvFilter::try_new(&config.filter).map_err(|error| {
        ConfigError::invalid(format!("invalid log filter '{}': {error}", config.filter))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_directives_are_validated() {
        let valid = LoggingConfig {
            filter: "info,pchat=debug".to_string(),
            json: false,
        };
        assert!(build_filter(&valid).is_ok());

        let invalid = LoggingConfig {
            filter: "pchat=notalevel".to_string(),
            json: false,
        };
        assert!(build_filter(&invalid).is_err());
    }
}
