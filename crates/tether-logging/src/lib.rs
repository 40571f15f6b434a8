//! # tether-logging
//!
//! Structured logging with `tracing`. Host applications embedding the sync
//! engine call [`init_logging`] once at startup; everything below logs
//! through the `tracing` macros with structured fields.

#![deny(unsafe_code)]

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Configuration for log output.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Default log level. Overridden by the `RUST_LOG` env var.
    pub log_level: Level,
    /// Per-module level overrides (e.g. `"tether_rpc"` => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Render the filter directive string for this configuration.
    #[must_use]
    pub fn filter_directives(&self) -> String {
        let mut filter = self.log_level.to_string().to_lowercase();
        for (module, level) in &self.module_levels {
            filter.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
        }
        filter
    }
}

/// Initialize the tracing subscriber. Call once at startup.
///
/// Returns an error string if a global subscriber is already installed
/// (tests installing their own subscriber is the common cause).
pub fn init_logging(config: &LoggingConfig) -> Result<(), String> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let result = if config.json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    };

    result.map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.log_level, Level::INFO);
        assert!(!config.json);
        assert!(config.module_levels.is_empty());
    }

    #[test]
    fn filter_directives_single_level() {
        let config = LoggingConfig::default();
        assert_eq!(config.filter_directives(), "info");
    }

    #[test]
    fn filter_directives_with_module_overrides() {
        let config = LoggingConfig {
            log_level: Level::WARN,
            module_levels: vec![
                ("tether_rpc".to_string(), Level::DEBUG),
                ("tether_sync".to_string(), Level::TRACE),
            ],
            json: false,
        };
        assert_eq!(
            config.filter_directives(),
            "warn,tether_rpc=debug,tether_sync=trace"
        );
    }

    #[test]
    fn double_init_reports_error() {
        let config = LoggingConfig::default();
        let first = init_logging(&config);
        assert!(first.is_ok());
        let second = init_logging(&config);
        assert!(second.is_err());
    }
}
