//! Configuration for trellisd
//!
//! Sources, lowest precedence first: built-in defaults, the optional
//! configuration file (format by extension), `TRELLIS_` environment
//! variables. Nested keys use `__` in variable names, for example
//! `TRELLIS_CONTROLLER__MAX_CONCURRENT_RECONCILES=4`.

use crate::error::DaemonResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use trellis_control::{BackoffConfig, ControllerConfig};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "TRELLIS";

/// Main daemon configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Controller configuration
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Retry backoff
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration from defaults, `path` and the environment.
    pub fn load(path: Option<&Path>) -> DaemonResult<Self> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("controller.monitored_namespaces")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DaemonError;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.controller.max_concurrent_reconciles, 1);
        assert_eq!(config.controller.meltdown_secs, 60);
        assert_eq!(config.backoff.max_retries, 5);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_load_without_file_gives_defaults() {
        let config = DaemonConfig::load(None).unwrap();
        assert_eq!(config.controller, ControllerConfig::default());
        assert_eq!(config.backoff, BackoffConfig::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[controller]
max_concurrent_reconciles = 4
monitored_namespaces = ["fleet"]

[backoff]
initial_delay_ms = 250
jitter = false
"#
        )
        .unwrap();

        let config = DaemonConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.controller.max_concurrent_reconciles, 4);
        assert_eq!(config.controller.monitored_namespaces, vec!["fleet"]);
        assert_eq!(config.controller.meltdown_secs, 60);
        assert_eq!(config.backoff.initial_delay_ms, 250);
        assert!(!config.backoff.jitter);
        assert_eq!(config.backoff.max_delay_ms, 30000);
    }

    #[test]
    fn test_yaml_file_is_accepted() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "logging:\n  level: debug\n  json: true\n").unwrap();

        let config = DaemonConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = DaemonConfig::load(Some(Path::new("/nonexistent/trellis.toml"))).unwrap_err();
        assert!(matches!(err, DaemonError::Config(_)));
    }
}
