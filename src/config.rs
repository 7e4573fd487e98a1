//! Configuration loading and validation.
//!
//! A TOML file configures logging, reconciliation back-off, the global
//! lifecycle timeout defaults, and optional declarative registrations.
//!
//! # Example
//!
//! ```no_run
//! use stagehand::config::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("stagehand.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::domain::{AppTimeouts, Phase, TimeoutConfig};
use crate::error::{ConfigError, Result};
use crate::reconcile::DEFAULT_RELOAD_BACKOFF;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// Global timeout defaults, captured by each application when it loads.
    #[serde(default)]
    pub timeouts: AppTimeouts,
    /// Declarative registrations, read with
    /// [`RegistrationConfig::from_table`](crate::registration::RegistrationConfig::from_table).
    #[serde(default)]
    pub applications: Vec<toml::Table>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_level() -> String {
    "info".into()
}

fn default_format() -> String {
    "pretty".into()
}

impl LoggingConfig {
    /// Install the global tracing subscriber. `RUST_LOG` overrides `level`.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    /// Minimum wait before an application in `LoadError` is loaded again.
    #[serde(default = "default_reload_backoff_ms")]
    pub reload_backoff_ms: u64,
}

fn default_reload_backoff_ms() -> u64 {
    DEFAULT_RELOAD_BACKOFF.as_millis() as u64
}

impl ReconcileConfig {
    pub fn reload_backoff(&self) -> Duration {
        Duration::from_millis(self.reload_backoff_ms)
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            reload_backoff_ms: default_reload_backoff_ms(),
        }
    }
}

impl Config {
    /// Read, parse and validate a config file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadFile`, `ConfigError::Parse`, or
    /// `ConfigError::InvalidValue`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Parse and validate config text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` or `ConfigError::InvalidValue`.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (phase, field) in [
            (Phase::Bootstrap, "timeouts.bootstrap.millis"),
            (Phase::Mount, "timeouts.mount.millis"),
            (Phase::Unmount, "timeouts.unmount.millis"),
            (Phase::Unload, "timeouts.unload.millis"),
            (Phase::Update, "timeouts.update.millis"),
        ] {
            validate_timeout(field, &self.timeouts.get(phase))?;
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::InvalidValue {
                field: "logging.format",
                reason: format!("expected \"pretty\" or \"json\", got \"{}\"", self.logging.format),
            }
            .into());
        }
        Ok(())
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}

fn validate_timeout(field: &'static str, config: &TimeoutConfig) -> Result<()> {
    if config.millis == 0 {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "must be greater than 0".to_string(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse_toml("").unwrap();

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.reconcile.reload_backoff(), Duration::from_millis(200));
        assert_eq!(config.timeouts, AppTimeouts::default());
        assert!(config.applications.is_empty());
    }

    #[test]
    fn phase_tables_override_defaults() {
        let config = Config::parse_toml(
            r#"
            [timeouts.mount]
            millis = 500
            die_on_timeout = true

            [reconcile]
            reload_backoff_ms = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.timeouts.mount, TimeoutConfig::new(500, true, 1000));
        assert_eq!(config.timeouts.bootstrap.millis, 4000);
        assert_eq!(config.reconcile.reload_backoff_ms, 50);
    }

    #[test]
    fn zero_millis_is_rejected() {
        let err = Config::parse_toml("[timeouts.unmount]\nmillis = 0\n").unwrap_err();

        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidValue { field: "timeouts.unmount.millis", .. })
        ));
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        let err = Config::parse_toml("[logging]\nformat = \"xml\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidValue { field: "logging.format", .. })));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = Config::parse_toml("[logging\n").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn applications_are_kept_as_tables() {
        let config = Config::parse_toml(
            r#"
            [[applications]]
            name = "nav"
            app = "nav"
            active_when = "/"
            "#,
        )
        .unwrap();

        assert_eq!(config.applications.len(), 1);
        assert_eq!(config.applications[0]["name"].as_str(), Some("nav"));
    }
}
