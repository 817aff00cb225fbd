//! The root configuration type.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, LoggingSettings, ServerSettings, StaticSettings};

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Complete weft configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to layer files and environment
/// variables over the defaults.
///
/// ```
/// use weft_config::WeftConfig;
///
/// let config = WeftConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct WeftConfig {
    /// Transport settings.
    pub server: ServerSettings,

    /// Logging settings.
    pub logging: LoggingSettings,

    /// Static-file settings.
    pub static_files: StaticSettings,
}

impl WeftConfig {
    /// Checks values that deserialise fine but cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .server
            .http_addr
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }
        if self.server.shutdown_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "server.shutdown_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.server.request_timeout_ms == Some(0) {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.server.body_limit_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "server.body_limit_bytes",
                "must be greater than zero",
            ));
        }
        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!("unknown level '{}', expected one of {}", self.logging.level, LOG_LEVELS.join(", ")),
            ));
        }
        Ok(())
    }

    /// Local development: debug logs in human-readable form.
    #[must_use]
    pub fn development() -> Self {
        Self {
            logging: LoggingSettings {
                level: "debug".to_string(),
                json_format: false,
                ..LoggingSettings::default()
            },
            ..Self::default()
        }
    }

    /// Production: info-level JSON logs and a 30 second request timeout.
    #[must_use]
    pub fn production() -> Self {
        Self {
            server: ServerSettings {
                request_timeout_ms: Some(30_000),
                ..ServerSettings::default()
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: true,
                ..LoggingSettings::default()
            },
            ..Self::default()
        }
    }
}
