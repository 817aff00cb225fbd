//! Configuration sections.
//!
//! Every section rejects unknown keys and falls back to its [`Default`] for
//! keys that are absent.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Transport settings.
///
/// ```
/// use weft_config::ServerSettings;
///
/// let settings = ServerSettings::default();
/// assert_eq!(settings.http_addr, "0.0.0.0:8080");
/// assert_eq!(settings.request_timeout(), None);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    /// Bind address (e.g. "0.0.0.0:8080").
    pub http_addr: String,

    /// Graceful shutdown timeout in seconds.
    pub shutdown_timeout_secs: u64,

    /// Request timeout in milliseconds; absent means no timeout.
    pub request_timeout_ms: Option<u64>,

    /// HTTP/1.1 keep-alive.
    pub keep_alive: bool,

    /// Upper bound for parsed request bodies, in bytes.
    pub body_limit_bytes: usize,
}

impl ServerSettings {
    /// Shutdown timeout as a [`Duration`].
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_string(),
            shutdown_timeout_secs: 30,
            request_timeout_ms: None,
            keep_alive: true,
            body_limit_bytes: 1024 * 1024,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Level: trace, debug, info, warn, error or off.
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    pub json_format: bool,

    /// Service name attached to the startup event.
    pub service_name: String,
}

impl LoggingSettings {
    /// Converts to the telemetry crate's configuration.
    #[must_use]
    pub fn to_log_config(&self) -> weft_telemetry::LogConfig {
        let preset = if self.json_format {
            weft_telemetry::LogConfig::production()
        } else {
            weft_telemetry::LogConfig::development()
        };
        weft_telemetry::LogConfig {
            enabled: self.enabled,
            level: self.level.clone(),
            json_format: self.json_format,
            service_name: self.service_name.clone(),
            ..preset
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: false,
            service_name: "weft".to_string(),
        }
    }
}

/// Static-file settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct StaticSettings {
    /// Directory to serve; required by the `weft-serve` binary unless given
    /// on the command line.
    pub root: Option<PathBuf>,

    /// File served for directory hits.
    pub index_file: Option<String>,

    /// SPA fallback file, relative to the root.
    pub spa_file: Option<String>,

    /// Serve files whose name starts with a dot.
    pub show_hidden: bool,
}

impl Default for StaticSettings {
    fn default() -> Self {
        Self {
            root: None,
            index_file: Some("index.html".to_string()),
            spa_file: None,
            show_hidden: false,
        }
    }
}
