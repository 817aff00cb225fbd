//! Structured logging for weft.
//!
//! Installs a `tracing-subscriber` registry with an [`EnvFilter`] and either
//! a JSON or a pretty formatting layer.
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! tracing::info!(port = 8080, "listening");
//! ```

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Install a subscriber at all.
    pub enabled: bool,
    /// Filter directive used when `RUST_LOG` is unset, e.g. `"info"`.
    pub level: String,
    /// JSON lines instead of pretty output.
    pub json_format: bool,
    /// Emit span open/close events.
    pub span_events: bool,
    /// Record source file and line.
    pub file_line_info: bool,
    /// Record the event target (module path).
    pub include_target: bool,
    /// Attached to the startup event.
    pub service_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Human-readable output at debug level.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            json_format: false,
            span_events: true,
            file_line_info: true,
            include_target: true,
            service_name: "weft".to_string(),
        }
    }

    /// JSON output at info level.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            span_events: false,
            file_line_info: false,
            include_target: true,
            service_name: "weft".to_string(),
        }
    }
}

/// Installs the global subscriber described by `config`.
///
/// `RUST_LOG` wins over [`LogConfig::level`] when it is set and valid. A
/// disabled config installs nothing.
///
/// # Errors
///
/// [`TelemetryError::InvalidFilter`] for a bad `level`, and
/// [`TelemetryError::AlreadyInitialized`] when a global subscriber exists.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env().or_else(|_| create_env_filter(&config.level))?;
    let layer = format_layer(config).with_filter(filter);

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;

    tracing::debug!(service = %config.service_name, json = config.json_format, "logging initialized");
    Ok(())
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn format_layer(config: &LogConfig) -> BoxedLayer {
    let spans = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let base = tracing_subscriber::fmt::layer()
        .with_span_events(spans)
        .with_file(config.file_line_info)
        .with_line_number(config.file_line_info)
        .with_target(config.include_target);

    if config.json_format {
        base.json().boxed()
    } else {
        base.pretty().boxed()
    }
}

/// Parses a filter directive such as `"info,weft_router=debug"`.
pub fn create_env_filter(directives: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(directives).map_err(|e| TelemetryError::InvalidFilter(e.to_string()))
}

/// Field names shared by the access log and the built-in stages.
pub mod fields {
    /// Per-request UUID.
    pub const REQUEST_ID: &str = "request_id";
    /// Request method.
    pub const HTTP_METHOD: &str = "http.method";
    /// Path as sent by the client.
    pub const HTTP_PATH: &str = "http.path";
    /// Response status code.
    pub const HTTP_STATUS: &str = "http.status_code";
    /// Response reason phrase.
    pub const HTTP_STATUS_MESSAGE: &str = "http.status_message";
    /// Time from context creation to access record, in milliseconds.
    pub const DURATION_MS: &str = "duration_ms";
    /// Name of the stage an event came from.
    pub const STAGE: &str = "stage";
    /// Rendered error.
    pub const ERROR: &str = "error";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_config() {
        let config = LogConfig::development();
        assert!(!config.json_format);
        assert!(config.span_events);
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn test_production_is_default() {
        let config = LogConfig::default();
        assert!(config.json_format);
        assert!(!config.file_line_info);
        assert_eq!(config, LogConfig::production());
    }

    #[test]
    fn test_create_env_filter() {
        assert!(create_env_filter("info,weft_router=debug").is_ok());
        assert!(matches!(
            create_env_filter("weft=notalevel").unwrap_err(),
            TelemetryError::InvalidFilter(_)
        ));
    }

    #[test]
    fn test_disabled_logging() {
        let config = LogConfig {
            enabled: false,
            ..LogConfig::default()
        };
        assert!(init_logging(&config).is_ok());
    }
}
