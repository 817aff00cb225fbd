//! # Weft Telemetry
//!
//! Logging setup for weft services:
//!
//! - [`init_logging`] installs a `tracing-subscriber` registry (JSON or pretty)
//! - [`TracingAccessLog`] reports every finished request as a structured event
//! - [`fields`] holds the shared field names

#![doc(html_root_url = "https://docs.rs/weft-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod access;
mod error;
pub mod logging;

pub use access::TracingAccessLog;
pub use error::TelemetryError;
pub use logging::{create_env_filter, fields, init_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
