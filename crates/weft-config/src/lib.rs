//! Typed configuration for weft servers.
//!
//! Configuration is layered, later layers winning:
//!
//! 1. built-in defaults
//! 2. TOML or JSON files and strings, merged key by key
//! 3. `PREFIX__SECTION__KEY` environment variables
//!
//! Unknown keys are errors; values are validated once every layer applied.
//!
//! # Example
//!
//! ```no_run
//! use weft_config::ConfigLoader;
//!
//! # fn main() -> Result<(), weft_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("weft.toml")?
//!     .with_env_prefix("WEFT")
//!     .load()?;
//!
//! println!("listening on {}", config.server.http_addr);
//! # Ok(())
//! # }
//! ```
//!
//! # File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! shutdown_timeout_secs = 30
//! request_timeout_ms = 10000
//! keep_alive = true
//! body_limit_bytes = 1048576
//!
//! [logging]
//! level = "info"
//! json_format = true
//!
//! [static_files]
//! root = "./public"
//! spa_file = "index.html"
//! ```
//!
//! # Environment Variables
//!
//! - `WEFT__SERVER__HTTP_ADDR=0.0.0.0:9000`
//! - `WEFT__SERVER__REQUEST_TIMEOUT_MS=none`
//! - `WEFT__LOGGING__LEVEL=debug`
//! - `WEFT__STATIC_FILES__SHOW_HIDDEN=false`

#![doc(html_root_url = "https://docs.rs/weft-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::WeftConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{LoggingSettings, ServerSettings, StaticSettings};
