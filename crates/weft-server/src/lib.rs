//! # Weft Server
//!
//! Transport and file-serving pieces for running a weft [`Pipeline`] over
//! HTTP:
//!
//! - HTTP/1.1 via hyper, one task per connection and per request
//! - client disconnects and request timeouts cancel the request's token
//! - graceful shutdown with connection draining
//! - a [`StaticFiles`] stage with index and SPA fallbacks
//!
//! ## Example
//!
//! ```rust,ignore
//! use weft_middleware::{mount, Pipeline};
//! use weft_server::{Server, ServerConfig, StaticFiles};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = Pipeline::builder()
//!         .stage(StaticFiles::new("./public"))
//!         .build();
//!
//!     Server::builder()
//!         .config(ServerConfig::builder().http_addr("0.0.0.0:8080").build())
//!         .pipeline(pipeline)
//!         .build()
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! [`Pipeline`]: weft_middleware::Pipeline

#![doc(html_root_url = "https://docs.rs/weft-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod server;
pub mod shutdown;
pub mod static_files;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use server::{BoundServer, HttpResponse, Server, ServerBuilder, ServerError};
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownReceiver, ShutdownSignal};
pub use static_files::{ResolvedFile, StaticFileError, StaticFiles};
