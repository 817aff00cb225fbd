//! # weft
//!
//! A staged HTTP middleware toolkit. Requests flow through a prioritised
//! [`Pipeline`](middleware::Pipeline) of stages; each stage may respond,
//! enrich the request context for later stages, or fail into a single
//! error-interception point.
//!
//! This crate re-exports the workspace crates and ships the `weft-serve`
//! static-file server binary.
//!
//! ```rust,ignore
//! use weft::prelude::*;
//!
//! let mut router = Router::new();
//! router.get("/greet/:name", |view: RouteView| async move {
//!     Ok(format!("Hello {}", &view.params[0]))
//! })?;
//!
//! let pipeline = Pipeline::builder()
//!     .register(RequestIdStage::new(), 100)
//!     .register(BodyParser::new(), 50)
//!     .stage(router.into_stage())
//!     .build();
//!
//! Server::builder().pipeline(pipeline).build().run().await?;
//! ```

#![doc(html_root_url = "https://docs.rs/weft/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cli;

// Re-export core types
pub use weft_core as core;

// Re-export pipeline engine and built-in stages
pub use weft_middleware as middleware;

// Re-export router types
pub use weft_router as router;

// Re-export transport and static files
pub use weft_server as server;

// Re-export logging
pub use weft_telemetry as telemetry;

// Re-export configuration
pub use weft_config as config;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use weft::prelude::*;
/// ```
pub mod prelude {
    pub use weft_core::{
        HttpError, Key, Request, RequestContext, RequestId, Response, StageError,
    };

    pub use weft_middleware::stages::{BodyParser, ParsedBody, RequestIdStage, RequestLogger, BODY};
    pub use weft_middleware::{mount, stage_fn, Flow, Mount, Pipeline, Stage, StageResult};

    pub use weft_router::{Reply, RouteResponse, RouteView, Router, RouterOptions};

    pub use weft_server::{Server, ServerConfig, ShutdownSignal, StaticFiles};

    pub use weft_config::{ConfigLoader, WeftConfig};
    pub use weft_telemetry::{init_logging, LogConfig};
}
