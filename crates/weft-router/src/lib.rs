//! # Weft Router
//!
//! A method + path-pattern router that runs as a pipeline stage.
//!
//! # Features
//!
//! - **`path-to-regexp` patterns**: `:name`, `:name?`, `:name(\d+)`,
//!   unnamed `(groups)` and `*` wildcards, compiled once at registration
//! - **First match wins**: at most one handler runs per request
//! - **Route middlewares**: synchronous checks that run before the handler
//!   and can publish `extra` entries or abort with an error
//! - **Typed outcomes**: handlers return text, a stream, a structured
//!   [`Reply`] or nothing ([`RouteResponse::Pass`])
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_router::{Reply, Router};
//!
//! let mut router = Router::new();
//! router.get("/greet/:name", |view| async move {
//!     Ok(format!("Hello {}", &view.params[0]))
//! })?;
//! router.post("/items", |_view| async {
//!     Ok(Reply::text("Created").status(201))
//! })?;
//!
//! let pipeline = Pipeline::builder().stage(router.into_stage()).build();
//! ```
//!
//! # Parameters
//!
//! Captures are reported in pattern order with the whole match dropped.
//! Unnamed groups are named by their position among unnamed groups (`"0"`,
//! `"1"`, ...). An optional group that did not participate in the match is
//! reported as an empty string. Capturing groups nested inside a parameter
//! are rejected at registration with [`RouteError::NestedCapture`].

#![doc(html_root_url = "https://docs.rs/weft-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod params;
mod pattern;
mod response;
mod router;
mod view;

pub use error::RouteError;
pub use params::Params;
pub use pattern::{PathPattern, RouterOptions};
pub use response::{Content, Reply, RouteResponse};
pub use router::{ErasedHandler, Route, RouteMiddleware, Router, RouterStage};
pub use view::RouteView;
