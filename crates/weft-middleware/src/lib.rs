//! # Weft Middleware
//!
//! The pipeline engine and the stages that ship with weft.
//!
//! A [`Pipeline`] is an ordered table of [`Stage`]s. Stages are registered
//! with a priority; higher priorities run first and equal priorities keep
//! registration order. Every request passes through the stages one by one,
//! then through two terminal steps that always run:
//!
//! ```text
//! Request → Stage(p=100) → Stage(p=50) → ... → Stage(p=0)
//!                                                   ↓
//! AccessLog ← Fallback 404 ← Error interception ←───┘
//! ```
//!
//! ## Key Features
//!
//! - **Priority ordering**: stable, descending, frozen at build time
//! - **Exactly one response**: failures are mapped to a status once, and a
//!   request nobody answered ends as `404 Cannot {METHOD} {path}`
//! - **Mounting**: [`Mount`] scopes a stage (or a whole nested pipeline) to
//!   a path prefix
//! - **Built-in stages**: request ids, request logging and body parsing
//!
//! ## Example
//!
//! ```ignore
//! use weft_middleware::stages::{BodyParser, RequestIdStage, RequestLogger};
//! use weft_middleware::{mount, Pipeline};
//!
//! let pipeline = Pipeline::builder()
//!     .register(RequestIdStage::new(), 100)
//!     .register(RequestLogger::new(), 90)
//!     .register(BodyParser::new(), 50)
//!     .stage(mount("/api", api_router.into_stage())?)
//!     .build();
//! ```

#![doc(html_root_url = "https://docs.rs/weft-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod mount;
pub mod pipeline;
pub mod stage;
pub mod stages;

pub use mount::{mount, Mount, MountError};
pub use pipeline::{BoxedStage, Pipeline, PipelineBuilder};
pub use stage::{stage_fn, BoxFuture, Flow, FnStage, Stage, StageResult};
