//! # Weft Core
//!
//! Core types shared by every weft crate:
//!
//! - [`RequestContext`] - the per-request value that flows through the pipeline
//! - [`Request`] - the inbound request view with a read-once body
//! - [`Response`] - the shared response handle that commits exactly once
//! - [`Extra`] / [`Key`] - typed side-channel storage between stages
//! - [`StageError`] / [`HttpError`] - failures and how they map to responses
//! - [`AccessLog`] - the contract for reporting finished requests

#![doc(html_root_url = "https://docs.rs/weft-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod access;
mod context;
mod error;
mod extra;
mod request;
mod response;

pub use access::{AccessLog, AccessRecord, MemoryAccessLog, NoopAccessLog};
pub use context::{RequestContext, RequestId};
pub use error::{
    ErrorResponse, HttpError, ResponseError, StageError, WeftResult, CLIENT_CLOSED_REQUEST,
};
pub use extra::{Extra, Key};
pub use request::{
    empty_body, full_body, BoxBody, BoxError, Query, Request, RequestBody, RequestBuilder,
};
pub use response::{Committed, Response, ResponseBody, ResponseReceiver};

pub use tokio_util::sync::CancellationToken;
