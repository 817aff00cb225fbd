//! Test error types.

use thiserror::Error;

/// Errors that can occur while driving a request in memory.
#[derive(Error, Debug)]
pub enum TestError {
    /// The request could not be built (bad URI or header).
    #[error("request build error: {0}")]
    RequestBuild(#[from] http::Error),

    /// The response body could not be collected.
    #[error("body read error: {0}")]
    BodyRead(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Form serialization failed.
    #[error("form error: {0}")]
    Form(#[from] serde_urlencoded::ser::Error),

    /// The body is not valid UTF-8.
    #[error("body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// The pipeline finished without committing a response.
    #[error("pipeline finished without a committed response")]
    NotCommitted,
}
