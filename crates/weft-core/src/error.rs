//! Error types for weft.
//!
//! Everything a stage can fail with is a [`StageError`]. The pipeline's error
//! interception resolves each variant to exactly one response through
//! [`StageError::to_response`]:
//!
//! | Variant | Status | Body |
//! |---|---|---|
//! | `Status(n)` | `n` | empty |
//! | `Http` | its status | its reason, if any |
//! | `Cancelled` | 499 | empty |
//! | `Internal` | 500 | the error's message |

use std::any::Any;
use std::fmt;

use http::StatusCode;
use thiserror::Error;

/// Non-standard status used when the client went away before a response
/// was produced.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Result type alias using [`StageError`].
pub type WeftResult<T> = Result<T, StageError>;

/// A structured HTTP error carrying a status and an optional reason.
///
/// The reason doubles as the response body and the status line's reason
/// phrase when the error is intercepted.
///
/// # Example
///
/// ```
/// use weft_core::HttpError;
///
/// let err = HttpError::with_reason(401, "Unauthorized");
/// assert_eq!(err.status().as_u16(), 401);
/// assert_eq!(err.reason(), Some("Unauthorized"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    status: StatusCode,
    reason: Option<String>,
}

impl HttpError {
    /// Creates an error with the given status and no reason.
    ///
    /// Codes outside `100..=999` are clamped to 500.
    #[must_use]
    pub fn new(code: u16) -> Self {
        Self {
            status: StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            reason: None,
        }
    }

    /// Creates an error with the given status and reason.
    #[must_use]
    pub fn with_reason(code: u16, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::new(code)
        }
    }

    /// 400 with the given reason.
    #[must_use]
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::with_reason(400, reason)
    }

    /// 403 "Resource forbidden".
    #[must_use]
    pub fn forbidden() -> Self {
        Self::with_reason(403, "Resource forbidden")
    }

    /// 404 "Not found".
    #[must_use]
    pub fn not_found() -> Self {
        Self::with_reason(404, "Not found")
    }

    /// 413 "Payload Too Large".
    #[must_use]
    pub fn payload_too_large() -> Self {
        Self::with_reason(413, "Payload Too Large")
    }

    /// Returns the status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the reason, if one was given.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "HTTP {}: {reason}", self.status.as_u16()),
            None => write!(f, "HTTP {}", self.status),
        }
    }
}

impl std::error::Error for HttpError {}

/// Errors raised by writes to a [`Response`](crate::Response).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    /// The response was already committed; the write was ignored.
    #[error("response already committed")]
    AlreadyCommitted,

    /// The status code is not a valid HTTP status.
    #[error("invalid status code: {0}")]
    InvalidStatus(u16),

    /// A header name or value could not be encoded.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

/// A failure raised by a pipeline stage, route middleware or handler.
#[derive(Debug, Error)]
pub enum StageError {
    /// A bare status code; resolves to that status with an empty body.
    #[error("status {0}")]
    Status(u16),

    /// A structured HTTP error.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The request was cancelled before the pipeline finished.
    #[error("request cancelled")]
    Cancelled,

    /// Any other failure; resolves to 500.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl StageError {
    /// Creates an internal error from a message.
    pub fn internal(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self::Internal(anyhow::Error::msg(message))
    }

    /// Wraps a panic payload caught while running a stage.
    #[must_use]
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "stage panicked".to_string());
        Self::internal(message)
    }

    /// Returns true for failures that the server should log as its own fault.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    /// Resolves this failure to the response that error interception writes.
    #[must_use]
    pub fn to_response(&self) -> ErrorResponse {
        match self {
            Self::Status(code) => match StatusCode::from_u16(*code) {
                Ok(status) => ErrorResponse::new(status, None, String::new()),
                Err(_) => {
                    tracing::warn!(code, "stage failed with an invalid status code");
                    ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, None, String::new())
                }
            },
            Self::Http(err) => ErrorResponse::new(
                err.status(),
                err.reason().map(str::to_string),
                err.reason().unwrap_or_default().to_string(),
            ),
            Self::Cancelled => ErrorResponse::new(
                StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                Some("Client Closed Request".to_string()),
                String::new(),
            ),
            Self::Internal(err) => ErrorResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                None,
                err.to_string(),
            ),
        }
    }
}

impl From<u16> for StageError {
    fn from(code: u16) -> Self {
        Self::Status(code)
    }
}

impl From<std::io::Error> for StageError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.into())
    }
}

impl From<ResponseError> for StageError {
    fn from(err: ResponseError) -> Self {
        Self::Internal(err.into())
    }
}

/// The status line and body that a [`StageError`] resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Response status.
    pub status: StatusCode,
    /// Reason phrase; `None` means the canonical phrase.
    pub reason: Option<String>,
    /// Plain-text body.
    pub body: String,
}

impl ErrorResponse {
    fn new(status: StatusCode, reason: Option<String>, body: String) -> Self {
        Self {
            status,
            reason,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_status_resolves_to_empty_body() {
        let resolved = StageError::from(403).to_response();
        assert_eq!(resolved.status, StatusCode::FORBIDDEN);
        assert!(resolved.body.is_empty());
        assert!(resolved.reason.is_none());
    }

    #[test]
    fn test_invalid_bare_status_resolves_to_500() {
        let resolved = StageError::Status(42).to_response();
        assert_eq!(resolved.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_http_error_reason_becomes_body() {
        let resolved = StageError::from(HttpError::with_reason(401, "Unauthorized")).to_response();
        assert_eq!(resolved.status, StatusCode::UNAUTHORIZED);
        assert_eq!(resolved.body, "Unauthorized");
        assert_eq!(resolved.reason.as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn test_http_error_without_reason() {
        let resolved = StageError::from(HttpError::new(418)).to_response();
        assert_eq!(resolved.status.as_u16(), 418);
        assert!(resolved.body.is_empty());
    }

    #[test]
    fn test_internal_error_uses_message_only() {
        let err = anyhow::anyhow!("database offline").context("loading user");
        let resolved = StageError::from(err).to_response();
        assert_eq!(resolved.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resolved.body, "loading user");
    }

    #[test]
    fn test_cancelled_resolves_to_499() {
        let resolved = StageError::Cancelled.to_response();
        assert_eq!(resolved.status.as_u16(), CLIENT_CLOSED_REQUEST);
    }

    #[test]
    fn test_from_panic_payloads() {
        let err = StageError::from_panic(Box::new("boom"));
        assert_eq!(err.to_string(), "boom");

        let err = StageError::from_panic(Box::new(String::from("bang")));
        assert_eq!(err.to_string(), "bang");

        let err = StageError::from_panic(Box::new(7_u8));
        assert_eq!(err.to_string(), "stage panicked");
    }

    #[test]
    fn test_http_error_clamps_invalid_code() {
        assert_eq!(HttpError::new(7).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
