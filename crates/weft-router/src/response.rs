//! What route handlers return and how it is written.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use serde::Serialize;
use weft_core::{BoxBody, Response, ResponseError, StageError};

const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// The outcome of a route handler.
///
/// # Example
///
/// ```rust
/// use weft_router::{Reply, RouteResponse};
///
/// let plain: RouteResponse = "Hello".into();
/// let structured: RouteResponse = Reply::text("Created").status(201).into();
/// let pass: RouteResponse = None::<String>.into();
///
/// assert!(matches!(plain, RouteResponse::Text(_)));
/// assert!(matches!(structured, RouteResponse::Structured(_)));
/// assert!(matches!(pass, RouteResponse::Pass));
/// ```
pub enum RouteResponse {
    /// `200` with a plain-text body.
    Text(String),
    /// `200` with a streamed body.
    Stream(BoxBody),
    /// Full control over status, reason, headers and content type.
    Structured(Reply),
    /// Write nothing; later stages still see the request.
    Pass,
}

impl RouteResponse {
    /// Writes this outcome onto `response`. Returns false for [`RouteResponse::Pass`].
    pub fn write_to(self, response: &Response) -> Result<bool, StageError> {
        match self {
            Self::Text(text) => {
                if !response.has_header(CONTENT_TYPE) {
                    response.content_type(TEXT_PLAIN_UTF8)?;
                }
                response.status(200, None)?;
                response.send(text)?;
            }
            Self::Stream(body) => {
                response.status(200, None)?;
                response.stream(body)?;
            }
            Self::Structured(reply) => reply.write_to(response)?,
            Self::Pass => return Ok(false),
        }
        Ok(true)
    }
}

impl std::fmt::Debug for RouteResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Stream(_) => f.write_str("Stream"),
            Self::Structured(reply) => f.debug_tuple("Structured").field(reply).finish(),
            Self::Pass => f.write_str("Pass"),
        }
    }
}

impl From<&str> for RouteResponse {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for RouteResponse {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<BoxBody> for RouteResponse {
    fn from(body: BoxBody) -> Self {
        Self::Stream(body)
    }
}

impl From<Reply> for RouteResponse {
    fn from(reply: Reply) -> Self {
        Self::Structured(reply)
    }
}

impl From<()> for RouteResponse {
    fn from((): ()) -> Self {
        Self::Pass
    }
}

impl<T: Into<RouteResponse>> From<Option<T>> for RouteResponse {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Pass, Into::into)
    }
}

/// Body of a [`Reply`].
pub enum Content {
    /// Text.
    Text(String),
    /// Raw bytes.
    Bytes(Bytes),
    /// A streamed body.
    Stream(BoxBody),
    /// No body.
    Empty,
}

impl std::fmt::Debug for Content {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
            Self::Empty => f.write_str("Empty"),
        }
    }
}

/// A structured handler response.
///
/// Status defaults to 200 and the reason to the status's canonical phrase.
/// The content type is `mime` when given; otherwise `text/plain`, unless a
/// content type was already set by a header here or by an earlier stage.
#[derive(Debug)]
pub struct Reply {
    status: u16,
    reason: Option<String>,
    headers: Vec<(String, String)>,
    mime: Option<String>,
    content: Content,
}

impl Reply {
    /// Creates a reply with the given content.
    #[must_use]
    pub fn new(content: Content) -> Self {
        Self {
            status: 200,
            reason: None,
            headers: Vec::new(),
            mime: None,
            content,
        }
    }

    /// A text reply.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Content::Text(text.into()))
    }

    /// A binary reply.
    #[must_use]
    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        Self::new(Content::Bytes(bytes.into()))
    }

    /// A streamed reply.
    #[must_use]
    pub fn stream(body: BoxBody) -> Self {
        Self::new(Content::Stream(body))
    }

    /// A reply without a body.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Content::Empty)
    }

    /// A JSON reply with `application/json`.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, StageError> {
        let body = serde_json::to_vec(value).map_err(|err| StageError::Internal(err.into()))?;
        Ok(Self::bytes(body).mime("application/json"))
    }

    /// Sets the status code.
    pub fn status(mut self, code: u16) -> Self {
        self.status = code;
        self
    }

    /// Sets a custom reason phrase.
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Adds a response header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the content type.
    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Returns the status code.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.status
    }

    /// Writes the reply onto `response`.
    ///
    /// Status and headers are checked before anything is written, so a
    /// rejected reply leaves `response` untouched.
    pub fn write_to(self, response: &Response) -> Result<(), StageError> {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| encode_header(name, value))
            .collect::<Result<Vec<_>, _>>()?;
        let mime = self
            .mime
            .map(|mime| encode_header(CONTENT_TYPE.as_str(), &mime))
            .transpose()?;
        response.status(self.status, self.reason.as_deref())?;
        for (name, value) in headers {
            response.append_header(name, value)?;
        }
        match mime {
            Some((name, value)) => response.set_header(name, value)?,
            None if !response.has_header(CONTENT_TYPE) => response.content_type("text/plain")?,
            None => {}
        }
        match self.content {
            Content::Text(text) => response.send(text)?,
            Content::Bytes(bytes) => response.send(bytes)?,
            Content::Stream(body) => response.stream(body)?,
            Content::Empty => response.end()?,
        }
        Ok(())
    }
}

fn encode_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), ResponseError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| ResponseError::InvalidHeader(e.to_string()))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| ResponseError::InvalidHeader(format!("{name}: {e}")))?;
    Ok((name, value))
}
