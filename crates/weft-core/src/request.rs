//! The inbound request view.
//!
//! A [`Request`] has two halves. The head (method, URI, headers, query) is
//! fixed at creation and shared by every clone. The route view
//! ([`Request::path`] and [`Request::base_path`]) belongs to each clone and
//! is what mounting rewrites.
//!
//! The body can be read once. All clones share the same body slot, so a
//! mounted stage can consume a body that the outer pipeline never touched.

use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::{header, HeaderMap, Method, Uri, Version};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use parking_lot::Mutex;

use crate::error::{HttpError, StageError};

/// Boxed error type carried by bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Type-erased body used for both request and streamed response bodies.
pub type BoxBody = UnsyncBoxBody<Bytes, BoxError>;

/// Returns an empty [`BoxBody`].
#[must_use]
pub fn empty_body() -> BoxBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Wraps bytes into a [`BoxBody`].
#[must_use]
pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Parsed query string, kept as ordered pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    /// Parses a raw query string (without the leading `?`).
    ///
    /// Malformed input yields an empty query.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.filter(|raw| !raw.is_empty()) else {
            return Self::default();
        };
        match serde_urlencoded::from_str::<Vec<(String, String)>>(raw) {
            Ok(pairs) => Self { pairs },
            Err(err) => {
                tracing::debug!(error = %err, query = raw, "ignoring malformed query string");
                Self::default()
            }
        }
    }

    /// Returns the first value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns every value for `name`, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Iterates over all pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if there are no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

struct RequestHead {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    query: Query,
}

/// The inbound request as seen by pipeline stages.
#[derive(Clone)]
pub struct Request {
    head: Arc<RequestHead>,
    path: String,
    base_path: String,
    body: Arc<Mutex<Option<BoxBody>>>,
}

impl Request {
    /// Creates a request from an `http::Request` with any compatible body.
    pub fn from_http<B>(request: http::Request<B>) -> Self
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = request.into_parts();
        let body = body.map_err(|err| -> BoxError { err.into() }).boxed_unsync();
        Self::from_parts(parts.method, parts.uri, parts.version, parts.headers, body)
    }

    fn from_parts(
        method: Method,
        uri: Uri,
        version: Version,
        headers: HeaderMap,
        body: BoxBody,
    ) -> Self {
        let path = uri.path().to_string();
        let query = Query::parse(uri.query());
        Self {
            head: Arc::new(RequestHead {
                method,
                uri,
                version,
                headers,
                query,
            }),
            path,
            base_path: String::new(),
            body: Arc::new(Mutex::new(Some(body))),
        }
    }

    /// Starts building a request, mostly useful in tests.
    #[must_use]
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Returns the request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.head.method
    }

    /// Returns the full request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    /// Returns the HTTP version.
    #[must_use]
    pub fn version(&self) -> Version {
        self.head.version
    }

    /// Returns the request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// Returns a header value as a string, if present and valid.
    #[must_use]
    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the `Content-Type` header.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE)
    }

    /// Returns the parsed query string.
    #[must_use]
    pub fn query(&self) -> &Query {
        &self.head.query
    }

    /// Returns the path stages match against.
    ///
    /// At top level this is the URI path; below a mount it is relative to the
    /// mount prefix and always starts with `/`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the prefixes stripped by enclosing mounts, joined.
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Returns the path the client sent.
    #[must_use]
    pub fn original_path(&self) -> &str {
        self.head.uri.path()
    }

    /// Returns a clone whose route view is rebased under `prefix`.
    #[must_use]
    pub fn rebase(&self, prefix: &str, path: String) -> Self {
        let mut base_path = self.base_path.clone();
        base_path.push_str(prefix.trim_end_matches('/'));
        Self {
            head: Arc::clone(&self.head),
            path,
            base_path,
            body: Arc::clone(&self.body),
        }
    }

    /// Takes the body. Only the first call, across all clones, gets it.
    pub fn take_body(&self) -> Option<RequestBody> {
        self.body.lock().take().map(|inner| RequestBody { inner })
    }

    /// Returns true if the body has not been taken yet.
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body.lock().is_some()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.head.method)
            .field("uri", &self.head.uri)
            .field("path", &self.path)
            .field("base_path", &self.base_path)
            .finish_non_exhaustive()
    }
}

/// A request body that has been taken from its [`Request`].
pub struct RequestBody {
    inner: BoxBody,
}

impl RequestBody {
    /// Reads the whole body.
    ///
    /// Fails with 413 once more than `limit` bytes arrive. A transport error
    /// mid-read ends the body early: the bytes received so far are returned.
    pub async fn read_to_end(mut self, limit: Option<usize>) -> Result<Bytes, StageError> {
        let mut buf = BytesMut::new();
        while let Some(frame) = self.inner.frame().await {
            match frame {
                Ok(frame) => {
                    let Ok(data) = frame.into_data() else {
                        continue;
                    };
                    if limit.is_some_and(|limit| buf.len() + data.len() > limit) {
                        return Err(HttpError::payload_too_large().into());
                    }
                    buf.extend_from_slice(&data);
                }
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        received = buf.len(),
                        "request body ended early"
                    );
                    break;
                }
            }
        }
        Ok(buf.freeze())
    }

    /// Returns the underlying body for streaming consumers.
    #[must_use]
    pub fn into_inner(self) -> BoxBody {
        self.inner
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBody").finish_non_exhaustive()
    }
}

/// Builder for [`Request`].
#[derive(Debug, Default)]
#[must_use]
pub struct RequestBuilder {
    inner: http::request::Builder,
}

impl RequestBuilder {
    /// Sets the method.
    pub fn method(mut self, method: Method) -> Self {
        self.inner = self.inner.method(method);
        self
    }

    /// Sets the URI.
    pub fn uri(mut self, uri: impl AsRef<str>) -> Self {
        self.inner = self.inner.uri(uri.as_ref());
        self
    }

    /// Appends a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.inner = self.inner.header(name.as_ref(), value.as_ref());
        self
    }

    /// Finishes the request with the given body.
    pub fn body(self, body: impl Into<Bytes>) -> Result<Request, http::Error> {
        self.inner
            .body(Full::new(body.into()))
            .map(Request::from_http)
    }

    /// Finishes the request with an empty body.
    pub fn build(self) -> Result<Request, http::Error> {
        self.body(Bytes::new())
    }
}
