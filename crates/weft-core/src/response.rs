//! The outbound response handle.
//!
//! A [`Response`] is a shared handle: every clone writes to the same
//! destination. Status and headers can be changed freely until the response
//! is committed by [`Response::send`], [`Response::stream`] or
//! [`Response::end`]. Commit happens once, under the handle's lock, and
//! flips [`Response::is_done`] from false to true. Every write after that is
//! rejected with [`ResponseError::AlreadyCommitted`] and logged.
//!
//! The committed status, headers and body travel to the transport through a
//! [`ResponseReceiver`] obtained from [`Response::channel`].

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{self, AsHeaderName, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::ResponseError;
use crate::request::{BoxBody, BoxError};

/// Body of a committed response.
pub enum ResponseBody {
    /// No body.
    Empty,
    /// A body held in memory.
    Full(Bytes),
    /// A streamed body.
    Stream(BoxBody),
}

impl ResponseBody {
    /// Collects the body into memory.
    pub async fn collect(self) -> Result<Bytes, BoxError> {
        match self {
            Self::Empty => Ok(Bytes::new()),
            Self::Full(bytes) => Ok(bytes),
            Self::Stream(body) => Ok(body.collect().await?.to_bytes()),
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// A response as it was committed.
#[derive(Debug)]
pub struct Committed {
    /// Status code.
    pub status: StatusCode,
    /// Reason phrase, when it differs from the canonical one.
    pub reason: Option<String>,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: ResponseBody,
}

impl Committed {
    /// Returns the reason phrase that goes on the status line.
    #[must_use]
    pub fn reason_phrase(&self) -> &str {
        self.reason
            .as_deref()
            .or_else(|| self.status.canonical_reason())
            .unwrap_or("")
    }
}

/// Headers that describe a body and go stale when the body is replaced.
const BODY_HEADERS: [HeaderName; 8] = [
    header::CONTENT_LENGTH,
    header::CONTENT_TYPE,
    header::CONTENT_ENCODING,
    header::CONTENT_RANGE,
    header::CONTENT_DISPOSITION,
    header::TRANSFER_ENCODING,
    header::ETAG,
    header::LAST_MODIFIED,
];

struct State {
    status: StatusCode,
    reason: Option<String>,
    headers: HeaderMap,
    done: bool,
    sink: Option<oneshot::Sender<Committed>>,
    parked: Option<Committed>,
}

/// Shared handle to the outbound response.
#[derive(Clone)]
pub struct Response {
    inner: Arc<Mutex<State>>,
}

impl Response {
    /// Creates a handle together with the receiver its commit is sent to.
    #[must_use]
    pub fn channel() -> (Self, ResponseReceiver) {
        let (tx, rx) = oneshot::channel();
        (Self::with_sink(Some(tx)), ResponseReceiver { inner: rx })
    }

    /// Creates a handle with no receiver.
    ///
    /// The committed response is parked in the handle and can be retrieved
    /// with [`Response::take_committed`].
    #[must_use]
    pub fn detached() -> Self {
        Self::with_sink(None)
    }

    fn with_sink(sink: Option<oneshot::Sender<Committed>>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(State {
                status: StatusCode::OK,
                reason: None,
                headers: HeaderMap::new(),
                done: false,
                sink,
                parked: None,
            })),
        }
    }

    /// Returns true once the response has been committed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.inner.lock().done
    }

    /// Returns the current (or committed) status.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.inner.lock().status
    }

    /// Returns the reason phrase that is (or will be) sent.
    #[must_use]
    pub fn status_message(&self) -> String {
        let state = self.inner.lock();
        state
            .reason
            .clone()
            .or_else(|| state.status.canonical_reason().map(str::to_string))
            .unwrap_or_default()
    }

    /// Returns a header value.
    #[must_use]
    pub fn header(&self, name: impl AsHeaderName) -> Option<HeaderValue> {
        self.inner.lock().headers.get(name).cloned()
    }

    /// Returns true if the header is set.
    #[must_use]
    pub fn has_header(&self, name: impl AsHeaderName) -> bool {
        self.inner.lock().headers.contains_key(name)
    }

    /// Sets a header, replacing previous values.
    pub fn set_header<N, V>(&self, name: N, value: V) -> Result<(), ResponseError>
    where
        N: TryInto<HeaderName>,
        N::Error: fmt::Display,
        V: TryInto<HeaderValue>,
        V::Error: fmt::Display,
    {
        let (name, value) = encode_header(name, value)?;
        let mut state = self.inner.lock();
        ensure_open(&state, "set_header")?;
        state.headers.insert(name, value);
        Ok(())
    }

    /// Appends a header value, keeping previous values.
    pub fn append_header<N, V>(&self, name: N, value: V) -> Result<(), ResponseError>
    where
        N: TryInto<HeaderName>,
        N::Error: fmt::Display,
        V: TryInto<HeaderValue>,
        V::Error: fmt::Display,
    {
        let (name, value) = encode_header(name, value)?;
        let mut state = self.inner.lock();
        ensure_open(&state, "append_header")?;
        state.headers.append(name, value);
        Ok(())
    }

    /// Removes a header, returning its first value.
    pub fn remove_header(
        &self,
        name: impl AsHeaderName,
    ) -> Result<Option<HeaderValue>, ResponseError> {
        let mut state = self.inner.lock();
        ensure_open(&state, "remove_header")?;
        Ok(state.headers.remove(name))
    }

    /// Removes every header set so far.
    pub fn reset_headers(&self) -> Result<(), ResponseError> {
        let mut state = self.inner.lock();
        ensure_open(&state, "reset_headers")?;
        state.headers.clear();
        Ok(())
    }

    /// Drops the headers that describe a body, such as `Content-Length`,
    /// keeping the others.
    pub fn discard_body_headers(&self) -> Result<(), ResponseError> {
        let mut state = self.inner.lock();
        ensure_open(&state, "discard_body_headers")?;
        strip_body_headers(&mut state.headers);
        Ok(())
    }

    /// Sets the `Content-Type` header.
    pub fn content_type(&self, mime: &str) -> Result<(), ResponseError> {
        self.set_header(header::CONTENT_TYPE, mime)
    }

    /// Sets the status and, optionally, a custom reason phrase.
    pub fn status(&self, code: u16, reason: Option<&str>) -> Result<(), ResponseError> {
        let status = StatusCode::from_u16(code).map_err(|_| ResponseError::InvalidStatus(code))?;
        let mut state = self.inner.lock();
        ensure_open(&state, "status")?;
        state.status = status;
        state.reason = reason
            .filter(|reason| Some(*reason) != status.canonical_reason())
            .map(str::to_string);
        Ok(())
    }

    /// Commits the response with an in-memory body.
    pub fn send(&self, body: impl Into<Bytes>) -> Result<(), ResponseError> {
        self.commit(ResponseBody::Full(body.into()), "send")
    }

    /// Commits the response with a streamed body.
    pub fn stream(&self, body: BoxBody) -> Result<(), ResponseError> {
        self.commit(ResponseBody::Stream(body), "stream")
    }

    /// Commits the response with no body.
    pub fn end(&self) -> Result<(), ResponseError> {
        self.commit(ResponseBody::Empty, "end")
    }

    /// Commits an empty response with `status` in place of whatever was
    /// being prepared. Body headers are dropped as by
    /// [`Response::discard_body_headers`].
    pub fn abort(&self, status: StatusCode) -> Result<(), ResponseError> {
        let mut state = self.inner.lock();
        ensure_open(&state, "abort")?;
        strip_body_headers(&mut state.headers);
        state.status = status;
        state.reason = None;
        commit_locked(&mut state, ResponseBody::Empty);
        Ok(())
    }

    /// Takes the committed response from a [`Response::detached`] handle.
    pub fn take_committed(&self) -> Option<Committed> {
        self.inner.lock().parked.take()
    }

    fn commit(&self, body: ResponseBody, operation: &'static str) -> Result<(), ResponseError> {
        let mut state = self.inner.lock();
        ensure_open(&state, operation)?;
        commit_locked(&mut state, body);
        Ok(())
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("Response")
            .field("status", &state.status)
            .field("done", &state.done)
            .finish_non_exhaustive()
    }
}

fn strip_body_headers(headers: &mut HeaderMap) {
    for name in BODY_HEADERS {
        headers.remove(name);
    }
}

fn commit_locked(state: &mut State, body: ResponseBody) {
    state.done = true;
    let committed = Committed {
        status: state.status,
        reason: state.reason.clone(),
        headers: state.headers.clone(),
        body,
    };
    match state.sink.take() {
        Some(sink) => {
            if sink.send(committed).is_err() {
                tracing::debug!("response receiver dropped before commit");
            }
        }
        None => state.parked = Some(committed),
    }
}

fn ensure_open(state: &State, operation: &'static str) -> Result<(), ResponseError> {
    if state.done {
        tracing::warn!(operation, "write after the response was committed ignored");
        return Err(ResponseError::AlreadyCommitted);
    }
    Ok(())
}

fn encode_header<N, V>(name: N, value: V) -> Result<(HeaderName, HeaderValue), ResponseError>
where
    N: TryInto<HeaderName>,
    N::Error: fmt::Display,
    V: TryInto<HeaderValue>,
    V::Error: fmt::Display,
{
    let name = name
        .try_into()
        .map_err(|e| ResponseError::InvalidHeader(e.to_string()))?;
    let value = value
        .try_into()
        .map_err(|e| ResponseError::InvalidHeader(format!("{name}: {e}")))?;
    Ok((name, value))
}

/// Receives the committed response of a [`Response::channel`] handle.
#[derive(Debug)]
pub struct ResponseReceiver {
    inner: oneshot::Receiver<Committed>,
}

impl ResponseReceiver {
    /// Waits for the commit.
    ///
    /// Returns `None` if every handle was dropped without committing.
    pub async fn recv(self) -> Option<Committed> {
        self.inner.await.ok()
    }

    /// Returns the commit if it already happened.
    pub fn try_recv(&mut self) -> Option<Committed> {
        self.inner.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::full_body;

    #[test]
    fn test_defaults() {
        let response = Response::detached();
        assert!(!response.is_done());
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.status_message(), "OK");
    }

    #[test]
    fn test_send_commits_once() {
        let response = Response::detached();
        response.status(201, None).unwrap();
        response.set_header("x-id", "7").unwrap();
        response.send("created").unwrap();

        assert!(response.is_done());
        assert_eq!(response.send("again"), Err(ResponseError::AlreadyCommitted));
        assert_eq!(response.end(), Err(ResponseError::AlreadyCommitted));
        assert_eq!(
            response.set_header("x-late", "1"),
            Err(ResponseError::AlreadyCommitted)
        );
        assert_eq!(response.status(500, None), Err(ResponseError::AlreadyCommitted));

        let committed = response.take_committed().unwrap();
        assert_eq!(committed.status, StatusCode::CREATED);
        assert_eq!(committed.headers.get("x-id").unwrap(), "7");
        assert!(committed.headers.get("x-late").is_none());
        assert!(matches!(committed.body, ResponseBody::Full(ref b) if b == "created"));
        assert_eq!(response.status_code(), StatusCode::CREATED);
    }

    #[test]
    fn test_custom_reason() {
        let response = Response::detached();
        response.status(401, Some("Unauthorized")).unwrap();
        assert!(response.inner.lock().reason.is_none());

        response.status(401, Some("Token expired")).unwrap();
        assert_eq!(response.status_message(), "Token expired");
        response.end().unwrap();

        let committed = response.take_committed().unwrap();
        assert_eq!(committed.reason_phrase(), "Token expired");
    }

    #[test]
    fn test_invalid_status_and_header() {
        let response = Response::detached();
        assert_eq!(response.status(42, None), Err(ResponseError::InvalidStatus(42)));
        assert!(matches!(
            response.set_header("bad header", "x"),
            Err(ResponseError::InvalidHeader(_))
        ));
        assert!(!response.is_done());
    }

    #[test]
    fn test_remove_and_reset_headers() {
        let response = Response::detached();
        response.set_header("content-length", "1000").unwrap();
        response.content_type("text/html").unwrap();
        assert_eq!(
            response.remove_header(header::CONTENT_LENGTH).unwrap().unwrap(),
            "1000"
        );
        assert_eq!(response.remove_header(header::CONTENT_LENGTH).unwrap(), None);

        response.set_header("x-request-id", "abc").unwrap();
        response.reset_headers().unwrap();
        assert!(!response.has_header("x-request-id"));
        assert!(!response.has_header(header::CONTENT_TYPE));

        response.end().unwrap();
        assert_eq!(response.reset_headers(), Err(ResponseError::AlreadyCommitted));
    }

    #[test]
    fn test_discard_body_headers_keeps_others() {
        let response = Response::detached();
        response.set_header("content-length", "1000").unwrap();
        response.set_header("etag", "\"v1\"").unwrap();
        response.set_header("x-request-id", "abc").unwrap();
        response.discard_body_headers().unwrap();

        assert!(!response.has_header(header::CONTENT_LENGTH));
        assert!(!response.has_header(header::ETAG));
        assert!(response.has_header("x-request-id"));
    }

    #[tokio::test]
    async fn test_abort_replaces_prepared_response() {
        let (response, receiver) = Response::channel();
        response.status(200, Some("Fine")).unwrap();
        response.set_header("content-length", "1000").unwrap();
        response.set_header("x-request-id", "abc").unwrap();
        response.abort(StatusCode::GATEWAY_TIMEOUT).unwrap();

        assert!(response.is_done());
        assert_eq!(response.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(response.send("late"), Err(ResponseError::AlreadyCommitted));
        assert_eq!(
            response.abort(StatusCode::GATEWAY_TIMEOUT),
            Err(ResponseError::AlreadyCommitted)
        );

        let committed = receiver.recv().await.unwrap();
        assert_eq!(committed.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(committed.reason_phrase(), "Gateway Timeout");
        assert!(committed.headers.get(header::CONTENT_LENGTH).is_none());
        assert_eq!(committed.headers.get("x-request-id").unwrap(), "abc");
        assert!(matches!(committed.body, ResponseBody::Empty));
    }

    #[test]
    fn test_clones_share_state() {
        let response = Response::detached();
        let other = response.clone();
        other.content_type("text/html").unwrap();
        other.end().unwrap();

        assert!(response.is_done());
        assert!(response.has_header(header::CONTENT_TYPE));
        assert_eq!(response.header("content-type").unwrap(), "text/html");
    }

    #[test]
    fn test_append_header() {
        let response = Response::detached();
        response.append_header("set-cookie", "a=1").unwrap();
        response.append_header("set-cookie", "b=2").unwrap();
        response.end().unwrap();

        let committed = response.take_committed().unwrap();
        assert_eq!(committed.headers.get_all("set-cookie").iter().count(), 2);
    }

    #[tokio::test]
    async fn test_channel_delivers_commit() {
        let (response, receiver) = Response::channel();
        response.stream(full_body("streamed")).unwrap();

        let committed = receiver.recv().await.unwrap();
        assert_eq!(committed.body.collect().await.unwrap(), Bytes::from("streamed"));
        assert!(response.take_committed().is_none());
    }

    #[tokio::test]
    async fn test_channel_closed_without_commit() {
        let (response, receiver) = Response::channel();
        drop(response);
        assert!(receiver.recv().await.is_none());
    }
}
