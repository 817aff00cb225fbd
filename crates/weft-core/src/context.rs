//! Request context types.
//!
//! The [`RequestContext`] is the value that flows through the pipeline: the
//! request view, the response handle and the typed `extra` map, plus the
//! bookkeeping the engine needs (request id, start time, cancellation).

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::extra::{Extra, Key};
use crate::request::Request;
use crate::response::Response;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps log lines for consecutive requests
/// sorted.
///
/// # Example
///
/// ```
/// use weft_core::RequestId;
///
/// let id = RequestId::new();
/// println!("Request ID: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parses a request ID from its textual form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value).ok().map(Self)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Per-request context that flows through the pipeline.
///
/// One context is created per inbound request. Mounting derives a second
/// context with [`RequestContext::derive_with_path`]; the derived context
/// shares the response handle, body, request id and cancellation token, and
/// gets its own route view and a copy of `extra`.
///
/// # Example
///
/// ```
/// use weft_core::{Key, Request, RequestContext, Response};
///
/// const USER: Key<String> = Key::new("user");
///
/// let request = Request::builder().uri("/profile").build().unwrap();
/// let mut ctx = RequestContext::new(request, Response::detached());
/// ctx.set(&USER, "alice".to_string());
///
/// assert_eq!(ctx.get(&USER).map(String::as_str), Some("alice"));
/// assert_eq!(ctx.request().path(), "/profile");
/// ```
#[derive(Clone)]
pub struct RequestContext {
    request: Request,
    response: Response,
    extra: Extra,
    request_id: RequestId,
    started_at: Instant,
    cancellation: CancellationToken,
}

impl RequestContext {
    /// Creates a context with an empty `extra` map and a fresh request id.
    #[must_use]
    pub fn new(request: Request, response: Response) -> Self {
        Self::with_cancellation(request, response, CancellationToken::new())
    }

    /// Creates a context bound to an existing cancellation token.
    #[must_use]
    pub fn with_cancellation(
        request: Request,
        response: Response,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            request,
            response,
            extra: Extra::new(),
            request_id: RequestId::new(),
            started_at: Instant::now(),
            cancellation,
        }
    }

    /// Returns the request view.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Returns the response handle.
    #[must_use]
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Returns the `extra` map.
    #[must_use]
    pub fn extra(&self) -> &Extra {
        &self.extra
    }

    /// Returns the `extra` map mutably.
    pub fn extra_mut(&mut self) -> &mut Extra {
        &mut self.extra
    }

    /// Replaces the `extra` map.
    pub fn set_extra(&mut self, extra: Extra) {
        self.extra = extra;
    }

    /// Reads an `extra` entry.
    pub fn get<T: Send + Sync + 'static>(&self, key: &Key<T>) -> Option<&T> {
        self.extra.get(key)
    }

    /// Writes an `extra` entry.
    pub fn set<T: Send + Sync + 'static>(&mut self, key: &Key<T>, value: T) {
        self.extra.set(key, value);
    }

    /// Returns true if an `extra` entry exists for `key`.
    pub fn contains<T>(&self, key: &Key<T>) -> bool {
        self.extra.contains(key)
    }

    /// Returns the request id.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Overrides the request id, e.g. with one supplied by the client.
    pub fn set_request_id(&mut self, id: RequestId) {
        self.request_id = id;
    }

    /// Returns when the context was created.
    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the time elapsed since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Returns the cancellation token for this request.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns true if the request was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Derives a context whose route view is `path` below `prefix`.
    #[must_use]
    pub fn derive_with_path(&self, prefix: &str, path: String) -> Self {
        Self {
            request: self.request.rebase(prefix, path),
            ..self.clone()
        }
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("request", &self.request)
            .field("response", &self.response)
            .field("extra", &self.extra)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: Key<&'static str> = Key::new("user");

    fn context(uri: &str) -> RequestContext {
        let request = Request::builder().uri(uri).build().unwrap();
        RequestContext::new(request, Response::detached())
    }

    #[test]
    fn test_request_id_is_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn test_request_id_parse() {
        let id = RequestId::new();
        assert_eq!(RequestId::parse(&id.to_string()), Some(id));
        assert_eq!(RequestId::parse("not-a-uuid"), None);
    }

    #[test]
    fn test_extra_accessors() {
        let mut ctx = context("/");
        assert!(!ctx.contains(&USER));
        ctx.set(&USER, "alice");
        assert_eq!(ctx.get(&USER), Some(&"alice"));
    }

    #[test]
    fn test_derive_shares_response_not_route() {
        let mut ctx = context("/api/items");
        ctx.set(&USER, "carol");

        let derived = ctx.derive_with_path("/api", "/items".to_string());
        assert_eq!(derived.request().path(), "/items");
        assert_eq!(ctx.request().path(), "/api/items");
        assert_eq!(derived.request_id(), ctx.request_id());
        assert_eq!(derived.get(&USER), Some(&"carol"));

        derived.response().end().unwrap();
        assert!(ctx.response().is_done());
    }

    #[test]
    fn test_cancellation_is_shared() {
        let ctx = context("/");
        let derived = ctx.derive_with_path("/", "/".to_string());
        ctx.cancellation().cancel();
        assert!(derived.is_cancelled());
    }
}
