//! The route view handed to route middlewares and handlers.

use http::{HeaderMap, Method};
use weft_core::{Extra, Key, Query, Request, RequestContext, RequestId};

use crate::params::Params;

/// An owned snapshot of the matched request.
///
/// Route middlewares receive it mutably and may add `extra` entries; those
/// entries are written back to the request context before the handler runs.
#[derive(Debug, Clone)]
pub struct RouteView {
    /// Request method.
    pub method: Method,
    /// Path the route matched against.
    pub path: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Parsed query string.
    pub query: Query,
    /// Captured path parameters.
    pub params: Params,
    /// Data published by earlier stages.
    pub extra: Extra,
    /// Id of the request.
    pub request_id: RequestId,
    request: Request,
}

impl RouteView {
    pub(crate) fn new(ctx: &RequestContext, params: Params) -> Self {
        let request = ctx.request();
        Self {
            method: request.method().clone(),
            path: request.path().to_string(),
            headers: request.headers().clone(),
            query: request.query().clone(),
            params,
            extra: ctx.extra().clone(),
            request_id: ctx.request_id(),
            request: request.clone(),
        }
    }

    /// Returns a captured parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Returns a header value as a string.
    #[must_use]
    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Reads an `extra` entry.
    pub fn get<T: Send + Sync + 'static>(&self, key: &Key<T>) -> Option<&T> {
        self.extra.get(key)
    }

    /// Writes an `extra` entry.
    pub fn set<T: Send + Sync + 'static>(&mut self, key: &Key<T>, value: T) {
        self.extra.set(key, value);
    }

    /// Returns the underlying request, e.g. to stream its body.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }
}
