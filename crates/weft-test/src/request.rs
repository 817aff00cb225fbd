//! Request builder bound to a [`TestClient`].

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::Method;
use serde::Serialize;
use weft_core::Request;

use crate::client::TestClient;
use crate::error::TestError;
use crate::response::TestResponse;

/// A request under construction.
///
/// Serialization errors from [`TestRequest::json`] and [`TestRequest::form`]
/// are kept and reported by [`TestRequest::send`].
#[must_use]
pub struct TestRequest<'a> {
    client: &'a TestClient,
    method: Method,
    uri: String,
    headers: Vec<(String, String)>,
    body: Result<Bytes, TestError>,
}

impl<'a> TestRequest<'a> {
    pub(crate) fn new(client: &'a TestClient, method: Method, uri: String) -> Self {
        Self {
            client,
            method,
            uri,
            headers: Vec::new(),
            body: Ok(Bytes::new()),
        }
    }

    /// Appends a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the `content-type` header.
    pub fn content_type(self, content_type: impl Into<String>) -> Self {
        self.header(CONTENT_TYPE.as_str(), content_type)
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Ok(body.into());
        self
    }

    /// Sets a JSON body and `application/json`.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        self.body = serde_json::to_vec(value).map(Bytes::from).map_err(Into::into);
        self.content_type("application/json")
    }

    /// Sets a urlencoded form body and `application/x-www-form-urlencoded`.
    pub fn form<T: Serialize>(mut self, value: &T) -> Self {
        self.body = serde_urlencoded::to_string(value)
            .map(Bytes::from)
            .map_err(Into::into);
        self.content_type("application/x-www-form-urlencoded")
    }

    /// Dispatches the request through the client's pipeline.
    pub async fn send(self) -> Result<TestResponse, TestError> {
        let body = self.body?;
        let mut builder = Request::builder().method(self.method).uri(&self.uri);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        let request = builder.body(body)?;
        self.client.execute(request).await
    }
}

impl std::fmt::Debug for TestRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRequest")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}
