//! Test client for in-memory requests.

use http::Method;
use weft_core::{Request, RequestContext, Response};
use weft_middleware::Pipeline;

use crate::error::TestError;
use crate::request::TestRequest;
use crate::response::TestResponse;

/// Drives a [`Pipeline`] without binding a socket.
///
/// Each request goes through [`Pipeline::dispatch`], so error interception,
/// the 404 fallback and the access log behave exactly as they do behind the
/// server.
///
/// # Example
///
/// ```
/// use weft_core::RequestContext;
/// use weft_middleware::{Flow, Pipeline};
/// use weft_test::TestClient;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), weft_test::TestError> {
/// let pipeline = Pipeline::builder()
///     .register_fn("hello", 0, |ctx: RequestContext| async move {
///         ctx.response().send("hello")?;
///         Ok(Flow::Continue(ctx))
///     })
///     .build();
///
/// let client = TestClient::new(pipeline);
/// let response = client.get("/").send().await?;
/// response.assert_status_code(200).assert_body_eq("hello");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct TestClient {
    pipeline: Pipeline,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Creates a client for `pipeline`.
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            default_headers: Vec::new(),
        }
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Starts a GET request.
    pub fn get(&self, uri: impl Into<String>) -> TestRequest<'_> {
        self.request(Method::GET, uri)
    }

    /// Starts a POST request.
    pub fn post(&self, uri: impl Into<String>) -> TestRequest<'_> {
        self.request(Method::POST, uri)
    }

    /// Starts a PUT request.
    pub fn put(&self, uri: impl Into<String>) -> TestRequest<'_> {
        self.request(Method::PUT, uri)
    }

    /// Starts a PATCH request.
    pub fn patch(&self, uri: impl Into<String>) -> TestRequest<'_> {
        self.request(Method::PATCH, uri)
    }

    /// Starts a DELETE request.
    pub fn delete(&self, uri: impl Into<String>) -> TestRequest<'_> {
        self.request(Method::DELETE, uri)
    }

    /// Starts a HEAD request.
    pub fn head(&self, uri: impl Into<String>) -> TestRequest<'_> {
        self.request(Method::HEAD, uri)
    }

    /// Starts a request with any method.
    pub fn request(&self, method: Method, uri: impl Into<String>) -> TestRequest<'_> {
        let mut request = TestRequest::new(self, method, uri.into());
        for (name, value) in &self.default_headers {
            request = request.header(name, value);
        }
        request
    }

    pub(crate) async fn execute(&self, request: Request) -> Result<TestResponse, TestError> {
        let response = Response::detached();
        let ctx = RequestContext::new(request, response.clone());
        self.pipeline.dispatch(ctx).await;
        let committed = response.take_committed().ok_or(TestError::NotCommitted)?;
        TestResponse::from_committed(committed).await
    }
}
