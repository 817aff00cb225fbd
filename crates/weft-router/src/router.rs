//! Route table and router stage.
//!
//! Routes are tried in registration order. The first route whose method and
//! pattern both match handles the request; later matches never run. A
//! request no route matches passes through untouched.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use http::Method;
use weft_core::{RequestContext, StageError};
use weft_middleware::{BoxFuture, Flow, Stage, StageResult};

use crate::error::RouteError;
use crate::params::Params;
use crate::pattern::{PathPattern, RouterOptions};
use crate::response::RouteResponse;
use crate::view::RouteView;

/// Type-erased route handler.
pub type ErasedHandler =
    Arc<dyn Fn(RouteView) -> BoxFuture<'static, Result<RouteResponse, StageError>> + Send + Sync>;

/// Type-erased route middleware.
pub type RouteMiddleware = Arc<dyn Fn(&mut RouteView) -> Result<(), StageError> + Send + Sync>;

/// HTTP verbs a route can be registered for.
const HTTP_VERBS: [Method; 9] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::CONNECT,
    Method::OPTIONS,
    Method::TRACE,
    Method::PATCH,
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum MethodFilter {
    Any,
    Exact(Method),
}

impl MethodFilter {
    fn parse(method: &str) -> Result<Self, RouteError> {
        let upper = method.to_ascii_uppercase();
        if upper == "*" || upper == "ALL" {
            return Ok(Self::Any);
        }
        HTTP_VERBS
            .iter()
            .find(|verb| verb.as_str() == upper)
            .map(|verb| Self::Exact(verb.clone()))
            .ok_or_else(|| RouteError::InvalidMethod(method.to_string()))
    }

    fn matches(&self, method: &Method) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => expected == method,
        }
    }
}

/// One entry of the route table.
pub struct Route {
    method: MethodFilter,
    pattern: PathPattern,
    handler: ErasedHandler,
    middlewares: Vec<RouteMiddleware>,
}

impl Route {
    /// Adds a middleware that runs before the handler.
    ///
    /// Middlewares run in the order they were added. Returning an error
    /// aborts the request; the handler is not called.
    pub fn with_middleware<F>(&mut self, middleware: F) -> &mut Self
    where
        F: Fn(&mut RouteView) -> Result<(), StageError> + Send + Sync + 'static,
    {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Returns the route's pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Returns the route's method, or `None` for any method.
    #[must_use]
    pub fn method(&self) -> Option<&Method> {
        match &self.method {
            MethodFilter::Any => None,
            MethodFilter::Exact(method) => Some(method),
        }
    }

    fn matches(&self, method: &Method, path: &str) -> Option<Params> {
        if !self.method.matches(method) {
            return None;
        }
        self.pattern.captures(path)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .field("middlewares", &self.middlewares.len())
            .finish_non_exhaustive()
    }
}

/// Builder for the route table.
///
/// # Example
///
/// ```rust,ignore
/// use weft_router::{Reply, Router};
///
/// let mut router = Router::new();
/// router.get("/greet/:name", |view| async move {
///     Ok(format!("Hello {}", &view.params[0]))
/// })?;
/// router
///     .delete("/users/:id", delete_user)?
///     .with_middleware(require_admin);
///
/// let pipeline = Pipeline::builder().stage(router.into_stage()).build();
/// ```
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
    options: RouterOptions,
}

impl Router {
    /// Creates an empty router with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty router with the given matching options.
    #[must_use]
    pub fn with_options(options: RouterOptions) -> Self {
        Self {
            routes: Vec::new(),
            options,
        }
    }

    /// Registers a route.
    ///
    /// `method` is case-insensitive; `"*"` and `"ALL"` match every method.
    ///
    /// # Errors
    ///
    /// Fails if the method is unknown or the pattern does not compile.
    pub fn add_route<H, Fut, R>(
        &mut self,
        method: &str,
        pattern: &str,
        handler: H,
    ) -> Result<&mut Route, RouteError>
    where
        H: Fn(RouteView) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, StageError>> + Send + 'static,
        R: Into<RouteResponse> + 'static,
    {
        let method = MethodFilter::parse(method)?;
        let pattern = PathPattern::compile(pattern, self.options)?;
        let handler: ErasedHandler = Arc::new(
            move |view: RouteView| -> BoxFuture<'static, Result<RouteResponse, StageError>> {
                let future = handler(view);
                Box::pin(async move { future.await.map(Into::into) })
            },
        );

        self.routes.push(Route {
            method,
            pattern,
            handler,
            middlewares: Vec::new(),
        });
        let index = self.routes.len() - 1;
        Ok(&mut self.routes[index])
    }

    /// Registers a `GET` route.
    pub fn get<H, Fut, R>(&mut self, pattern: &str, handler: H) -> Result<&mut Route, RouteError>
    where
        H: Fn(RouteView) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, StageError>> + Send + 'static,
        R: Into<RouteResponse> + 'static,
    {
        self.add_route("GET", pattern, handler)
    }

    /// Registers a `POST` route.
    pub fn post<H, Fut, R>(&mut self, pattern: &str, handler: H) -> Result<&mut Route, RouteError>
    where
        H: Fn(RouteView) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, StageError>> + Send + 'static,
        R: Into<RouteResponse> + 'static,
    {
        self.add_route("POST", pattern, handler)
    }

    /// Registers a `PUT` route.
    pub fn put<H, Fut, R>(&mut self, pattern: &str, handler: H) -> Result<&mut Route, RouteError>
    where
        H: Fn(RouteView) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, StageError>> + Send + 'static,
        R: Into<RouteResponse> + 'static,
    {
        self.add_route("PUT", pattern, handler)
    }

    /// Registers a `PATCH` route.
    pub fn patch<H, Fut, R>(&mut self, pattern: &str, handler: H) -> Result<&mut Route, RouteError>
    where
        H: Fn(RouteView) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, StageError>> + Send + 'static,
        R: Into<RouteResponse> + 'static,
    {
        self.add_route("PATCH", pattern, handler)
    }

    /// Registers a `DELETE` route.
    pub fn delete<H, Fut, R>(&mut self, pattern: &str, handler: H) -> Result<&mut Route, RouteError>
    where
        H: Fn(RouteView) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, StageError>> + Send + 'static,
        R: Into<RouteResponse> + 'static,
    {
        self.add_route("DELETE", pattern, handler)
    }

    /// Registers a route for every method.
    pub fn all<H, Fut, R>(&mut self, pattern: &str, handler: H) -> Result<&mut Route, RouteError>
    where
        H: Fn(RouteView) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, StageError>> + Send + 'static,
        R: Into<RouteResponse> + 'static,
    {
        self.add_route("*", pattern, handler)
    }

    /// Returns the number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if no route is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Freezes the table into a pipeline stage.
    #[must_use]
    pub fn into_stage(self) -> RouterStage {
        RouterStage {
            routes: self.routes.into(),
        }
    }
}

impl Stage for Router {
    fn name(&self) -> &'static str {
        "router"
    }

    fn process(&self, ctx: RequestContext) -> BoxFuture<'_, StageResult> {
        Box::pin(dispatch(&self.routes, ctx))
    }
}

/// A frozen route table, usable as a pipeline stage.
///
/// Cloning is cheap; clones share the table.
#[derive(Clone)]
pub struct RouterStage {
    routes: Arc<[Route]>,
}

impl RouterStage {
    /// Returns the number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if no route is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Stage for RouterStage {
    fn name(&self) -> &'static str {
        "router"
    }

    fn process(&self, ctx: RequestContext) -> BoxFuture<'_, StageResult> {
        Box::pin(dispatch(&self.routes, ctx))
    }
}

impl fmt::Debug for RouterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterStage")
            .field("routes", &self.routes)
            .finish()
    }
}

async fn dispatch(routes: &[Route], mut ctx: RequestContext) -> StageResult {
    let matched = {
        let request = ctx.request();
        routes.iter().find_map(|route| {
            route
                .matches(request.method(), request.path())
                .map(|params| (route, params))
        })
    };
    let Some((route, params)) = matched else {
        return Ok(Flow::Continue(ctx));
    };
    tracing::debug!(
        pattern = route.pattern(),
        http.path = ctx.request().path(),
        "route matched"
    );

    let mut view = RouteView::new(&ctx, params);
    for middleware in &route.middlewares {
        middleware(&mut view)?;
    }
    ctx.set_extra(view.extra.clone());

    let outcome = (route.handler)(view).await?;
    if !outcome.write_to(ctx.response())? {
        tracing::trace!(pattern = route.pattern(), "handler passed");
    }
    Ok(Flow::Continue(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::{Key, Request, Response};

    const ROLE: Key<&'static str> = Key::new("role");

    fn context(method: Method, uri: &str) -> RequestContext {
        let request = Request::builder().method(method).uri(uri).build().unwrap();
        RequestContext::new(request, Response::detached())
    }

    async fn body_of(stage: &impl Stage, ctx: RequestContext) -> Option<String> {
        let response = ctx.response().clone();
        stage.process(ctx).await.unwrap();
        let committed = response.take_committed()?;
        let bytes = committed.body.collect().await.unwrap();
        Some(String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!(MethodFilter::parse("get").unwrap(), MethodFilter::Exact(Method::GET));
        assert_eq!(MethodFilter::parse("ALL").unwrap(), MethodFilter::Any);
        assert_eq!(MethodFilter::parse("*").unwrap(), MethodFilter::Any);
        assert_eq!(
            MethodFilter::parse("BREW").unwrap_err(),
            RouteError::InvalidMethod("BREW".to_string())
        );
    }

    #[test]
    fn test_registration_errors() {
        let mut router = Router::new();
        assert!(router
            .add_route("FETCH", "/x", |_view| async { Ok("x") })
            .is_err());
        assert!(router.get("/x/(", |_view| async { Ok("x") }).is_err());
        assert!(router.is_empty());
    }

    #[tokio::test]
    async fn test_greet_route() {
        let mut router = Router::new();
        router
            .get("/greet/:name", |view: RouteView| async move {
                Ok(format!("Hello {}", &view.params[0]))
            })
            .unwrap();

        let body = body_of(&router, context(Method::GET, "/greet/Ada")).await;
        assert_eq!(body.as_deref(), Some("Hello Ada"));
    }

    #[tokio::test]
    async fn test_method_mismatch_passes_through() {
        let mut router = Router::new();
        router.get("/items", |_view| async { Ok("items") }).unwrap();

        let stage = router.into_stage();
        assert_eq!(body_of(&stage, context(Method::POST, "/items")).await, None);
        assert_eq!(
            body_of(&stage, context(Method::GET, "/items")).await.as_deref(),
            Some("items")
        );
    }

    #[tokio::test]
    async fn test_all_matches_any_method() {
        let mut router = Router::new();
        router
            .all("/ping", |view: RouteView| async move { Ok(view.method.to_string()) })
            .unwrap();

        let body = body_of(&router, context(Method::PATCH, "/ping")).await;
        assert_eq!(body.as_deref(), Some("PATCH"));
    }

    #[tokio::test]
    async fn test_middleware_extra_reaches_handler_and_context() {
        let mut router = Router::new();
        router
            .get("/admin", |view: RouteView| async move {
                Ok(view.get(&ROLE).copied().unwrap_or("none").to_string())
            })
            .unwrap()
            .with_middleware(|view| {
                view.set(&ROLE, "admin");
                Ok(())
            });

        let ctx = context(Method::GET, "/admin");
        let response = ctx.response().clone();
        let after = router.process(ctx).await.unwrap().into_context().unwrap();
        assert_eq!(after.get(&ROLE), Some(&"admin"));
        let committed = response.take_committed().unwrap();
        assert_eq!(committed.body.collect().await.unwrap(), "admin");
    }

    #[tokio::test]
    async fn test_middleware_error_skips_handler() {
        let mut router = Router::new();
        router
            .get("/private", |_view| async { Ok("secret") })
            .unwrap()
            .with_middleware(|_view| Err(StageError::Status(403)));

        let err = router
            .process(context(Method::GET, "/private"))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Status(403)));
    }

    #[tokio::test]
    async fn test_pass_leaves_response_open() {
        let mut router = Router::new();
        router
            .get("/maybe", |_view| async { Ok(None::<String>) })
            .unwrap();

        assert_eq!(body_of(&router, context(Method::GET, "/maybe")).await, None);
    }
}
