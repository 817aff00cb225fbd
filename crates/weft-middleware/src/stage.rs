//! The stage trait.
//!
//! A [`Stage`] takes the request context by value and hands it on, or stops
//! the request. Every stage finishes before the next one starts.
//!
//! # Example
//!
//! ```ignore
//! use weft_middleware::{BoxFuture, Flow, Stage, StageResult};
//! use weft_core::RequestContext;
//!
//! struct PoweredBy;
//!
//! impl Stage for PoweredBy {
//!     fn name(&self) -> &'static str {
//!         "powered_by"
//!     }
//!
//!     fn process(&self, ctx: RequestContext) -> BoxFuture<'_, StageResult> {
//!         Box::pin(async move {
//!             ctx.response().set_header("x-powered-by", "weft")?;
//!             Ok(Flow::Continue(ctx))
//!         })
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use weft_core::{RequestContext, StageError};

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a stage hands to the next one.
#[derive(Debug)]
pub enum Flow {
    /// Continue with this context.
    Continue(RequestContext),
    /// Stop here; the remaining stages are skipped.
    Halt,
}

impl Flow {
    /// Returns the context, if the flow continues.
    #[must_use]
    pub fn into_context(self) -> Option<RequestContext> {
        match self {
            Self::Continue(ctx) => Some(ctx),
            Self::Halt => None,
        }
    }
}

/// Result of running one stage.
pub type StageResult = Result<Flow, StageError>;

/// A single pipeline transformation.
///
/// Failures propagate to the pipeline's error interception; stages never
/// need to catch errors raised by earlier stages.
pub trait Stage: Send + Sync + 'static {
    /// Returns the stage's name, used in logs.
    fn name(&self) -> &'static str;

    /// Processes one request.
    fn process(&self, ctx: RequestContext) -> BoxFuture<'_, StageResult>;
}

impl<S: Stage + ?Sized> Stage for Arc<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn process(&self, ctx: RequestContext) -> BoxFuture<'_, StageResult> {
        (**self).process(ctx)
    }
}

impl<S: Stage + ?Sized> Stage for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn process(&self, ctx: RequestContext) -> BoxFuture<'_, StageResult> {
        (**self).process(ctx)
    }
}

/// A stage built from an async closure.
///
/// # Example
///
/// ```ignore
/// let stage = FnStage::new("hello", |ctx: RequestContext| async move {
///     ctx.response().send("hello")?;
///     Ok(Flow::Continue(ctx))
/// });
/// ```
pub struct FnStage<F> {
    name: &'static str,
    func: F,
}

impl<F> FnStage<F> {
    /// Creates a function-based stage.
    pub fn new<Fut>(name: &'static str, func: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StageResult> + Send + 'static,
    {
        Self { name, func }
    }
}

impl<F, Fut> Stage for FnStage<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StageResult> + Send + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn process(&self, ctx: RequestContext) -> BoxFuture<'_, StageResult> {
        Box::pin((self.func)(ctx))
    }
}

/// Shorthand for [`FnStage::new`].
pub fn stage_fn<F, Fut>(name: &'static str, func: F) -> FnStage<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StageResult> + Send + 'static,
{
    FnStage::new(name, func)
}
