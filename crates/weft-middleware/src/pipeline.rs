//! Priority-ordered middleware pipeline.
//!
//! Stages are registered with an integer priority on a [`PipelineBuilder`].
//! [`PipelineBuilder::build`] stable-sorts them by descending priority and
//! freezes the table; a built [`Pipeline`] cannot be modified.
//!
//! Each request runs through the stages one at a time. After the last stage
//! the engine applies two terminal steps of its own:
//!
//! 1. **Error interception** - a failure from any stage is resolved to a
//!    status and body (see [`weft_core::StageError::to_response`]) and written
//!    unless the response was already committed.
//! 2. **Fallback termination** - if nothing committed the response, it is
//!    finalized as `404` with the body `Cannot {METHOD} {path}`.
//!
//! The request is then reported to the configured [`AccessLog`].
//!
//! ```text
//! ctx → stage(p=10) → stage(p=5) → stage(p=0) → intercept → fallback → log
//! ```

use std::cmp::Reverse;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use http::Method;
use tracing::Instrument;
use weft_core::{AccessLog, AccessRecord, RequestContext, Response, StageError};
use weft_telemetry::TracingAccessLog;

use crate::stage::{BoxFuture, Flow, FnStage, Stage, StageResult};

/// A type-erased stage that can be stored in the table.
pub type BoxedStage = Arc<dyn Stage>;

struct Registration {
    stage: BoxedStage,
    priority: i32,
}

/// The frozen, ordered stage table.
///
/// Cloning a pipeline is cheap; clones share the same table.
///
/// # Example
///
/// ```ignore
/// use weft_middleware::{stage_fn, Flow, Pipeline};
///
/// let pipeline = Pipeline::builder()
///     .register(stage_fn("auth", authenticate), 10)
///     .register(router.into_stage(), 0)
///     .build();
///
/// let record = pipeline.dispatch(ctx).await;
/// ```
#[derive(Clone)]
pub struct Pipeline {
    stages: Arc<[Registration]>,
    access_log: Arc<dyn AccessLog>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs one request through the pipeline and finalizes its response.
    ///
    /// Always commits the response exactly once (unless a stage already did)
    /// and never fails; the returned record is also sent to the access log.
    pub async fn dispatch(&self, ctx: RequestContext) -> AccessRecord {
        let response = ctx.response().clone();
        let method = ctx.request().method().clone();
        let path = ctx.request().original_path().to_string();
        let started_at = ctx.started_at();
        let span = tracing::debug_span!(
            "request",
            request_id = %ctx.request_id(),
            http.method = %method,
            http.path = %path,
        );

        async {
            if let Err(err) = catch_panics(self.run(ctx)).await {
                intercept(&response, &err);
            }
            terminate(&response, &method, &path);
        }
        .instrument(span)
        .await;

        let record = AccessRecord {
            method,
            path,
            status: response.status_code(),
            status_message: response.status_message(),
            duration: started_at.elapsed(),
        };
        self.access_log.record(&record);
        record
    }

    async fn run(&self, mut ctx: RequestContext) -> StageResult {
        for registration in self.stages.iter() {
            let stage = &registration.stage;
            let token = ctx.cancellation().clone();
            if token.is_cancelled() {
                return Err(StageError::Cancelled);
            }

            tracing::trace!(stage = stage.name(), "entering stage");
            let flow = tokio::select! {
                biased;
                () = token.cancelled() => return Err(StageError::Cancelled),
                flow = stage.process(ctx) => flow?,
            };
            match flow {
                Flow::Continue(next) => ctx = next,
                Flow::Halt => {
                    tracing::trace!(stage = stage.name(), "stage halted the request");
                    return Ok(Flow::Halt);
                }
            }
        }
        Ok(Flow::Continue(ctx))
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|r| r.stage.name()).collect()
    }

    /// Returns the number of registered stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if no stage is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// A pipeline can be nested inside another one, e.g. below a mount.
///
/// The nested pipeline intercepts its own errors but leaves fallback
/// termination and access logging to the outermost pipeline.
impl Stage for Pipeline {
    fn name(&self) -> &'static str {
        "pipeline"
    }

    fn process(&self, ctx: RequestContext) -> BoxFuture<'_, StageResult> {
        Box::pin(async move {
            let resume = ctx.clone();
            match catch_panics(self.run(ctx)).await {
                Err(StageError::Cancelled) => Err(StageError::Cancelled),
                Err(err) => {
                    intercept(resume.response(), &err);
                    Ok(Flow::Continue(resume))
                }
                flow => flow,
            }
        })
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish_non_exhaustive()
    }
}

async fn catch_panics<F>(future: F) -> StageResult
where
    F: Future<Output = StageResult>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(StageError::from_panic(payload)))
}

fn intercept(response: &Response, err: &StageError) {
    if response.is_done() {
        if matches!(err, StageError::Cancelled) {
            tracing::debug!("request cancelled after the response was committed");
        } else {
            tracing::error!(error = %err, "stage failed after the response was committed");
        }
        return;
    }
    if err.is_internal() {
        tracing::error!(error = %err, "stage failed");
    } else {
        tracing::debug!(error = %err, "stage failed");
    }

    let resolved = err.to_response();
    let written = response
        .discard_body_headers()
        .and_then(|()| response.status(resolved.status.as_u16(), resolved.reason.as_deref()))
        .and_then(|()| {
            if resolved.body.is_empty() {
                response.end()
            } else {
                response.content_type("text/plain; charset=utf-8")?;
                response.send(resolved.body)
            }
        });
    if let Err(write_err) = written {
        tracing::debug!(error = %write_err, "error response not written");
    }
}

fn terminate(response: &Response, method: &Method, path: &str) {
    if response.is_done() {
        return;
    }
    let written = response
        .discard_body_headers()
        .and_then(|()| response.status(404, None))
        .and_then(|()| response.content_type("text/plain; charset=utf-8"))
        .and_then(|()| response.send(format!("Cannot {method} {path}")));
    if let Err(err) = written {
        tracing::debug!(error = %err, "fallback response not written");
    }
}

/// Builder for constructing a [`Pipeline`].
#[must_use]
pub struct PipelineBuilder {
    registrations: Vec<Registration>,
    access_log: Arc<dyn AccessLog>,
}

impl PipelineBuilder {
    /// Creates an empty builder that logs through [`TracingAccessLog`].
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            access_log: Arc::new(TracingAccessLog::new()),
        }
    }

    /// Registers a stage. Higher priorities run earlier; equal priorities
    /// run in registration order.
    pub fn register(mut self, stage: impl Stage, priority: i32) -> Self {
        self.registrations.push(Registration {
            stage: Arc::new(stage),
            priority,
        });
        self
    }

    /// Registers a stage at priority 0.
    pub fn stage(self, stage: impl Stage) -> Self {
        self.register(stage, 0)
    }

    /// Registers an async closure as a stage.
    pub fn register_fn<F, Fut>(self, name: &'static str, priority: i32, func: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StageResult> + Send + 'static,
    {
        self.register(FnStage::new(name, func), priority)
    }

    /// Replaces the access log.
    pub fn access_log(mut self, log: impl AccessLog) -> Self {
        self.access_log = Arc::new(log);
        self
    }

    /// Sorts the registrations and freezes the table.
    pub fn build(mut self) -> Pipeline {
        self.registrations.sort_by_key(|r| Reverse(r.priority));
        Pipeline {
            stages: self.registrations.into(),
            access_log: self.access_log,
        }
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
