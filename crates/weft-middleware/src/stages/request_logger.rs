//! Per-request log line.

use weft_core::RequestContext;

use crate::stage::{BoxFuture, Flow, Stage, StageResult};

/// Stage that emits one `info` event as each request enters the pipeline.
///
/// The final status and duration are reported later by the access log.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogger;

impl RequestLogger {
    /// Creates the stage.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Stage for RequestLogger {
    fn name(&self) -> &'static str {
        "request_logger"
    }

    fn process(&self, ctx: RequestContext) -> BoxFuture<'_, StageResult> {
        Box::pin(async move {
            let request = ctx.request();
            tracing::info!(
                request_id = %ctx.request_id(),
                http.method = %request.method(),
                http.path = %request.original_path(),
                user_agent = request.header(http::header::USER_AGENT).unwrap_or("-"),
                "request received"
            );
            Ok(Flow::Continue(ctx))
        })
    }
}
