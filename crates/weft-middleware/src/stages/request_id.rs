//! Request ID stage.
//!
//! Every context is created with a fresh UUID v7 request id. This stage
//! adopts a client-supplied `X-Request-ID` instead when it is a valid UUID,
//! and echoes the effective id on the response so clients can correlate
//! their requests with server logs.

use weft_core::{RequestContext, RequestId};

use crate::stage::{BoxFuture, Flow, Stage, StageResult};

/// The header name for request ID propagation.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Stage that propagates request ids.
#[derive(Debug, Clone, Copy)]
pub struct RequestIdStage {
    trust_incoming: bool,
}

impl Default for RequestIdStage {
    fn default() -> Self {
        Self {
            trust_incoming: true,
        }
    }
}

impl RequestIdStage {
    /// Creates a stage that adopts valid incoming ids.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a stage that always keeps the generated id.
    ///
    /// Use this for edge services that receive untrusted traffic.
    #[must_use]
    pub const fn ignore_incoming() -> Self {
        Self {
            trust_incoming: false,
        }
    }

    fn extract(&self, ctx: &RequestContext) -> Option<RequestId> {
        if !self.trust_incoming {
            return None;
        }
        ctx.request()
            .header(REQUEST_ID_HEADER)
            .and_then(RequestId::parse)
    }
}

impl Stage for RequestIdStage {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn process(&self, mut ctx: RequestContext) -> BoxFuture<'_, StageResult> {
        Box::pin(async move {
            if let Some(id) = self.extract(&ctx) {
                ctx.set_request_id(id);
            }
            if !ctx.response().is_done() {
                ctx.response()
                    .set_header(REQUEST_ID_HEADER, ctx.request_id().to_string())?;
            }
            Ok(Flow::Continue(ctx))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::{Request, Response};

    fn context(header: Option<&str>) -> RequestContext {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = header {
            builder = builder.header(REQUEST_ID_HEADER, value);
        }
        RequestContext::new(builder.build().unwrap(), Response::detached())
    }

    async fn run(stage: RequestIdStage, ctx: RequestContext) -> RequestContext {
        stage.process(ctx).await.unwrap().into_context().unwrap()
    }

    #[tokio::test]
    async fn test_echoes_generated_id() {
        let ctx = run(RequestIdStage::new(), context(None)).await;
        let header = ctx.response().header(REQUEST_ID_HEADER).unwrap();
        assert_eq!(header.to_str().unwrap(), ctx.request_id().to_string());
    }

    #[tokio::test]
    async fn test_adopts_valid_incoming_id() {
        let incoming = "01234567-89ab-7def-8123-456789abcdef";
        let ctx = run(RequestIdStage::new(), context(Some(incoming))).await;
        assert_eq!(ctx.request_id().to_string(), incoming);
        assert_eq!(ctx.response().header(REQUEST_ID_HEADER).unwrap(), incoming);
    }

    #[tokio::test]
    async fn test_ignores_invalid_incoming_id() {
        let ctx = run(RequestIdStage::new(), context(Some("not-a-valid-uuid"))).await;
        let header = ctx.response().header(REQUEST_ID_HEADER).unwrap();
        assert_ne!(header, "not-a-valid-uuid");
        assert!(RequestId::parse(header.to_str().unwrap()).is_some());
    }

    #[tokio::test]
    async fn test_ignore_incoming() {
        let incoming = "01234567-89ab-7def-8123-456789abcdef";
        let ctx = run(RequestIdStage::ignore_incoming(), context(Some(incoming))).await;
        assert_ne!(ctx.request_id().to_string(), incoming);
    }

    #[tokio::test]
    async fn test_committed_response_untouched() {
        let ctx = context(None);
        ctx.response().end().unwrap();
        let ctx = run(RequestIdStage::new(), ctx).await;
        assert!(!ctx.response().has_header(REQUEST_ID_HEADER));
    }
}
