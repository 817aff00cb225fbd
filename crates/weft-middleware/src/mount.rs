//! Prefix-scoped delegation.
//!
//! A [`Mount`] runs a nested stage only for requests below its prefix. The
//! nested stage sees the path relative to the prefix; the response handle
//! and the request body are shared with the outer context.
//!
//! | Prefix | Request path | Nested path |
//! |---|---|---|
//! | `/api` | `/api` | `/` |
//! | `/api` | `/api/users` | `/users` |
//! | `/api` | `/apiextra` | no match |
//! | `/api/` | `/api/users` | `/users` |
//! | `/` | `/anything` | `/anything` |

use thiserror::Error;
use weft_core::RequestContext;

use crate::stage::{BoxFuture, Flow, Stage, StageResult};

/// Mount registration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MountError {
    /// The prefix does not start with `/`.
    #[error("mount prefix must start with '/': {0:?}")]
    NotAbsolute(String),
}

/// A stage that delegates to a nested stage below a path prefix.
///
/// # Example
///
/// ```ignore
/// let api = Pipeline::builder().stage(router.into_stage()).build();
/// let pipeline = Pipeline::builder()
///     .stage(Mount::new("/api", api)?)
///     .build();
/// ```
pub struct Mount<S> {
    prefix: String,
    trailing: bool,
    stage: S,
}

impl<S: Stage> Mount<S> {
    /// Creates a mount.
    ///
    /// # Errors
    ///
    /// Returns [`MountError::NotAbsolute`] if `prefix` does not start with `/`.
    pub fn new(prefix: impl Into<String>, stage: S) -> Result<Self, MountError> {
        let prefix = prefix.into();
        if !prefix.starts_with('/') {
            return Err(MountError::NotAbsolute(prefix));
        }
        Ok(Self {
            trailing: prefix.ends_with('/'),
            prefix,
            stage,
        })
    }

    /// Returns the mount prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the nested path for `path`, or `None` if it is outside the prefix.
    #[must_use]
    pub fn rewrite(&self, path: &str) -> Option<String> {
        let rest = path.strip_prefix(&self.prefix)?;
        if self.trailing {
            Some(format!("/{rest}"))
        } else if rest.is_empty() {
            Some("/".to_string())
        } else if rest.starts_with('/') {
            Some(rest.to_string())
        } else {
            None
        }
    }
}

impl<S: Stage> Stage for Mount<S> {
    fn name(&self) -> &'static str {
        "mount"
    }

    fn process(&self, ctx: RequestContext) -> BoxFuture<'_, StageResult> {
        Box::pin(async move {
            let Some(path) = self.rewrite(ctx.request().path()) else {
                return Ok(Flow::Continue(ctx));
            };
            tracing::trace!(prefix = %self.prefix, path = %path, "entering mount");
            let derived = ctx.derive_with_path(&self.prefix, path);
            self.stage.process(derived).await
        })
    }
}

/// Shorthand for [`Mount::new`].
///
/// # Errors
///
/// Returns [`MountError::NotAbsolute`] if `prefix` does not start with `/`.
pub fn mount<S: Stage>(prefix: impl Into<String>, stage: S) -> Result<Mount<S>, MountError> {
    Mount::new(prefix, stage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::stage_fn;
    use weft_core::{Request, Response, StageError};

    fn echo() -> impl Stage {
        stage_fn("echo", |ctx: RequestContext| async move {
            let body = format!("{}|{}", ctx.request().base_path(), ctx.request().path());
            ctx.response().send(body)?;
            Ok(Flow::Continue(ctx))
        })
    }

    fn context(uri: &str) -> RequestContext {
        let request = Request::builder().uri(uri).build().unwrap();
        RequestContext::new(request, Response::detached())
    }

    #[test]
    fn test_rejects_relative_prefix() {
        assert_eq!(
            mount("api", echo()).err(),
            Some(MountError::NotAbsolute("api".to_string()))
        );
    }

    #[test]
    fn test_rewrite_boundaries() {
        let api = Mount::new("/api", echo()).unwrap();
        assert_eq!(api.rewrite("/api").as_deref(), Some("/"));
        assert_eq!(api.rewrite("/api/foo/bar").as_deref(), Some("/foo/bar"));
        assert_eq!(api.rewrite("/api/").as_deref(), Some("/"));
        assert_eq!(api.rewrite("/apiextra"), None);
        assert_eq!(api.rewrite("/other"), None);
    }

    #[test]
    fn test_trailing_slash_prefix_matches_any_continuation() {
        let api = Mount::new("/api/", echo()).unwrap();
        assert_eq!(api.rewrite("/api/users").as_deref(), Some("/users"));
        assert_eq!(api.rewrite("/api/").as_deref(), Some("/"));
        assert_eq!(api.rewrite("/api"), None);
    }

    #[test]
    fn test_root_mount_is_identity() {
        let root = Mount::new("/", echo()).unwrap();
        assert_eq!(root.rewrite("/foo/bar").as_deref(), Some("/foo/bar"));
        assert_eq!(root.rewrite("/").as_deref(), Some("/"));
    }

    #[tokio::test]
    async fn test_nested_stage_sees_relative_path() {
        let api = mount("/api", echo()).unwrap();
        let ctx = context("/api/foo/bar");
        let response = ctx.response().clone();

        let flow = api.process(ctx).await.unwrap();
        let after = flow.into_context().unwrap();
        assert_eq!(after.request().path(), "/foo/bar");

        let committed = response.take_committed().unwrap();
        assert_eq!(committed.body.collect().await.unwrap(), "/api|/foo/bar");
    }

    #[tokio::test]
    async fn test_nested_mounts_extend_base_path() {
        let inner = mount("/v1", echo()).unwrap();
        let outer = mount("/api", inner).unwrap();
        let ctx = context("/api/v1/items");
        let response = ctx.response().clone();

        outer.process(ctx).await.unwrap();
        let committed = response.take_committed().unwrap();
        assert_eq!(committed.body.collect().await.unwrap(), "/api/v1|/items");
    }

    #[tokio::test]
    async fn test_non_match_skips_nested_stage() {
        let api = mount("/api", echo()).unwrap();
        let ctx = context("/apiextra");
        let response = ctx.response().clone();

        let after = api.process(ctx).await.unwrap().into_context().unwrap();
        assert_eq!(after.request().path(), "/apiextra");
        assert!(!response.is_done());
    }

    #[tokio::test]
    async fn test_nested_failure_propagates() {
        let failing = stage_fn("fail", |_ctx| async { Err(StageError::Status(418)) });
        let api = mount("/api", failing).unwrap();

        let err = api.process(context("/api")).await.unwrap_err();
        assert!(matches!(err, StageError::Status(418)));
    }
}
