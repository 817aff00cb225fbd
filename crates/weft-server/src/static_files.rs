//! Static file serving.
//!
//! [`StaticFiles`] is a pipeline stage that answers `GET` and `HEAD` requests
//! from a directory on disk. It resolves the request's route path (so it can
//! sit below a mount), streams the file and sets `content-type`,
//! `content-length` and `last-modified`.
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_middleware::{mount, Pipeline};
//! use weft_server::StaticFiles;
//!
//! let pipeline = Pipeline::builder()
//!     .stage(mount("/assets", StaticFiles::new("./public"))?)
//!     .build();
//! ```
//!
//! # Resolution
//!
//! - `..` and absolute components are rejected with `403`
//! - hidden files (a component starting with `.`) are rejected with `403`
//!   unless [`StaticFiles::show_hidden`] is enabled
//! - the canonical path must stay under the canonical root, so a symlink
//!   pointing outside is rejected with `403`
//! - a directory is served through its index file, else `404`
//! - in SPA mode any failed resolution is retried with the SPA file; if that
//!   fails too, the first error stands

use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use futures_util::TryStreamExt;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED};
use http::Method;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use thiserror::Error;
use tokio_util::io::ReaderStream;
use weft_core::{BoxError, HttpError, RequestContext, StageError};
use weft_middleware::{BoxFuture, Flow, Stage, StageResult};

/// Default index and SPA file name.
pub const DEFAULT_INDEX_FILE: &str = "index.html";

/// Why a path could not be served.
#[derive(Debug, Error)]
pub enum StaticFileError {
    /// Nothing servable exists at the path.
    #[error("not found: {0}")]
    NotFound(String),

    /// The path is not allowed or not readable.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Any other filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StaticFileError {
    fn from_io(err: io::Error, path: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_string()),
            io::ErrorKind::PermissionDenied => Self::Forbidden(path.to_string()),
            _ => Self::Io(err),
        }
    }
}

impl From<StaticFileError> for StageError {
    fn from(err: StaticFileError) -> Self {
        match err {
            StaticFileError::NotFound(_) => HttpError::not_found().into(),
            StaticFileError::Forbidden(_) => HttpError::forbidden().into(),
            StaticFileError::Io(err) => err.into(),
        }
    }
}

/// A file that passed resolution.
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    path: PathBuf,
    len: u64,
    modified: Option<SystemTime>,
}

impl ResolvedFile {
    /// Canonical path on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File size in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns true for an empty file.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Last modification time, when the platform reports one.
    #[must_use]
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    /// Content type derived from the file extension.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        content_type_for(&self.path)
    }
}

/// Static-file stage.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
    index_file: Option<String>,
    spa_file: Option<String>,
    show_hidden: bool,
}

impl StaticFiles {
    /// Serves files below `root`, with `index.html` as the directory index.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index_file: Some(DEFAULT_INDEX_FILE.to_string()),
            spa_file: None,
            show_hidden: false,
        }
    }

    /// Sets the file served for directory hits; `None` makes directories 404.
    #[must_use]
    pub fn index_file(mut self, file: Option<&str>) -> Self {
        self.index_file = file.map(str::to_string);
        self
    }

    /// Enables SPA mode with the given file, relative to the root.
    #[must_use]
    pub fn spa_file(mut self, file: Option<&str>) -> Self {
        self.spa_file = file.map(str::to_string);
        self
    }

    /// Allows serving hidden files.
    #[must_use]
    pub fn show_hidden(mut self, enabled: bool) -> Self {
        self.show_hidden = enabled;
        self
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a route path to a file under the root.
    pub async fn resolve(&self, request_path: &str) -> Result<ResolvedFile, StaticFileError> {
        let err = match self.resolve_path(request_path).await {
            Ok(file) => return Ok(file),
            Err(err) => err,
        };
        let Some(spa) = &self.spa_file else {
            return Err(err);
        };
        tracing::debug!(path = request_path, error = %err, spa, "falling back to SPA file");
        let root = self.canonical_root().await?;
        locate(&root, &root.join(spa), None, spa).await.map_err(|_| err)
    }

    async fn resolve_path(&self, request_path: &str) -> Result<ResolvedFile, StaticFileError> {
        let relative = self.sanitize(request_path)?;
        let root = self.canonical_root().await?;
        locate(
            &root,
            &root.join(relative),
            self.index_file.as_deref(),
            request_path,
        )
        .await
    }

    async fn canonical_root(&self) -> Result<PathBuf, StaticFileError> {
        Ok(tokio::fs::canonicalize(&self.root).await?)
    }

    fn sanitize(&self, request_path: &str) -> Result<PathBuf, StaticFileError> {
        let mut relative = PathBuf::new();
        for component in Path::new(request_path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(name) => {
                    let hidden = name.to_str().is_some_and(|n| n.starts_with('.'));
                    if hidden && !self.show_hidden {
                        return Err(StaticFileError::Forbidden(request_path.to_string()));
                    }
                    relative.push(name);
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StaticFileError::Forbidden(request_path.to_string()));
                }
            }
        }
        Ok(relative)
    }

    async fn serve(&self, ctx: &RequestContext, file: &ResolvedFile) -> Result<(), StageError> {
        let handle = if ctx.request().method() == Method::HEAD {
            None
        } else {
            let handle = tokio::fs::File::open(file.path())
                .await
                .map_err(|err| StaticFileError::from_io(err, ctx.request().path()))?;
            Some(handle)
        };

        let response = ctx.response();
        response.set_header(CONTENT_TYPE, file.content_type())?;
        response.set_header(CONTENT_LENGTH, file.len())?;
        if let Some(modified) = file.modified() {
            response.set_header(LAST_MODIFIED, httpdate::fmt_http_date(modified))?;
        }
        response.status(200, None)?;

        let Some(handle) = handle else {
            response.end()?;
            return Ok(());
        };
        let frames = ReaderStream::new(handle).map_ok(Frame::data);
        let body = BodyExt::map_err(StreamBody::new(frames), |err| -> BoxError { err.into() });
        response.stream(body.boxed_unsync())?;
        Ok(())
    }
}

impl Stage for StaticFiles {
    fn name(&self) -> &'static str {
        "static_files"
    }

    fn process(&self, ctx: RequestContext) -> BoxFuture<'_, StageResult> {
        Box::pin(async move {
            let method = ctx.request().method();
            if (method != Method::GET && method != Method::HEAD) || ctx.response().is_done() {
                return Ok(Flow::Continue(ctx));
            }
            let file = self.resolve(ctx.request().path()).await?;
            self.serve(&ctx, &file).await?;
            Ok(Flow::Continue(ctx))
        })
    }
}

/// Canonicalises `candidate`, checks it stays under `root` and resolves
/// directories through `index`.
async fn locate(
    root: &Path,
    candidate: &Path,
    index: Option<&str>,
    shown: &str,
) -> Result<ResolvedFile, StaticFileError> {
    let path = canonical_within(root, candidate, shown).await?;
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|err| StaticFileError::from_io(err, shown))?;

    if metadata.is_dir() {
        let Some(index) = index else {
            return Err(StaticFileError::NotFound(shown.to_string()));
        };
        let path = canonical_within(root, &path.join(index), shown).await?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|err| StaticFileError::from_io(err, shown))?;
        if !metadata.is_file() {
            return Err(StaticFileError::NotFound(shown.to_string()));
        }
        return Ok(ResolvedFile {
            path,
            len: metadata.len(),
            modified: metadata.modified().ok(),
        });
    }

    if !metadata.is_file() {
        return Err(StaticFileError::NotFound(shown.to_string()));
    }
    Ok(ResolvedFile {
        path,
        len: metadata.len(),
        modified: metadata.modified().ok(),
    })
}

async fn canonical_within(
    root: &Path,
    candidate: &Path,
    shown: &str,
) -> Result<PathBuf, StaticFileError> {
    let path = tokio::fs::canonicalize(candidate).await.map_err(|err| {
        if err.kind() == io::ErrorKind::PermissionDenied {
            StaticFileError::Forbidden(shown.to_string())
        } else {
            StaticFileError::NotFound(shown.to_string())
        }
    })?;
    if !path.starts_with(root) {
        tracing::warn!(path = shown, "static path escapes the root");
        return Err(StaticFileError::Forbidden(shown.to_string()));
    }
    Ok(path)
}

/// Maps a file extension to a content type.
#[must_use]
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "wasm" => "application/wasm",
        "webmanifest" => "application/manifest+json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use weft_core::{Committed, Request, Response, ResponseBody};

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<html>home</html>").unwrap();
        fs::write(dir.path().join("style.css"), "body { color: red }").unwrap();
        fs::write(dir.path().join(".env"), "SECRET=1").unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs").join("index.html"), "<html>docs</html>").unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();
        dir
    }

    async fn run(stage: &StaticFiles, method: Method, uri: &str) -> Result<Option<Committed>, StageError> {
        let request = Request::builder().method(method).uri(uri).build().unwrap();
        let ctx = RequestContext::new(request, Response::detached());
        let response = ctx.response().clone();
        stage.process(ctx).await?;
        Ok(response.take_committed())
    }

    #[tokio::test]
    async fn test_resolves_file_and_index() {
        let dir = site();
        let files = StaticFiles::new(dir.path());

        let css = files.resolve("/style.css").await.unwrap();
        assert_eq!(css.len(), 19);
        assert_eq!(css.content_type(), "text/css; charset=utf-8");

        let docs = files.resolve("/docs/").await.unwrap();
        assert!(docs.path().ends_with("docs/index.html"));

        let root = files.resolve("/").await.unwrap();
        assert!(root.path().ends_with("index.html"));
    }

    #[tokio::test]
    async fn test_rejections() {
        let dir = site();
        let files = StaticFiles::new(dir.path());

        assert!(matches!(files.resolve("/missing.txt").await, Err(StaticFileError::NotFound(_))));
        assert!(matches!(files.resolve("/empty").await, Err(StaticFileError::NotFound(_))));
        assert!(matches!(files.resolve("/../etc/passwd").await, Err(StaticFileError::Forbidden(_))));
        assert!(matches!(files.resolve("/.env").await, Err(StaticFileError::Forbidden(_))));
        assert!(files.clone().show_hidden(true).resolve("/.env").await.is_ok());
    }

    #[tokio::test]
    async fn test_index_can_be_disabled() {
        let dir = site();
        let files = StaticFiles::new(dir.path()).index_file(None);
        assert!(matches!(files.resolve("/docs").await, Err(StaticFileError::NotFound(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_out_of_root_is_forbidden() {
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "secret").unwrap();
        let dir = site();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), dir.path().join("link.txt"))
            .unwrap();

        let files = StaticFiles::new(dir.path());
        assert!(matches!(files.resolve("/link.txt").await, Err(StaticFileError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_spa_fallback() {
        let dir = site();
        let files = StaticFiles::new(dir.path()).spa_file(Some("index.html"));
        let file = files.resolve("/app/settings").await.unwrap();
        assert!(file.path().ends_with("index.html"));

        let broken = StaticFiles::new(dir.path()).spa_file(Some("missing.html"));
        assert!(matches!(broken.resolve("/.env").await, Err(StaticFileError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_stage_streams_file() {
        let dir = site();
        let files = StaticFiles::new(dir.path());

        let committed = run(&files, Method::GET, "/style.css").await.unwrap().unwrap();
        assert_eq!(committed.status.as_u16(), 200);
        assert_eq!(committed.headers[CONTENT_TYPE], "text/css; charset=utf-8");
        assert_eq!(committed.headers[CONTENT_LENGTH], "19");
        assert!(committed.headers.contains_key(LAST_MODIFIED));
        assert!(matches!(committed.body, ResponseBody::Stream(_)));
        assert_eq!(committed.body.collect().await.unwrap(), "body { color: red }");
    }

    #[tokio::test]
    async fn test_head_sends_headers_only() {
        let dir = site();
        let files = StaticFiles::new(dir.path());

        let committed = run(&files, Method::HEAD, "/style.css").await.unwrap().unwrap();
        assert_eq!(committed.headers[CONTENT_LENGTH], "19");
        assert!(matches!(committed.body, ResponseBody::Empty));
    }

    #[tokio::test]
    async fn test_other_methods_pass_through() {
        let dir = site();
        let files = StaticFiles::new(dir.path());
        assert!(run(&files, Method::POST, "/style.css").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_errors_map_to_http_errors() {
        let dir = site();
        let files = StaticFiles::new(dir.path());

        let err = run(&files, Method::GET, "/nope").await.unwrap_err();
        let resolved = err.to_response();
        assert_eq!(resolved.status.as_u16(), 404);
        assert_eq!(resolved.body, "Not found");

        let err = run(&files, Method::GET, "/.env").await.unwrap_err();
        let resolved = err.to_response();
        assert_eq!(resolved.status.as_u16(), 403);
        assert_eq!(resolved.body, "Resource forbidden");
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for(Path::new("a.HTML")), "text/html; charset=utf-8");
        assert_eq!(content_type_for(Path::new("a.wasm")), "application/wasm");
        assert_eq!(content_type_for(Path::new("README")), "application/octet-stream");
    }
}
