//! Request body parsing.
//!
//! [`BodyParser`] reads the request body once, decodes it according to its
//! `Content-Type` and publishes the result under [`BODY`].
//!
//! | Content type | Result |
//! |---|---|
//! | `application/json`, `*/*+json` | [`ParsedBody::Json`] |
//! | `application/x-www-form-urlencoded` | [`ParsedBody::Form`] |
//! | `multipart/form-data` | [`ParsedBody::Multipart`] |
//! | anything else | [`ParsedBody::Text`] or [`ParsedBody::Bytes`] |

use std::io;

use bytes::Bytes;
use mime::Mime;
use serde_json::Value;
use weft_core::{HttpError, Key, RequestContext, StageError};

use crate::stage::{BoxFuture, Flow, Stage, StageResult};

/// Where the parsed body is published.
pub const BODY: Key<ParsedBody> = Key::new("body");

/// Default body size limit (1 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// A decoded request body.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    /// A JSON document.
    Json(Value),
    /// URL-encoded form pairs, in order.
    Form(Vec<(String, String)>),
    /// A multipart form.
    Multipart(MultipartForm),
    /// A UTF-8 body of any other type.
    Text(String),
    /// A non-UTF-8 body of any other type.
    Bytes(Bytes),
}

impl ParsedBody {
    /// Returns the JSON document, if the body was JSON.
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the text, if the body was plain text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Returns the first form or multipart field named `name`.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        let pairs = match self {
            Self::Form(pairs) => pairs,
            Self::Multipart(form) => &form.fields,
            _ => return None,
        };
        pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// The text fields and files of a multipart form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    /// Text fields, in order.
    pub fields: Vec<(String, String)>,
    /// Uploaded files, in order.
    pub files: Vec<UploadedFile>,
}

/// A file received in a multipart form, held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Form field name.
    pub field: String,
    /// Client-supplied file name.
    pub file_name: String,
    /// Declared content type.
    pub content_type: Option<String>,
    /// File contents.
    pub data: Bytes,
}

/// Stage that parses the request body.
///
/// # Example
///
/// ```ignore
/// let pipeline = Pipeline::builder()
///     .register(BodyParser::new().limit(64 * 1024), 50)
///     .stage(router.into_stage())
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct BodyParser {
    limit: usize,
}

impl Default for BodyParser {
    fn default() -> Self {
        Self {
            limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl BodyParser {
    /// Creates a parser with the default limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum body size in bytes.
    #[must_use]
    pub const fn limit(mut self, bytes: usize) -> Self {
        self.limit = bytes;
        self
    }

    async fn parse(&self, ctx: &RequestContext) -> Result<Option<ParsedBody>, StageError> {
        let Some(body) = ctx.request().take_body() else {
            return Ok(None);
        };
        let bytes = body.read_to_end(Some(self.limit)).await?;
        if bytes.is_empty() {
            return Ok(None);
        }

        let mime = ctx
            .request()
            .content_type()
            .and_then(|value| value.parse::<Mime>().ok());
        let parsed = match mime {
            Some(ref mime) if is_json(mime) => ParsedBody::Json(
                serde_json::from_slice(&bytes)
                    .map_err(|_| HttpError::bad_request("Invalid JSON body"))?,
            ),
            Some(ref mime)
                if mime.type_() == mime::APPLICATION
                    && mime.subtype() == mime::WWW_FORM_URLENCODED =>
            {
                ParsedBody::Form(
                    serde_urlencoded::from_bytes(&bytes)
                        .map_err(|_| HttpError::bad_request("Invalid form body"))?,
                )
            }
            Some(ref mime)
                if mime.type_() == mime::MULTIPART && mime.subtype() == mime::FORM_DATA =>
            {
                ParsedBody::Multipart(parse_multipart(mime, bytes).await?)
            }
            _ => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => ParsedBody::Text(text),
                Err(_) => ParsedBody::Bytes(bytes),
            },
        };
        Ok(Some(parsed))
    }
}

impl Stage for BodyParser {
    fn name(&self) -> &'static str {
        "body_parser"
    }

    fn process(&self, mut ctx: RequestContext) -> BoxFuture<'_, StageResult> {
        Box::pin(async move {
            if let Some(parsed) = self.parse(&ctx).await? {
                ctx.set(&BODY, parsed);
            }
            Ok(Flow::Continue(ctx))
        })
    }
}

fn is_json(mime: &Mime) -> bool {
    (mime.type_() == mime::APPLICATION && mime.subtype() == mime::JSON)
        || mime.suffix() == Some(mime::JSON)
}

async fn parse_multipart(mime: &Mime, body: Bytes) -> Result<MultipartForm, StageError> {
    let boundary = multer::parse_boundary(mime.as_ref())
        .map_err(|_| HttpError::bad_request("Missing multipart boundary"))?;
    let stream = futures_util::stream::once(async move { Ok::<_, io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let invalid =
        |err: multer::Error| HttpError::bad_request(format!("Invalid multipart body: {err}"));
    let mut form = MultipartForm::default();
    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(ToString::to_string);
                let data = field.bytes().await.map_err(invalid)?;
                form.files.push(UploadedFile {
                    field: name,
                    file_name,
                    content_type,
                    data,
                });
            }
            None => {
                let value = field.text().await.map_err(invalid)?;
                form.fields.push((name, value));
            }
        }
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use serde_json::json;
    use weft_core::{Request, Response};

    fn context(content_type: Option<&str>, body: &'static str) -> RequestContext {
        let mut builder = Request::builder().method(Method::POST).uri("/submit");
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        RequestContext::new(builder.body(body).unwrap(), Response::detached())
    }

    async fn parse(ctx: RequestContext) -> Result<Option<ParsedBody>, StageError> {
        let ctx = BodyParser::new().process(ctx).await?.into_context().unwrap();
        Ok(ctx.get(&BODY).cloned())
    }

    #[tokio::test]
    async fn test_json_body() {
        let parsed = parse(context(Some("application/json"), r#"{"name":"Ada"}"#))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(parsed.as_json(), Some(&json!({"name": "Ada"})));
    }

    #[tokio::test]
    async fn test_json_suffix() {
        let parsed = parse(context(Some("application/problem+json"), "[1,2]"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(parsed, ParsedBody::Json(json!([1, 2])));
    }

    #[tokio::test]
    async fn test_invalid_json_is_400() {
        let err = parse(context(Some("application/json"), "{nope"))
            .await
            .unwrap_err();
        let resolved = err.to_response();
        assert_eq!(resolved.status.as_u16(), 400);
        assert_eq!(resolved.body, "Invalid JSON body");
    }

    #[tokio::test]
    async fn test_form_body() {
        let parsed = parse(context(
            Some("application/x-www-form-urlencoded"),
            "name=Ada+Lovelace&lang=en",
        ))
        .await
        .unwrap()
        .unwrap();
        assert_eq!(parsed.field("name"), Some("Ada Lovelace"));
        assert_eq!(parsed.field("lang"), Some("en"));
    }

    #[tokio::test]
    async fn test_multipart_body() {
        let body = "--XYZ\r\n\
            Content-Disposition: form-data; name=\"title\"\r\n\r\n\
            Notes\r\n\
            --XYZ\r\n\
            Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n\
            Content-Type: text/plain\r\n\r\n\
            hello file\r\n\
            --XYZ--\r\n";
        let parsed = parse(context(Some("multipart/form-data; boundary=XYZ"), body))
            .await
            .unwrap()
            .unwrap();

        let ParsedBody::Multipart(form) = parsed else {
            panic!("expected multipart");
        };
        assert_eq!(form.fields, vec![("title".to_string(), "Notes".to_string())]);
        assert_eq!(form.files.len(), 1);
        assert_eq!(form.files[0].field, "upload");
        assert_eq!(form.files[0].file_name, "a.txt");
        assert_eq!(form.files[0].content_type.as_deref(), Some("text/plain"));
        assert_eq!(form.files[0].data, "hello file");
    }

    #[tokio::test]
    async fn test_plain_text_fallback() {
        let parsed = parse(context(None, "just words")).await.unwrap().unwrap();
        assert_eq!(parsed.as_text(), Some("just words"));
    }

    #[tokio::test]
    async fn test_empty_body_sets_nothing() {
        assert!(parse(context(Some("application/json"), "")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_limit_is_413() {
        let ctx = context(Some("text/plain"), "0123456789");
        let err = BodyParser::new().limit(4).process(ctx).await.unwrap_err();
        assert_eq!(err.to_response().status.as_u16(), 413);
    }

    #[tokio::test]
    async fn test_body_taken_already() {
        let ctx = context(Some("text/plain"), "taken");
        let _ = ctx.request().take_body();
        assert!(parse(ctx).await.unwrap().is_none());
    }
}
