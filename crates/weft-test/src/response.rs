//! Collected response with assertion helpers.

use std::fmt;

use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use weft_core::Committed;

use crate::error::TestError;

/// A committed response with its body collected.
pub struct TestResponse {
    status: StatusCode,
    reason: String,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    pub(crate) async fn from_committed(committed: Committed) -> Result<Self, TestError> {
        let reason = committed.reason_phrase().to_string();
        let body = committed
            .body
            .collect()
            .await
            .map_err(|e| TestError::BodyRead(e.to_string()))?;
        Ok(Self {
            status: committed.status,
            reason,
            headers: committed.headers,
            body,
        })
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as a u16.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns the reason phrase that would go on the status line.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Gets a header value by name.
    #[must_use]
    pub fn header(&self, name: impl AsRef<str>) -> Option<&HeaderValue> {
        self.headers.get(name.as_ref())
    }

    /// Gets a header value as a string.
    #[must_use]
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.header(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the `content-type` header.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE.as_str())
    }

    /// Returns the raw body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as a string.
    pub fn text(&self) -> Result<String, TestError> {
        Ok(String::from_utf8(self.body.to_vec())?)
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    fn lossy_body(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Asserts the status code.
    ///
    /// # Panics
    ///
    /// Panics if the status code differs; the message includes the body.
    pub fn assert_status_code(&self, expected: u16) -> &Self {
        assert!(
            self.status.as_u16() == expected,
            "status: expected {expected}, got {} {} with body {:?}",
            self.status.as_u16(),
            self.reason,
            self.lossy_body()
        );
        self
    }

    /// Asserts the reason phrase.
    ///
    /// # Panics
    ///
    /// Panics if the reason phrase differs.
    pub fn assert_reason(&self, expected: impl AsRef<str>) -> &Self {
        let expected = expected.as_ref();
        assert!(
            self.reason == expected,
            "reason: expected {expected:?}, got {:?}",
            self.reason
        );
        self
    }

    /// Asserts a header value.
    ///
    /// # Panics
    ///
    /// Panics if the header is missing or differs.
    pub fn assert_header(&self, name: impl AsRef<str>, expected: impl AsRef<str>) -> &Self {
        let (name, expected) = (name.as_ref(), expected.as_ref());
        match self.header_str(name) {
            Some(actual) => assert!(
                actual == expected,
                "header {name}: expected {expected:?}, got {actual:?}"
            ),
            None => panic!("header {name} missing; present: {:?}", self.headers.keys().collect::<Vec<_>>()),
        }
        self
    }

    /// Asserts the body equals `expected`.
    ///
    /// # Panics
    ///
    /// Panics if the body differs.
    pub fn assert_body_eq(&self, expected: impl AsRef<str>) -> &Self {
        let body = self.lossy_body();
        assert!(
            body == expected.as_ref(),
            "body: expected {:?}, got {body:?}",
            expected.as_ref()
        );
        self
    }

    /// Asserts the body contains `expected`.
    ///
    /// # Panics
    ///
    /// Panics if the substring is missing.
    pub fn assert_body_contains(&self, expected: impl AsRef<str>) -> &Self {
        let body = self.lossy_body();
        assert!(
            body.contains(expected.as_ref()),
            "body {body:?} does not contain {:?}",
            expected.as_ref()
        );
        self
    }

    /// Asserts the JSON body equals `expected`.
    ///
    /// # Panics
    ///
    /// Panics if the body is not JSON or differs.
    pub fn assert_json_eq(&self, expected: &serde_json::Value) -> &Self {
        match self.json::<serde_json::Value>() {
            Ok(actual) => assert!(
                &actual == expected,
                "json: expected {expected}, got {actual}"
            ),
            Err(err) => panic!("body is not JSON ({err}): {:?}", self.lossy_body()),
        }
        self
    }
}

impl fmt::Debug for TestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestResponse")
            .field("status", &self.status)
            .field("reason", &self.reason)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish()
    }
}
