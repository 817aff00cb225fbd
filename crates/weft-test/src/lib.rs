//! # weft-test
//!
//! In-memory testing for weft pipelines: requests are dispatched straight
//! into a [`Pipeline`](weft_middleware::Pipeline), with no socket and no
//! server task.
//!
//! ## Example
//!
//! ```ignore
//! use weft_test::TestClient;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_user() {
//!     let client = TestClient::new(app());
//!
//!     let response = client
//!         .post("/users")
//!         .json(&json!({ "name": "Alice" }))
//!         .send()
//!         .await
//!         .unwrap();
//!
//!     response.assert_status_code(201).assert_reason("Created");
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/weft-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::TestClient;
pub use error::TestError;
pub use request::TestRequest;
pub use response::TestResponse;
