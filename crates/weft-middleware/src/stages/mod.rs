//! Built-in stages.
//!
//! | Stage | Purpose |
//! |---|---|
//! | [`RequestIdStage`] | adopt or echo `X-Request-ID` |
//! | [`RequestLogger`] | log each request as it arrives |
//! | [`BodyParser`] | decode JSON, form and multipart bodies into `extra` |

pub mod body_parser;
pub mod request_id;
pub mod request_logger;

pub use body_parser::{BodyParser, MultipartForm, ParsedBody, UploadedFile, BODY};
pub use request_id::{RequestIdStage, REQUEST_ID_HEADER};
pub use request_logger::RequestLogger;
