//! Access logging through `tracing`.

use weft_core::{AccessLog, AccessRecord};

/// Emits one `tracing` event per finished request.
///
/// Server errors are logged at `error`, client errors at `warn`, everything
/// else at `info`. Field names follow [`crate::fields`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAccessLog;

impl TracingAccessLog {
    /// Creates the access log.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl AccessLog for TracingAccessLog {
    fn record(&self, record: &AccessRecord) {
        let status = record.status.as_u16();
        let duration_ms = record.duration_ms();
        if record.status.is_server_error() {
            tracing::error!(
                http.method = %record.method,
                http.path = %record.path,
                http.status_code = status,
                http.status_message = %record.status_message,
                duration_ms,
                "request finished"
            );
        } else if record.status.is_client_error() {
            tracing::warn!(
                http.method = %record.method,
                http.path = %record.path,
                http.status_code = status,
                http.status_message = %record.status_message,
                duration_ms,
                "request finished"
            );
        } else {
            tracing::info!(
                http.method = %record.method,
                http.path = %record.path,
                http.status_code = status,
                http.status_message = %record.status_message,
                duration_ms,
                "request finished"
            );
        }
    }
}
