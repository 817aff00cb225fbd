//! The access-log contract.
//!
//! After a request is finalized the pipeline hands an [`AccessRecord`] to an
//! [`AccessLog`]. Formatting and output belong to the implementation.

use std::sync::Arc;
use std::time::Duration;

use http::{Method, StatusCode};
use parking_lot::Mutex;

/// What the pipeline reports for each finished request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRecord {
    /// Request method.
    pub method: Method,
    /// Path the client sent.
    pub path: String,
    /// Final status.
    pub status: StatusCode,
    /// Final reason phrase.
    pub status_message: String,
    /// Time from context creation to fallback termination.
    pub duration: Duration,
}

impl AccessRecord {
    /// Returns the duration in fractional milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}

/// Receives one [`AccessRecord`] per request.
pub trait AccessLog: Send + Sync + 'static {
    /// Records a finished request.
    fn record(&self, record: &AccessRecord);
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAccessLog;

impl AccessLog for NoopAccessLog {
    fn record(&self, _record: &AccessRecord) {}
}

/// Keeps records in memory. Handy for assertions in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryAccessLog {
    records: Arc<Mutex<Vec<AccessRecord>>>,
}

impl MemoryAccessLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    #[must_use]
    pub fn records(&self) -> Vec<AccessRecord> {
        self.records.lock().clone()
    }
}

impl AccessLog for MemoryAccessLog {
    fn record(&self, record: &AccessRecord) {
        self.records.lock().push(record.clone());
    }
}
