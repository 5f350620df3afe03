//! Response logging.
//!
//! # Responsibilities
//! - Define the finalized response record ([`LogRecord`])
//! - Provide the sink contract ([`ResponseLogger`]) and the default
//!   `tracing` backed implementation
//! - Keep logger failures away from the response pipeline

use std::error::Error;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::StatusCode;

/// One finalized observation of a response (or of one chunk of it).
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Path as received from the client, before any rewrite.
    pub path: String,
    /// Status known at the time of the record, if the upstream set one.
    pub status: Option<StatusCode>,
    /// Time since the exchange started.
    pub elapsed: Duration,
    pub body: String,
    pub timestamp: SystemTime,
}

impl LogRecord {
    pub fn new(
        path: impl Into<String>,
        status: Option<StatusCode>,
        elapsed: Duration,
        body: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            status,
            elapsed,
            body: body.into(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }
}

pub type LogResult = Result<(), Box<dyn Error + Send + Sync>>;

/// Destination for response records. Synchronous, side-effect only.
pub trait ResponseLogger: Send + Sync {
    fn record(&self, record: &LogRecord) -> LogResult;
}

/// Default logger: one structured `tracing` event per record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl ResponseLogger for TracingLogger {
    fn record(&self, record: &LogRecord) -> LogResult {
        let timestamp_ms = record.timestamp.duration_since(UNIX_EPOCH)?.as_millis();
        let status = record.status.map_or(0, |s| s.as_u16());

        tracing::info!(
            target: "lb_gateway::access",
            path = %record.path,
            status,
            elapsed_ms = record.elapsed_ms() as u64,
            timestamp_ms = timestamp_ms as u64,
            body = %record.body,
            "Response"
        );
        Ok(())
    }
}

/// Hand a record to `logger`, reporting any failure on the error target.
pub fn emit(logger: &dyn ResponseLogger, record: &LogRecord) {
    if let Err(e) = logger.record(record) {
        tracing::error!(
            target: "lb_gateway::errors",
            path = %record.path,
            error = %e,
            "Error logging response"
        );
    }
}
