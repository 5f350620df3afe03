//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Interceptor / filters produce:
//!     → access_log.rs (LogRecord per response or per chunk)
//!     → metrics.rs (counters, histograms)
//!     → logging.rs (subscriber for every tracing event)
//! ```
//!
//! # Design Decisions
//! - Structured logging through `tracing` everywhere
//! - Logger failures never reach the client
//! - Metrics are cheap and optional

pub mod access_log;
pub mod logging;
pub mod metrics;

pub use access_log::{LogRecord, ResponseLogger, TracingLogger};
