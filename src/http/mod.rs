//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, one exchange task per request)
//!     → [filter chain] (log filter, load balancing, forwarding)
//!     → intercept.rs (observe / transform body chunks)
//!     → sink.rs (commit head, stream body with backpressure)
//!     → Send to client
//! ```

pub mod intercept;
pub mod server;
pub mod sink;

#[cfg(test)]
pub(crate) mod testing;

pub use intercept::InterceptingSink;
pub use server::GatewayServer;
pub use sink::{PendingResponse, ResponseSink, ServerResponse};
