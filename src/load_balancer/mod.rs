//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Config upstream list
//!     → upstream.rs (parse & validate each base address)
//!     → UpstreamPool (ordered, immutable, non-empty)
//!     → round_robin.rs (UpstreamSelector, one shared atomic counter)
//!     → next() per request
//! ```
//!
//! # Design Decisions
//! - Static pool; no discovery, health checks or weights
//! - Selector is passed explicitly to the filter that uses it (no globals)
//! - Lock-free: one fetch-and-increment per selection

pub mod round_robin;
pub mod upstream;

pub use round_robin::UpstreamSelector;
pub use upstream::{Upstream, UpstreamPool};
