//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → wait_for_shutdown_signal() returns
//!
//! Shutdown (shutdown.rs):
//!     trigger() → every subscriber wakes → server stops accepting → drain → exit
//! ```
//!
//! # Design Decisions
//! - One broadcast channel fans the shutdown out to every long-running task
//! - In-flight exchanges finish before the process exits

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_shutdown_signal;
