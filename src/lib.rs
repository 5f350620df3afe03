//! Load-balancing HTTP gateway library.
//!
//! Every request runs through an ordered filter chain: a response-log
//! filter installs a body interceptor, a load-balance filter picks the next
//! upstream round-robin and rewrites the path, and the forwarding stage
//! streams the upstream response back through the interceptor.

pub mod config;
pub mod error;
pub mod filter;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use filter::{Exchange, FilterChain, GatewayFilter};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use load_balancer::UpstreamSelector;
