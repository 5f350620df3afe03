//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → consumed once at startup to build the selector, filters and server
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no runtime reconfiguration
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::GatewayConfig;
pub use schema::InterceptConfig;
pub use schema::InterceptMode;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
