//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → MoxConfig (validated, immutable)
//!     → consumed once by MoxServer::new
//! ```
//!
//! # Design Decisions
//! - Config is constructor-time only; the pipeline never reads it directly
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    LimitsConfig, ListenerConfig, MoxConfig, ObservabilityConfig, RouteConfig, StepConfig,
    TimeoutConfig,
};
