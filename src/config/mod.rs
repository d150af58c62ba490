//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → .env + process environment (loader.rs)
//!     → validation.rs (semantic checks)
//!     → WorkerConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults so an empty environment is a valid setup
//! - Malformed env durations fall back to their default with a warning
//! - Validation separates syntactic (serde) from semantic checks

pub mod duration;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, LoadedConfig};
pub use schema::{
    LimitsConfig, ListenerConfig, LogFormat, ObservabilityConfig, TimeoutConfig, WorkerConfig,
};
pub use validation::{validate_config, ValidationError};
