//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → command-line overrides (binary)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → SessionOptions shared via Arc by every session
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, read_config, ConfigError};
pub use schema::{
    ListenerConfig, ObservabilityConfig, RelayConfig, RemoteConfig, RemoteTlsConfig, RewriteConfig,
};
pub use validation::{validate_config, ValidationError};
