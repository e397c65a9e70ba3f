//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML/YAML)
//!     → loader.rs (parse, deserialize, normalize exit names)
//!     → validation.rs (semantic checks)
//!     → GeoSwitchConfig (validated, immutable)
//!     → RoutingConfig shared via Arc with the exit resolver
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ContainerSettings, ExitConfig, GeoSwitchConfig, IntentConfig, ListenerConfig,
    ObservabilityConfig, RoutingConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
