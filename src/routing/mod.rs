//! Exit routing subsystem.
//!
//! # Data Flow
//! ```text
//! Parsed exit name (or none)
//!     → resolver.rs (default fallback, lookup in validated config)
//!     → Return: canonical exit name + ExitConfig, or UnknownExit
//! ```
//!
//! # Design Decisions
//! - Config compiled at startup, immutable at runtime
//! - Deterministic: same input always resolves to the same exit
//! - Explicit UnknownExit rather than silent fallback to the default

pub mod resolver;

pub use resolver::{ExitResolver, ResolutionError, ResolvedExit};
