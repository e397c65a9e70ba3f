//! Request intent subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, query, headers)
//!     → context.rs (split path into segments)
//!     → pipeline.rs (run parsers in configured order)
//!     → parser.rs (header exit, path target + exit)
//!     → Intent: optional target URL, optional exit, leftover segments
//! ```
//!
//! # Design Decisions
//! - Parsers are pure functions over the context; no I/O
//! - First parser to claim a field wins; later parsers leave it alone
//! - A parser error aborts the chain and becomes a 400

pub mod context;
pub mod parser;
pub mod pipeline;

pub use context::{split_path, Intent, RequestContext};
pub use parser::{HeaderExitParser, IntentParser, ParseError, PathIntentParser};
pub use pipeline::IntentPipeline;
