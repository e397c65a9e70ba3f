//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Rewritten request (absolute URI, Host set by the orchestrator)
//!     → reverse.rs (precondition check, hop-by-hop stripping)
//!     → transport.rs (direct, or via the exit's forward proxy)
//!     → Upstream response relayed back unmodified
//! ```

pub mod handler;
pub mod reverse;
pub mod transport;

pub use handler::{ExitHandler, SharedHandler};
pub use reverse::ReverseProxy;
pub use transport::{HttpTransport, Transport, TransportError, TransportOptions};
