//! HTTP front end.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum, request id, tracing, timeout, panic guard)
//!     → handler.rs (intent → exit → provider → URI rewrite)
//!     → exit handler (reverse proxy over the exit's egress path)
//!     → response.rs (400/502 for requests that never reach an exit)
//! ```

pub mod handler;
pub mod request;
pub mod response;
pub mod server;

pub use handler::ProxyHandler;
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use response::ProxyError;
pub use server::{build_router, HttpServer};
