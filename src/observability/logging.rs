//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber
//! - Apply the configured level unless `RUST_LOG` overrides it
//!
//! # Design Decisions
//! - Container output is logged under the `geoswitch::container` target so it
//!   can be filtered independently of the proxy's own events

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Target used for lines forwarded from exit containers.
pub const CONTAINER_TARGET: &str = "geoswitch::container";

/// Build the filter: `RUST_LOG` if set, else `level` for this crate and tower-http.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("geoswitch={level},tower_http={level}")))
}

/// Install the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init_logging(level: &str) {
    let result = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
