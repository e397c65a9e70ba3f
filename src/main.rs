//! GeoSwitch
//!
//! Geo-routing HTTP egress proxy backed by per-exit VPN containers.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http::server ──▶ intent pipeline ──▶ exit resolver
//!                                                         │
//!                                                         ▼
//!                                              provider (container per exit)
//!                                                         │
//!     Client ◀── reverse proxy ◀── forward proxy (gluetun-<exit>:8888) ◀── Upstream
//! ```

use std::path::PathBuf;

use clap::Parser;

use geoswitch::config::load_config;
use geoswitch::lifecycle;
use geoswitch::observability::logging;

#[derive(Debug, Parser)]
#[command(name = "geoswitch", version, about = "Geo-routing HTTP egress proxy")]
struct Cli {
    /// Path to the configuration file (TOML, or YAML by extension).
    #[arg(short, long, default_value = "geoswitch.toml")]
    config: PathBuf,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        exits = config.routing.exits.len(),
        default_exit = %config.routing.default_exit,
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded, geoswitch starting"
    );

    lifecycle::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
