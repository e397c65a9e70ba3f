//! Startup orchestration.
//!
//! # Responsibilities
//! - Install the metrics exporter when enabled
//! - Connect to the container engine and build the provider
//! - Wire intent pipeline, resolver and provider into the HTTP server
//! - Serve until shutdown, then drain and stop exit containers

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::InvalidHeaderName;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::time::Instant;

use crate::config::{GeoSwitchConfig, TimeoutConfig};
use crate::http::{HttpServer, ProxyHandler};
use crate::intent::IntentPipeline;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::observability::metrics;
use crate::provider::{ContainerProvider, DockerEngine, EngineError, ExitHandlerProvider};
use crate::proxy::TransportOptions;
use crate::routing::ExitResolver;

/// Fatal errors while starting or running the service.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid exit header: {0}")]
    ExitHeader(#[from] InvalidHeaderName),

    #[error("container engine unavailable: {0}")]
    Engine(#[from] EngineError),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}

pub fn transport_options(timeouts: &TimeoutConfig) -> TransportOptions {
    TransportOptions {
        connect_timeout: Duration::from_secs(timeouts.connect_secs),
    }
}

/// Assemble the request orchestrator over `provider`.
pub fn build_handler(
    config: &GeoSwitchConfig,
    provider: Arc<dyn ExitHandlerProvider>,
) -> Result<ProxyHandler, StartupError> {
    let pipeline = IntentPipeline::from_config(&config.intent)?;
    let resolver = ExitResolver::new(Arc::new(config.routing.clone()));
    Ok(ProxyHandler::new(pipeline, resolver, provider))
}

/// Run the service with the Docker-backed provider until a termination signal.
pub async fn run(config: GeoSwitchConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr);
    }

    let engine = DockerEngine::connect().await?;
    let provider: Arc<dyn ExitHandlerProvider> = Arc::new(ContainerProvider::new(
        engine,
        config.container.clone(),
        transport_options(&config.timeouts),
    ));

    tracing::info!(
        network = %config.container.network,
        image = %config.container.image,
        exits = config.routing.exits.len(),
        default_exit = %config.routing.default_exit,
        "Container provider ready"
    );

    let address = config.listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    serve(listener, &config, provider, shutdown).await
}

/// Serve on `listener` until `shutdown` fires, then drain requests and shut
/// the provider down. Each phase is bounded by `timeouts.shutdown_secs`.
pub async fn serve(
    listener: TcpListener,
    config: &GeoSwitchConfig,
    provider: Arc<dyn ExitHandlerProvider>,
    shutdown: Shutdown,
) -> Result<(), StartupError> {
    let handler = Arc::new(build_handler(config, Arc::clone(&provider))?);
    let server = HttpServer::new(config, handler);

    let signal = shutdown.clone();
    let mut server_task = tokio::spawn(server.run(listener, async move { signal.wait().await }));

    let finished = tokio::select! {
        result = &mut server_task => Some(result),
        _ = shutdown.wait() => None,
    };

    let budget = Duration::from_secs(config.timeouts.shutdown_secs);
    let served = match finished {
        Some(result) => result,
        None => match tokio::time::timeout_at(Instant::now() + budget, &mut server_task).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(budget_secs = budget.as_secs(), "Drain deadline exceeded, aborting in-flight requests");
                server_task.abort();
                Ok(Ok(()))
            }
        },
    };

    match tokio::time::timeout(budget, provider.shutdown()).await {
        Ok(Ok(())) => tracing::info!("Exit handlers released"),
        Ok(Err(e)) => tracing::warn!(error = %e, "Provider shutdown completed with errors"),
        Err(_) => tracing::warn!(budget_secs = budget.as_secs(), "Provider shutdown deadline exceeded"),
    }

    match served {
        Ok(result) => result.map_err(StartupError::Serve),
        Err(e) => Err(StartupError::Serve(io::Error::other(e))),
    }
}
