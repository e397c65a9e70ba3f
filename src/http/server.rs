//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router; every path and method goes to the proxy handler
//! - Wire up middleware (request id, tracing, timeout, panic guard)
//! - Serve on a bound listener until the shutdown signal fires

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, extract::State, http::Request, response::Response, Router};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GeoSwitchConfig;
use crate::http::handler::ProxyHandler;
use crate::http::request::{propagate_request_id_layer, request_span, set_request_id_layer};

/// HTTP server for the geo-routing proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &GeoSwitchConfig, handler: Arc<ProxyHandler>) -> Self {
        let timeout = Duration::from_secs(config.timeouts.request_secs);
        Self {
            router: build_router(handler, timeout),
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(handler: Arc<ProxyHandler>, request_timeout: Duration) -> Router {
    Router::new()
        .fallback(proxy_entry)
        .with_state(handler)
        .layer(
            ServiceBuilder::new()
                .layer(set_request_id_layer())
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(propagate_request_id_layer())
                .layer(CatchPanicLayer::new())
                .layer(TimeoutLayer::new(request_timeout)),
        )
}

async fn proxy_entry(State(handler): State<Arc<ProxyHandler>>, req: Request<Body>) -> Response {
    handler.handle(req).await
}
