//! Reverse proxy primitive.
//!
//! # Responsibilities
//! - Forward an already-rewritten request over a pluggable transport
//! - Strip hop-by-hop headers in both directions
//! - Relay upstream status, headers and body unmodified otherwise
//!
//! # Design Decisions
//! - No routing: the request URI must already carry scheme and host
//! - Dispatching without a host is a programmer error and panics
//! - Transport failures become 502 Bad Gateway

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, Request, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::proxy::handler::ExitHandler;
use crate::proxy::transport::{HttpTransport, Transport, TransportOptions};

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
];

/// Stateless forwarding handler.
#[derive(Clone)]
pub struct ReverseProxy {
    transport: Arc<dyn Transport>,
}

impl ReverseProxy {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// A proxy that talks to upstreams directly.
    pub fn direct(options: &TransportOptions) -> Result<Self, reqwest::Error> {
        Ok(Self::new(Arc::new(HttpTransport::direct(options)?)))
    }
}

impl std::fmt::Debug for ReverseProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReverseProxy").finish_non_exhaustive()
    }
}

#[async_trait]
impl ExitHandler for ReverseProxy {
    async fn handle(&self, mut req: Request<Body>) -> Response {
        let has_host = req.uri().host().is_some_and(|h| !h.is_empty());
        assert!(has_host, "ReverseProxy requires the request URI host to be set");

        strip_hop_by_hop(req.headers_mut());

        let uri = req.uri().clone();
        match self.transport.round_trip(req).await {
            Ok(mut response) => {
                strip_hop_by_hop(response.headers_mut());
                response
            }
            Err(e) => {
                tracing::warn!(uri = %uri, error = %e, "Upstream request failed");
                (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
            }
        }
    }
}

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    // Framing is re-derived by the next hop
    headers.remove(header::TRANSFER_ENCODING);
}
