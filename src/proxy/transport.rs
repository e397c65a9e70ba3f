//! Upstream transports.
//!
//! # Responsibilities
//! - Send a rewritten request to its upstream and stream the response back
//! - Optionally tunnel through an HTTP forward proxy (one per exit)
//!
//! # Design Decisions
//! - Redirects are never followed; the caller sees the upstream's 3xx
//! - Bodies are streamed in both directions, never buffered
//! - Empty request bodies are not sent chunked

use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, HttpBody};
use axum::http::Request;
use axum::response::Response;
use thiserror::Error;
use url::Url;

/// Failure to complete an upstream exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

/// Moves a request to its upstream.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, req: Request<Body>) -> Result<Response, TransportError>;
}

/// Options shared by every `HttpTransport`.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub connect_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// A reqwest-backed transport, either direct or through a forward proxy.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    proxy: Option<Url>,
}

impl HttpTransport {
    /// Connect straight to upstreams, ignoring proxy environment variables.
    pub fn direct(options: &TransportOptions) -> Result<Self, reqwest::Error> {
        let client = Self::builder(options).no_proxy().build()?;
        Ok(Self { client, proxy: None })
    }

    /// Send every request (HTTP and HTTPS) through the forward proxy at `proxy`.
    pub fn via_proxy(proxy: Url, options: &TransportOptions) -> Result<Self, reqwest::Error> {
        let client = Self::builder(options)
            .proxy(reqwest::Proxy::all(proxy.as_str())?)
            .build()?;
        Ok(Self {
            client,
            proxy: Some(proxy),
        })
    }

    fn builder(options: &TransportOptions) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(options.connect_timeout)
    }

    /// The forward proxy in use, if any.
    pub fn proxy(&self) -> Option<&Url> {
        self.proxy.as_ref()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn round_trip(&self, req: Request<Body>) -> Result<Response, TransportError> {
        let (parts, body) = req.into_parts();

        let mut outbound = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers);

        if body.size_hint().exact() != Some(0) {
            outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let upstream = outbound.send().await?;

        let status = upstream.status();
        let headers = upstream.headers().clone();

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}
