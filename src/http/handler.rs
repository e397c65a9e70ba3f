//! Request orchestration.
//!
//! # Responsibilities
//! - Extract the intent (target URL, optional exit) from the request
//! - Resolve the exit and obtain its handler from the provider
//! - Rewrite the request to the target and hand it over
//! - Record per-exit request metrics

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::OriginalUri;
use axum::http::{header, HeaderValue, Request, Uri};
use axum::response::{IntoResponse, Response};
use url::Url;

use crate::http::response::ProxyError;
use crate::intent::IntentPipeline;
use crate::observability::metrics;
use crate::provider::ExitHandlerProvider;
use crate::routing::ExitResolver;

/// Ties intent parsing, exit resolution and the provider together.
pub struct ProxyHandler {
    pipeline: IntentPipeline,
    resolver: ExitResolver,
    provider: Arc<dyn ExitHandlerProvider>,
}

impl ProxyHandler {
    pub fn new(
        pipeline: IntentPipeline,
        resolver: ExitResolver,
        provider: Arc<dyn ExitHandlerProvider>,
    ) -> Self {
        Self {
            pipeline,
            resolver,
            provider,
        }
    }

    pub fn provider(&self) -> &Arc<dyn ExitHandlerProvider> {
        &self.provider
    }

    pub async fn handle(&self, req: Request<Body>) -> Response {
        let start = Instant::now();
        let mut exit = None;

        let response = match self.dispatch(req, &mut exit).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    exit = exit.as_deref().unwrap_or("-"),
                    status = e.status().as_u16(),
                    error = %e,
                    "Request rejected"
                );
                e.into_response()
            }
        };

        metrics::record_request(
            exit.as_deref().unwrap_or("none"),
            response.status().as_u16(),
            start,
        );
        response
    }

    async fn dispatch(
        &self,
        mut req: Request<Body>,
        exit: &mut Option<String>,
    ) -> Result<Response, ProxyError> {
        let intent = self.pipeline.parse(&req)?.into_intent();

        let target = intent.target.ok_or(ProxyError::MissingTarget)?;
        if !matches!(target.scheme(), "http" | "https") {
            return Err(ProxyError::UnsupportedScheme(target.scheme().to_string()));
        }

        if !intent.remaining_path.is_empty() {
            tracing::debug!(remaining = ?intent.remaining_path, "Unconsumed path segments");
        }

        let resolved = self.resolver.resolve(intent.exit.as_deref())?;
        *exit = Some(resolved.name.clone());

        let handler = self
            .provider
            .get_handler(&resolved.name, &resolved.config)
            .await?;

        let (uri, authority) = target_uri(&target)?;
        let host = HeaderValue::from_str(&authority)
            .map_err(|e| ProxyError::InvalidTarget(e.to_string()))?;

        tracing::debug!(exit = %resolved.name, target = %uri, "Forwarding request");

        *req.uri_mut() = uri;
        req.headers_mut().insert(header::HOST, host);
        req.extensions_mut().remove::<OriginalUri>();

        Ok(handler.handle(req).await)
    }
}

/// Outbound URI (fragment dropped) and `host[:port]` authority for `target`.
fn target_uri(target: &Url) -> Result<(Uri, String), ProxyError> {
    let host = target
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or(ProxyError::MissingTarget)?;

    let authority = match target.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    let mut path_and_query = target.path().to_string();
    if let Some(query) = target.query() {
        path_and_query.push('?');
        path_and_query.push_str(query);
    }

    let uri = Uri::builder()
        .scheme(target.scheme())
        .authority(authority.as_str())
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| ProxyError::InvalidTarget(e.to_string()))?;

    Ok((uri, authority))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_uri_keeps_port_and_query() {
        let target = Url::parse("https://example.com:8443/a/b?x=1&y=2#frag").unwrap();
        let (uri, authority) = target_uri(&target).unwrap();

        assert_eq!(uri.to_string(), "https://example.com:8443/a/b?x=1&y=2");
        assert_eq!(authority, "example.com:8443");
    }

    #[test]
    fn test_target_uri_default_port_omitted() {
        let target = Url::parse("http://example.com:80").unwrap();
        let (uri, authority) = target_uri(&target).unwrap();

        assert_eq!(uri.to_string(), "http://example.com/");
        assert_eq!(authority, "example.com");
    }

    #[test]
    fn test_target_uri_ipv6() {
        let target = Url::parse("http://[::1]:3000/x").unwrap();
        let (_, authority) = target_uri(&target).unwrap();
        assert_eq!(authority, "[::1]:3000");
    }
}
