//! The handler abstraction shared by providers and the orchestrator.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

/// Something that can serve a fully rewritten request.
///
/// Providers hand these out per exit; the orchestrator invokes them after
/// pointing the request at its target.
#[async_trait]
pub trait ExitHandler: Send + Sync {
    async fn handle(&self, req: Request<Body>) -> Response;
}

impl fmt::Debug for dyn ExitHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExitHandler")
    }
}

/// A handler shared between the provider cache and in-flight requests.
pub type SharedHandler = Arc<dyn ExitHandler>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl ExitHandler for Noop {
        async fn handle(&self, _req: Request<Body>) -> Response {
            Response::new(Body::empty())
        }
    }

    #[test]
    fn test_shared_handler_results_are_debug() {
        let ok: Result<SharedHandler, String> = Ok(Arc::new(Noop));
        assert_eq!(format!("{:?}", ok), "Ok(ExitHandler)");

        let err: Result<SharedHandler, String> = Err("down".into());
        assert_eq!(err.unwrap_err(), "down");
    }
}
