//! Client-facing error responses.
//!
//! # Design Decisions
//! - Anything wrong with the request itself (intent, target, exit name) is 400
//! - Failing to obtain an exit handler is 502; the exit is the gateway
//! - Upstream responses are never rewritten here

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::intent::ParseError;
use crate::provider::ProvisionError;
use crate::routing::ResolutionError;

/// Why a request could not be handed to an exit.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("could not parse request: {0}")]
    Intent(#[from] ParseError),

    #[error("no target URL in request")]
    MissingTarget,

    #[error("unsupported target scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("exit unavailable: {0}")]
    Provision(#[from] ProvisionError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Provision(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
