//! Provider error types.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::provider::engine::{EngineError, HealthStatus};

/// Failure to produce a handler for an exit.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("no handler registered for exit '{exit}'")]
    NoHandler { exit: String },

    #[error("exit '{exit}': failed to ensure network '{network}': {source}")]
    Network {
        exit: String,
        network: String,
        #[source]
        source: EngineError,
    },

    #[error("exit '{exit}': failed to pull image '{image}': {source}")]
    Image {
        exit: String,
        image: String,
        #[source]
        source: EngineError,
    },

    #[error("exit '{exit}': failed to {action} container '{container}': {source}")]
    Container {
        exit: String,
        container: String,
        action: &'static str,
        #[source]
        source: EngineError,
    },

    #[error("exit '{exit}': container '{container}' became unhealthy")]
    Unhealthy { exit: String, container: String },

    #[error("exit '{exit}': container '{container}' not healthy after {timeout:?}")]
    HealthTimeout {
        exit: String,
        container: String,
        timeout: Duration,
    },

    #[error("exit '{exit}': container '{container}' has no health check")]
    NoHealthcheck { exit: String, container: String },

    #[error("exit '{exit}': container '{container}' is {status}")]
    NotHealthy {
        exit: String,
        container: String,
        status: HealthStatus,
    },

    #[error("exit '{exit}': container '{container}' no longer exists")]
    ContainerGone { exit: String, container: String },

    #[error("exit '{exit}': failed to build transport: {reason}")]
    Transport { exit: String, reason: String },

    #[error("provider closed")]
    Closed,

    #[error("exit '{exit}': provisioning aborted: {reason}")]
    Aborted { exit: String, reason: String },
}

/// One container that could not be stopped during shutdown.
#[derive(Debug)]
pub struct StopFailure {
    pub exit: String,
    pub container: String,
    pub error: EngineError,
}

/// Aggregated shutdown failures. Shutdown keeps going past individual errors.
#[derive(Debug, Default)]
pub struct ShutdownError {
    pub failures: Vec<StopFailure>,
    pub close: Option<EngineError>,
}

impl ShutdownError {
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty() && self.close.is_none()
    }
}

impl fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shutdown failed:")?;
        for failure in &self.failures {
            write!(
                f,
                "\n  - stop exit '{}' container '{}': {}",
                failure.exit, failure.container, failure.error
            )?;
        }
        if let Some(e) = &self.close {
            write!(f, "\n  - close engine: {}", e)?;
        }
        Ok(())
    }
}

impl std::error::Error for ShutdownError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_error_lists_every_failure() {
        let err = ShutdownError {
            failures: vec![
                StopFailure {
                    exit: "kr".into(),
                    container: "gluetun-kr".into(),
                    error: EngineError::Other("boom".into()),
                },
                StopFailure {
                    exit: "us".into(),
                    container: "gluetun-us".into(),
                    error: EngineError::Timeout(Duration::from_secs(15)),
                },
            ],
            close: None,
        };

        let text = err.to_string();
        assert!(text.contains("gluetun-kr"));
        assert!(text.contains("boom"));
        assert!(text.contains("gluetun-us"));
        assert!(!err.is_empty());
    }

    #[test]
    fn test_provision_error_messages() {
        let err = ProvisionError::HealthTimeout {
            exit: "kr".into(),
            container: "gluetun-kr".into(),
            timeout: Duration::from_secs(60),
        };
        assert_eq!(
            err.to_string(),
            "exit 'kr': container 'gluetun-kr' not healthy after 60s"
        );
        assert_eq!(ProvisionError::Closed.to_string(), "provider closed");
    }
}
