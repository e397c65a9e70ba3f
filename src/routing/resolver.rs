//! Exit resolution.
//!
//! # Responsibilities
//! - Map a parsed exit name (or none) to a canonical name and its config
//! - Fall back to the default exit when the request named none
//! - Reject names the configuration does not declare
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Relies on `RoutingConfig::validate` having run: the default exit exists
//! - Names are compared in lowercase, matching how the loader stores them

use std::sync::Arc;

use thiserror::Error;

use crate::config::{ExitConfig, RoutingConfig};

/// A parsed exit name that the configuration does not declare. Maps to 400.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("unknown exit '{0}'")]
    UnknownExit(String),

    #[error("default exit '{0}' not defined")]
    MissingDefault(String),
}

/// An exit chosen for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedExit {
    pub name: String,
    pub config: ExitConfig,
}

/// Resolves exits against the validated routing policy.
#[derive(Debug, Clone)]
pub struct ExitResolver {
    config: Arc<RoutingConfig>,
}

impl ExitResolver {
    pub fn new(config: Arc<RoutingConfig>) -> Self {
        Self { config }
    }

    /// Resolve `requested`, treating `None` and blank names as "use the default".
    pub fn resolve(&self, requested: Option<&str>) -> Result<ResolvedExit, ResolutionError> {
        let requested = requested.map(str::trim).filter(|name| !name.is_empty());

        let Some(requested) = requested else {
            let name = &self.config.default_exit;
            // Unreachable for a validated config
            let config = self
                .config
                .exit(name)
                .ok_or_else(|| ResolutionError::MissingDefault(name.clone()))?;
            tracing::debug!(exit = %name, "Using default exit");
            return Ok(ResolvedExit {
                name: name.clone(),
                config: config.clone(),
            });
        };

        let name = requested.to_ascii_lowercase();
        match self.config.exit(&name) {
            Some(config) => Ok(ResolvedExit {
                name,
                config: config.clone(),
            }),
            None => Err(ResolutionError::UnknownExit(requested.to_string())),
        }
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }
}
