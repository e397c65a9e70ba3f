//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (default exit references a declared exit)
//! - Validate value ranges (timeouts > 0, ports valid)
//!
//! # Design Decisions
//! - The routing policy fails fast on its first problem, in a fixed order
//! - Whole-file validation returns all errors, not just first
//! - Validation is pure: GeoSwitchConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;

use crate::config::schema::{GeoSwitchConfig, RoutingConfig};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("default_exit is required")]
    MissingDefaultExit,

    #[error("at least one exit must be defined")]
    NoExits,

    #[error("default_exit '{0}' is not defined in exits")]
    UnknownDefaultExit(String),

    #[error("exit '{0}' is declared more than once (names are case-insensitive)")]
    DuplicateExit(String),

    #[error("exit '{0}': provider is required")]
    MissingProvider(String),

    #[error("exit '{0}': country is required")]
    MissingCountry(String),

    #[error("listener.bind_address '{0}' is not a socket address")]
    InvalidBindAddress(String),

    #[error("intent.exit_header '{0}' is not a valid header name")]
    InvalidExitHeader(String),

    #[error("container.{0} must not be empty")]
    EmptyContainerField(&'static str),

    #[error("container.proxy_port must be non-zero")]
    ZeroProxyPort,

    #[error("container.{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("container.health_poll_interval_ms must be shorter than the health timeout")]
    PollIntervalTooLong,
}

impl RoutingConfig {
    /// Check the routing policy, stopping at the first problem.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.default_exit.is_empty() {
            return Err(ValidationError::MissingDefaultExit);
        }

        if self.exits.is_empty() {
            return Err(ValidationError::NoExits);
        }

        if !self.exits.contains_key(&self.default_exit) {
            return Err(ValidationError::UnknownDefaultExit(self.default_exit.clone()));
        }

        for (name, exit) in &self.exits {
            if exit.provider.is_empty() {
                return Err(ValidationError::MissingProvider(name.clone()));
            }
            if exit.country.is_empty() {
                return Err(ValidationError::MissingCountry(name.clone()));
            }
        }

        Ok(())
    }
}

/// Validate a whole configuration file, collecting every problem found.
pub fn validate_config(config: &GeoSwitchConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = config.routing.validate() {
        errors.push(e);
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let header = &config.intent.exit_header;
    if !header.is_empty() && HeaderName::from_bytes(header.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidExitHeader(header.clone()));
    }

    let container = &config.container;
    if container.network.is_empty() {
        errors.push(ValidationError::EmptyContainerField("network"));
    }
    if container.image.is_empty() {
        errors.push(ValidationError::EmptyContainerField("image"));
    }
    if container.proxy_port == 0 {
        errors.push(ValidationError::ZeroProxyPort);
    }
    if container.health_timeout_secs == 0 {
        errors.push(ValidationError::ZeroDuration("health_timeout_secs"));
    }
    if container.health_poll_interval_ms == 0 {
        errors.push(ValidationError::ZeroDuration("health_poll_interval_ms"));
    } else if container.health_timeout_secs > 0
        && container.health_poll_interval() >= container.health_timeout()
    {
        errors.push(ValidationError::PollIntervalTooLong);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ExitConfig;

    fn routing(default_exit: &str, exits: &[(&str, &str, &str)]) -> RoutingConfig {
        RoutingConfig {
            default_exit: default_exit.to_string(),
            exits: exits
                .iter()
                .map(|(name, provider, country)| (name.to_string(), ExitConfig::new(*provider, *country)))
                .collect(),
        }
    }

    #[test]
    fn test_valid_routing() {
        let cfg = routing("us-exit", &[("us-exit", "aws", "US"), ("eu-exit", "gcp", "DE")]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_missing_default_exit() {
        let err = routing("", &[("us-exit", "aws", "US")]).validate().unwrap_err();
        assert_eq!(err.to_string(), "default_exit is required");
    }

    #[test]
    fn test_no_exits() {
        let err = routing("us-exit", &[]).validate().unwrap_err();
        assert_eq!(err.to_string(), "at least one exit must be defined");
    }

    #[test]
    fn test_default_exit_not_declared() {
        let err = routing("nonexistent", &[("us-exit", "aws", "US")]).validate().unwrap_err();
        assert_eq!(err.to_string(), "default_exit 'nonexistent' is not defined in exits");
    }

    #[test]
    fn test_exit_missing_provider() {
        let err = routing("us-exit", &[("us-exit", "", "US")]).validate().unwrap_err();
        assert_eq!(err.to_string(), "exit 'us-exit': provider is required");
    }

    #[test]
    fn test_exit_missing_country() {
        let err = routing("us-exit", &[("us-exit", "aws", "")]).validate().unwrap_err();
        assert_eq!(err.to_string(), "exit 'us-exit': country is required");
    }

    #[test]
    fn test_messages_are_distinct() {
        let errors = [
            ValidationError::MissingDefaultExit,
            ValidationError::NoExits,
            ValidationError::UnknownDefaultExit("x".into()),
            ValidationError::MissingProvider("x".into()),
            ValidationError::MissingCountry("x".into()),
        ];
        let mut messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), errors.len());
    }

    #[test]
    fn test_validate_config_collects_all_errors() {
        let mut config = GeoSwitchConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.container.image = String::new();
        config.container.proxy_port = 0;
        config.intent.exit_header = "bad header".into();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::MissingDefaultExit));
        assert!(errors.contains(&ValidationError::InvalidBindAddress("not-an-address".into())));
        assert!(errors.contains(&ValidationError::EmptyContainerField("image")));
        assert!(errors.contains(&ValidationError::ZeroProxyPort));
        assert!(errors.contains(&ValidationError::InvalidExitHeader("bad header".into())));
    }

    #[test]
    fn test_poll_interval_must_be_shorter_than_timeout() {
        let mut config = GeoSwitchConfig::default();
        config.routing = routing("kr", &[("kr", "gluetun", "Korea")]);
        config.container.health_timeout_secs = 1;
        config.container.health_poll_interval_ms = 1000;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::PollIntervalTooLong]);
    }
}
