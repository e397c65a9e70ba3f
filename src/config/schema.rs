//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::validation::ValidationError;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GeoSwitchConfig {
    /// Exit routing policy (`default_exit` and `exits` at the top level).
    #[serde(flatten)]
    pub routing: RoutingConfig,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// How exit and target are extracted from requests.
    pub intent: IntentConfig,

    /// Container provider settings.
    pub container: ContainerSettings,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// The routing policy: which exits exist and which one is used by default.
///
/// Immutable once validated; shared via `Arc` by the resolver.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RoutingConfig {
    /// Exit used when a request does not name one.
    pub default_exit: String,

    /// Declared exits keyed by name. Sorted so validation is deterministic.
    pub exits: BTreeMap<String, ExitConfig>,
}

impl RoutingConfig {
    /// Look up an exit by its exact (normalized) name.
    pub fn exit(&self, name: &str) -> Option<&ExitConfig> {
        self.exits.get(name)
    }

    /// Lowercase every exit name and the default exit.
    ///
    /// Fails if two declared exits differ only in case; the policy is left
    /// untouched in that case.
    pub fn normalize(&mut self) -> Result<(), ValidationError> {
        let mut exits = BTreeMap::new();
        for (name, exit) in &self.exits {
            let key = name.to_ascii_lowercase();
            if exits.insert(key.clone(), exit.clone()).is_some() {
                return Err(ValidationError::DuplicateExit(key));
            }
        }
        self.exits = exits;
        self.default_exit = self.default_exit.to_ascii_lowercase();
        Ok(())
    }
}

/// Declarative descriptor of one exit.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ExitConfig {
    /// Provider kind backing this exit (e.g. "gluetun").
    #[serde(default)]
    pub provider: String,

    /// Country the exit should egress from.
    #[serde(default)]
    pub country: String,
}

impl ExitConfig {
    pub fn new(provider: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            country: country.into(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Intent parsing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IntentConfig {
    /// Header naming the exit explicitly. Empty disables header parsing.
    pub exit_header: String,

    /// Run the header parser before the path parser.
    pub header_precedence: bool,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            exit_header: "X-GeoSwitch-Exit".to_string(),
            header_precedence: true,
        }
    }
}

/// Settings for the container-orchestrating provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContainerSettings {
    /// Managed network every exit container is attached to.
    pub network: String,

    /// VPN gateway image reference.
    pub image: String,

    /// Prefix of the per-exit container name.
    pub container_prefix: String,

    /// Port of the forward proxy exposed inside each container.
    pub proxy_port: u16,

    /// Interval between health polls in milliseconds.
    pub health_poll_interval_ms: u64,

    /// Budget for a container to become healthy, from provisioning start.
    pub health_timeout_secs: u64,

    /// Per-container stop timeout in seconds.
    pub stop_timeout_secs: u64,

    /// Passed to the container as `VPN_SERVICE_PROVIDER`.
    pub vpn_service_provider: String,

    /// Passed to the container as `OPENVPN_USER`.
    pub openvpn_user: String,

    /// Passed to the container as `OPENVPN_PASSWORD`.
    pub openvpn_password: String,
}

impl ContainerSettings {
    pub fn health_poll_interval(&self) -> Duration {
        Duration::from_millis(self.health_poll_interval_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            network: "gluetun".to_string(),
            image: "qmcgaw/gluetun:latest".to_string(),
            container_prefix: "gluetun-".to_string(),
            proxy_port: 8888,
            health_poll_interval_ms: 1000,
            health_timeout_secs: 60,
            stop_timeout_secs: 10,
            vpn_service_provider: env_or_empty("VPN_SERVICE_PROVIDER"),
            openvpn_user: env_or_empty("OPENVPN_USER"),
            openvpn_password: env_or_empty("OPENVPN_PASSWORD"),
        }
    }
}

fn env_or_empty(key: &str) -> String {
    std::env::var(key).unwrap_or_default()
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    /// Must leave room for first-time exit provisioning.
    pub request_secs: u64,

    /// Budget for provider cleanup at shutdown in seconds.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            request_secs: 120,
            shutdown_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
