//! Container engine abstraction.
//!
//! The container provider only needs a handful of daemon operations. They are
//! gathered behind `ContainerEngine` so the provider can run against the
//! Docker daemon in production and against an in-memory double in tests.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Failure reported by the container engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("docker: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("engine call timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}

/// Health as reported by the container's own health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Starting,
    Healthy,
    Unhealthy,
    /// The image defines no health check.
    None,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Starting => "starting",
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::None => "none",
        };
        f.write_str(s)
    }
}

/// Snapshot of an existing container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub running: bool,
    pub health: HealthStatus,
}

/// A host device exposed to a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSpec {
    pub path_on_host: String,
    pub path_in_container: String,
    pub cgroup_permissions: String,
}

/// Everything needed to create one exit container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub env: Vec<String>,
    pub network: String,
    pub cap_add: Vec<String>,
    pub devices: Vec<DeviceSpec>,
    pub auto_remove: bool,
}

impl ContainerSpec {
    /// Value of environment variable `key`, if `env` sets it.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.iter().find_map(|entry| {
            entry
                .split_once('=')
                .filter(|(k, _)| *k == key)
                .map(|(_, v)| v)
        })
    }
}

/// Daemon operations used by the container provider.
#[async_trait]
pub trait ContainerEngine: Send + Sync + 'static {
    async fn network_exists(&self, name: &str) -> Result<bool, EngineError>;

    async fn create_network(&self, name: &str) -> Result<(), EngineError>;

    async fn image_exists(&self, image: &str) -> Result<bool, EngineError>;

    /// Pull `image`, returning only once the pull has fully completed.
    async fn pull_image(&self, image: &str) -> Result<(), EngineError>;

    /// Inspect a container by name or id. `Ok(None)` means it does not exist.
    async fn inspect_container(&self, name_or_id: &str) -> Result<Option<ContainerInfo>, EngineError>;

    /// Create a container and return its id.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, EngineError>;

    async fn start_container(&self, id: &str) -> Result<(), EngineError>;

    /// Stop a container, allowing it `grace` before it is killed.
    async fn stop_container(&self, id: &str, grace: Duration) -> Result<(), EngineError>;

    /// Follow container output into the process log until `cancel` fires or
    /// the stream ends.
    async fn follow_logs(&self, id: &str, cancel: CancellationToken) -> Result<(), EngineError>;

    /// Release the client connection.
    async fn close(&self) -> Result<(), EngineError>;
}
