//! Docker-backed container engine.
//!
//! # Responsibilities
//! - Connect to the local Docker daemon (socket or DOCKER_HOST)
//! - Translate engine calls into Docker API requests via bollard
//! - Map "not found" and "already in that state" responses to non-errors
//! - Follow container logs into the process log

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, LogsOptions, NetworkingConfig,
    StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use bollard::models::{DeviceMapping, EndpointSettings, HealthStatusEnum, HostConfig};
use bollard::network::{CreateNetworkOptions, InspectNetworkOptions};
use bollard::Docker;
use futures_util::{StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;

use crate::provider::engine::{ContainerEngine, ContainerInfo, ContainerSpec, EngineError, HealthStatus};

/// `ContainerEngine` talking to a Docker daemon.
#[derive(Debug, Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect using local defaults and negotiate the API version.
    pub async fn connect() -> Result<Self, EngineError> {
        let docker = Docker::connect_with_local_defaults()?
            .negotiate_version()
            .await?;

        tracing::info!(
            api_version = ?docker.client_version(),
            "Docker client initialised"
        );

        Ok(Self { docker })
    }

    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }
}

fn has_status(err: &DockerError, code: u16) -> bool {
    matches!(err, DockerError::DockerResponseServerError { status_code, .. } if *status_code == code)
}

fn health_of(status: Option<HealthStatusEnum>) -> HealthStatus {
    match status {
        Some(HealthStatusEnum::HEALTHY) => HealthStatus::Healthy,
        Some(HealthStatusEnum::UNHEALTHY) => HealthStatus::Unhealthy,
        Some(HealthStatusEnum::STARTING) => HealthStatus::Starting,
        _ => HealthStatus::None,
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn network_exists(&self, name: &str) -> Result<bool, EngineError> {
        match self
            .docker
            .inspect_network(name, None::<InspectNetworkOptions<String>>)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if has_status(&e, 404) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_network(&self, name: &str) -> Result<(), EngineError> {
        let options = CreateNetworkOptions {
            name: name.to_string(),
            driver: "bridge".to_string(),
            ..Default::default()
        };

        match self.docker.create_network(options).await {
            Ok(_) => Ok(()),
            // Created by someone else in the meantime
            Err(e) if has_status(&e, 409) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn image_exists(&self, image: &str) -> Result<bool, EngineError> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(e) if has_status(&e, 404) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn pull_image(&self, image: &str) -> Result<(), EngineError> {
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };

        // The pull only completes once its progress stream is drained
        let mut progress = Box::pin(self.docker.create_image(Some(options), None, None));
        while let Some(info) = progress.try_next().await? {
            if let Some(status) = info.status {
                tracing::trace!(image = %image, status = %status, "Pull progress");
            }
        }

        Ok(())
    }

    async fn inspect_container(&self, name_or_id: &str) -> Result<Option<ContainerInfo>, EngineError> {
        let response = match self
            .docker
            .inspect_container(name_or_id, None::<InspectContainerOptions>)
            .await
        {
            Ok(response) => response,
            Err(e) if has_status(&e, 404) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let state = response.state.unwrap_or_default();
        Ok(Some(ContainerInfo {
            id: response.id.unwrap_or_default(),
            running: state.running.unwrap_or(false),
            health: health_of(state.health.and_then(|h| h.status)),
        }))
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, EngineError> {
        let devices = spec
            .devices
            .iter()
            .map(|d| DeviceMapping {
                path_on_host: Some(d.path_on_host.clone()),
                path_in_container: Some(d.path_in_container.clone()),
                cgroup_permissions: Some(d.cgroup_permissions.clone()),
            })
            .collect();

        let host_config = HostConfig {
            auto_remove: Some(spec.auto_remove),
            cap_add: Some(spec.cap_add.clone()),
            devices: Some(devices),
            ..Default::default()
        };

        let mut endpoints_config = HashMap::new();
        endpoints_config.insert(spec.network.clone(), EndpointSettings::default());

        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            host_config: Some(host_config),
            networking_config: Some(NetworkingConfig { endpoints_config }),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            ..Default::default()
        };

        let response = self.docker.create_container(Some(options), config).await?;
        for warning in &response.warnings {
            tracing::warn!(container = %spec.name, warning = %warning, "Docker warning on create");
        }
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn stop_container(&self, id: &str, grace: Duration) -> Result<(), EngineError> {
        let options = StopContainerOptions {
            t: grace.as_secs() as i64,
        };

        match self.docker.stop_container(id, Some(options)).await {
            Ok(()) => Ok(()),
            // Already stopped, or already removed by auto-remove
            Err(e) if has_status(&e, 304) || has_status(&e, 404) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn follow_logs(&self, id: &str, cancel: CancellationToken) -> Result<(), EngineError> {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            tail: "all".to_string(),
            ..Default::default()
        };

        let mut stream = Box::pin(self.docker.logs(id, Some(options)));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                chunk = stream.next() => match chunk {
                    Some(Ok(output)) => {
                        for line in output.to_string().lines() {
                            let line = line.trim_end();
                            if !line.is_empty() {
                                tracing::info!(target: "geoswitch::container", container = %id, "{}", line);
                            }
                        }
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(()),
                },
            }
        }
    }

    async fn close(&self) -> Result<(), EngineError> {
        // bollard releases its connection pool when the last clone drops
        tracing::info!("Closing docker client");
        Ok(())
    }
}
