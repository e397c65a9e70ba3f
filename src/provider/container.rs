//! Container-orchestrating exit provider.
//!
//! # Responsibilities
//! - Bring up one VPN gateway container per exit on first use
//! - Gate the exit on the container's own health check
//! - Cache a forward-proxy handler per exit and re-check health on every hit
//! - Roll back failed provisioning and stop everything on shutdown
//!
//! # Design Decisions
//! - A single `tokio::sync::Mutex` covers the whole provisioning sequence, so
//!   provisioning of one exit blocks cache hits and provisioning of others
//! - The health deadline starts when provisioning acquires the lock
//! - Cache hits on an unhealthy container fail; entries are not evicted
//! - Existing containers with the derived name are reused, and started if stopped

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

use crate::config::{ContainerSettings, ExitConfig};
use crate::observability::metrics;
use crate::provider::docker::DockerEngine;
use crate::provider::engine::{ContainerEngine, ContainerSpec, DeviceSpec, EngineError, HealthStatus};
use crate::provider::error::{ProvisionError, ShutdownError, StopFailure};
use crate::provider::runtime::ExitRuntime;
use crate::provider::ExitHandlerProvider;
use crate::proxy::{HttpTransport, ReverseProxy, SharedHandler, TransportOptions};

/// Extra time allowed on top of the stop timeout before giving up on the daemon.
const STOP_SLACK: Duration = Duration::from_secs(5);

/// Provider that backs every exit with a dedicated gateway container.
pub struct ContainerProvider<E = DockerEngine> {
    inner: Arc<Inner<E>>,
}

struct Inner<E> {
    engine: Arc<E>,
    settings: ContainerSettings,
    transport: TransportOptions,
    state: Mutex<ProviderState>,
}

#[derive(Default)]
struct ProviderState {
    runtimes: HashMap<String, ExitRuntime>,
    closed: bool,
}

impl<E> Clone for ContainerProvider<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> fmt::Debug for ContainerProvider<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerProvider")
            .field("network", &self.inner.settings.network)
            .field("image", &self.inner.settings.image)
            .finish_non_exhaustive()
    }
}

impl<E: ContainerEngine> ContainerProvider<E> {
    pub fn new(engine: E, settings: ContainerSettings, transport: TransportOptions) -> Self {
        Self::with_engine(Arc::new(engine), settings, transport)
    }

    /// Build around an engine shared with the caller.
    pub fn with_engine(engine: Arc<E>, settings: ContainerSettings, transport: TransportOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine,
                settings,
                transport,
                state: Mutex::new(ProviderState::default()),
            }),
        }
    }

    pub fn settings(&self) -> &ContainerSettings {
        &self.inner.settings
    }

    /// Container name used for `exit_name`.
    pub fn container_name(&self, exit_name: &str) -> String {
        self.inner.container_name(exit_name)
    }

    /// Number of tracked exits, including one currently provisioning.
    pub async fn runtime_count(&self) -> usize {
        self.inner.state.lock().await.runtimes.len()
    }

    /// Names of tracked exits, sorted.
    pub async fn tracked_exits(&self) -> Vec<String> {
        let state = self.inner.state.lock().await;
        let mut names: Vec<String> = state.runtimes.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.state.lock().await.closed
    }
}

#[async_trait]
impl<E: ContainerEngine> ExitHandlerProvider for ContainerProvider<E> {
    async fn get_handler(
        &self,
        exit_name: &str,
        exit: &ExitConfig,
    ) -> Result<SharedHandler, ProvisionError> {
        let inner = Arc::clone(&self.inner);
        let name = exit_name.to_ascii_lowercase();
        let config = exit.clone();

        // Detached so a dropped caller cannot leave a half-provisioned exit
        tokio::spawn(async move { inner.get_or_provision(&name, &config).await })
            .await
            .map_err(|e| ProvisionError::Aborted {
                exit: exit_name.to_string(),
                reason: e.to_string(),
            })?
    }

    async fn shutdown(&self) -> Result<(), ShutdownError> {
        self.inner.shutdown().await
    }
}

impl<E: ContainerEngine> Inner<E> {
    fn container_name(&self, exit_name: &str) -> String {
        format!("{}{}", self.settings.container_prefix, exit_name)
    }

    async fn get_or_provision(
        &self,
        exit_name: &str,
        exit: &ExitConfig,
    ) -> Result<SharedHandler, ProvisionError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(ProvisionError::Closed);
        }

        if let Some(runtime) = state.runtimes.get(exit_name) {
            if let Some(handler) = &runtime.handler {
                let handler = Arc::clone(handler);
                let container_id = runtime.container_id.clone();
                let container_name = runtime.container_name.clone();
                self.check_cached(exit_name, &container_name, &container_id)
                    .await?;
                return Ok(handler);
            }
        }

        // Left behind by a provisioning task that never finished
        if let Some(mut stale) = state.runtimes.remove(exit_name) {
            stale.cancel_logs();
        }

        let started = Instant::now();
        match self.provision(&mut state, exit_name, exit, started).await {
            Ok(handler) => {
                tracing::info!(
                    exit = %exit_name,
                    country = %exit.country,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Exit provisioned"
                );
                metrics::record_provision(exit_name, "success");
                metrics::set_active_exits(state.runtimes.len());
                Ok(handler)
            }
            Err(e) => {
                tracing::error!(exit = %exit_name, error = %e, "Exit provisioning failed");
                metrics::record_provision(exit_name, "failure");
                Err(e)
            }
        }
    }

    async fn check_cached(
        &self,
        exit_name: &str,
        container_name: &str,
        container_id: &str,
    ) -> Result<(), ProvisionError> {
        let result = match self.engine.inspect_container(container_id).await {
            Ok(Some(info)) if info.health == HealthStatus::Healthy => return Ok(()),
            Ok(Some(info)) => ProvisionError::NotHealthy {
                exit: exit_name.to_string(),
                container: container_name.to_string(),
                status: info.health,
            },
            Ok(None) => ProvisionError::ContainerGone {
                exit: exit_name.to_string(),
                container: container_name.to_string(),
            },
            Err(source) => ProvisionError::Container {
                exit: exit_name.to_string(),
                container: container_name.to_string(),
                action: "inspect",
                source,
            },
        };

        tracing::warn!(exit = %exit_name, error = %result, "Cached exit is not serving");
        Err(result)
    }

    async fn provision(
        &self,
        state: &mut ProviderState,
        exit_name: &str,
        exit: &ExitConfig,
        started: Instant,
    ) -> Result<SharedHandler, ProvisionError> {
        self.ensure_network(exit_name).await?;

        let container_name = self.container_name(exit_name);
        let container_id = self.ensure_container(exit_name, &container_name, exit).await?;

        let mut runtime = ExitRuntime::new(container_id.clone(), container_name.clone());
        runtime.log_task = Some(self.spawn_log_follower(&runtime));
        state.runtimes.insert(exit_name.to_string(), runtime);

        let ready = match self
            .wait_for_healthy(exit_name, &container_name, &container_id, started)
            .await
        {
            Ok(()) => self.build_handler(exit_name, &container_name),
            Err(e) => Err(e),
        };

        match ready {
            Ok(handler) => {
                if let Some(runtime) = state.runtimes.get_mut(exit_name) {
                    runtime.handler = Some(Arc::clone(&handler));
                }
                Ok(handler)
            }
            Err(e) => {
                if let Some(mut runtime) = state.runtimes.remove(exit_name) {
                    runtime.cancel_logs();
                }
                if let Err(stop_err) = self.stop_bounded(&container_id).await {
                    tracing::warn!(
                        exit = %exit_name,
                        container = %container_name,
                        error = %stop_err,
                        "Failed to stop container during rollback"
                    );
                }
                Err(e)
            }
        }
    }

    async fn ensure_network(&self, exit_name: &str) -> Result<(), ProvisionError> {
        let network = &self.settings.network;
        let to_err = |source: EngineError| ProvisionError::Network {
            exit: exit_name.to_string(),
            network: network.clone(),
            source,
        };

        if !self.engine.network_exists(network).await.map_err(to_err)? {
            tracing::info!(network = %network, "Creating network");
            self.engine.create_network(network).await.map_err(to_err)?;
        }
        Ok(())
    }

    async fn ensure_image(&self, exit_name: &str) -> Result<(), ProvisionError> {
        let image = &self.settings.image;
        let to_err = |source: EngineError| ProvisionError::Image {
            exit: exit_name.to_string(),
            image: image.clone(),
            source,
        };

        if !self.engine.image_exists(image).await.map_err(to_err)? {
            tracing::info!(image = %image, "Pulling image");
            self.engine.pull_image(image).await.map_err(to_err)?;
            tracing::info!(image = %image, "Image pulled");
        }
        Ok(())
    }

    async fn ensure_container(
        &self,
        exit_name: &str,
        container_name: &str,
        exit: &ExitConfig,
    ) -> Result<String, ProvisionError> {
        let to_err = |action: &'static str| {
            move |source: EngineError| ProvisionError::Container {
                exit: exit_name.to_string(),
                container: container_name.to_string(),
                action,
                source,
            }
        };

        let existing = self
            .engine
            .inspect_container(container_name)
            .await
            .map_err(to_err("inspect"))?;

        if let Some(info) = existing {
            tracing::info!(container = %container_name, running = info.running, "Reusing existing container");
            if !info.running {
                self.engine
                    .start_container(&info.id)
                    .await
                    .map_err(to_err("start"))?;
            }
            return Ok(info.id);
        }

        self.ensure_image(exit_name).await?;

        let spec = container_spec(&self.settings, container_name, exit);
        let id = self
            .engine
            .create_container(&spec)
            .await
            .map_err(to_err("create"))?;
        self.engine
            .start_container(&id)
            .await
            .map_err(to_err("start"))?;

        tracing::info!(container = %container_name, id = %id, country = %exit.country, "Container started");
        Ok(id)
    }

    fn spawn_log_follower(&self, runtime: &ExitRuntime) -> tokio::task::JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let cancel = runtime.log_cancel.clone();
        let id = runtime.container_id.clone();
        let name = runtime.container_name.clone();

        tokio::spawn(async move {
            if let Err(e) = engine.follow_logs(&id, cancel).await {
                tracing::warn!(container = %name, error = %e, "Container log stream ended");
            }
        })
    }

    async fn wait_for_healthy(
        &self,
        exit_name: &str,
        container_name: &str,
        container_id: &str,
        started: Instant,
    ) -> Result<(), ProvisionError> {
        let timeout = self.settings.health_timeout();
        let deadline = started + timeout;
        let poll = self.settings.health_poll_interval();

        loop {
            let info = self
                .engine
                .inspect_container(container_id)
                .await
                .map_err(|source| ProvisionError::Container {
                    exit: exit_name.to_string(),
                    container: container_name.to_string(),
                    action: "inspect",
                    source,
                })?;

            let Some(info) = info else {
                return Err(ProvisionError::ContainerGone {
                    exit: exit_name.to_string(),
                    container: container_name.to_string(),
                });
            };

            match info.health {
                HealthStatus::Healthy => return Ok(()),
                HealthStatus::Unhealthy => {
                    return Err(ProvisionError::Unhealthy {
                        exit: exit_name.to_string(),
                        container: container_name.to_string(),
                    })
                }
                HealthStatus::None => {
                    return Err(ProvisionError::NoHealthcheck {
                        exit: exit_name.to_string(),
                        container: container_name.to_string(),
                    })
                }
                HealthStatus::Starting => {
                    tracing::debug!(container = %container_name, "Waiting for container health");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ProvisionError::HealthTimeout {
                    exit: exit_name.to_string(),
                    container: container_name.to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(poll.min(deadline - now)).await;
        }
    }

    fn build_handler(&self, exit_name: &str, container_name: &str) -> Result<SharedHandler, ProvisionError> {
        let to_err = |reason: String| ProvisionError::Transport {
            exit: exit_name.to_string(),
            reason,
        };

        let proxy = Url::parse(&format!("http://{}:{}", container_name, self.settings.proxy_port))
            .map_err(|e| to_err(e.to_string()))?;
        let transport =
            HttpTransport::via_proxy(proxy, &self.transport).map_err(|e| to_err(e.to_string()))?;

        Ok(Arc::new(ReverseProxy::new(Arc::new(transport))))
    }

    async fn stop_bounded(&self, container_id: &str) -> Result<(), EngineError> {
        let grace = self.settings.stop_timeout();
        let budget = grace + STOP_SLACK;
        match tokio::time::timeout(budget, self.engine.stop_container(container_id, grace)).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout(budget)),
        }
    }

    async fn shutdown(&self) -> Result<(), ShutdownError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Ok(());
        }
        state.closed = true;

        let mut runtimes: Vec<(String, ExitRuntime)> = state.runtimes.drain().collect();
        runtimes.sort_by(|a, b| a.0.cmp(&b.0));

        tracing::info!(exits = runtimes.len(), "Stopping exit containers");

        let mut error = ShutdownError::default();
        for (exit, mut runtime) in runtimes {
            runtime.cancel_logs();
            match self.stop_bounded(&runtime.container_id).await {
                Ok(()) => {
                    tracing::info!(exit = %exit, container = %runtime.container_name, "Container stopped");
                }
                Err(e) => {
                    tracing::warn!(
                        exit = %exit,
                        container = %runtime.container_name,
                        error = %e,
                        "Failed to stop container"
                    );
                    error.failures.push(StopFailure {
                        exit,
                        container: runtime.container_name,
                        error: e,
                    });
                }
            }
        }
        metrics::set_active_exits(0);

        if let Err(e) = self.engine.close().await {
            tracing::warn!(error = %e, "Failed to close container engine");
            error.close = Some(e);
        }

        if error.is_empty() {
            Ok(())
        } else {
            Err(error)
        }
    }
}

/// Container definition for one exit.
fn container_spec(settings: &ContainerSettings, container_name: &str, exit: &ExitConfig) -> ContainerSpec {
    ContainerSpec {
        name: container_name.to_string(),
        image: settings.image.clone(),
        env: vec![
            "HTTPPROXY=on".to_string(),
            format!("SERVER_COUNTRIES={}", exit.country),
            format!("VPN_SERVICE_PROVIDER={}", settings.vpn_service_provider),
            format!("OPENVPN_USER={}", settings.openvpn_user),
            format!("OPENVPN_PASSWORD={}", settings.openvpn_password),
        ],
        network: settings.network.clone(),
        cap_add: vec!["NET_ADMIN".to_string()],
        devices: vec![DeviceSpec {
            path_on_host: "/dev/net/tun".to_string(),
            path_in_container: "/dev/net/tun".to_string(),
            cgroup_permissions: "rwm".to_string(),
        }],
        auto_remove: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_spec() {
        let settings = ContainerSettings {
            vpn_service_provider: "mullvad".into(),
            openvpn_user: "user".into(),
            openvpn_password: "secret".into(),
            ..ContainerSettings::default()
        };
        let spec = container_spec(&settings, "gluetun-kr", &ExitConfig::new("gluetun", "Korea"));

        assert_eq!(spec.name, "gluetun-kr");
        assert_eq!(spec.image, "qmcgaw/gluetun:latest");
        assert_eq!(spec.network, "gluetun");
        assert_eq!(spec.env_var("HTTPPROXY"), Some("on"));
        assert_eq!(spec.env_var("SERVER_COUNTRIES"), Some("Korea"));
        assert_eq!(spec.env_var("VPN_SERVICE_PROVIDER"), Some("mullvad"));
        assert_eq!(spec.env_var("OPENVPN_PASSWORD"), Some("secret"));
        assert_eq!(spec.cap_add, vec!["NET_ADMIN".to_string()]);
        assert_eq!(spec.devices[0].cgroup_permissions, "rwm");
        assert!(spec.auto_remove);
    }
}
