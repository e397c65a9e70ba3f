//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use geoswitch::config::ContainerSettings;
use geoswitch::provider::{ContainerEngine, ContainerInfo, ContainerSpec, EngineError, HealthStatus};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// One call observed by `MockEngine`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    NetworkExists(String),
    CreateNetwork(String),
    ImageExists(String),
    PullImage(String),
    Inspect(String),
    Create(String),
    Start(String),
    Stop(String),
    FollowLogs(String),
    Close,
}

impl EngineEvent {
    /// Container name or id the event refers to, if any.
    pub fn container(&self) -> Option<&str> {
        match self {
            EngineEvent::Inspect(c)
            | EngineEvent::Create(c)
            | EngineEvent::Start(c)
            | EngineEvent::Stop(c)
            | EngineEvent::FollowLogs(c) => Some(c),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct MockContainer {
    running: bool,
    health: HealthStatus,
    starting_polls: usize,
}

/// In-memory container engine. Container ids equal container names.
pub struct MockEngine {
    events: Mutex<Vec<EngineEvent>>,
    specs: Mutex<Vec<ContainerSpec>>,
    containers: Mutex<HashMap<String, MockContainer>>,
    failing_stops: Mutex<HashSet<String>>,
    log_streams: Mutex<HashMap<String, CancellationToken>>,
    network_present: AtomicBool,
    image_present: AtomicBool,
    health: Mutex<HealthStatus>,
    starting_polls: Mutex<usize>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Network and image present; new containers are healthy on first poll.
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            specs: Mutex::new(Vec::new()),
            containers: Mutex::new(HashMap::new()),
            failing_stops: Mutex::new(HashSet::new()),
            log_streams: Mutex::new(HashMap::new()),
            network_present: AtomicBool::new(true),
            image_present: AtomicBool::new(true),
            health: Mutex::new(HealthStatus::Healthy),
            starting_polls: Mutex::new(0),
        }
    }

    pub fn without_network(self) -> Self {
        self.network_present.store(false, Ordering::SeqCst);
        self
    }

    pub fn without_image(self) -> Self {
        self.image_present.store(false, Ordering::SeqCst);
        self
    }

    /// Health new containers settle on.
    pub fn with_health(self, health: HealthStatus) -> Self {
        *self.health.lock().unwrap() = health;
        self
    }

    /// Number of polls new containers report `starting` for.
    pub fn with_starting_polls(self, polls: usize) -> Self {
        *self.starting_polls.lock().unwrap() = polls;
        self
    }

    pub fn with_failing_stop(self, container: &str) -> Self {
        self.failing_stops.lock().unwrap().insert(container.to_string());
        self
    }

    pub fn with_existing_container(self, name: &str, running: bool, health: HealthStatus) -> Self {
        self.containers.lock().unwrap().insert(
            name.to_string(),
            MockContainer {
                running,
                health,
                starting_polls: 0,
            },
        );
        self
    }

    /// Change the settled health of all future containers.
    pub fn set_default_health(&self, health: HealthStatus, starting_polls: usize) {
        *self.health.lock().unwrap() = health;
        *self.starting_polls.lock().unwrap() = starting_polls;
    }

    /// Change the health of an existing container.
    pub fn set_health(&self, container: &str, health: HealthStatus) {
        if let Some(c) = self.containers.lock().unwrap().get_mut(container) {
            c.health = health;
            c.starting_polls = 0;
        }
    }

    pub fn has_container(&self, container: &str) -> bool {
        self.containers.lock().unwrap().contains_key(container)
    }

    /// Whether the log stream opened for `container` has been cancelled.
    /// `None` if no stream was ever opened.
    pub fn log_stream_cancelled(&self, container: &str) -> Option<bool> {
        self.log_streams
            .lock()
            .unwrap()
            .get(container)
            .map(CancellationToken::is_cancelled)
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&EngineEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }

    pub fn specs(&self) -> Vec<ContainerSpec> {
        self.specs.lock().unwrap().clone()
    }

    fn record(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl ContainerEngine for MockEngine {
    async fn network_exists(&self, name: &str) -> Result<bool, EngineError> {
        self.record(EngineEvent::NetworkExists(name.to_string()));
        Ok(self.network_present.load(Ordering::SeqCst))
    }

    async fn create_network(&self, name: &str) -> Result<(), EngineError> {
        self.record(EngineEvent::CreateNetwork(name.to_string()));
        self.network_present.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> Result<bool, EngineError> {
        self.record(EngineEvent::ImageExists(image.to_string()));
        Ok(self.image_present.load(Ordering::SeqCst))
    }

    async fn pull_image(&self, image: &str) -> Result<(), EngineError> {
        self.record(EngineEvent::PullImage(image.to_string()));
        tokio::task::yield_now().await;
        self.image_present.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn inspect_container(&self, name_or_id: &str) -> Result<Option<ContainerInfo>, EngineError> {
        self.record(EngineEvent::Inspect(name_or_id.to_string()));
        tokio::task::yield_now().await;

        let mut containers = self.containers.lock().unwrap();
        Ok(containers.get_mut(name_or_id).map(|c| {
            let health = if c.starting_polls > 0 {
                c.starting_polls -= 1;
                HealthStatus::Starting
            } else {
                c.health
            };
            ContainerInfo {
                id: name_or_id.to_string(),
                running: c.running,
                health,
            }
        }))
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, EngineError> {
        self.record(EngineEvent::Create(spec.name.clone()));
        self.specs.lock().unwrap().push(spec.clone());

        let container = MockContainer {
            running: false,
            health: *self.health.lock().unwrap(),
            starting_polls: *self.starting_polls.lock().unwrap(),
        };
        self.containers
            .lock()
            .unwrap()
            .insert(spec.name.clone(), container);
        Ok(spec.name.clone())
    }

    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        self.record(EngineEvent::Start(id.to_string()));
        match self.containers.lock().unwrap().get_mut(id) {
            Some(c) => {
                c.running = true;
                Ok(())
            }
            None => Err(EngineError::Other(format!("no such container: {}", id))),
        }
    }

    async fn stop_container(&self, id: &str, _grace: Duration) -> Result<(), EngineError> {
        self.record(EngineEvent::Stop(id.to_string()));
        if self.failing_stops.lock().unwrap().contains(id) {
            return Err(EngineError::Other(format!("cannot stop {}", id)));
        }
        // Containers are auto-removed once stopped
        self.containers.lock().unwrap().remove(id);
        Ok(())
    }

    async fn follow_logs(&self, id: &str, cancel: CancellationToken) -> Result<(), EngineError> {
        self.record(EngineEvent::FollowLogs(id.to_string()));
        self.log_streams
            .lock()
            .unwrap()
            .insert(id.to_string(), cancel.clone());
        cancel.cancelled().await;
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.record(EngineEvent::Close);
        Ok(())
    }
}

/// Container settings with fast polling for tests.
pub fn fast_settings() -> ContainerSettings {
    ContainerSettings {
        health_poll_interval_ms: 10,
        health_timeout_secs: 5,
        stop_timeout_secs: 1,
        vpn_service_provider: "mullvad".into(),
        openvpn_user: "user".into(),
        openvpn_password: "secret".into(),
        ..ContainerSettings::default()
    }
}

/// Start a backend that answers every request with its request line and
/// `Host` header, one per line. Returns the bound address.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            buf.extend_from_slice(&chunk[..n]);
                            if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                    }
                }

                let head = String::from_utf8_lossy(&buf);
                let mut lines = head.split("\r\n");
                let request_line = lines.next().unwrap_or_default().to_string();
                let host = lines
                    .filter_map(|l| l.split_once(':'))
                    .find(|(k, _)| k.eq_ignore_ascii_case("host"))
                    .map(|(_, v)| v.trim().to_string())
                    .unwrap_or_default();

                let body = format!("{}\nhost: {}\n", request_line, host);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nX-Backend: echo\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}
