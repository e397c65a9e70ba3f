//! Exit handler providers.
//!
//! A provider turns a resolved exit into a handler whose requests leave
//! through that exit's egress path.
//!
//! # Data Flow
//! ```text
//! (exit name, ExitConfig)
//!     → static_map.rs (fixed handlers)
//!     → container.rs (network → image → container → health gate)
//!         → engine.rs trait, docker.rs implementation
//!     → ReverseProxy over the container's forward proxy, cached per exit
//! ```
//!
//! # Design Decisions
//! - One provider-wide async lock; provisioning of different exits never interleaves
//! - Provisioning runs detached from the caller so it is never abandoned half-way
//! - Failed provisioning leaves no cached state; the next request retries

use async_trait::async_trait;

use crate::config::ExitConfig;
use crate::proxy::SharedHandler;

pub mod container;
pub mod docker;
pub mod engine;
pub mod error;
pub mod runtime;
pub mod static_map;

pub use container::ContainerProvider;
pub use docker::DockerEngine;
pub use engine::{ContainerEngine, ContainerInfo, ContainerSpec, DeviceSpec, EngineError, HealthStatus};
pub use error::{ProvisionError, ShutdownError, StopFailure};
pub use runtime::ExitRuntime;
pub use static_map::StaticProvider;

/// Source of per-exit request handlers.
#[async_trait]
pub trait ExitHandlerProvider: Send + Sync {
    /// Handler for `exit_name`, provisioning its egress path if needed.
    ///
    /// Idempotent per exit name and safe to call concurrently.
    async fn get_handler(
        &self,
        exit_name: &str,
        exit: &ExitConfig,
    ) -> Result<SharedHandler, ProvisionError>;

    /// Release everything the provider started.
    async fn shutdown(&self) -> Result<(), ShutdownError> {
        Ok(())
    }
}
