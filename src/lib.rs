//! GeoSwitch: a geo-routing HTTP egress proxy.
//!
//! Requests name a target URL in their path and optionally an exit, either as
//! the path segment before the target or in the `X-GeoSwitch-Exit` header.
//! Each exit is backed by a VPN gateway container whose forward proxy carries
//! the request out of the chosen country.

pub mod config;
pub mod http;
pub mod intent;
pub mod lifecycle;
pub mod observability;
pub mod provider;
pub mod proxy;
pub mod routing;

pub use config::schema::GeoSwitchConfig;
pub use http::{HttpServer, ProxyHandler};
pub use lifecycle::Shutdown;
pub use provider::{ContainerProvider, ExitHandlerProvider, StaticProvider};
