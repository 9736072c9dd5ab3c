// src/lib.rs
// ────────────────────────────────────────────────────────────────────────────
// Public library entry point.  Re-export the gateway surface for the probe
// binary and the integration tests.

pub mod channel;
pub mod config;
pub mod consts;
pub mod error;
pub mod gateway;
mod macros;
pub mod protocol;
pub mod service;

pub use channel::{DeviceControl, DriverChannel};
pub use error::{InitError, ScmError};
pub use gateway::{DeviceConnector, Gateway, GatewayOptions, Lifecycle};
pub use protocol::PortWidth;
pub use service::{DriverService, RefreshPolicy, Registration, ServiceDatabase, ServiceDescriptor};
