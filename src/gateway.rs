//! Process-facing lifecycle: ensure the driver service is running, open the
//! device, and route port/memory operations through the channel.
//!
//! The gateway is an explicitly owned context object rather than process
//! globals: one instance stands for the one channel and one service
//! registration the design supports, and tests build as many independent
//! instances as they like. Lifecycle transitions happen under a single
//! mutex; concurrent callers beyond that are outside the contract
//! (single-threaded or externally synchronized use only).

use std::io;
use std::path::PathBuf;
use std::ptr::NonNull;
use std::sync::Mutex;

use crate::channel::{DeviceControl, DriverChannel};
use crate::error::InitError;
use crate::service::{DriverService, RefreshPolicy, ServiceDatabase};

/// Module lifecycle, transitioned only by `init` and `shutdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initializing,
    Ready,
    Error,
    ShutDown,
}

/// Seam over opening the driver device, so tests can hand the gateway a
/// scripted peer.
pub trait DeviceConnector {
    type Device: DeviceControl;

    fn open(&self) -> io::Result<Self::Device>;
}

/// Knobs fixed at construction time.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Full pathname of the driver binary to register.
    pub driver_path: PathBuf,
    pub refresh: RefreshPolicy,
    /// Host kernel has remap-conflict protection; physical-memory mapping is
    /// refused without it.
    pub mapping_supported: bool,
}

struct Inner<D: DeviceControl, S: ServiceDatabase> {
    state: Lifecycle,
    channel: Option<DriverChannel<D>>,
    service: DriverService<S>,
}

/// Trusted user-mode gateway to the privileged driver.
pub struct Gateway<C: DeviceConnector, S: ServiceDatabase> {
    connector: C,
    driver_path: PathBuf,
    mapping_supported: bool,
    inner: Mutex<Inner<C::Device, S>>,
}

impl<C: DeviceConnector, S: ServiceDatabase> Gateway<C, S> {
    pub fn new(connector: C, database: S, options: GatewayOptions) -> Self {
        Self {
            connector,
            driver_path: options.driver_path,
            mapping_supported: options.mapping_supported,
            inner: Mutex::new(Inner {
                state: Lifecycle::Uninitialized,
                channel: None,
                service: DriverService::new(database, options.refresh),
            }),
        }
    }

    /// Start the driver service and open the channel.
    ///
    /// Idempotent while ready; permitted again after `shutdown` (and after a
    /// failed attempt). Service-control failures are non-fatal here: a
    /// driver that is genuinely absent surfaces as the device-open error.
    pub fn init(&self) -> Result<(), InitError> {
        let mut inner = self.lock();
        match inner.state {
            Lifecycle::Ready | Lifecycle::Initializing => return Ok(()),
            Lifecycle::Uninitialized | Lifecycle::Error | Lifecycle::ShutDown => {}
        }
        inner.state = Lifecycle::Initializing;

        inner.service.start_driver(&self.driver_path);

        match self.connector.open() {
            Ok(device) => {
                inner.channel = Some(DriverChannel::new(device, self.mapping_supported));
                inner.state = Lifecycle::Ready;
                log::info!("driver gateway ready ({})", self.driver_path.display());
                Ok(())
            }
            Err(err) => {
                inner.state = Lifecycle::Error;
                log::warn!("driver device open failed: {}", err);
                Err(InitError::DeviceOpen(err))
            }
        }
    }

    /// Close the channel and remove the driver service. Idempotent; also
    /// runs after a failed init, which may have left the service registered.
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        if !matches!(inner.state, Lifecycle::Ready | Lifecycle::Error) {
            return;
        }

        inner.channel = None; // drop closes the handle
        inner.service.uninstall_driver();
        inner.state = Lifecycle::ShutDown;
        log::info!("driver gateway shut down");
    }

    pub fn state(&self) -> Lifecycle {
        self.lock().state
    }

    /// The device connector this gateway opens its channel through.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn mapping_supported(&self) -> bool {
        self.mapping_supported
    }

    pub fn read_port8(&self, port: u16) -> u8 {
        self.with_channel(0, |ch| ch.read_port8(port))
    }

    pub fn read_port16(&self, port: u16) -> u16 {
        self.with_channel(0, |ch| ch.read_port16(port))
    }

    pub fn read_port32(&self, port: u16) -> u32 {
        self.with_channel(0, |ch| ch.read_port32(port))
    }

    pub fn write_port8(&self, port: u16, value: u8) {
        self.with_channel((), |ch| ch.write_port8(port, value));
    }

    pub fn write_port16(&self, port: u16, value: u16) {
        self.with_channel((), |ch| ch.write_port16(port, value));
    }

    pub fn write_port32(&self, port: u16, value: u32) {
        self.with_channel((), |ch| ch.write_port32(port, value));
    }

    /// See [`DriverChannel::map_physical`]; `None` when the gateway is not
    /// ready.
    pub fn map_physical(&self, physical_address: u64, length: u64) -> Option<NonNull<u8>> {
        self.with_channel(None, |ch| ch.map_physical(physical_address, length))
    }

    /// See [`DriverChannel::unmap_physical`]; a no-op when the gateway is
    /// not ready.
    pub fn unmap_physical(&self, virtual_address: NonNull<u8>) {
        self.with_channel((), |ch| ch.unmap_physical(virtual_address));
    }

    /// Run `op` against the open channel, or return `fallback` with a
    /// diagnostic when there is none. Callers never crash on an un-ready
    /// gateway; the operation simply did not happen.
    fn with_channel<T>(&self, fallback: T, op: impl FnOnce(&DriverChannel<C::Device>) -> T) -> T {
        let inner = self.lock();
        match inner.channel.as_ref() {
            Some(channel) => op(channel),
            None => {
                log::warn!("driver operation requested while gateway is {:?}", inner.state);
                fallback
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<C::Device, S>> {
        self.inner.lock().expect("gateway lifecycle lock poisoned")
    }
}

#[cfg(windows)]
mod host {
    use super::*;
    use crate::channel::device::{DriverDevice, remap_protection_available};
    use crate::config::GatewayConfig;
    use crate::consts::DEVICE_PATH;
    use crate::service::path::{driver_pathname, exe_dir};
    use crate::service::scm::WindowsServiceDatabase;

    /// Opens the device object published by the running driver.
    pub struct DeviceOpener;

    impl DeviceConnector for DeviceOpener {
        type Device = DriverDevice;

        fn open(&self) -> io::Result<DriverDevice> {
            DriverDevice::open(DEVICE_PATH)
        }
    }

    impl Gateway<DeviceOpener, WindowsServiceDatabase> {
        /// Wire the production transport, service database and host probes
        /// together from configuration.
        pub fn from_config(config: &GatewayConfig) -> Result<Self, InitError> {
            let dir = match &config.driver.dir {
                Some(dir) => dir.clone(),
                None => exe_dir().map_err(InitError::DriverLocation)?,
            };
            Ok(Self::new(
                DeviceOpener,
                WindowsServiceDatabase::new(),
                GatewayOptions {
                    driver_path: driver_pathname(&dir),
                    refresh: config.driver.refresh_policy(),
                    mapping_supported: remap_protection_available(),
                },
            ))
        }
    }
}

#[cfg(windows)]
pub use host::DeviceOpener;
