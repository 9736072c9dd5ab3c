//! Driver service lifecycle against the OS service database.
//!
//! Ensures the privileged peer is registered and running before the channel
//! opens its handle, and removes the registration on shutdown.
//!
//! Key responsibilities:
//! - Open the service database with full-control rights, treating access
//!   denial as an expected, silent outcome.
//! - Install the driver as a kernel-level, on-demand service and start it.
//! - Stop and delete the registration on uninstall.
//!
//! Administrator-equivalent privilege is required; there is no self-elevation
//! and no auto-install for lower-privilege accounts.

pub mod path;
#[cfg(windows)]
pub mod scm;

use std::path::{Path, PathBuf};

use crate::consts::SERVICE_NAME;
use crate::error::ScmError;

/// Registration details for one install attempt. Constructed fresh each
/// time; the OS service database is the only persistent copy.
///
/// Fixed install attributes (kernel-driver type, on-demand start, normal
/// error severity, LocalSystem account) are supplied by the database
/// implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: String,
    pub display_name: String,
    pub binary_path: PathBuf,
}

impl ServiceDescriptor {
    pub fn kernel_driver(binary_path: PathBuf) -> Self {
        Self {
            name: SERVICE_NAME.to_string(),
            display_name: SERVICE_NAME.to_string(),
            binary_path,
        }
    }
}

/// Registration state of the driver service as observed through the
/// database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Stopped,
    Running,
}

/// Seam over the OS service database, scoped to the one driver service.
///
/// Verb contracts fold benign outcomes: `start` treats "already running" as
/// success, `stop` treats "not active" and "cannot accept control" as
/// success, and `status` reports an unregistered service as `None`. Anything
/// else surfaces as `ScmError`.
pub trait ServiceDatabase {
    /// Connect with rights sufficient to create and control services.
    /// `ExpectedDenial` is the normal result for non-elevated callers.
    fn connect(&mut self) -> Result<(), ScmError>;

    fn status(&mut self) -> Result<Option<Registration>, ScmError>;

    fn create(&mut self, descriptor: &ServiceDescriptor) -> Result<(), ScmError>;

    fn start(&mut self) -> Result<(), ScmError>;

    fn stop(&mut self) -> Result<(), ScmError>;

    fn delete(&mut self) -> Result<(), ScmError>;
}

/// What to do when `start_driver` finds the service already registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Tear the registration down and recreate it from the given binary, so
    /// the freshest driver build loads on every run. Extra install churn,
    /// suits a frequently-rebuilt peer.
    AlwaysRecreate,
    /// Keep an existing registration and just start it.
    ReuseExisting,
}

/// Orchestrates install, start and removal of the driver service.
pub struct DriverService<S: ServiceDatabase> {
    database: S,
    refresh: RefreshPolicy,
}

impl<S: ServiceDatabase> DriverService<S> {
    pub fn new(database: S, refresh: RefreshPolicy) -> Self {
        Self { database, refresh }
    }

    /// Ensure the driver service is registered from `binary_path` and
    /// running. Failures are reported and swallowed: the caller proceeds,
    /// and a driver that is genuinely absent surfaces when the channel open
    /// fails.
    pub fn start_driver(&mut self, binary_path: &Path) {
        if !self.connect_or_bail("start") {
            return;
        }

        let mut existing = match self.database.status() {
            Ok(status) => status,
            Err(err) => {
                crate::soft_assert!(false, "service status query failed: {}", err);
                None
            }
        };

        if existing.is_some() && self.refresh == RefreshPolicy::AlwaysRecreate {
            self.tear_down();
            existing = None;
        }

        if existing.is_none() {
            let descriptor = ServiceDescriptor::kernel_driver(binary_path.to_path_buf());
            // Creation only enters the service into the database; a missing
            // binary does not fail here.
            if let Err(err) = self.database.create(&descriptor) {
                crate::soft_assert!(false, "service registration failed: {}", err);
            }
        }

        if let Err(err) = self.database.start() {
            log::warn!("driver service start failed: {}", err);
        }
    }

    /// Stop and delete the driver service. No-op when the database cannot be
    /// opened or the service is not registered.
    pub fn uninstall_driver(&mut self) {
        if !self.connect_or_bail("uninstall") {
            return;
        }

        match self.database.status() {
            Ok(Some(_)) => self.tear_down(),
            Ok(None) => log::debug!("driver service not registered, nothing to uninstall"),
            Err(err) => crate::soft_assert!(false, "service status query failed: {}", err),
        }
    }

    fn connect_or_bail(&mut self, action: &str) -> bool {
        match self.database.connect() {
            Ok(()) => true,
            Err(ScmError::ExpectedDenial) => {
                // Normal for non-elevated accounts.
                log::debug!("service database unavailable for {}: not elevated", action);
                false
            }
            Err(err) => {
                crate::soft_assert!(false, "service database open failed: {}", err);
                false
            }
        }
    }

    fn tear_down(&mut self) {
        if let Err(err) = self.database.stop() {
            // Benign "already stopped" outcomes never reach here.
            crate::soft_assert!(false, "service stop failed: {}", err);
        }
        if let Err(err) = self.database.delete() {
            log::warn!("service delete failed: {}", err);
        }
    }
}
