//! Windows service database backed by the service control manager.

use std::ffi::{OsStr, OsString};
use std::io;

use windows_service::service::{
    Service, ServiceAccess, ServiceErrorControl, ServiceInfo, ServiceStartType, ServiceState,
    ServiceType,
};
use windows_service::service_manager::{ServiceManager, ServiceManagerAccess};

use super::{Registration, ServiceDatabase, ServiceDescriptor};
use crate::consts::SERVICE_NAME;
use crate::error::ScmError;

/* Win32 error codes the verbs must tolerate or classify. */
const ERROR_ACCESS_DENIED: i32 = 5;
const ERROR_SERVICE_ALREADY_RUNNING: i32 = 1056;
const ERROR_SERVICE_DOES_NOT_EXIST: i32 = 1060;
const ERROR_SERVICE_CANNOT_ACCEPT_CTRL: i32 = 1061;
const ERROR_SERVICE_NOT_ACTIVE: i32 = 1062;

fn raw_code(err: &windows_service::Error) -> Option<i32> {
    match err {
        windows_service::Error::Winapi(io) => io.raw_os_error(),
        _ => None,
    }
}

fn scm_error(err: windows_service::Error) -> ScmError {
    match err {
        windows_service::Error::Winapi(io) if io.raw_os_error() == Some(ERROR_ACCESS_DENIED) => {
            ScmError::ExpectedDenial
        }
        windows_service::Error::Winapi(io) => ScmError::UnexpectedFault(io),
        other => ScmError::UnexpectedFault(io::Error::other(other.to_string())),
    }
}

/// Live connection to the local service control manager, opened lazily by
/// `connect` and scoped to the one driver service.
pub struct WindowsServiceDatabase {
    manager: Option<ServiceManager>,
}

impl WindowsServiceDatabase {
    pub fn new() -> Self {
        Self { manager: None }
    }

    fn manager(&self) -> Result<&ServiceManager, ScmError> {
        self.manager
            .as_ref()
            .ok_or_else(|| ScmError::UnexpectedFault(io::Error::other("service database not connected")))
    }

    /// Open the driver service, reporting an unregistered service as `None`.
    fn open_service(&self) -> Result<Option<Service>, ScmError> {
        let access = ServiceAccess::QUERY_STATUS
            | ServiceAccess::START
            | ServiceAccess::STOP
            | ServiceAccess::DELETE;
        match self.manager()?.open_service(SERVICE_NAME, access) {
            Ok(service) => Ok(Some(service)),
            Err(err) if raw_code(&err) == Some(ERROR_SERVICE_DOES_NOT_EXIST) => Ok(None),
            Err(err) => Err(scm_error(err)),
        }
    }
}

impl Default for WindowsServiceDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceDatabase for WindowsServiceDatabase {
    fn connect(&mut self) -> Result<(), ScmError> {
        // Creating services needs elevation; denial here is the expected
        // outcome for ordinary accounts and stays silent.
        let access = ServiceManagerAccess::CONNECT | ServiceManagerAccess::CREATE_SERVICE;
        let manager = ServiceManager::local_computer(None::<&str>, access).map_err(scm_error)?;
        self.manager = Some(manager);
        Ok(())
    }

    fn status(&mut self) -> Result<Option<Registration>, ScmError> {
        let Some(service) = self.open_service()? else {
            return Ok(None);
        };
        let status = service.query_status().map_err(scm_error)?;
        Ok(Some(match status.current_state {
            ServiceState::Running | ServiceState::StartPending => Registration::Running,
            _ => Registration::Stopped,
        }))
    }

    fn create(&mut self, descriptor: &ServiceDescriptor) -> Result<(), ScmError> {
        let info = ServiceInfo {
            name: OsString::from(&descriptor.name),
            display_name: OsString::from(&descriptor.display_name),
            service_type: ServiceType::KERNEL_DRIVER,
            start_type: ServiceStartType::OnDemand,
            error_control: ServiceErrorControl::Normal,
            executable_path: descriptor.binary_path.clone(),
            launch_arguments: vec![],
            dependencies: vec![],
            account_name: None, // LocalSystem
            account_password: None,
        };
        self.manager()?
            .create_service(&info, ServiceAccess::empty())
            .map(|_| ())
            .map_err(scm_error)
    }

    fn start(&mut self) -> Result<(), ScmError> {
        let Some(service) = self.open_service()? else {
            return Err(ScmError::UnexpectedFault(io::Error::other("service not registered")));
        };
        match service.start::<&OsStr>(&[]) {
            Ok(()) => Ok(()),
            Err(err) if raw_code(&err) == Some(ERROR_SERVICE_ALREADY_RUNNING) => Ok(()),
            Err(err) => Err(scm_error(err)),
        }
    }

    fn stop(&mut self) -> Result<(), ScmError> {
        let Some(service) = self.open_service()? else {
            return Ok(());
        };
        match service.stop() {
            Ok(_) => Ok(()),
            Err(err)
                if matches!(
                    raw_code(&err),
                    Some(ERROR_SERVICE_NOT_ACTIVE) | Some(ERROR_SERVICE_CANNOT_ACCEPT_CTRL)
                ) =>
            {
                Ok(())
            }
            Err(err) => Err(scm_error(err)),
        }
    }

    fn delete(&mut self) -> Result<(), ScmError> {
        let Some(service) = self.open_service()? else {
            return Ok(());
        };
        service.delete().map_err(scm_error)
    }
}
