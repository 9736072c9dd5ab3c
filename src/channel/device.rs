//! Windows transport: the opened driver device.
//!
//! Thin RAII wrapper around the device handle; exchanges are synchronous
//! buffered `DeviceIoControl` calls with no OVERLAPPED, so every call blocks
//! until the driver completes it.

use std::ffi::OsStr;
use std::io;
use std::os::windows::prelude::OsStrExt;
use std::ptr;

use windows_sys::Win32::Foundation::{CloseHandle, GENERIC_READ, HANDLE, INVALID_HANDLE_VALUE};
use windows_sys::Win32::Storage::FileSystem::{CreateFileW, FILE_ATTRIBUTE_NORMAL, OPEN_EXISTING};
use windows_sys::Win32::System::IO::DeviceIoControl;
use windows_sys::Win32::System::SystemInformation::GetVersion;

use super::DeviceControl;

/// Handle to the driver's device object, valid from open until drop.
pub struct DriverDevice {
    handle: HANDLE,
}

// The handle is only ever used for synchronous calls.
unsafe impl Send for DriverDevice {}

impl DriverDevice {
    /// Open the device created by the running driver, e.g. `\\.\HwGate`.
    pub fn open(path: &str) -> io::Result<Self> {
        let wide: Vec<u16> = OsStr::new(path).encode_wide().chain(Some(0)).collect();

        let share_mode = 0;
        let handle = unsafe {
            CreateFileW(
                wide.as_ptr(),
                GENERIC_READ,
                share_mode,
                ptr::null(),
                OPEN_EXISTING,
                FILE_ATTRIBUTE_NORMAL,
                ptr::null_mut(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            return Err(io::Error::last_os_error());
        }

        Ok(Self { handle })
    }
}

impl DeviceControl for DriverDevice {
    fn exchange(&self, code: u32, input: &[u8], output: &mut [u8]) -> io::Result<usize> {
        let mut bytes_returned = 0u32;
        let overlapped = ptr::null_mut(); // synchronous
        let ok = unsafe {
            DeviceIoControl(
                self.handle,
                code,
                input.as_ptr().cast(),
                input.len() as u32,
                output.as_mut_ptr().cast(),
                output.len() as u32,
                &mut bytes_returned,
                overlapped,
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(bytes_returned as usize)
    }
}

impl Drop for DriverDevice {
    fn drop(&mut self) {
        unsafe { CloseHandle(self.handle) };
    }
}

/// Whether the host kernel guards against re-mapping pages with conflicting
/// attributes (NT 5.1 and later). Mapping on earlier kernels risks TLB
/// corruption, so the channel refuses it there.
pub fn remap_protection_available() -> bool {
    let version = unsafe { GetVersion() };
    let major = (version & 0xFF) as u8;
    let minor = ((version >> 8) & 0xFF) as u8;
    (major, minor) >= (5, 1)
}
