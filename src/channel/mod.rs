//! Request/response channel to the privileged driver.
//!
//! Translates typed port and physical-memory operations into the fixed
//! exchanges of [`crate::protocol`] and maps failures to safe defaults.
//!
//! Key responsibilities:
//! - Issue synchronous, single-shot exchanges over the device transport.
//! - Narrow port reads to the requested width.
//! - Refuse physical-memory mapping on hosts without remap protection.
//!
//! A failed exchange is reported via the `log` facade and abandoned; there is
//! no retry and callers see only sentinel return values. In particular a
//! port read of 0 is indistinguishable from a failed read through the return
//! value alone; that ambiguity comes with the driver protocol.

#[cfg(windows)]
pub mod device;

use std::io;
use std::ptr::NonNull;

use crate::protocol::{
    IOCTL_MAP, IOCTL_READ_PORT, IOCTL_UNMAP, IOCTL_WRITE_PORT, MapReply, MapRequest, PortWidth,
    ReadPortReply, ReadPortRequest, UnmapRequest, WritePortRequest,
};

/// Transport seam over the driver device.
///
/// The production implementation wraps the opened device handle; tests
/// substitute a scripted peer.
pub trait DeviceControl {
    /// Synchronous buffered exchange. Returns the number of bytes the driver
    /// placed in `output`.
    fn exchange(&self, code: u32, input: &[u8], output: &mut [u8]) -> io::Result<usize>;
}

/// Owns the transport for the single open channel to the driver.
pub struct DriverChannel<D: DeviceControl> {
    device: D,
    /// Host kernel rejects conflicting page attributes on remap. Without
    /// that protection, mapping risks TLB corruption and is refused.
    mapping_supported: bool,
}

impl<D: DeviceControl> DriverChannel<D> {
    pub fn new(device: D, mapping_supported: bool) -> Self {
        Self { device, mapping_supported }
    }

    /// The underlying transport.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Read a port at the given width. Failure returns 0.
    pub fn read_port(&self, port: u16, width: PortWidth) -> u32 {
        let request = ReadPortRequest { port, width };
        let mut reply = [0u8; ReadPortReply::WIRE_SIZE];
        match self.device.exchange(IOCTL_READ_PORT, &request.encode(), &mut reply) {
            Ok(len) => {
                crate::soft_assert!(len == reply.len(), "read-port reply truncated: {} bytes", len);
                match ReadPortReply::decode(&reply[..len.min(reply.len())]) {
                    Some(reply) => reply.value,
                    None => 0,
                }
            }
            Err(err) => {
                log::warn!("port 0x{:04x} read ({} bytes) failed: {}", port, width.bytes(), err);
                0
            }
        }
    }

    pub fn read_port8(&self, port: u16) -> u8 {
        let value = self.read_port(port, PortWidth::Byte);
        crate::soft_assert!(value <= 0xFF, "byte read of port 0x{:04x} returned 0x{:x}", port, value);
        (value & 0xFF) as u8
    }

    pub fn read_port16(&self, port: u16) -> u16 {
        let value = self.read_port(port, PortWidth::Word);
        crate::soft_assert!(value <= 0xFFFF, "word read of port 0x{:04x} returned 0x{:x}", port, value);
        (value & 0xFFFF) as u16
    }

    pub fn read_port32(&self, port: u16) -> u32 {
        self.read_port(port, PortWidth::Dword)
    }

    /// Write a port at the given width. Fire-and-forget: failure is reported
    /// and the write is abandoned.
    pub fn write_port(&self, port: u16, value: u32, width: PortWidth) {
        let request = WritePortRequest { value, port, width };
        if let Err(err) = self.device.exchange(IOCTL_WRITE_PORT, &request.encode(), &mut []) {
            log::warn!("port 0x{:04x} write ({} bytes) failed: {}", port, width.bytes(), err);
        }
    }

    pub fn write_port8(&self, port: u16, value: u8) {
        self.write_port(port, u32::from(value), PortWidth::Byte);
    }

    pub fn write_port16(&self, port: u16, value: u16) {
        self.write_port(port, u32::from(value), PortWidth::Word);
    }

    pub fn write_port32(&self, port: u16, value: u32) {
        self.write_port(port, value, PortWidth::Dword);
    }

    /// Map `length` bytes of physical address space into this process.
    ///
    /// Returns `None` without touching the driver when the host lacks remap
    /// protection, and on any driver failure. The mapping aliases device
    /// registers or physical RAM: access it with `read_volatile` /
    /// `write_volatile` only, and release it with [`Self::unmap_physical`].
    /// Pairing map and unmap is the caller's responsibility; the channel
    /// keeps no record of outstanding mappings.
    pub fn map_physical(&self, physical_address: u64, length: u64) -> Option<NonNull<u8>> {
        if !self.mapping_supported {
            return None;
        }

        let request = MapRequest { physical_address, length };
        let mut reply = [0u8; MapReply::WIRE_SIZE];
        match self.device.exchange(IOCTL_MAP, &request.encode(), &mut reply) {
            Ok(len) => {
                crate::soft_assert!(len == reply.len(), "map reply truncated: {} bytes", len);
                let reply = MapReply::decode(&reply[..len.min(reply.len())])?;
                NonNull::new(reply.virtual_address as usize as *mut u8)
            }
            Err(err) => {
                log::warn!(
                    "mapping {:#x} bytes at physical {:#x} failed: {}",
                    length, physical_address, err
                );
                None
            }
        }
    }

    /// Release a mapping returned by [`Self::map_physical`]. Best-effort:
    /// commonly called during teardown after other failures, so errors are
    /// reported and swallowed.
    pub fn unmap_physical(&self, virtual_address: NonNull<u8>) {
        let request = UnmapRequest { virtual_address: virtual_address.as_ptr() as usize as u64 };
        if let Err(err) = self.device.exchange(IOCTL_UNMAP, &request.encode(), &mut []) {
            log::warn!("unmapping virtual {:p} failed: {}", virtual_address.as_ptr(), err);
        }
    }
}
