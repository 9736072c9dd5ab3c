//! Names shared with the kernel driver. The driver creates the device and
//! registers the service under these exact strings.

/// Service name in the OS service database.
pub const SERVICE_NAME: &str = "HwGate";

/// Win32 namespace path of the driver's device object.
pub const DEVICE_PATH: &str = r"\\.\HwGate";

/// Driver binary is `<base><arch><debug>.<ext>` next to the executable,
/// e.g. `hwgate64d.sys` for a debug build on a 64-bit OS.
pub const DRIVER_BASE_NAME: &str = "hwgate";
pub const DRIVER_EXTENSION: &str = "sys";
