//! Driver binary selection.
//!
//! The install ships one driver binary per {bitness, build flavor} pair and
//! the service must register the one matching this host:
//! `<dir>/<base><archSuffix><debugSuffix>.sys`, archSuffix "64" on a 64-bit
//! OS (a 32-bit process on a 64-bit OS still needs the 64-bit driver),
//! debugSuffix "d" for non-optimized builds.

use std::io;
use std::path::{Path, PathBuf};

use crate::consts::{DRIVER_BASE_NAME, DRIVER_EXTENSION};

pub fn driver_pathname(install_dir: &Path) -> PathBuf {
    let arch = if is_64bit_os() { "64" } else { "" };
    let debug = if cfg!(debug_assertions) { "d" } else { "" };
    install_dir.join(format!("{DRIVER_BASE_NAME}{arch}{debug}.{DRIVER_EXTENSION}"))
}

/// Directory that contains the running executable; the default location of
/// the driver binary.
pub fn exe_dir() -> io::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| io::Error::other("executable has no parent directory"))
}

/// The kernel's bitness, not the process's: a 32-bit build running under
/// WOW64 must still load the 64-bit driver.
pub fn is_64bit_os() -> bool {
    if cfg!(target_pointer_width = "64") {
        return true;
    }
    running_under_wow64()
}

#[cfg(windows)]
fn running_under_wow64() -> bool {
    use windows_sys::Win32::System::Threading::{GetCurrentProcess, IsWow64Process};

    let mut wow64 = 0;
    let ok = unsafe { IsWow64Process(GetCurrentProcess(), &mut wow64) };
    ok != 0 && wow64 != 0
}

#[cfg(not(windows))]
fn running_under_wow64() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pathname_composition() {
        let path = driver_pathname(Path::new("C:\\drivers"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();

        assert!(name.starts_with(DRIVER_BASE_NAME), "{name}");
        assert!(name.ends_with(&format!(".{DRIVER_EXTENSION}")), "{name}");

        let stem = name
            .strip_prefix(DRIVER_BASE_NAME)
            .unwrap()
            .strip_suffix(&format!(".{DRIVER_EXTENSION}"))
            .unwrap();
        let expect_arch = if is_64bit_os() { "64" } else { "" };
        let expect_debug = if cfg!(debug_assertions) { "d" } else { "" };
        assert_eq!(stem, format!("{expect_arch}{expect_debug}"));
    }

    #[test]
    fn pathname_is_under_install_dir() {
        let dir = Path::new("install");
        assert_eq!(driver_pathname(dir).parent().unwrap(), dir);
    }
}
