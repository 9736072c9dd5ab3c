//! Gateway probe: console check that the driver loads and answers.
//!
//! Run **as Admin**. Installs and starts the driver service, opens the
//! channel, reads the keyboard-controller status port, optionally maps a
//! physical range, then tears everything down again.
//!
//! ```text
//! hwgate_probe [PHYS_ADDR_HEX LEN_HEX]
//! ```

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    windows_main::run()
}

#[cfg(not(windows))]
fn main() {
    eprintln!("hwgate_probe talks to a Windows kernel driver and only runs there.");
    std::process::exit(1);
}

#[cfg(windows)]
mod windows_main {
    use anyhow::{Context, bail};
    use chrono::Local;
    use fern::Dispatch;
    use log::LevelFilter;

    use hwgate::config::{self, GatewayConfig, LoggingConfig};
    use hwgate::gateway::Gateway;
    use hwgate::service::path::exe_dir;

    /// Keyboard controller status port; safe to read on any PC.
    const KBC_STATUS_PORT: u16 = 0x64;
    const KBC_DATA_PORT: u16 = 0x60;

    /// Configure global logging as requested in `[logging]`.
    fn setup_logging(logging: &LoggingConfig) -> Result<(), fern::InitError> {
        let level = match logging.level.to_uppercase().as_str() {
            "ERROR" => LevelFilter::Error,
            "WARN" => LevelFilter::Warn,
            "DEBUG" => LevelFilter::Debug,
            "TRACE" => LevelFilter::Trace,
            _ => LevelFilter::Info,
        };

        let mut dispatch = Dispatch::new()
            .format(|out, msg, record| {
                out.finish(format_args!(
                    "[{}][{:5}][{}] {}",
                    Local::now().to_rfc3339(),
                    record.level(),
                    record.target(),
                    msg
                ))
            })
            .level(level)
            .chain(std::io::stdout());

        if logging.enable {
            if let Some(file) = logging.file.as_deref() {
                dispatch = dispatch.chain(fern::log_file(file)?);
            }
        }

        dispatch.apply()?;
        Ok(())
    }

    /// Load `default.toml` next to the executable, falling back to defaults.
    fn load_config() -> GatewayConfig {
        let Ok(dir) = exe_dir() else {
            return GatewayConfig::default();
        };
        config::load(&dir.join("default.toml")).unwrap_or_default()
    }

    fn parse_map_request() -> anyhow::Result<Option<(u64, u64)>> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        match args.as_slice() {
            [] => Ok(None),
            [addr, len] => {
                let addr = u64::from_str_radix(addr.trim_start_matches("0x"), 16)
                    .context("bad physical address")?;
                let len = u64::from_str_radix(len.trim_start_matches("0x"), 16)
                    .context("bad length")?;
                Ok(Some((addr, len)))
            }
            _ => bail!("usage: hwgate_probe [PHYS_ADDR_HEX LEN_HEX]"),
        }
    }

    pub fn run() -> anyhow::Result<()> {
        let cfg = load_config();
        setup_logging(&cfg.logging).context("logging setup failed")?;

        let map_request = parse_map_request()?;

        let gateway = Gateway::from_config(&cfg)?;
        if let Err(err) = gateway.init() {
            bail!("gateway init failed: {err} (run as Admin, driver binary next to the exe)");
        }

        let status = gateway.read_port8(KBC_STATUS_PORT);
        let data = gateway.read_port8(KBC_DATA_PORT);
        log::info!("KBC status=0x{status:02x} data=0x{data:02x}");

        if let Some((addr, len)) = map_request {
            if !gateway.mapping_supported() {
                log::warn!("physical-memory mapping unsupported on this OS, skipping");
            } else {
                match gateway.map_physical(addr, len) {
                    Some(base) => {
                        // MMIO: the first byte must be read volatilely.
                        let first = unsafe { base.as_ptr().read_volatile() };
                        log::info!("mapped {len:#x} bytes at {addr:#x} -> {:p}, first byte 0x{first:02x}", base.as_ptr());
                        gateway.unmap_physical(base);
                    }
                    None => log::warn!("mapping {len:#x} bytes at {addr:#x} failed"),
                }
            }
        }

        gateway.shutdown();
        Ok(())
    }
}
