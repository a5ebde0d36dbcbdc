//! Package installation.

use std::fmt;
use std::path::Path;

use anyhow::{Result, bail};
use tracing::{info, instrument, warn};

use crate::io::adb::Adb;

/// The install tool exited non-zero. The binary exits with the same code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallFailed {
    pub code: i32,
}

impl fmt::Display for InstallFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "adb install returned {}", self.code)
    }
}

impl std::error::Error for InstallFailed {}

/// Installs application packages on the device.
pub trait PackageInstaller {
    fn install(&self, apk: &Path) -> Result<i32>;
    fn kill_server(&self) -> Result<i32>;
}

impl PackageInstaller for Adb {
    fn install(&self, apk: &Path) -> Result<i32> {
        Adb::install(self, apk)
    }

    fn kill_server(&self) -> Result<i32> {
        Adb::kill_server(self)
    }
}

/// Install a signed package, then stop the adb server.
///
/// A non-zero install code is returned as [`InstallFailed`]; the caller
/// decides what that means for the process.
#[instrument(skip_all, fields(apk = %apk.display()))]
pub fn install_apk<I: PackageInstaller>(installer: &I, apk: &Path) -> Result<()> {
    if !apk.is_file() {
        bail!("package {} not found", apk.display());
    }
    let code = installer.install(apk)?;
    if code != 0 {
        return Err(InstallFailed { code }.into());
    }
    info!("package installed");

    let killed = installer.kill_server()?;
    if killed != 0 {
        warn!(exit_code = killed, "failed to stop adb server");
    }
    Ok(())
}
