//! Bridge configuration stored in `balatro-bridge.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::core::layout::{
    DEFAULT_APP_SAVE_ROOT, DEFAULT_PACKAGE, DEFAULT_STAGING_ROOT, DeviceLayout,
};

pub const DEFAULT_CONFIG_FILE: &str = "balatro-bridge.toml";
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 16 * 1024 * 1024;

/// Bridge configuration (TOML).
///
/// Missing fields default to the stock Balatro mobile layout and an `adb`
/// found on `PATH`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Explicit `adb` executable. Searched on `PATH` when unset.
    pub adb_path: Option<PathBuf>,

    /// Device serial passed as `adb -s`. Unset means the only attached device.
    pub device_serial: Option<String>,

    /// Package id of the installed game.
    pub package: String,

    /// Neutral device directory used to relay saves.
    pub staging_root: String,

    /// Save root relative to the app's data directory.
    pub app_save_root: String,

    /// Local save root. Platform default when unset.
    pub save_root: Option<PathBuf>,

    /// Kill any single `adb` call running longer than this. No limit when unset.
    pub command_timeout_secs: Option<u64>,

    /// Discard `adb` stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            adb_path: None,
            device_serial: None,
            package: DEFAULT_PACKAGE.to_string(),
            staging_root: DEFAULT_STAGING_ROOT.to_string(),
            app_save_root: DEFAULT_APP_SAVE_ROOT.to_string(),
            save_root: None,
            command_timeout_secs: None,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.package.trim().is_empty() {
            return Err(anyhow!("package must be non-empty"));
        }
        if !is_shell_safe(&self.package) {
            return Err(anyhow!("package contains unsupported characters"));
        }
        if !self.staging_root.starts_with('/') {
            return Err(anyhow!("staging_root must be an absolute device path"));
        }
        for (name, value) in [
            ("staging_root", &self.staging_root),
            ("app_save_root", &self.app_save_root),
        ] {
            if value.trim().is_empty() || !is_shell_safe(value) {
                return Err(anyhow!(
                    "{name} must be a non-empty path without spaces or shell metacharacters"
                ));
            }
        }
        if self.staging_root.trim_end_matches('/').is_empty() {
            return Err(anyhow!("staging_root must not be the device root"));
        }
        if self.command_timeout_secs == Some(0) {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn layout(&self) -> DeviceLayout {
        DeviceLayout::new(&self.package, &self.staging_root, &self.app_save_root)
    }
}

/// Paths are interpolated into remote shell commands unquoted.
fn is_shell_safe(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-'))
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `BridgeConfig::default()`.
pub fn load_config(path: &Path) -> Result<BridgeConfig> {
    if !path.exists() {
        let cfg = BridgeConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: BridgeConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
