//! Locating the `adb` executable.
//!
//! Acquiring the tool is not the bridge's job; it only has to be present
//! before any sync starts.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tracing::debug;

#[cfg(windows)]
const ADB_EXE: &str = "adb.exe";

#[cfg(not(windows))]
const ADB_EXE: &str = "adb";

/// Resolve the `adb` executable: the configured path if given, otherwise `PATH`.
pub fn locate_adb(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if !path.is_file() {
            bail!("configured adb_path {} does not exist", path.display());
        }
        return Ok(path.to_path_buf());
    }
    match find_in_path(ADB_EXE, env::var_os("PATH").as_deref()) {
        Some(path) => {
            debug!(path = %path.display(), "found adb on PATH");
            Ok(path)
        }
        None => bail!("{ADB_EXE} not found on PATH (install platform-tools or set adb_path)"),
    }
}

/// First `dir/name` that is a file, scanning `search_path` in order.
pub fn find_in_path(name: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    let search_path = search_path?;
    env::split_paths(search_path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
