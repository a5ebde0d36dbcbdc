//! Local save root resolution.
//!
//! Balatro keeps one directory per save slot under a platform-specific root.
//! On Linux the game runs through Proton, so the saves live inside its Wine
//! prefix.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

const GAME_DIR: &str = "Balatro";
const STEAM_APP_ID: &str = "2379780";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }
}

/// Save root for `platform`, given the user's home and per-user config dirs.
///
/// The config dir is roaming app data on Windows and `~/Library/Application Support`
/// on macOS. Linux ignores it: the game's config dir lives inside the Proton prefix.
pub fn platform_save_root(
    platform: Platform,
    home: Option<&Path>,
    config_dir: Option<&Path>,
) -> Option<PathBuf> {
    match platform {
        Platform::Windows | Platform::MacOs => config_dir.map(|dir| dir.join(GAME_DIR)),
        Platform::Linux => home.map(|dir| {
            dir.join(".local/share/Steam/steamapps/compatdata")
                .join(STEAM_APP_ID)
                .join("pfx/drive_c/users/steamuser/AppData/Roaming")
                .join(GAME_DIR)
        }),
    }
}

/// Platform default save root for the current user.
pub fn default_save_root() -> Result<PathBuf> {
    platform_save_root(
        Platform::current(),
        dirs::home_dir().as_deref(),
        dirs::config_dir().as_deref(),
    )
    .ok_or_else(|| anyhow!("cannot determine save directory (set save_root in config)"))
}

/// Prefer an explicit root over the platform default.
pub fn resolve_save_root(override_root: Option<&Path>) -> Result<PathBuf> {
    match override_root {
        Some(root) => Ok(root.to_path_buf()),
        None => default_save_root(),
    }
}
