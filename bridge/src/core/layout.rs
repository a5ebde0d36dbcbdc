//! Device filesystem layout and the remote shell commands built from it.
//!
//! App-private storage is reachable only from commands run inside the app's
//! `run-as` context, so every file crossing the local/device boundary goes
//! through a neutral staging directory that `push`/`pull` can reach. Commands
//! that touch the app directory use paths relative to the app's data dir and
//! must be run with the app context; staging commands must not.

use crate::core::types::{SaveFile, SlotNumber};

pub const DEFAULT_PACKAGE: &str = "com.unofficial.balatro";
pub const DEFAULT_STAGING_ROOT: &str = "/data/local/tmp/balatro";
pub const DEFAULT_APP_SAVE_ROOT: &str = "./files/save/game";

/// Where save slots live on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLayout {
    /// Android package id; also the `run-as` context for app-private commands.
    pub package: String,
    /// Neutral relay directory reachable by `push`/`pull`.
    pub staging_root: String,
    /// Save root relative to the app's data directory.
    pub app_save_root: String,
}

impl Default for DeviceLayout {
    fn default() -> Self {
        Self::new(DEFAULT_PACKAGE, DEFAULT_STAGING_ROOT, DEFAULT_APP_SAVE_ROOT)
    }
}

impl DeviceLayout {
    pub fn new(
        package: impl Into<String>,
        staging_root: impl Into<String>,
        app_save_root: impl Into<String>,
    ) -> Self {
        Self {
            package: package.into(),
            staging_root: trim_trailing_slash(staging_root.into()),
            app_save_root: trim_trailing_slash(app_save_root.into()),
        }
    }

    /// `<staging>/<slot>/`, the push destination.
    pub fn staging_slot_dir(&self, slot: SlotNumber) -> String {
        format!("{}/{slot}/", self.staging_root)
    }

    /// `<staging>/<slot>/.`, the pull source (copies contents, not the directory).
    pub fn staging_slot_contents(&self, slot: SlotNumber) -> String {
        format!("{}/{slot}/.", self.staging_root)
    }

    pub fn staging_file(&self, slot: SlotNumber, file: SaveFile) -> String {
        format!("{}/{slot}/{}", self.staging_root, file.file_name())
    }

    pub fn app_slot_dir(&self, slot: SlotNumber) -> String {
        format!("{}/{slot}/", self.app_save_root)
    }

    pub fn app_file(&self, slot: SlotNumber, file: SaveFile) -> String {
        format!("{}/{slot}/{}", self.app_save_root, file.file_name())
    }

    // Staging context.

    pub fn remove_staging_root(&self) -> String {
        format!("rm -r {}/", self.staging_root)
    }

    pub fn make_staging_slot(&self, slot: SlotNumber) -> String {
        format!("mkdir -p {}", self.staging_slot_dir(slot))
    }

    pub fn remove_staging_file(&self, slot: SlotNumber, file: SaveFile) -> String {
        format!("rm {}", self.staging_file(slot, file))
    }

    pub fn force_stop(&self) -> String {
        format!("am force-stop {}", self.package)
    }

    // App context.

    pub fn make_app_slot(&self, slot: SlotNumber) -> String {
        format!("mkdir -p {}", self.app_slot_dir(slot))
    }

    pub fn remove_app_file(&self, slot: SlotNumber, file: SaveFile) -> String {
        format!("rm {}", self.app_file(slot, file))
    }

    /// Copy the staged slot directory over the app's slot directory.
    pub fn copy_staging_slot_into_app(&self, slot: SlotNumber) -> String {
        format!("cp -r {}/{slot} {}", self.staging_root, self.app_save_root)
    }

    /// Read an app file as the app and let the device shell write it into staging.
    pub fn relay_app_file_to_staging(&self, slot: SlotNumber, file: SaveFile) -> String {
        format!(
            "cat {} > {}",
            self.app_file(slot, file),
            self.staging_file(slot, file)
        )
    }

    /// Dump an app file as one contiguous lowercase hex line.
    pub fn hex_dump_app_file(&self, slot: SlotNumber, file: SaveFile) -> String {
        format!("xxd -c 0 -p {}", self.app_file(slot, file))
    }
}

fn trim_trailing_slash(mut path: String) -> String {
    while path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    path
}
