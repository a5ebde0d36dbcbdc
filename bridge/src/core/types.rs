//! Shared types describing save slots and their files.

use std::fmt;

use clap::ValueEnum;

/// Save profile number as the game numbers them (`1`, `2`, `3`, ...).
pub type SlotNumber = u32;

/// One of the files the game keeps inside a save slot directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum SaveFile {
    Profile,
    Meta,
    /// In-progress run. Only present while a run is active.
    Save,
}

impl SaveFile {
    /// All files in the order they are relayed off the device.
    pub const ALL: [SaveFile; 3] = [SaveFile::Profile, SaveFile::Meta, SaveFile::Save];

    pub fn stem(self) -> &'static str {
        match self {
            SaveFile::Profile => "profile",
            SaveFile::Meta => "meta",
            SaveFile::Save => "save",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            SaveFile::Profile => "profile.jkr",
            SaveFile::Meta => "meta.jkr",
            SaveFile::Save => "save.jkr",
        }
    }

    /// Whether a slot is considered absent when this file cannot be read.
    pub fn is_mandatory(self) -> bool {
        !matches!(self, SaveFile::Save)
    }
}

impl fmt::Display for SaveFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

/// Direction of a save sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// Local save directory to device.
    Upload,
    /// Device to local save directory.
    Download,
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncDirection::Upload => f.write_str("upload"),
            SyncDirection::Download => f.write_str("download"),
        }
    }
}
