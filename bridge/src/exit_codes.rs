//! Stable exit codes for bridge CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed due to invalid config, a missing tool or directory, or other errors.
pub const INVALID: i32 = 1;
/// `push`/`pull` ran but a load-bearing step failed.
pub const SYNC_FAILED: i32 = 2;
/// `read` found no such file on the device.
pub const NOT_FOUND: i32 = 3;
