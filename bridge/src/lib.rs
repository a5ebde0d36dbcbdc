//! Save sync and install bridge between a desktop build tool and the Balatro
//! mobile port on an Android device.
//!
//! The game's saves live in app-private storage that `adb push`/`adb pull`
//! cannot reach. The bridge relays them through a neutral staging directory,
//! using shell commands run in the app's `run-as` context for the private
//! side. The crate keeps the usual split:
//!
//! - **[`core`]**: Pure, deterministic logic (device layout, remote command
//!   strings, step ledger, hex decoding). No I/O.
//! - **[`io`]**: Side-effecting adapters (`adb`, process execution, config,
//!   local save root, tool lookup).
//!
//! Orchestration modules ([`staging`], [`sync`], [`install`], [`commands`])
//! coordinate core logic with I/O to implement CLI commands.

pub mod commands;
pub mod core;
pub mod exit_codes;
pub mod install;
pub mod io;
pub mod logging;
pub mod staging;
pub mod sync;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
