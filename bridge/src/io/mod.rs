//! I/O adapters for bridge commands.

pub mod adb;
pub mod config;
pub mod process;
pub mod save_root;
pub mod tool;
