//! Deterministic, pure logic shared by the bridge.
//!
//! Core modules must be free of I/O side effects. They build remote command
//! strings, record step results, and decode payloads, so they can be tested
//! without a device attached.

pub mod hex_payload;
pub mod layout;
pub mod ledger;
pub mod types;
