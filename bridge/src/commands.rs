//! CLI command implementations.
//!
//! Each command prints a one-line `key=value` summary to stdout and returns the
//! process exit code; errors are left to the caller to report.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::ledger::{SyncOutcome, SyncReport};
use crate::core::types::{SaveFile, SlotNumber};
use crate::exit_codes;
use crate::install::{PackageInstaller, install_apk};
use crate::io::adb::{RemoteShell, Transfer};
use crate::sync::{RawSave, SaveSync, SyncOptions};

/// Upload a local slot to the device.
pub fn push_save<S: RemoteShell, T: Transfer>(
    sync: &SaveSync<'_, S, T>,
    slot: SlotNumber,
    opts: &SyncOptions,
) -> Result<i32> {
    let report = sync.upload(slot, opts)?;
    println!("{}", render_report(&report));
    Ok(report_exit_code(&report))
}

/// Download a device slot into the local save root.
pub fn pull_save<S: RemoteShell, T: Transfer>(
    sync: &SaveSync<'_, S, T>,
    slot: SlotNumber,
    opts: &SyncOptions,
) -> Result<i32> {
    let report = sync.download(slot, opts)?;
    println!("{}", render_report(&report));
    Ok(report_exit_code(&report))
}

/// Read one save file off the device, writing it to `out` when given.
pub fn read_save<S: RemoteShell, T: Transfer>(
    sync: &SaveSync<'_, S, T>,
    slot: SlotNumber,
    file: SaveFile,
    out: Option<&Path>,
) -> Result<i32> {
    let Some(bytes) = sync.read_file(slot, file, &RawSave)? else {
        println!("read: slot={slot} file={file} found=false");
        return Ok(exit_codes::NOT_FOUND);
    };
    if let Some(path) = out {
        fs::write(path, &bytes).with_context(|| format!("write {}", path.display()))?;
    }
    println!(
        "read: slot={slot} file={file} found=true bytes={}",
        bytes.len()
    );
    Ok(exit_codes::OK)
}

pub fn install<I: PackageInstaller>(installer: &I, apk: &Path) -> Result<i32> {
    install_apk(installer, apk)?;
    println!("install: apk={} ok=true", apk.display());
    Ok(exit_codes::OK)
}

pub fn render_report(report: &SyncReport) -> String {
    let outcome = match report.outcome {
        SyncOutcome::Completed => "completed",
        SyncOutcome::SkippedAbsent => "skipped-absent",
    };
    let mut line = format!(
        "{}: slot={} outcome={} ok={}",
        report.direction,
        report.slot,
        outcome,
        report.succeeded()
    );
    let failures = report.ledger.failures();
    if !report.succeeded() && !failures.is_empty() {
        let names: Vec<String> = failures.iter().map(ToString::to_string).collect();
        line.push_str(&format!(" failed={}", names.join(",")));
    }
    line
}

pub fn report_exit_code(report: &SyncReport) -> i32 {
    if report.succeeded() {
        exit_codes::OK
    } else {
        exit_codes::SYNC_FAILED
    }
}
