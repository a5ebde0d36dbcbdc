//! Save slot synchronization between the local save root and the device.
//!
//! The app's private directory cannot be reached by `push`/`pull`, so every
//! sync relays through the staging directory:
//!
//! ```text
//! upload:   local slot --push--> staging --cp (as app)--> app slot
//! download: app slot --cat (as app) > staging--> staging --pull--> local slot
//! ```
//!
//! Callers must not run two syncs for the same slot concurrently; they share
//! the staging directory.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, instrument, warn};

use crate::core::hex_payload::decode_hex_payload;
use crate::core::layout::DeviceLayout;
use crate::core::ledger::{StepLedger, SyncReport, SyncStep};
use crate::core::types::{SaveFile, SlotNumber, SyncDirection};
use crate::io::adb::{RemoteShell, Transfer};
use crate::io::save_root::resolve_save_root;
use crate::staging::prepare_staging;

/// Per-call sync options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Treat a missing source slot as a successful no-op. Defaults to `true`.
    pub ignore_non_existent: bool,
    /// Local save root. The platform default when `None`.
    pub save_root: Option<PathBuf>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            ignore_non_existent: true,
            save_root: None,
        }
    }
}

impl SyncOptions {
    pub fn strict(mut self) -> Self {
        self.ignore_non_existent = false;
        self
    }

    pub fn with_save_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.save_root = Some(root.into());
        self
    }
}

/// External parser for save file bytes read straight off the device.
pub trait SaveDecoder {
    type Output;

    fn decode(&self, file: SaveFile, bytes: Vec<u8>) -> Result<Self::Output>;
}

/// Returns the file's bytes unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawSave;

impl SaveDecoder for RawSave {
    type Output = Vec<u8>;

    fn decode(&self, _file: SaveFile, bytes: Vec<u8>) -> Result<Vec<u8>> {
        Ok(bytes)
    }
}

/// Moves save slots between the local save root and the app's private storage.
pub struct SaveSync<'a, S, T> {
    shell: &'a S,
    transfer: &'a T,
    layout: DeviceLayout,
}

impl<'a, S: RemoteShell, T: Transfer> SaveSync<'a, S, T> {
    pub fn new(shell: &'a S, transfer: &'a T, layout: DeviceLayout) -> Self {
        Self {
            shell,
            transfer,
            layout,
        }
    }

    /// Copy local slot `slot` into the app's save directory.
    ///
    /// Without a local slot directory nothing touches the device: the call
    /// succeeds as skipped when `ignore_non_existent` is set and errors
    /// otherwise. The push and the final copy decide the result; stopping
    /// the app and removing its `save.jkr` are best-effort.
    #[instrument(skip_all, fields(slot = slot))]
    pub fn upload(&self, slot: SlotNumber, opts: &SyncOptions) -> Result<SyncReport> {
        let root = resolve_save_root(opts.save_root.as_deref())?;
        let local_slot = root.join(slot.to_string());
        if !local_slot.is_dir() {
            if opts.ignore_non_existent {
                info!(path = %local_slot.display(), "no local slot, skipping upload");
                return Ok(SyncReport::skipped(
                    SyncDirection::Upload,
                    slot,
                    StepLedger::new(),
                ));
            }
            bail!("couldn't find save directory {}", local_slot.display());
        }

        let package = self.layout.package.as_str();
        let mut ledger = prepare_staging(self.shell, &self.layout, slot)?;

        let pushed = self
            .transfer
            .push(&local_slot.join("."), &self.layout.staging_slot_dir(slot))?;
        ledger.required(SyncStep::Push, pushed);

        // The running game would hold the save open and write it back on exit.
        let stopped = self.shell.run(&self.layout.force_stop(), None)?;
        if !stopped.success() {
            warn!(exit_code = stopped.exit_code, "failed to stop app");
        }
        ledger.best_effort(SyncStep::ForceStop, stopped.exit_code);

        // `cp -r` merges into the existing slot, so a save.jkr missing locally
        // would otherwise survive on the device.
        let removed = self
            .shell
            .run(&self.layout.remove_app_file(slot, SaveFile::Save), Some(package))?;
        debug!(exit_code = removed.exit_code, "removed app save.jkr");
        ledger.best_effort(SyncStep::RemoveAppSave, removed.exit_code);

        let copied = self
            .shell
            .run(&self.layout.copy_staging_slot_into_app(slot), Some(package))?;
        ledger.required(SyncStep::CopyIntoApp, copied.exit_code);

        let report = SyncReport::completed(SyncDirection::Upload, slot, ledger);
        log_report(&report);
        Ok(report)
    }

    /// Copy the app's slot `slot` into the local save root.
    ///
    /// The local save root itself must exist. When `profile.jkr` or `meta.jkr`
    /// cannot be relayed the slot is taken as absent on the device and the
    /// call returns before relaying `save.jkr` or pulling: skipped when
    /// `ignore_non_existent` is set, failed otherwise.
    ///
    /// The local `save.jkr` is removed before pulling so a run finished on the
    /// device doesn't linger locally. If that removal fails for any reason other
    /// than the file being absent, the call returns `Err` without pulling; the
    /// staging relays already run are left in place.
    #[instrument(skip_all, fields(slot = slot))]
    pub fn download(&self, slot: SlotNumber, opts: &SyncOptions) -> Result<SyncReport> {
        let root = resolve_save_root(opts.save_root.as_deref())?;
        if !root.is_dir() {
            bail!("couldn't find save directory {}", root.display());
        }
        let local_slot = root.join(slot.to_string());
        fs::create_dir_all(&local_slot)
            .with_context(|| format!("create {}", local_slot.display()))?;

        let package = self.layout.package.as_str();
        let mut ledger = prepare_staging(self.shell, &self.layout, slot)?;

        for file in SaveFile::ALL.into_iter().filter(|file| file.is_mandatory()) {
            let relayed = self.shell.run(
                &self.layout.relay_app_file_to_staging(slot, file),
                Some(package),
            )?;
            ledger.required(SyncStep::Relay(file), relayed.exit_code);
        }
        if !ledger.succeeded() {
            info!(
                failed = ?ledger.failures(),
                "slot missing on device"
            );
            if opts.ignore_non_existent {
                return Ok(SyncReport::skipped(SyncDirection::Download, slot, ledger));
            }
            let report = SyncReport::completed(SyncDirection::Download, slot, ledger);
            log_report(&report);
            return Ok(report);
        }

        let relayed = self.shell.run(
            &self.layout.relay_app_file_to_staging(slot, SaveFile::Save),
            Some(package),
        )?;
        ledger.best_effort(SyncStep::Relay(SaveFile::Save), relayed.exit_code);
        if !relayed.success() {
            // No run in progress. The shell still created the redirect target.
            debug!("no save.jkr on device");
            let discarded = self
                .shell
                .run(&self.layout.remove_staging_file(slot, SaveFile::Save), None)?;
            ledger.best_effort(SyncStep::DiscardStagedSave, discarded.exit_code);
        }

        let local_save = local_slot.join(SaveFile::Save.file_name());
        match fs::remove_file(&local_save) {
            Ok(()) => debug!(path = %local_save.display(), "removed local save.jkr"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| format!("remove {}", local_save.display()));
            }
        }
        // Only reached once the local save is gone.
        ledger.best_effort(SyncStep::RemoveLocalSave, 0);

        let pulled = self
            .transfer
            .pull(&self.layout.staging_slot_contents(slot), &local_slot)?;
        ledger.required(SyncStep::Pull, pulled);

        let report = SyncReport::completed(SyncDirection::Download, slot, ledger);
        log_report(&report);
        Ok(report)
    }

    /// Read one save file straight from the app directory via a hex dump.
    ///
    /// Returns `Ok(None)` when the dump is empty (file missing or unreadable).
    /// A dump cut off at the output limit is an error, never a short file.
    #[instrument(skip_all, fields(slot = slot, file = %file))]
    pub fn read_file<D: SaveDecoder>(
        &self,
        slot: SlotNumber,
        file: SaveFile,
        decoder: &D,
    ) -> Result<Option<D::Output>> {
        let output = self.shell.run(
            &self.layout.hex_dump_app_file(slot, file),
            Some(&self.layout.package),
        )?;
        if output.truncated {
            bail!(
                "hex dump of {file} in slot {slot} exceeded the output limit \
                 ({} chars captured); raise output_limit_bytes",
                output.stdout.len()
            );
        }
        let Some(bytes) = decode_hex_payload(&output.stdout)
            .with_context(|| format!("read {file} of slot {slot}"))?
        else {
            debug!(exit_code = output.exit_code, "save file not found");
            return Ok(None);
        };
        debug!(bytes = bytes.len(), "read save file");
        decoder.decode(file, bytes).map(Some)
    }
}

fn log_report(report: &SyncReport) {
    if report.succeeded() {
        info!(direction = %report.direction, slot = report.slot, "sync succeeded");
    } else {
        warn!(
            direction = %report.direction,
            slot = report.slot,
            failed = ?report.ledger.failures(),
            "sync failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::SyncOutcome;
    use crate::test_support::{DeviceCall, FakeDevice, LocalSaves, ShellCall};

    const PKG: &str = "com.unofficial.balatro";

    fn sync(device: &FakeDevice) -> SaveSync<'_, FakeDevice, FakeDevice> {
        SaveSync::new(device, device, DeviceLayout::default())
    }

    #[test]
    fn upload_absent_slot_is_noop_success() {
        let device = FakeDevice::new();
        let saves = LocalSaves::new().expect("saves");
        for slot in [1, 2, 3, 42] {
            let report = sync(&device)
                .upload(slot, &SyncOptions::default().with_save_root(saves.root()))
                .expect("upload");
            assert_eq!(report.outcome, SyncOutcome::SkippedAbsent);
            assert!(report.succeeded());
        }
        assert!(device.calls().is_empty());
    }

    #[test]
    fn strict_upload_of_absent_slot_errors_without_device_calls() {
        let device = FakeDevice::new();
        let saves = LocalSaves::new().expect("saves");
        let opts = SyncOptions::default()
            .strict()
            .with_save_root(saves.root());
        let err = sync(&device).upload(1, &opts).unwrap_err();
        assert!(err.to_string().contains("couldn't find save directory"));
        assert!(device.calls().is_empty());
    }

    #[test]
    fn upload_issues_steps_in_order() {
        let device = FakeDevice::new();
        let saves = LocalSaves::new().expect("saves");
        for file in SaveFile::ALL {
            saves.write(3, file, file.stem().as_bytes()).expect("write");
        }

        let report = sync(&device)
            .upload(3, &SyncOptions::default().with_save_root(saves.root()))
            .expect("upload");

        assert!(report.succeeded());
        assert_eq!(
            report.ledger.steps(),
            vec![
                SyncStep::ClearStaging,
                SyncStep::MakeStagingSlot,
                SyncStep::MakeAppSlot,
                SyncStep::Push,
                SyncStep::ForceStop,
                SyncStep::RemoveAppSave,
                SyncStep::CopyIntoApp,
            ]
        );
        assert_eq!(
            device.calls(),
            vec![
                DeviceCall::Shell(ShellCall::device("rm -r /data/local/tmp/balatro/")),
                DeviceCall::Shell(ShellCall::device("mkdir -p /data/local/tmp/balatro/3/")),
                DeviceCall::Shell(ShellCall::app(PKG, "mkdir -p ./files/save/game/3/")),
                DeviceCall::Push {
                    local: saves.slot_dir(3).join("."),
                    remote: "/data/local/tmp/balatro/3/".to_string(),
                },
                DeviceCall::Shell(ShellCall::device("am force-stop com.unofficial.balatro")),
                DeviceCall::Shell(ShellCall::app(PKG, "rm ./files/save/game/3/save.jkr")),
                DeviceCall::Shell(ShellCall::app(
                    PKG,
                    "cp -r /data/local/tmp/balatro/3 ./files/save/game"
                )),
            ]
        );
        assert_eq!(device.force_stops(), vec![PKG.to_string()]);
        for file in SaveFile::ALL {
            assert_eq!(
                device.app_file(PKG, &format!("files/save/game/3/{}", file.file_name())),
                Some(file.stem().as_bytes().to_vec())
            );
        }
    }

    #[test]
    fn upload_removes_stale_app_save_when_local_has_none() {
        let device = FakeDevice::new();
        device.put_app_file(PKG, "files/save/game/1/save.jkr", b"stale run");
        let saves = LocalSaves::new().expect("saves");
        saves.write(1, SaveFile::Profile, b"p").expect("write");
        saves.write(1, SaveFile::Meta, b"m").expect("write");

        let report = sync(&device)
            .upload(1, &SyncOptions::default().with_save_root(saves.root()))
            .expect("upload");

        assert!(report.succeeded());
        assert!(
            device
                .shell_calls()
                .contains(&ShellCall::app(PKG, "rm ./files/save/game/1/save.jkr"))
        );
        assert_eq!(device.app_file(PKG, "files/save/game/1/save.jkr"), None);
        assert_eq!(
            device.app_file(PKG, "files/save/game/1/profile.jkr"),
            Some(b"p".to_vec())
        );
    }

    #[test]
    fn upload_ignores_best_effort_failures() {
        let device = FakeDevice::new();
        device.fail_shell("am force-stop", 255);
        let saves = LocalSaves::new().expect("saves");
        saves.write(2, SaveFile::Profile, b"p").expect("write");

        let report = sync(&device)
            .upload(2, &SyncOptions::default().with_save_root(saves.root()))
            .expect("upload");

        assert!(report.succeeded());
        // No app save existed, so its removal failed too.
        assert_ne!(
            report
                .ledger
                .get(SyncStep::RemoveAppSave)
                .expect("recorded")
                .exit_code,
            0
        );
    }

    #[test]
    fn upload_fails_when_push_fails() {
        let device = FakeDevice::new();
        device.fail_push(1);
        let saves = LocalSaves::new().expect("saves");
        saves.write(2, SaveFile::Profile, b"p").expect("write");

        let report = sync(&device)
            .upload(2, &SyncOptions::default().with_save_root(saves.root()))
            .expect("upload");

        assert!(!report.succeeded());
        assert_eq!(report.ledger.failures(), vec![SyncStep::Push]);
    }

    #[test]
    fn upload_fails_when_copy_fails() {
        let device = FakeDevice::new();
        device.fail_shell("cp -r", 1);
        let saves = LocalSaves::new().expect("saves");
        saves.write(2, SaveFile::Meta, b"m").expect("write");

        let report = sync(&device)
            .upload(2, &SyncOptions::default().with_save_root(saves.root()))
            .expect("upload");

        assert!(!report.succeeded());
        assert_eq!(report.ledger.failures(), vec![SyncStep::CopyIntoApp]);
    }

    #[test]
    fn download_requires_local_save_root() {
        let device = FakeDevice::new();
        let saves = LocalSaves::new().expect("saves");
        let missing = saves.root().join("nope");
        let err = sync(&device)
            .download(1, &SyncOptions::default().with_save_root(&missing))
            .unwrap_err();
        assert!(err.to_string().contains("couldn't find save directory"));
        assert!(device.calls().is_empty());
        assert!(!missing.exists());
    }

    #[test]
    fn download_absent_slot_skips_pull() {
        let device = FakeDevice::new();
        let saves = LocalSaves::new().expect("saves");
        let report = sync(&device)
            .download(4, &SyncOptions::default().with_save_root(saves.root()))
            .expect("download");

        assert_eq!(report.outcome, SyncOutcome::SkippedAbsent);
        assert!(report.succeeded());
        assert!(device.transfer_calls().is_empty());
        assert!(saves.slot_dir(4).is_dir());
    }

    #[test]
    fn strict_download_of_absent_slot_fails_before_save_relay() {
        let device = FakeDevice::new();
        let saves = LocalSaves::new().expect("saves");
        let opts = SyncOptions::default()
            .strict()
            .with_save_root(saves.root());

        let report = sync(&device).download(5, &opts).expect("download");

        assert_eq!(report.outcome, SyncOutcome::Completed);
        assert!(!report.succeeded());
        assert_eq!(
            report.ledger.failures(),
            vec![
                SyncStep::Relay(SaveFile::Profile),
                SyncStep::Relay(SaveFile::Meta),
            ]
        );
        assert!(
            !device
                .shell_calls()
                .iter()
                .any(|call| call.command.contains("save.jkr"))
        );
        assert!(device.transfer_calls().is_empty());
    }

    #[test]
    fn download_relays_then_pulls() {
        let device = FakeDevice::new();
        for file in SaveFile::ALL {
            device.put_app_file(
                PKG,
                &format!("files/save/game/2/{}", file.file_name()),
                file.stem().as_bytes(),
            );
        }
        let saves = LocalSaves::new().expect("saves");

        let report = sync(&device)
            .download(2, &SyncOptions::default().with_save_root(saves.root()))
            .expect("download");

        assert!(report.succeeded());
        assert_eq!(
            report.ledger.steps()[3..],
            [
                SyncStep::Relay(SaveFile::Profile),
                SyncStep::Relay(SaveFile::Meta),
                SyncStep::Relay(SaveFile::Save),
                SyncStep::RemoveLocalSave,
                SyncStep::Pull,
            ]
        );
        assert_eq!(
            device.transfer_calls(),
            vec![DeviceCall::Pull {
                remote: "/data/local/tmp/balatro/2/.".to_string(),
                local: saves.slot_dir(2),
            }]
        );
        for file in SaveFile::ALL {
            assert_eq!(saves.read(2, file), Some(file.stem().as_bytes().to_vec()));
        }
    }

    #[test]
    fn download_without_device_save_removes_local_save() {
        let device = FakeDevice::new();
        device.put_app_file(PKG, "files/save/game/1/profile.jkr", b"p");
        device.put_app_file(PKG, "files/save/game/1/meta.jkr", b"m");
        let saves = LocalSaves::new().expect("saves");
        saves.write(1, SaveFile::Save, b"finished run").expect("write");

        let report = sync(&device)
            .download(1, &SyncOptions::default().with_save_root(saves.root()))
            .expect("download");

        assert!(report.succeeded());
        assert!(report.ledger.get(SyncStep::DiscardStagedSave).is_some());
        assert_eq!(saves.read(1, SaveFile::Save), None);
        assert_eq!(saves.read(1, SaveFile::Profile), Some(b"p".to_vec()));
    }

    #[test]
    fn download_aborts_when_local_save_cannot_be_removed() {
        let device = FakeDevice::new();
        for file in SaveFile::ALL {
            device.put_app_file(
                PKG,
                &format!("files/save/game/1/{}", file.file_name()),
                b"x",
            );
        }
        let saves = LocalSaves::new().expect("saves");
        // A directory in place of save.jkr can't be removed with remove_file.
        let blocker = saves.slot_dir(1).join(SaveFile::Save.file_name());
        fs::create_dir_all(&blocker).expect("mkdir");

        let err = sync(&device)
            .download(1, &SyncOptions::default().with_save_root(saves.root()))
            .unwrap_err();

        assert!(format!("{err:#}").contains("remove"));
        assert!(blocker.is_dir());
        assert!(device.transfer_calls().is_empty());
        assert!(device.exists("/data/local/tmp/balatro/1/save.jkr"));
    }

    #[test]
    fn download_fails_when_pull_fails() {
        let device = FakeDevice::new();
        device.put_app_file(PKG, "files/save/game/1/profile.jkr", b"p");
        device.put_app_file(PKG, "files/save/game/1/meta.jkr", b"m");
        device.fail_pull(1);
        let saves = LocalSaves::new().expect("saves");

        let report = sync(&device)
            .download(1, &SyncOptions::default().with_save_root(saves.root()))
            .expect("download");

        assert!(!report.succeeded());
        assert_eq!(report.ledger.failures(), vec![SyncStep::Pull]);
    }

    #[test]
    fn read_file_decodes_hex_dump() {
        let device = FakeDevice::new();
        device.put_app_file(PKG, "files/save/game/1/meta.jkr", &[0x78, 0x9c, 0x00, 0xff]);

        let bytes = sync(&device)
            .read_file(1, SaveFile::Meta, &RawSave)
            .expect("read");

        assert_eq!(bytes, Some(vec![0x78, 0x9c, 0x00, 0xff]));
        assert_eq!(
            device.shell_calls(),
            vec![ShellCall::app(PKG, "xxd -c 0 -p ./files/save/game/1/meta.jkr")]
        );
        assert!(device.transfer_calls().is_empty());
    }

    #[test]
    fn read_file_rejects_truncated_dump() {
        let device = FakeDevice::new();
        device.put_app_file(PKG, "files/save/game/1/meta.jkr", &[0, 0x11, 0x22, 0x33, 0x44]);
        // Cut on an even boundary so the partial dump would still decode.
        device.limit_output(4);

        let err = sync(&device)
            .read_file(1, SaveFile::Meta, &RawSave)
            .unwrap_err();
        assert!(err.to_string().contains("exceeded the output limit"));
    }

    #[test]
    fn read_missing_file_is_not_found() {
        let device = FakeDevice::new();
        let result = sync(&device)
            .read_file(1, SaveFile::Save, &RawSave)
            .expect("read");
        assert_eq!(result, None);
    }

    #[test]
    fn read_empty_dump_is_not_found_not_empty_bytes() {
        let device = FakeDevice::new();
        device.put_app_file(PKG, "files/save/game/1/save.jkr", b"");
        let result = sync(&device)
            .read_file(1, SaveFile::Save, &RawSave)
            .expect("read");
        assert_eq!(result, None);
    }

    #[test]
    fn read_file_hands_bytes_to_decoder() {
        struct Length;
        impl SaveDecoder for Length {
            type Output = (SaveFile, usize);
            fn decode(&self, file: SaveFile, bytes: Vec<u8>) -> Result<Self::Output> {
                Ok((file, bytes.len()))
            }
        }

        let device = FakeDevice::new();
        device.put_app_file(PKG, "files/save/game/3/profile.jkr", &[1, 2, 3]);
        let result = sync(&device)
            .read_file(3, SaveFile::Profile, &Length)
            .expect("read");
        assert_eq!(result, Some((SaveFile::Profile, 3)));
    }
}
