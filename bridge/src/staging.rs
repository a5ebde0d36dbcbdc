//! Preparation of the device relay directories before a sync.

use anyhow::Result;
use tracing::{debug, instrument, warn};

use crate::core::layout::DeviceLayout;
use crate::core::ledger::{StepLedger, SyncStep};
use crate::core::types::SlotNumber;
use crate::io::adb::RemoteShell;

/// Wipe the staging root and recreate the slot directories, in this order:
///
/// 1. `rm -r <staging>/` (a missing directory is fine),
/// 2. `mkdir -p <staging>/<slot>/`,
/// 3. `mkdir -p <app saves>/<slot>/` inside the app context.
///
/// Every step is best-effort: failures are recorded and logged, never fatal.
/// The whole staging root goes, not just the slot, so nothing from another
/// slot or an earlier run can ride along into this sync.
#[instrument(skip_all, fields(slot = slot))]
pub fn prepare_staging<S: RemoteShell>(
    shell: &S,
    layout: &DeviceLayout,
    slot: SlotNumber,
) -> Result<StepLedger> {
    let mut ledger = StepLedger::new();

    let cleared = shell.run(&layout.remove_staging_root(), None)?;
    // Fails on first use; the directory did not exist yet.
    debug!(exit_code = cleared.exit_code, "cleared staging root");
    ledger.best_effort(SyncStep::ClearStaging, cleared.exit_code);

    let staging = shell.run(&layout.make_staging_slot(slot), None)?;
    if !staging.success() {
        warn!(exit_code = staging.exit_code, "failed to create staging slot");
    }
    ledger.best_effort(SyncStep::MakeStagingSlot, staging.exit_code);

    let app = shell.run(&layout.make_app_slot(slot), Some(&layout.package))?;
    if !app.success() {
        warn!(exit_code = app.exit_code, "failed to create app slot");
    }
    ledger.best_effort(SyncStep::MakeAppSlot, app.exit_code);

    Ok(ledger)
}
