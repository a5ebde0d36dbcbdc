//! Ordered record of the remote steps a sync performed.
//!
//! Each step's exit code is recorded in execution order. Only load-bearing
//! steps decide the overall result; best-effort steps (cleanup, app stop,
//! stale-file removal) are kept for diagnostics and never fail a sync.

use std::fmt;

use crate::core::types::{SaveFile, SlotNumber, SyncDirection};

/// A single remote or local step performed during a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    ClearStaging,
    MakeStagingSlot,
    MakeAppSlot,
    Push,
    ForceStop,
    RemoveAppSave,
    CopyIntoApp,
    Relay(SaveFile),
    /// Drop the empty file a failed `save` relay leaves behind in staging.
    DiscardStagedSave,
    RemoveLocalSave,
    Pull,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStep::ClearStaging => f.write_str("clear-staging"),
            SyncStep::MakeStagingSlot => f.write_str("make-staging-slot"),
            SyncStep::MakeAppSlot => f.write_str("make-app-slot"),
            SyncStep::Push => f.write_str("push"),
            SyncStep::ForceStop => f.write_str("force-stop"),
            SyncStep::RemoveAppSave => f.write_str("remove-app-save"),
            SyncStep::CopyIntoApp => f.write_str("copy-into-app"),
            SyncStep::Relay(file) => write!(f, "relay-{file}"),
            SyncStep::DiscardStagedSave => f.write_str("discard-staged-save"),
            SyncStep::RemoveLocalSave => f.write_str("remove-local-save"),
            SyncStep::Pull => f.write_str("pull"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRecord {
    pub step: SyncStep,
    pub exit_code: i32,
    /// Whether a non-zero exit code fails the whole operation.
    pub load_bearing: bool,
}

impl StepRecord {
    pub fn failed(&self) -> bool {
        self.exit_code != 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepLedger {
    records: Vec<StepRecord>,
}

impl StepLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step whose failure fails the operation.
    pub fn required(&mut self, step: SyncStep, exit_code: i32) -> &StepRecord {
        self.push(StepRecord {
            step,
            exit_code,
            load_bearing: true,
        })
    }

    /// Record a step whose failure is tolerated.
    pub fn best_effort(&mut self, step: SyncStep, exit_code: i32) -> &StepRecord {
        self.push(StepRecord {
            step,
            exit_code,
            load_bearing: false,
        })
    }

    pub fn steps(&self) -> Vec<SyncStep> {
        self.records.iter().map(|record| record.step).collect()
    }

    pub fn get(&self, step: SyncStep) -> Option<&StepRecord> {
        self.records.iter().find(|record| record.step == step)
    }

    /// True iff no load-bearing step failed.
    pub fn succeeded(&self) -> bool {
        !self
            .records
            .iter()
            .any(|record| record.load_bearing && record.failed())
    }

    /// Load-bearing steps that failed, in execution order.
    pub fn failures(&self) -> Vec<SyncStep> {
        self.records
            .iter()
            .filter(|record| record.load_bearing && record.failed())
            .map(|record| record.step)
            .collect()
    }

    fn push(&mut self, record: StepRecord) -> &StepRecord {
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }
}

/// How a sync ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// All steps ran; see the ledger for the result.
    Completed,
    /// The slot does not exist at the source and absence was tolerated.
    SkippedAbsent,
}

/// Result of one upload or download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub direction: SyncDirection,
    pub slot: SlotNumber,
    pub outcome: SyncOutcome,
    pub ledger: StepLedger,
}

impl SyncReport {
    pub fn skipped(direction: SyncDirection, slot: SlotNumber, ledger: StepLedger) -> Self {
        Self {
            direction,
            slot,
            outcome: SyncOutcome::SkippedAbsent,
            ledger,
        }
    }

    pub fn completed(direction: SyncDirection, slot: SlotNumber, ledger: StepLedger) -> Self {
        Self {
            direction,
            slot,
            outcome: SyncOutcome::Completed,
            ledger,
        }
    }

    /// Absent slots count as success; otherwise the ledger decides.
    pub fn succeeded(&self) -> bool {
        match self.outcome {
            SyncOutcome::SkippedAbsent => true,
            SyncOutcome::Completed => self.ledger.succeeded(),
        }
    }
}
