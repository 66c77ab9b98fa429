//! rebase::result
//!
//! Values handed back to the caller: per-call results and per-step reports.

use crate::core::step::RebaseStepInfo;
use crate::core::types::{Oid, RefName};

/// How a `continue` (or `skip`) call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebaseStatus {
    /// Every step is done and the branch points at the rewritten tip.
    Complete,
    /// The current step left unmerged paths in the index.
    Conflicts,
    /// The current step asked for the caller to intervene.
    Stop,
}

/// Snapshot of where the sequence stands after a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebaseResult {
    pub status: RebaseStatus,
    pub completed_step_count: usize,
    pub total_step_count: usize,
    /// The step that halted the sequence. `None` on completion.
    pub current_step_info: Option<RebaseStepInfo>,
}

impl RebaseResult {
    pub fn is_complete(&self) -> bool {
        self.status == RebaseStatus::Complete
    }
}

/// What finishing a step produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// A new commit was created.
    Committed(Oid),
    /// The changes were already present on the rewritten tip; no commit.
    AlreadyApplied,
    /// The caller skipped the step.
    Skipped,
    /// An exec step was acknowledged by the caller.
    Executed,
}

/// Report passed to the step-completed callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AfterStepInfo {
    pub step: RebaseStepInfo,
    pub outcome: StepOutcome,
}

impl AfterStepInfo {
    /// The commit the step created, if any.
    pub fn commit(&self) -> Option<&Oid> {
        match &self.outcome {
            StepOutcome::Committed(oid) => Some(oid),
            _ => None,
        }
    }

    pub fn was_already_applied(&self) -> bool {
        self.outcome == StepOutcome::AlreadyApplied
    }
}

/// Result of [`RebaseSequencer::abort`](super::RebaseSequencer::abort).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortOutcome {
    /// The sequence was discarded and HEAD restored to `restored`, attached
    /// to `branch` when there is one.
    Aborted {
        restored: Oid,
        branch: Option<RefName>,
    },
    /// The state file was unreadable and held no usable restore point. It
    /// was removed and HEAD left where it was.
    Discarded,
    /// There was nothing to abort.
    NothingToAbort,
}
