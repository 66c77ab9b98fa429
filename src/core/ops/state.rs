//! core::ops::state
//!
//! Persisted rebase sequence state.
//!
//! # Crash Safety Contract
//!
//! 1. **Atomic writes:** [`SequenceState::write`] serializes the whole state
//!    to `sequence.json.tmp`, fsyncs it, and renames it over `sequence.json`.
//!    A crash mid-write leaves the previous snapshot in place.
//!
//! 2. **Commit-then-record:** the sequencer creates a step's commit first and
//!    records it second. A crash in between leaves an unreferenced commit
//!    and a state that still points at the previous tip, so the next
//!    `continue` redoes the step from a consistent base.
//!
//! 3. **Integrity:** the step list carries a SHA-256 digest and the file a
//!    schema version. [`SequenceState::read`] rejects a file where either
//!    does not match instead of resuming a plan it cannot trust. Abort still
//!    works on such a file through [`SequenceState::read_restore_point`].
//!
//! # Storage
//!
//! - `<git_dir>/stepwise/sequence.json` - The only state file. Its presence
//!   means a rebase is in progress.
//!
//! # Invariants
//!
//! - `completed <= steps.len()`
//! - `halt` is only set while a step remains (`completed < steps.len()`)
//! - `last_commit` starts at `onto` and only moves forward to commits whose
//!   first parent is the previous `last_commit`

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::paths::RebasePaths;
use crate::core::step::{RebaseStep, RebaseStepInfo};
use crate::core::types::{Fingerprint, Oid, RefName, UtcTimestamp};

/// Current on-disk schema version.
pub const SEQUENCE_SCHEMA_VERSION: u32 = 1;

/// Errors from reading or writing sequence state.
#[derive(Debug, Error)]
pub enum StateError {
    /// I/O error reading or writing the state file.
    #[error("sequence state i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("sequence state json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The file was written by an incompatible version.
    #[error("sequence state schema v{found} is not supported (expected v{expected})")]
    SchemaMismatch {
        /// Version recorded in the file.
        found: u32,
        /// Version this build understands.
        expected: u32,
    },

    /// The step list no longer matches its recorded digest.
    #[error("sequence step list does not match its digest")]
    DigestMismatch,

    /// The file parsed but violates a state invariant.
    #[error("invalid sequence state: {0}")]
    Invalid(String),
}

impl StateError {
    /// The file exists but its contents cannot be resumed.
    pub fn is_corrupt(&self) -> bool {
        !matches!(self, StateError::Io(_))
    }
}

/// Unique identifier for one rebase run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpId(String);

impl OpId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OpId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OpId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a sequence handed control back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    /// The current step left unmerged paths.
    Conflicts,
    /// The current step asked for caller intervention (edit, reword, exec).
    Stop,
}

/// Where a sequence stands, derived from the persisted fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencePhase {
    NotStarted,
    StepInProgress,
    Halted(HaltReason),
    Complete,
}

/// An original commit and the commit that replaced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewrittenCommit {
    pub original: Oid,
    pub rewritten: Oid,
}

/// Where abort puts HEAD and the branch back.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RestorePoint {
    pub orig_head: Oid,
    #[serde(default)]
    pub branch: Option<RefName>,
    /// Rewritten tip, if known. Used to undo a branch move that already happened.
    #[serde(default)]
    pub last_commit: Option<Oid>,
}

/// The persisted rebase sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceState {
    pub schema_version: u32,
    pub op_id: OpId,
    pub started_at: UtcTimestamp,
    pub updated_at: UtcTimestamp,

    /// Branch being rebased. `None` when HEAD was detached at init.
    pub branch: Option<RefName>,
    /// Tip of the branch (or detached HEAD) before init.
    pub orig_head: Oid,
    pub upstream: Oid,
    pub onto: Oid,

    pub steps: Vec<RebaseStep>,
    /// Digest over `steps` in `todo_line` form.
    pub steps_digest: Fingerprint,

    /// Number of steps finished (committed, already applied, or skipped).
    pub completed: usize,
    pub halt: Option<HaltReason>,

    /// Tip of the rewritten history so far.
    pub last_commit: Oid,
    #[serde(default)]
    pub rewritten: Vec<RewrittenCommit>,
}

impl SequenceState {
    pub fn new(
        branch: Option<RefName>,
        orig_head: Oid,
        upstream: Oid,
        onto: Oid,
        steps: Vec<RebaseStep>,
    ) -> Self {
        let now = UtcTimestamp::now();
        Self {
            schema_version: SEQUENCE_SCHEMA_VERSION,
            op_id: OpId::new(),
            started_at: now.clone(),
            updated_at: now,
            branch,
            orig_head,
            upstream,
            last_commit: onto.clone(),
            onto,
            steps_digest: Self::digest(&steps),
            steps,
            completed: 0,
            halt: None,
            rewritten: Vec::new(),
        }
    }

    /// Digest of a step list.
    pub fn digest(steps: &[RebaseStep]) -> Fingerprint {
        Fingerprint::of_lines(steps.iter().map(RebaseStep::todo_line))
    }

    pub fn total(&self) -> usize {
        self.steps.len()
    }

    pub fn phase(&self) -> SequencePhase {
        match self.halt {
            Some(reason) => SequencePhase::Halted(reason),
            None if self.completed >= self.steps.len() => SequencePhase::Complete,
            None if self.completed == 0 => SequencePhase::NotStarted,
            None => SequencePhase::StepInProgress,
        }
    }

    /// The next step to run (or the halted one).
    pub fn current_step(&self) -> Option<&RebaseStep> {
        self.steps.get(self.completed)
    }

    pub fn current_step_info(&self) -> Option<RebaseStepInfo> {
        self.current_step().map(|s| s.info(self.total()))
    }

    /// Mark the current step finished and move the rewritten tip.
    ///
    /// `rewritten` is `None` when the step produced no commit.
    pub fn advance(&mut self, rewritten: Option<Oid>) {
        if let Some(new_tip) = rewritten {
            if let Some(original) = self.current_step().and_then(|s| s.commit.clone()) {
                self.rewritten.push(RewrittenCommit {
                    original,
                    rewritten: new_tip.clone(),
                });
            }
            self.last_commit = new_tip;
        }
        self.completed = (self.completed + 1).min(self.steps.len());
        self.halt = None;
        self.touch();
    }

    pub fn halt(&mut self, reason: HaltReason) {
        self.halt = Some(reason);
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = UtcTimestamp::now();
    }

    /// Check schema, digest, and counters.
    pub fn verify(&self) -> Result<(), StateError> {
        if self.schema_version != SEQUENCE_SCHEMA_VERSION {
            return Err(StateError::SchemaMismatch {
                found: self.schema_version,
                expected: SEQUENCE_SCHEMA_VERSION,
            });
        }
        if Self::digest(&self.steps) != self.steps_digest {
            return Err(StateError::DigestMismatch);
        }
        if self.completed > self.steps.len() {
            return Err(StateError::Invalid(format!(
                "completed count {} exceeds {} steps",
                self.completed,
                self.steps.len()
            )));
        }
        if self.halt.is_some() && self.completed == self.steps.len() {
            return Err(StateError::Invalid(
                "halted with no step remaining".into(),
            ));
        }
        if let Some(step) = self.steps.iter().enumerate().find(|(i, s)| s.index != *i) {
            return Err(StateError::Invalid(format!(
                "step at position {} records index {}",
                step.0, step.1.index
            )));
        }
        Ok(())
    }

    pub fn path(paths: &RebasePaths) -> PathBuf {
        paths.sequence_path()
    }

    /// Write the state to a temp file, fsync it, and rename it into place.
    ///
    /// # Fault Injection
    ///
    /// With `cfg(test)` or the `fault_injection` feature, writes can be made
    /// to fail via [`fault_injection::set_crash_after`].
    pub fn write(&self, paths: &RebasePaths) -> Result<(), StateError> {
        #[cfg(any(test, feature = "fault_injection"))]
        if fault_injection::should_crash() {
            return Err(StateError::Io(std::io::Error::other(
                "simulated crash for fault injection testing",
            )));
        }

        fs::create_dir_all(paths.state_dir())?;

        let content = serde_json::to_string_pretty(self)?;
        let path = Self::path(paths);
        let temp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, &path)?;

        tracing::debug!(
            op_id = %self.op_id,
            completed = self.completed,
            total = self.steps.len(),
            halt = ?self.halt,
            "wrote sequence state"
        );
        Ok(())
    }

    /// Read and verify the state, if a sequence is in progress.
    pub fn read(paths: &RebasePaths) -> Result<Option<Self>, StateError> {
        let path = Self::path(paths);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let state: Self = serde_json::from_str(&content)?;
        state.verify()?;
        Ok(Some(state))
    }

    pub fn restore_point(&self) -> RestorePoint {
        RestorePoint {
            orig_head: self.orig_head.clone(),
            branch: self.branch.clone(),
            last_commit: Some(self.last_commit.clone()),
        }
    }

    /// Pull the fields abort needs out of a file [`read`](Self::read) rejects.
    ///
    /// `None` when the file is missing or not even a JSON object with an
    /// `orig_head`.
    pub fn read_restore_point(paths: &RebasePaths) -> Option<RestorePoint> {
        let content = fs::read_to_string(Self::path(paths)).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn remove(paths: &RebasePaths) -> Result<(), StateError> {
        let path = Self::path(paths);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    pub fn exists(paths: &RebasePaths) -> bool {
        Self::path(paths).exists()
    }
}

/// Fault injection support for testing crash recovery.
///
/// Only the chosen write fails; later writes go through, so recovery code
/// that writes again can be exercised.
///
/// ```ignore
/// use stepwise::core::ops::state::fault_injection;
///
/// fault_injection::set_crash_after(2);
/// state.write(&paths)?;            // succeeds
/// assert!(state.write(&paths).is_err());
/// state.write(&paths)?;            // succeeds again
/// fault_injection::reset();
/// ```
#[cfg(any(test, feature = "fault_injection"))]
pub mod fault_injection {
    use std::cell::Cell;

    // Thread-local so parallel tests do not see each other's thresholds.
    thread_local! {
        /// Fail the Nth write. 0 disables.
        static CRASH_AFTER_WRITES: Cell<usize> = const { Cell::new(0) };
        static WRITE_COUNT: Cell<usize> = const { Cell::new(0) };
    }

    /// Make the `n`th write from now fail. 0 disables.
    pub fn set_crash_after(n: usize) {
        CRASH_AFTER_WRITES.with(|c| c.set(n));
        WRITE_COUNT.with(|c| c.set(0));
    }

    /// Count a write attempt and report whether it should fail.
    pub fn should_crash() -> bool {
        CRASH_AFTER_WRITES.with(|threshold| {
            let threshold = threshold.get();
            if threshold == 0 {
                return false;
            }
            WRITE_COUNT.with(|count| {
                let next = count.get() + 1;
                count.set(next);
                next == threshold
            })
        })
    }

    pub fn reset() {
        CRASH_AFTER_WRITES.with(|c| c.set(0));
        WRITE_COUNT.with(|c| c.set(0));
    }
}
