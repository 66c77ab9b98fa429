//! rebase::error
//!
//! Errors surfaced at the sequencer boundary.

use thiserror::Error;

use crate::core::conflict::ConflictError;
use crate::core::ops::{LockError, StateError};
use crate::core::step::RebaseStepKind;
use crate::core::types::TypeError;
use crate::git::GitError;

/// Errors from sequencer operations.
///
/// A conflicting step is not an error; it is reported through
/// [`RebaseStatus::Conflicts`](super::RebaseStatus::Conflicts).
#[derive(Debug, Error)]
pub enum RebaseError {
    /// A required argument was empty.
    #[error("missing required argument: {name}")]
    MissingArgument {
        /// Argument name
        name: &'static str,
    },

    /// A sequence already exists for this worktree.
    #[error("a rebase is already in progress")]
    RebaseInProgress,

    /// No sequence exists for this worktree.
    #[error("no rebase in progress")]
    NoRebaseInProgress,

    /// A commit was requested while conflict stages remain.
    #[error("{count} path(s) still have unmerged entries")]
    UnmergedEntries {
        /// Number of conflicted paths
        count: usize,
    },

    /// The current step has a kind the sequencer does not execute.
    #[error("step {} ({kind}) is not supported", .index + 1)]
    UnsupportedOperation {
        /// Kind of the offending step
        kind: RebaseStepKind,
        /// 0-based index of the offending step
        index: usize,
    },

    /// The operation needs a halted sequence.
    #[error("the rebase is not stopped at a step")]
    NotHalted,

    /// The todo list was edited into an unusable shape.
    #[error("invalid todo list: {0}")]
    InvalidTodo(String),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Type(#[from] TypeError),
}
