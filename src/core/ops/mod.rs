//! core::ops
//!
//! Sequence state persistence and locking.
//!
//! # Modules
//!
//! - [`state`] - The persisted rebase sequence
//! - [`lock`] - Exclusive per-worktree lock
//!
//! # Architecture
//!
//! Every mutating sequencer call:
//! 1. Acquires the exclusive lock
//! 2. Reads and verifies the sequence state
//! 3. Mutates the repository
//! 4. Writes the new state only after the repository change succeeded
//!
//! # Example
//!
//! ```ignore
//! use stepwise::core::ops::{RepoLock, SequenceState};
//!
//! let _lock = RepoLock::acquire(&paths)?;
//! let mut state = SequenceState::read(&paths)?.expect("in progress");
//! state.advance(Some(new_tip));
//! state.write(&paths)?;
//! ```

pub mod lock;
pub mod state;

pub use lock::{LockError, RepoLock};
pub use state::{
    HaltReason, OpId, RestorePoint, RewrittenCommit, SequencePhase, SequenceState, StateError,
};
