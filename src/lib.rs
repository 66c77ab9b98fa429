//! stepwise - a resumable rebase sequencer
//!
//! stepwise replays a run of commits onto a new base one step at a time.
//! When a step conflicts, it stops with the conflict staged in the index
//! and the sequence persisted, so the caller can resolve and continue,
//! skip the step, or abort back to where it started.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to the sequencer)
//! - [`rebase`] - The sequencer: init, continue, skip, abort, queries
//! - [`core`] - Domain types, conflict model, state persistence, config
//! - [`git`] - Single interface for all Git operations
//! - [`ui`] - Output formatting
//!
//! # Correctness Invariants
//!
//! 1. The persisted sequence only changes after the repository change it describes
//! 2. A failed operation leaves the persisted sequence as it was
//! 3. The rebased branch is moved once, with compare-and-swap, at completion
//! 4. One mutating operation per worktree at a time

pub mod cli;
pub mod core;
pub mod git;
pub mod rebase;
pub mod ui;
