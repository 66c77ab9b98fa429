//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. No other module imports
//! `git2`; everything else works with [`Oid`](crate::core::types::Oid),
//! [`RefName`](crate::core::types::RefName) and the staging records in
//! [`crate::core::conflict`].
//!
//! # Responsibilities
//!
//! - Repository discovery and opening
//! - Ref resolution, CAS update, HEAD detach and re-attach
//! - Commit walking and commit creation
//! - Three-way tree merges and staging their results
//! - Status and state detection
//!
//! # Invariants
//!
//! - Branch refs are only moved with CAS semantics
//! - All operations return strong types
//!
//! # Example
//!
//! ```ignore
//! use stepwise::git::{Git, MergeSettings};
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! let onto = git.resolve_commitish("main")?;
//! let source = git.resolve_commitish("topic")?;
//! let merged = git.merge_commit_onto(&source, &onto, &MergeSettings::default())?;
//! ```

mod interface;

pub use interface::{
    CommitInfo, Git, GitError, GitState, MergeSettings, MergedIndex, RepoInfo, WorktreeStatus,
};
