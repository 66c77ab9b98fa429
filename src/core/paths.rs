//! core::paths
//!
//! Centralized path routing for stepwise storage locations.
//!
//! # Architecture
//!
//! A rebase rewrites HEAD and the index, and both are per-worktree in git.
//! Sequence state therefore lives under the worktree's own `git_dir`, while
//! configuration is shared through `common_dir`. For a normal repository
//! the two directories are the same.
//!
//! # Storage Layout
//!
//! - `<common_dir>/stepwise/config.toml` - Repository configuration
//! - `<git_dir>/stepwise/lock` - Exclusive lock file
//! - `<git_dir>/stepwise/sequence.json` - Persisted rebase sequence
//!
//! # Example
//!
//! ```
//! use stepwise::core::paths::RebasePaths;
//! use std::path::PathBuf;
//!
//! let paths = RebasePaths::new(
//!     PathBuf::from("/repo/.git/worktrees/topic"),
//!     PathBuf::from("/repo/.git"),
//! );
//!
//! assert_eq!(
//!     paths.sequence_path(),
//!     PathBuf::from("/repo/.git/worktrees/topic/stepwise/sequence.json")
//! );
//! assert_eq!(
//!     paths.repo_config_path(),
//!     PathBuf::from("/repo/.git/stepwise/config.toml")
//! );
//! ```

use std::path::{Path, PathBuf};

use crate::git::RepoInfo;

const DIR_NAME: &str = "stepwise";

/// Storage locations for one repository (or linked worktree).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebasePaths {
    /// Per-worktree git directory. Holds HEAD and the index.
    pub git_dir: PathBuf,

    /// Shared git directory (refs, objects, config).
    pub common_dir: PathBuf,
}

impl RebasePaths {
    pub fn new(git_dir: PathBuf, common_dir: PathBuf) -> Self {
        Self {
            git_dir,
            common_dir,
        }
    }

    /// Build paths from an opened repository.
    pub fn from_repo_info(info: &RepoInfo) -> Self {
        Self::new(info.git_dir.clone(), info.common_dir.clone())
    }

    /// `<git_dir>/stepwise`, holding everything scoped to one rebase.
    pub fn state_dir(&self) -> PathBuf {
        self.git_dir.join(DIR_NAME)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir().join("lock")
    }

    /// The sequence file. Its presence is the "rebase in progress" marker.
    pub fn sequence_path(&self) -> PathBuf {
        self.state_dir().join("sequence.json")
    }

    pub fn repo_config_path(&self) -> PathBuf {
        self.common_dir.join(DIR_NAME).join("config.toml")
    }

    /// Check if this is a linked worktree (common_dir != git_dir).
    pub fn is_worktree(&self) -> bool {
        self.git_dir != self.common_dir
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_repo_shares_one_root() {
        let paths = RebasePaths::new(PathBuf::from("/r/.git"), PathBuf::from("/r/.git"));
        assert!(!paths.is_worktree());
        assert_eq!(paths.state_dir(), PathBuf::from("/r/.git/stepwise"));
        assert_eq!(paths.lock_path(), PathBuf::from("/r/.git/stepwise/lock"));
        assert_eq!(
            paths.repo_config_path(),
            PathBuf::from("/r/.git/stepwise/config.toml")
        );
    }

    #[test]
    fn worktree_splits_state_from_config() {
        let paths = RebasePaths::new(
            PathBuf::from("/r/.git/worktrees/wt"),
            PathBuf::from("/r/.git"),
        );
        assert!(paths.is_worktree());
        assert!(paths.sequence_path().starts_with("/r/.git/worktrees/wt"));
        assert!(paths.repo_config_path().starts_with("/r/.git/stepwise"));
    }
}
