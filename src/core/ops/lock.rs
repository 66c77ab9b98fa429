//! core::ops::lock
//!
//! Exclusive lock held for the duration of every sequencer call.
//!
//! # Architecture
//!
//! Starting, continuing, skipping and aborting a rebase all read the
//! persisted sequence, touch HEAD and the index, then write the sequence
//! back. Two processes interleaving those steps would tear the state, so
//! each call takes this lock first and holds it until it returns.
//!
//! The lock lives next to the sequence file, under the worktree's
//! `git_dir`, because HEAD and the index are per-worktree.
//!
//! # Storage
//!
//! - `<git_dir>/stepwise/lock` - Lock file with OS-level exclusive lock
//!
//! # Invariants
//!
//! - Acquisition is non-blocking (fails fast with `AlreadyLocked`)
//! - The lock is released on drop, including on early `?` returns
//!
//! # Example
//!
//! ```ignore
//! use stepwise::core::ops::lock::RepoLock;
//!
//! let lock = RepoLock::acquire(&paths)?;
//! // ... read state, mutate the repository, write state ...
//! drop(lock);
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::RebasePaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process is already driving a sequencer call.
    #[error("repository is locked by another stepwise process")]
    AlreadyLocked,

    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// An exclusive lock guard. Released on drop.
#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
    /// `Some` while the lock is held.
    file: Option<File>,
}

impl RepoLock {
    /// Acquire the lock without blocking.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(paths: &RebasePaths) -> Result<Self, LockError> {
        let dir = paths.state_dir();
        fs::create_dir_all(&dir).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", dir.display(), e))
        })?;

        let path = paths.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "acquired repo lock");
                Ok(Self {
                    path,
                    file: Some(file),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(LockError::AlreadyLocked),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock early. Calling it twice is fine.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            FileExt::unlock(&file).map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = FileExt::unlock(&file);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_paths(dir: &Path) -> RebasePaths {
        RebasePaths::new(dir.to_path_buf(), dir.to_path_buf())
    }

    #[test]
    fn acquire_creates_state_dir() {
        let temp = TempDir::new().unwrap();
        let paths = test_paths(temp.path());
        assert!(!paths.state_dir().exists());

        let lock = RepoLock::acquire(&paths).expect("acquire lock");
        assert!(lock.is_held());
        assert!(paths.state_dir().exists());
        assert_eq!(lock.path(), paths.lock_path());
    }

    #[test]
    fn second_acquire_fails_fast() {
        let temp = TempDir::new().unwrap();
        let paths = test_paths(temp.path());

        let _held = RepoLock::acquire(&paths).expect("first acquire");
        let result = RepoLock::acquire(&paths);
        assert!(matches!(result, Err(LockError::AlreadyLocked)));
    }

    #[test]
    fn released_on_drop() {
        let temp = TempDir::new().unwrap();
        let paths = test_paths(temp.path());

        {
            let _lock = RepoLock::acquire(&paths).expect("first acquire");
        }
        assert!(RepoLock::acquire(&paths).is_ok());
    }

    #[test]
    fn release_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let paths = test_paths(temp.path());

        let mut lock = RepoLock::acquire(&paths).expect("acquire");
        lock.release().expect("first release");
        lock.release().expect("second release");
        assert!(!lock.is_held());
        assert!(RepoLock::acquire(&paths).is_ok());
    }

    #[test]
    fn worktrees_lock_independently() {
        let temp = TempDir::new().unwrap();
        let common = temp.path().to_path_buf();
        let main = RebasePaths::new(common.clone(), common.clone());
        let linked = RebasePaths::new(common.join("worktrees").join("wt"), common);

        let _a = RepoLock::acquire(&main).expect("main");
        let _b = RepoLock::acquire(&linked).expect("linked worktree has its own HEAD");
    }
}
