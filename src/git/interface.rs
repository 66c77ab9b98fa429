//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module provides the **single doorway** to all Git operations in
//! stepwise. The sequencer never sees a `git2` type: commits, trees and
//! refs cross this boundary as [`Oid`] and [`RefName`], merge results as
//! the opaque [`MergedIndex`], and staged entries as
//! [`IndexRecord`](crate::core::conflict::IndexRecord).
//!
//! # Architecture
//!
//! The interface covers the external collaborators the sequencer needs:
//!
//! - **Object store:** commit lookup and commit creation
//! - **Merge engine:** three-way tree merge into an in-memory index
//! - **Staging store:** the repository index, read as a [`StageStore`]
//! - **Refs and HEAD:** resolution, CAS update, detach, re-attach, hard reset
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Not inside a Git repository
//! - [`GitError::RefNotFound`]: Requested ref or revision does not exist
//! - [`GitError::CasFailed`]: Compare-and-swap precondition failed
//! - [`GitError::OperationInProgress`]: A git-native operation is underway
//! - [`GitError::UnmergedIndex`]: Tree write attempted with conflicts staged
//!
//! # Example
//!
//! ```ignore
//! use stepwise::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! let tip = git.resolve_commitish("main")?;
//! println!("main is at {}", tip.short(7));
//! ```

use std::path::{Path, PathBuf};

use git2::build::CheckoutBuilder;
use thiserror::Error;

use crate::core::config::schema::{ConflictStyle, FileFavor, RebaseConfig};
use crate::core::conflict::{ConflictError, IndexRecord, StageStore};
use crate::core::types::{Identity, Oid, RefName, TypeError};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Requested ref or revision does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref or revision that was not found
        refname: String,
    },

    /// Compare-and-swap precondition failed.
    ///
    /// The ref moved since the sequence recorded it, which means something
    /// outside the rebase touched the branch.
    #[error("CAS failed for {refname}: expected {expected}, found {actual}")]
    CasFailed {
        /// The ref being updated
        refname: String,
        /// The expected old value
        expected: String,
        /// The actual current value
        actual: String,
    },

    /// Git-native operation in progress (rebase, merge, etc.).
    #[error("{operation} in progress")]
    OperationInProgress {
        /// The type of operation in progress
        operation: GitState,
    },

    /// Working tree has uncommitted changes.
    #[error("working tree is dirty: {details}")]
    DirtyWorktree {
        /// Description of what's dirty
        details: String,
    },

    /// The index still holds conflict stages.
    #[error("index has {count} unmerged path(s)")]
    UnmergedIndex {
        /// Number of conflicted paths
        count: usize,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid ref name format.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// `user.name` / `user.email` missing or unusable.
    #[error("no usable committer identity: {message}")]
    MissingIdentity {
        /// Description of the problem
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => {
                if context.starts_with("refs/") || context == "HEAD" {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::InvalidSpec => GitError::RefNotFound {
                refname: context.to_string(),
            },
            git2::ErrorCode::Unmerged => GitError::UnmergedIndex { count: 0 },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            TypeError::InvalidRefName(msg) | TypeError::InvalidBranchName(msg) => {
                GitError::InvalidRefName { message: msg }
            }
            TypeError::InvalidIdentity(msg) => GitError::MissingIdentity { message: msg },
        }
    }
}

/// Information about a Git repository.
#[derive(Debug, Clone)]
pub struct RepoInfo {
    /// Per-worktree git directory
    pub git_dir: PathBuf,
    /// Shared git directory (equals `git_dir` outside linked worktrees)
    pub common_dir: PathBuf,
    /// Working directory
    pub work_dir: PathBuf,
}

/// Git-native operations that block starting a new sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitState {
    /// No operation in progress.
    Clean,
    Rebase,
    Merge,
    CherryPick,
    Revert,
    Bisect,
    ApplyMailbox,
}

impl GitState {
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, GitState::Clean)
    }

    pub fn description(&self) -> &'static str {
        match self {
            GitState::Clean => "clean",
            GitState::Rebase => "rebase",
            GitState::Merge => "merge",
            GitState::CherryPick => "cherry-pick",
            GitState::Revert => "revert",
            GitState::Bisect => "bisect",
            GitState::ApplyMailbox => "apply-mailbox",
        }
    }
}

impl std::fmt::Display for GitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Summary of working tree status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeStatus {
    /// Number of staged changes
    pub staged: usize,
    /// Number of unstaged changes to tracked files
    pub unstaged: usize,
    /// Number of untracked files (if requested)
    pub untracked: usize,
    /// Number of conflicted paths
    pub conflicted: usize,
}

impl WorktreeStatus {
    /// No staged, unstaged, or conflicted changes. Untracked files are ignored.
    pub fn is_clean(&self) -> bool {
        self.staged == 0 && self.unstaged == 0 && self.conflicted == 0
    }

    pub fn describe(&self) -> String {
        format!(
            "{} staged, {} unstaged, {} conflicted",
            self.staged, self.unstaged, self.conflicted
        )
    }
}

/// Information about a commit.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub oid: Oid,
    pub tree: Oid,
    pub parents: Vec<Oid>,
    /// First line of the commit message
    pub summary: String,
    /// Full commit message
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub author_time: chrono::DateTime<chrono::Utc>,
}

/// Merge settings handed to the merge engine and to checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSettings {
    pub file_favor: FileFavor,
    pub find_renames: bool,
    pub rename_threshold: u32,
    pub conflict_style: ConflictStyle,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self::from(&RebaseConfig::default())
    }
}

impl From<&RebaseConfig> for MergeSettings {
    fn from(config: &RebaseConfig) -> Self {
        Self {
            file_favor: config.file_favor,
            find_renames: config.find_renames,
            rename_threshold: config.rename_threshold,
            conflict_style: config.conflict_style,
        }
    }
}

impl MergeSettings {
    fn merge_options(&self) -> git2::MergeOptions {
        let mut opts = git2::MergeOptions::new();
        opts.find_renames(self.find_renames)
            .rename_threshold(self.rename_threshold)
            .file_favor(match self.file_favor {
                FileFavor::Normal => git2::FileFavor::Normal,
                FileFavor::Ours => git2::FileFavor::Ours,
                FileFavor::Theirs => git2::FileFavor::Theirs,
                FileFavor::Union => git2::FileFavor::Union,
            });
        opts
    }

    fn checkout_builder(&self) -> CheckoutBuilder<'static> {
        let mut builder = CheckoutBuilder::new();
        builder.force().allow_conflicts(true);
        match self.conflict_style {
            ConflictStyle::Merge => builder.conflict_style_merge(true),
            ConflictStyle::Diff3 => builder.conflict_style_diff3(true),
        };
        builder
    }
}

/// The in-memory result of a three-way merge.
///
/// Nothing is written to the repository until it is either turned into a
/// tree with [`Git::write_merged_tree`] or staged with [`Git::stage_merge`].
pub struct MergedIndex {
    index: git2::Index,
}

impl std::fmt::Debug for MergedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergedIndex")
            .field("entries", &self.index.len())
            .field("has_conflicts", &self.index.has_conflicts())
            .finish()
    }
}

impl StageStore for MergedIndex {
    fn records(&self) -> Result<Vec<IndexRecord>, ConflictError> {
        index_records(&self.index)
    }

    fn records_at(&self, path: &str) -> Result<Vec<IndexRecord>, ConflictError> {
        index_records_at(&self.index, path)
    }

    fn has_conflicts(&self) -> Result<bool, ConflictError> {
        Ok(self.index.has_conflicts())
    }
}

fn store_error(err: impl Into<GitError>) -> ConflictError {
    ConflictError::Store(Box::new(err.into()))
}

fn entry_record(entry: &git2::IndexEntry) -> Result<IndexRecord, ConflictError> {
    Ok(IndexRecord {
        path: String::from_utf8_lossy(&entry.path).into_owned(),
        id: to_oid(entry.id).map_err(store_error)?,
        mode: entry.mode,
        stage: (entry.flags >> 12) & 0x3,
    })
}

fn index_records(index: &git2::Index) -> Result<Vec<IndexRecord>, ConflictError> {
    index.iter().map(|entry| entry_record(&entry)).collect()
}

fn index_records_at(index: &git2::Index, path: &str) -> Result<Vec<IndexRecord>, ConflictError> {
    (1..=3)
        .filter_map(|stage| index.get_path(Path::new(path), stage))
        .map(|entry| entry_record(&entry))
        .collect()
}

fn to_oid(oid: git2::Oid) -> Result<Oid, GitError> {
    Oid::new(oid.to_string()).map_err(GitError::from)
}

fn to_git2(oid: &Oid) -> Result<git2::Oid, GitError> {
    git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))
}

/// The Git interface.
///
/// This is the **single point of interaction** with Git. No other module
/// imports `git2`.
pub struct Git {
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Info
    // =========================================================================

    /// Open the repository containing `path`.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }

        tracing::debug!(git_dir = %repo.path().display(), "opened repository");
        Ok(Self { repo })
    }

    pub fn info(&self) -> Result<RepoInfo, GitError> {
        Ok(RepoInfo {
            git_dir: self.repo.path().to_path_buf(),
            common_dir: self.repo.commondir().to_path_buf(),
            work_dir: self.repo.workdir().ok_or(GitError::BareRepo)?.to_path_buf(),
        })
    }

    // =========================================================================
    // State Detection
    // =========================================================================

    pub fn state(&self) -> GitState {
        match self.repo.state() {
            git2::RepositoryState::Clean => GitState::Clean,
            git2::RepositoryState::Rebase
            | git2::RepositoryState::RebaseInteractive
            | git2::RepositoryState::RebaseMerge => GitState::Rebase,
            git2::RepositoryState::Merge => GitState::Merge,
            git2::RepositoryState::CherryPick | git2::RepositoryState::CherryPickSequence => {
                GitState::CherryPick
            }
            git2::RepositoryState::Revert | git2::RepositoryState::RevertSequence => {
                GitState::Revert
            }
            git2::RepositoryState::Bisect => GitState::Bisect,
            git2::RepositoryState::ApplyMailbox | git2::RepositoryState::ApplyMailboxOrRebase => {
                GitState::ApplyMailbox
            }
        }
    }

    /// Working tree status summary. Untracked files are counted only on request.
    pub fn worktree_status(&self, include_untracked: bool) -> Result<WorktreeStatus, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(include_untracked)
            .include_ignored(false);

        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .map_err(|e| GitError::from_git2(e, "status"))?;

        let mut result = WorktreeStatus::default();
        for entry in statuses.iter() {
            let status = entry.status();

            if status.is_conflicted() {
                result.conflicted += 1;
                continue;
            }
            if status.is_index_new()
                || status.is_index_modified()
                || status.is_index_deleted()
                || status.is_index_renamed()
                || status.is_index_typechange()
            {
                result.staged += 1;
            }
            if status.is_wt_modified()
                || status.is_wt_deleted()
                || status.is_wt_renamed()
                || status.is_wt_typechange()
            {
                result.unstaged += 1;
            }
            if status.is_wt_new() {
                result.untracked += 1;
            }
        }

        Ok(result)
    }

    // =========================================================================
    // Ref Resolution
    // =========================================================================

    /// Resolve any revision expression (`main`, `HEAD~2`, a full id) to a commit.
    pub fn resolve_commitish(&self, spec: &str) -> Result<Oid, GitError> {
        let object = self.repo.revparse_single(spec).map_err(|e| match e.code() {
            git2::ErrorCode::NotFound | git2::ErrorCode::Ambiguous => GitError::RefNotFound {
                refname: spec.to_string(),
            },
            _ => GitError::from_git2(e, spec),
        })?;
        let commit = object
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, spec))?;
        to_oid(commit.id())
    }

    /// Resolve a fully qualified ref to the commit it points at.
    pub fn resolve_ref(&self, refname: &RefName) -> Result<Oid, GitError> {
        let reference = self
            .repo
            .find_reference(refname.as_str())
            .map_err(|e| GitError::from_git2(e, refname.as_str()))?;
        let commit = reference
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, refname.as_str()))?;
        to_oid(commit.id())
    }

    /// Turn a user-supplied branch argument into a local branch ref.
    ///
    /// Accepts `topic` or `refs/heads/topic`. The branch must exist.
    pub fn branch_ref(&self, name: &str) -> Result<RefName, GitError> {
        let refname = if name.starts_with("refs/") {
            RefName::new(name)?
        } else {
            RefName::for_branch(&crate::core::types::BranchName::new(name)?)
        };
        if !refname.is_branch_ref() {
            return Err(GitError::InvalidRefName {
                message: format!("{refname} is not a local branch"),
            });
        }
        self.resolve_ref(&refname)?;
        Ok(refname)
    }

    /// The commit HEAD points at.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if HEAD is unborn
    pub fn head_oid(&self) -> Result<Oid, GitError> {
        let head = self
            .repo
            .head()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;
        let commit = head
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;
        to_oid(commit.id())
    }

    /// The branch HEAD is attached to, or `None` when detached.
    pub fn head_branch(&self) -> Result<Option<RefName>, GitError> {
        let head = self
            .repo
            .head()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;
        if !head.is_branch() {
            return Ok(None);
        }
        match head.name() {
            Some(name) => Ok(Some(RefName::new(name)?)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // CAS Ref Operations
    // =========================================================================

    /// Move a ref from `expected_old` to `new_oid`, failing if it moved.
    ///
    /// # Errors
    ///
    /// - [`GitError::CasFailed`] if the current value doesn't match expected
    pub fn update_ref_cas(
        &self,
        refname: &RefName,
        new_oid: &Oid,
        expected_old: &Oid,
        message: &str,
    ) -> Result<(), GitError> {
        let actual = match self.resolve_ref(refname) {
            Ok(oid) => oid.to_string(),
            Err(GitError::RefNotFound { .. }) => "<none>".to_string(),
            Err(e) => return Err(e),
        };
        if actual != expected_old.as_str() {
            return Err(GitError::CasFailed {
                refname: refname.to_string(),
                expected: expected_old.to_string(),
                actual,
            });
        }

        self.repo
            .reference_matching(
                refname.as_str(),
                to_git2(new_oid)?,
                true,
                to_git2(expected_old)?,
                message,
            )
            .map_err(|e| GitError::from_git2(e, refname.as_str()))?;
        Ok(())
    }

    // =========================================================================
    // HEAD and Working Tree
    // =========================================================================

    /// Detach HEAD at its current commit without touching the index or worktree.
    pub fn detach_head(&self) -> Result<(), GitError> {
        let head = self.head_oid()?;
        self.repo
            .set_head_detached(to_git2(&head)?)
            .map_err(|e| GitError::from_git2(e, "HEAD"))
    }

    /// Point a detached HEAD, the index, and the worktree at `target`.
    ///
    /// Conflict stages and conflict markers are discarded. Untracked files
    /// are left alone.
    pub fn reset_hard(&self, target: &Oid) -> Result<(), GitError> {
        let object = self
            .repo
            .find_object(to_git2(target)?, Some(git2::ObjectType::Commit))
            .map_err(|e| GitError::from_git2(e, target.as_str()))?;
        self.repo
            .reset(&object, git2::ResetType::Hard, None)
            .map_err(|e| GitError::from_git2(e, target.as_str()))?;
        tracing::debug!(target = %target.short(7), "reset --hard");
        Ok(())
    }

    /// Replace the index and worktree with `tree`. HEAD does not move.
    pub fn checkout_tree(&self, tree: &Oid) -> Result<(), GitError> {
        let object = self
            .repo
            .find_tree(to_git2(tree)?)
            .map_err(|e| GitError::from_git2(e, tree.as_str()))?;
        let mut index = self.repo.index()?;
        index.read_tree(&object)?;
        index.write()?;

        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        self.repo
            .checkout_index(Some(&mut index), Some(&mut checkout))
            .map_err(|e| GitError::from_git2(e, "checkout index"))?;
        tracing::debug!(tree = %tree.short(7), "checked out tree");
        Ok(())
    }

    /// Attach HEAD to a branch ref. The worktree is not touched.
    pub fn attach_head(&self, refname: &RefName) -> Result<(), GitError> {
        self.repo
            .set_head(refname.as_str())
            .map_err(|e| GitError::from_git2(e, refname.as_str()))
    }

    // =========================================================================
    // Commits and Ancestry
    // =========================================================================

    pub fn commit_info(&self, oid: &Oid) -> Result<CommitInfo, GitError> {
        let commit = self
            .repo
            .find_commit(to_git2(oid)?)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;

        let author = commit.author();
        let author_time = chrono::DateTime::from_timestamp(author.when().seconds(), 0)
            .unwrap_or_default();
        let parents = commit
            .parent_ids()
            .map(to_oid)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CommitInfo {
            oid: oid.clone(),
            tree: to_oid(commit.tree_id())?,
            parents,
            summary: String::from_utf8_lossy(commit.summary_bytes().unwrap_or_default())
                .into_owned(),
            message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
            author_name: String::from_utf8_lossy(author.name_bytes()).into_owned(),
            author_email: String::from_utf8_lossy(author.email_bytes()).into_owned(),
            author_time,
        })
    }

    /// Commits reachable from `tip` but not from any of `exclude`, oldest first.
    ///
    /// Merge commits are left out: they cannot be replayed as a single pick.
    pub fn commits_to_replay(
        &self,
        tip: &Oid,
        exclude: &[&Oid],
        first_parent_only: bool,
    ) -> Result<Vec<Oid>, GitError> {
        let mut walk = self
            .repo
            .revwalk()
            .map_err(|e| GitError::from_git2(e, "revwalk"))?;
        walk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::REVERSE)
            .map_err(|e| GitError::from_git2(e, "revwalk"))?;
        walk.push(to_git2(tip)?)
            .map_err(|e| GitError::from_git2(e, tip.as_str()))?;
        for hidden in exclude {
            walk.hide(to_git2(hidden)?)
                .map_err(|e| GitError::from_git2(e, hidden.as_str()))?;
        }
        if first_parent_only {
            walk.simplify_first_parent()
                .map_err(|e| GitError::from_git2(e, "revwalk"))?;
        }

        let mut commits = Vec::new();
        for oid in walk {
            let oid = oid.map_err(|e| GitError::from_git2(e, "revwalk"))?;
            let commit = self
                .repo
                .find_commit(oid)
                .map_err(|e| GitError::from_git2(e, &oid.to_string()))?;
            if commit.parent_count() > 1 {
                tracing::debug!(commit = %oid, "skipping merge commit");
                continue;
            }
            commits.push(to_oid(oid)?);
        }
        Ok(commits)
    }

    // =========================================================================
    // Merge Engine
    // =========================================================================

    /// Three-way merge that replays `source` on top of `onto`.
    ///
    /// The ancestor is the first parent of `source` (the empty tree for a
    /// root commit), ours is `onto`, theirs is `source`.
    pub fn merge_commit_onto(
        &self,
        source: &Oid,
        onto: &Oid,
        settings: &MergeSettings,
    ) -> Result<MergedIndex, GitError> {
        let theirs = self
            .repo
            .find_commit(to_git2(source)?)
            .map_err(|e| GitError::from_git2(e, source.as_str()))?;
        let ours = self
            .repo
            .find_commit(to_git2(onto)?)
            .map_err(|e| GitError::from_git2(e, onto.as_str()))?;

        let ancestor_tree = match theirs.parent_ids().next() {
            Some(parent) => self.repo.find_commit(parent)?.tree()?,
            None => {
                let empty = self.repo.treebuilder(None)?.write()?;
                self.repo.find_tree(empty)?
            }
        };

        let index = self
            .repo
            .merge_trees(
                &ancestor_tree,
                &ours.tree()?,
                &theirs.tree()?,
                Some(&settings.merge_options()),
            )
            .map_err(|e| GitError::from_git2(e, source.as_str()))?;

        tracing::debug!(
            source = %source.short(7),
            onto = %onto.short(7),
            conflicts = index.has_conflicts(),
            "merged trees"
        );
        Ok(MergedIndex { index })
    }

    /// Write a fully merged in-memory index as a tree.
    pub fn write_merged_tree(&self, merged: &mut MergedIndex) -> Result<Oid, GitError> {
        if merged.index.has_conflicts() {
            let count = ConflictCount::of(&merged.index);
            return Err(GitError::UnmergedIndex { count });
        }
        let tree = merged
            .index
            .write_tree_to(&self.repo)
            .map_err(|e| GitError::from_git2(e, "write tree"))?;
        to_oid(tree)
    }

    /// Copy a merge result into the repository index and check it out.
    ///
    /// Conflicted paths get conflict markers in the worktree in the
    /// configured style, and their stages are kept in the index.
    pub fn stage_merge(
        &self,
        merged: &MergedIndex,
        settings: &MergeSettings,
    ) -> Result<(), GitError> {
        let mut repo_index = self.repo.index()?;
        repo_index.clear()?;
        for entry in merged.index.iter() {
            repo_index
                .add(&entry)
                .map_err(|e| GitError::from_git2(e, "stage merge"))?;
        }
        repo_index.write()?;

        self.repo
            .checkout_index(Some(&mut repo_index), Some(&mut settings.checkout_builder()))
            .map_err(|e| GitError::from_git2(e, "checkout index"))?;
        Ok(())
    }

    /// Write the repository index as a tree.
    ///
    /// # Errors
    ///
    /// - [`GitError::UnmergedIndex`] if conflict stages remain
    pub fn write_index_tree(&self) -> Result<Oid, GitError> {
        let mut index = self.repo.index()?;
        index.read(true)?;
        if index.has_conflicts() {
            return Err(GitError::UnmergedIndex {
                count: ConflictCount::of(&index),
            });
        }
        let tree = index
            .write_tree()
            .map_err(|e| GitError::from_git2(e, "write tree"))?;
        to_oid(tree)
    }

    /// Create a commit replaying `source` with a new tree and parent.
    ///
    /// The author (including timestamp) is carried over from `source`.
    /// References are not updated.
    pub fn create_replayed_commit(
        &self,
        source: &Oid,
        tree: &Oid,
        parent: &Oid,
        committer: &Identity,
        message: Option<&str>,
    ) -> Result<Oid, GitError> {
        let original = self
            .repo
            .find_commit(to_git2(source)?)
            .map_err(|e| GitError::from_git2(e, source.as_str()))?;
        let tree = self
            .repo
            .find_tree(to_git2(tree)?)
            .map_err(|e| GitError::from_git2(e, tree.as_str()))?;
        let parent = self
            .repo
            .find_commit(to_git2(parent)?)
            .map_err(|e| GitError::from_git2(e, parent.as_str()))?;
        let committer = git2::Signature::now(committer.name(), committer.email())
            .map_err(|e| GitError::from_git2(e, "committer"))?;

        let original_message = String::from_utf8_lossy(original.message_bytes()).into_owned();
        let message = message.unwrap_or(&original_message);

        let oid = self
            .repo
            .commit(None, &original.author(), &committer, message, &tree, &[&parent])
            .map_err(|e| GitError::from_git2(e, "commit"))?;
        to_oid(oid)
    }

    /// Committer identity from `user.name` / `user.email`.
    pub fn default_identity(&self) -> Result<Identity, GitError> {
        let config = self.repo.config()?;
        let read = |key: &str| {
            config.get_string(key).map_err(|_| GitError::MissingIdentity {
                message: format!("{key} is not set"),
            })
        };
        Ok(Identity::new(read("user.name")?, read("user.email")?)?)
    }
}

impl StageStore for Git {
    fn records(&self) -> Result<Vec<IndexRecord>, ConflictError> {
        let mut index = self.repo.index().map_err(store_error)?;
        index.read(true).map_err(store_error)?;
        index_records(&index)
    }

    fn records_at(&self, path: &str) -> Result<Vec<IndexRecord>, ConflictError> {
        let mut index = self.repo.index().map_err(store_error)?;
        index.read(true).map_err(store_error)?;
        index_records_at(&index, path)
    }

    fn has_conflicts(&self) -> Result<bool, ConflictError> {
        let mut index = self.repo.index().map_err(store_error)?;
        index.read(true).map_err(store_error)?;
        Ok(index.has_conflicts())
    }
}

/// Count distinct conflicted paths in an index.
struct ConflictCount;

impl ConflictCount {
    fn of(index: &git2::Index) -> usize {
        let mut paths: Vec<Vec<u8>> = index
            .iter()
            .filter(|e| (e.flags >> 12) & 0x3 != 0)
            .map(|e| e.path)
            .collect();
        paths.dedup();
        paths.len()
    }
}
