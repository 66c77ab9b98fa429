//! rebase::sequencer
//!
//! The rebase state machine.
//!
//! # Lifecycle
//!
//! ```text
//! init ──► NotStarted ──continue──► StepInProgress ──► Complete
//!                                    │      ▲
//!                         conflicts/ │      │ continue / skip
//!                         pause      ▼      │
//!                                   Halted ─┘
//!
//! abort: any state with a sequence ──► (no sequence, HEAD restored)
//! ```
//!
//! # Repository layout while running
//!
//! HEAD is detached at the rewritten tip for the whole run. The rebased
//! branch ref is not touched until completion, where it is moved once with
//! compare-and-swap from `orig_head` to the rewritten tip. Abort therefore
//! only has to reset the detached HEAD and re-attach it.
//!
//! # Failure contract
//!
//! A step is recorded only after its repository change succeeded, and a
//! halt is recorded only after the merge was staged, so a crash mid-call
//! leaves the sequence at the last step that finished.
//!
//! A call that returns an error is rolled back instead: the persisted
//! sequence, HEAD, and the index go back to what they were when the call
//! started, and retrying the call starts from the same place.

use crate::core::conflict::ConflictIndex;
use crate::core::ops::{
    HaltReason, RepoLock, RestorePoint, RewrittenCommit, SequencePhase, SequenceState,
};
use crate::core::paths::RebasePaths;
use crate::core::step::{RebaseStep, RebaseStepInfo, RebaseStepKind};
use crate::core::types::{Identity, Oid, RefName};
use crate::git::{Git, GitError, MergeSettings};

use super::error::RebaseError;
use super::options::{InitOptions, RebaseOptions};
use super::result::{AbortOutcome, AfterStepInfo, RebaseResult, RebaseStatus, StepOutcome};
use super::todo::TodoList;

/// Drives one rebase sequence in one worktree.
#[derive(Debug)]
pub struct RebaseSequencer {
    git: Git,
    paths: RebasePaths,
    state: SequenceState,
}

impl RebaseSequencer {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Plan a sequence replaying `upstream..branch` onto `onto` and check out `onto`.
    ///
    /// No step runs until [`continue_rebase`](Self::continue_rebase).
    ///
    /// # Errors
    ///
    /// - [`RebaseError::MissingArgument`] if `upstream` is empty
    /// - [`RebaseError::RebaseInProgress`] if a sequence already exists
    /// - [`GitError::OperationInProgress`] if a git-native operation is underway
    /// - [`GitError::DirtyWorktree`] if tracked files have changes
    pub fn init(git: Git, upstream: &str, opts: InitOptions<'_>) -> Result<Self, RebaseError> {
        if upstream.trim().is_empty() {
            return Err(RebaseError::MissingArgument { name: "upstream" });
        }

        let paths = RebasePaths::from_repo_info(&git.info()?);
        let _lock = RepoLock::acquire(&paths)?;

        if SequenceState::exists(&paths) {
            return Err(RebaseError::RebaseInProgress);
        }
        let git_state = git.state();
        if git_state.is_in_progress() {
            return Err(GitError::OperationInProgress {
                operation: git_state,
            }
            .into());
        }
        let status = git.worktree_status(false)?;
        if !status.is_clean() {
            return Err(GitError::DirtyWorktree {
                details: status.describe(),
            }
            .into());
        }

        let upstream_oid = git.resolve_commitish(upstream)?;
        let onto = match opts.onto.as_deref() {
            Some(spec) => git.resolve_commitish(spec)?,
            None => upstream_oid.clone(),
        };
        let (branch, orig_head) = match opts.branch.as_deref() {
            Some(name) => {
                let refname = git.branch_ref(name)?;
                let tip = git.resolve_ref(&refname)?;
                (Some(refname), tip)
            }
            None => (git.head_branch()?, git.head_oid()?),
        };

        let commits =
            git.commits_to_replay(&orig_head, &[&upstream_oid, &onto], opts.first_parent_only)?;
        let mut todo = TodoList::from_commits(&commits);
        if let Some(edit) = opts.edit_todo {
            edit(&mut todo)?;
        }
        todo.validate()?;

        let state = SequenceState::new(branch, orig_head, upstream_oid, onto, todo.into_steps());
        state.write(&paths)?;

        let sequencer = Self { git, paths, state };
        if let Err(err) = sequencer.checkout_onto() {
            sequencer.undo_init();
            return Err(err);
        }

        tracing::info!(
            op_id = %sequencer.state.op_id,
            branch = ?sequencer.state.branch.as_ref().map(RefName::as_str),
            onto = %sequencer.state.onto.short(7),
            steps = sequencer.state.total(),
            "initialized rebase"
        );
        Ok(sequencer)
    }

    /// Reattach to the sequence in progress for this worktree.
    pub fn open(git: Git) -> Result<Self, RebaseError> {
        let paths = RebasePaths::from_repo_info(&git.info()?);
        let state = SequenceState::read(&paths)?.ok_or(RebaseError::NoRebaseInProgress)?;
        Ok(Self { git, paths, state })
    }

    /// Whether a sequence exists for the worktree `git` is opened on.
    pub fn in_progress(git: &Git) -> Result<bool, RebaseError> {
        let paths = RebasePaths::from_repo_info(&git.info()?);
        Ok(SequenceState::exists(&paths))
    }

    fn checkout_onto(&self) -> Result<(), RebaseError> {
        self.git.detach_head()?;
        self.git.reset_hard(&self.state.onto)?;
        Ok(())
    }

    /// Best-effort rollback of a half-done init.
    fn undo_init(&self) {
        if let Err(err) = self.git.reset_hard(&self.state.orig_head) {
            tracing::warn!(error = %err, "could not restore HEAD after failed init");
        }
        if let Some(branch) = &self.state.branch {
            if let Err(err) = self.git.attach_head(branch) {
                tracing::warn!(error = %err, "could not re-attach HEAD after failed init");
            }
        }
        if let Err(err) = SequenceState::remove(&self.paths) {
            tracing::warn!(error = %err, "could not remove sequence state after failed init");
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn phase(&self) -> SequencePhase {
        self.state.phase()
    }

    /// The step that runs next, or the halted one.
    pub fn current_step_info(&self) -> Option<RebaseStepInfo> {
        self.state.current_step_info()
    }

    /// 0-based index of the current step. `None` once every step is done.
    pub fn current_step_index(&self) -> Option<usize> {
        self.state.current_step().map(|s| s.index)
    }

    pub fn step_info(&self, index: usize) -> Option<RebaseStepInfo> {
        self.state
            .steps
            .get(index)
            .map(|s| s.info(self.state.total()))
    }

    pub fn total_step_count(&self) -> usize {
        self.state.total()
    }

    pub fn completed_step_count(&self) -> usize {
        self.state.completed
    }

    pub fn steps(&self) -> &[RebaseStep] {
        &self.state.steps
    }

    /// (original, rewritten) pairs for every step that made a commit.
    pub fn rewritten(&self) -> &[RewrittenCommit] {
        &self.state.rewritten
    }

    pub fn branch(&self) -> Option<&RefName> {
        self.state.branch.as_ref()
    }

    pub fn orig_head(&self) -> &Oid {
        &self.state.orig_head
    }

    pub fn onto(&self) -> &Oid {
        &self.state.onto
    }

    /// Tip of the rewritten history so far.
    pub fn last_commit(&self) -> &Oid {
        &self.state.last_commit
    }

    pub fn git(&self) -> &Git {
        &self.git
    }

    /// Conflicts currently staged in the repository index.
    pub fn conflicts(&self) -> ConflictIndex<'_> {
        ConflictIndex::new(&self.git)
    }

    // =========================================================================
    // Driving the sequence
    // =========================================================================

    /// Finish the halted step, if any, then run steps until the sequence
    /// completes or halts.
    ///
    /// On error the sequence, HEAD, and the index are rolled back to where
    /// they were when the call started.
    ///
    /// # Errors
    ///
    /// - [`RebaseError::NoRebaseInProgress`] if the sequence already finished
    /// - [`RebaseError::UnmergedEntries`] if the halted step still has conflicts
    /// - [`RebaseError::UnsupportedOperation`] when reaching a squash or fixup step
    /// - [`GitError::DirtyWorktree`] if there are changes the step would discard
    pub fn continue_rebase(
        &mut self,
        committer: &Identity,
        opts: &mut RebaseOptions<'_>,
    ) -> Result<RebaseResult, RebaseError> {
        let _lock = RepoLock::acquire(&self.paths)?;
        self.reload()?;

        let snapshot = self.state.clone();
        let resolution = self.staged_resolution();
        let result = self.resume_and_run(committer, opts);
        if result.is_err() {
            self.roll_back(snapshot, resolution.as_ref(), &opts.merge);
        }
        result
    }

    /// Drop the halted step without committing it and keep going.
    ///
    /// Rolled back like [`continue_rebase`](Self::continue_rebase) on error;
    /// the skipped step's merge is staged again.
    ///
    /// # Errors
    ///
    /// - [`RebaseError::NotHalted`] unless the sequence is halted
    pub fn skip(
        &mut self,
        committer: &Identity,
        opts: &mut RebaseOptions<'_>,
    ) -> Result<RebaseResult, RebaseError> {
        let _lock = RepoLock::acquire(&self.paths)?;
        self.reload()?;

        if !matches!(self.state.phase(), SequencePhase::Halted(_)) {
            return Err(RebaseError::NotHalted);
        }
        let snapshot = self.state.clone();
        let result = self.skip_and_run(committer, opts);
        if result.is_err() {
            self.roll_back(snapshot, None, &opts.merge);
        }
        result
    }

    /// Discard the sequence and put HEAD back where it was before init.
    ///
    /// A branch that a failed finish already moved to the rewritten tip is
    /// moved back to `orig_head`. Calling it again once the sequence is gone reports
    /// [`AbortOutcome::NothingToAbort`].
    pub fn abort(&mut self) -> Result<AbortOutcome, RebaseError> {
        abort_sequence(&self.git, &self.paths)
    }

    /// Abort whatever sequence the worktree `git` is opened on holds.
    ///
    /// Unlike [`open`](Self::open) followed by [`abort`](Self::abort) this
    /// also clears a state file that no longer parses.
    pub fn abort_in(git: &Git) -> Result<AbortOutcome, RebaseError> {
        let paths = RebasePaths::from_repo_info(&git.info()?);
        abort_sequence(git, &paths)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn reload(&mut self) -> Result<(), RebaseError> {
        self.state = SequenceState::read(&self.paths)?.ok_or(RebaseError::NoRebaseInProgress)?;
        Ok(())
    }

    fn current_step(&self) -> Result<RebaseStep, RebaseError> {
        self.state
            .current_step()
            .cloned()
            .ok_or(RebaseError::NoRebaseInProgress)
    }

    fn require_clean_worktree(&self) -> Result<(), RebaseError> {
        let status = self.git.worktree_status(false)?;
        if !status.is_clean() {
            return Err(GitError::DirtyWorktree {
                details: status.describe(),
            }
            .into());
        }
        Ok(())
    }

    /// Persist `next` and adopt it as the in-memory state.
    fn record(&mut self, next: SequenceState) -> Result<(), RebaseError> {
        next.write(&self.paths)?;
        self.state = next;
        Ok(())
    }

    fn report(&self, step: &RebaseStep, outcome: StepOutcome, opts: &mut RebaseOptions<'_>) {
        let info = AfterStepInfo {
            step: step.info(self.state.total()),
            outcome,
        };
        opts.step_completed(&info);
    }

    fn result(&self, status: RebaseStatus) -> RebaseResult {
        RebaseResult {
            status,
            completed_step_count: self.state.completed,
            total_step_count: self.state.total(),
            current_step_info: match status {
                RebaseStatus::Complete => None,
                _ => self.state.current_step_info(),
            },
        }
    }

    fn resume_and_run(
        &mut self,
        committer: &Identity,
        opts: &mut RebaseOptions<'_>,
    ) -> Result<RebaseResult, RebaseError> {
        match self.state.phase() {
            SequencePhase::Halted(reason) => self.resume_halted(reason, committer, opts)?,
            _ => self.require_clean_worktree()?,
        }
        self.run(committer, opts)
    }

    fn skip_and_run(
        &mut self,
        committer: &Identity,
        opts: &mut RebaseOptions<'_>,
    ) -> Result<RebaseResult, RebaseError> {
        let step = self.current_step()?;

        self.git.reset_hard(&self.state.last_commit)?;
        let mut next = self.state.clone();
        next.advance(None);
        self.record(next)?;

        tracing::info!(step = step.index, "skipped step");
        self.report(&step, StepOutcome::Skipped, opts);
        self.run(committer, opts)
    }

    /// Tree of the index a halted commit step would be resumed with.
    fn staged_resolution(&self) -> Option<Oid> {
        let step = self.state.current_step()?;
        if self.state.halt.is_none() || step.kind == RebaseStepKind::Exec {
            return None;
        }
        self.git.write_index_tree().ok()
    }

    /// Undo a failed call so that `snapshot` is current again.
    ///
    /// Best effort: a failure here is logged and the original error wins.
    fn roll_back(
        &mut self,
        snapshot: SequenceState,
        resolution: Option<&Oid>,
        merge: &MergeSettings,
    ) {
        let head_moved = !matches!(self.git.head_oid(), Ok(head) if head == snapshot.last_commit);
        let recorded = self.state.completed != snapshot.completed
            || self.state.halt != snapshot.halt
            || self.state.last_commit != snapshot.last_commit;

        if head_moved || recorded {
            match self.restore(&snapshot, resolution, merge) {
                Ok(()) => tracing::info!(
                    completed = snapshot.completed,
                    tip = %snapshot.last_commit.short(7),
                    "rolled back failed call"
                ),
                Err(err) => tracing::warn!(error = %err, "could not roll back failed call"),
            }
        }
        self.state = snapshot;
    }

    fn restore(
        &self,
        snapshot: &SequenceState,
        resolution: Option<&Oid>,
        merge: &MergeSettings,
    ) -> Result<(), RebaseError> {
        snapshot.write(&self.paths)?;
        self.git.reset_hard(&snapshot.last_commit)?;

        let halted_step = match snapshot.halt {
            Some(_) => snapshot.current_step(),
            None => None,
        };
        let Some(step) = halted_step.filter(|s| s.kind != RebaseStepKind::Exec) else {
            return Ok(());
        };
        match resolution {
            Some(tree) => self.git.checkout_tree(tree)?,
            None => {
                let merged =
                    self.git
                        .merge_commit_onto(step_commit(step)?, &snapshot.last_commit, merge)?;
                self.git.stage_merge(&merged, merge)?;
            }
        }
        Ok(())
    }

    /// Finish the step the sequence is halted at.
    fn resume_halted(
        &mut self,
        reason: HaltReason,
        committer: &Identity,
        opts: &mut RebaseOptions<'_>,
    ) -> Result<(), RebaseError> {
        let step = self.current_step()?;

        let outcome = if step.kind == RebaseStepKind::Exec {
            self.require_clean_worktree()?;
            let mut next = self.state.clone();
            next.advance(None);
            self.record(next)?;
            StepOutcome::Executed
        } else {
            let conflicts = ConflictIndex::new(&self.git).all()?;
            if !conflicts.is_empty() {
                return Err(RebaseError::UnmergedEntries {
                    count: conflicts.len(),
                });
            }
            let status = self.git.worktree_status(false)?;
            if status.unstaged > 0 {
                return Err(GitError::DirtyWorktree {
                    details: format!("{} path(s) changed but not staged", status.unstaged),
                }
                .into());
            }
            let tree = self.git.write_index_tree()?;
            self.commit_step(&step, &tree, committer, opts.message.as_deref())?
        };

        tracing::info!(step = step.index, ?reason, ?outcome, "resumed halted step");
        self.report(&step, outcome, opts);
        Ok(())
    }

    /// Run steps from the cursor until completion or a halt.
    fn run(
        &mut self,
        committer: &Identity,
        opts: &mut RebaseOptions<'_>,
    ) -> Result<RebaseResult, RebaseError> {
        loop {
            let Some(step) = self.state.current_step().cloned() else {
                return self.finish();
            };
            if step.kind.melds() {
                return Err(RebaseError::UnsupportedOperation {
                    kind: step.kind,
                    index: step.index,
                });
            }

            let info = step.info(self.state.total());
            tracing::debug!(step = %info, "starting step");
            opts.step_starting(&info);

            if step.kind == RebaseStepKind::Exec {
                return self.halt(HaltReason::Stop);
            }

            let source = step_commit(&step)?;
            let mut merged =
                self.git
                    .merge_commit_onto(source, &self.state.last_commit, &opts.merge)?;

            if !ConflictIndex::new(&merged).is_empty()? {
                self.git.stage_merge(&merged, &opts.merge)?;
                return self.halt(HaltReason::Conflicts);
            }
            if step.kind.pauses() {
                self.git.stage_merge(&merged, &opts.merge)?;
                return self.halt(HaltReason::Stop);
            }

            let tree = self.git.write_merged_tree(&mut merged)?;
            let outcome = self.commit_step(&step, &tree, committer, None)?;
            tracing::debug!(step = step.index, ?outcome, "finished step");
            self.report(&step, outcome, opts);
        }
    }

    /// Turn `tree` into the step's commit on top of the rewritten tip and record it.
    fn commit_step(
        &mut self,
        step: &RebaseStep,
        tree: &Oid,
        committer: &Identity,
        message: Option<&str>,
    ) -> Result<StepOutcome, RebaseError> {
        let source = step_commit(step)?;
        let parent = self.state.last_commit.clone();
        let mut next = self.state.clone();

        let outcome = if self.git.commit_info(&parent)?.tree == *tree {
            self.git.reset_hard(&parent)?;
            next.advance(None);
            StepOutcome::AlreadyApplied
        } else {
            let commit = self
                .git
                .create_replayed_commit(source, tree, &parent, committer, message)?;
            self.git.reset_hard(&commit)?;
            next.advance(Some(commit.clone()));
            StepOutcome::Committed(commit)
        };

        self.record(next)?;
        Ok(outcome)
    }

    fn halt(&mut self, reason: HaltReason) -> Result<RebaseResult, RebaseError> {
        let mut next = self.state.clone();
        next.halt(reason);
        self.record(next)?;

        let status = match reason {
            HaltReason::Conflicts => RebaseStatus::Conflicts,
            HaltReason::Stop => RebaseStatus::Stop,
        };
        tracing::info!(
            step = ?self.state.current_step_info().map(|s| s.index),
            ?reason,
            "halted"
        );
        Ok(self.result(status))
    }

    /// Move the branch to the rewritten tip, re-attach HEAD, drop the state.
    fn finish(&mut self) -> Result<RebaseResult, RebaseError> {
        let tip = self.state.last_commit.clone();
        if self.git.head_oid()? != tip {
            self.git.reset_hard(&tip)?;
        }

        if let Some(branch) = &self.state.branch {
            self.git.update_ref_cas(
                branch,
                &tip,
                &self.state.orig_head,
                &format!("stepwise (finish): {} onto {}", branch, self.state.onto),
            )?;
            self.git.attach_head(branch)?;
        }
        SequenceState::remove(&self.paths)?;

        tracing::info!(
            op_id = %self.state.op_id,
            tip = %tip.short(7),
            rewritten = self.state.rewritten.len(),
            "rebase complete"
        );
        Ok(self.result(RebaseStatus::Complete))
    }
}

fn abort_sequence(git: &Git, paths: &RebasePaths) -> Result<AbortOutcome, RebaseError> {
    let _lock = RepoLock::acquire(paths)?;
    let point = match SequenceState::read(paths) {
        Ok(Some(state)) => {
            tracing::info!(op_id = %state.op_id, "aborting rebase");
            state.restore_point()
        }
        Ok(None) => return Ok(AbortOutcome::NothingToAbort),
        Err(err) if err.is_corrupt() => match SequenceState::read_restore_point(paths) {
            Some(point) => {
                tracing::warn!(error = %err, "aborting from a damaged sequence state");
                point
            }
            None => {
                tracing::warn!(error = %err, "removing unreadable sequence state");
                SequenceState::remove(paths)?;
                return Ok(AbortOutcome::Discarded);
            }
        },
        Err(err) => return Err(err.into()),
    };

    git.reset_hard(&point.orig_head)?;
    if let Some(branch) = &point.branch {
        rewind_finished_branch(git, branch, &point)?;
        git.attach_head(branch)?;
    }
    SequenceState::remove(paths)?;

    tracing::info!(restored = %point.orig_head.short(7), "aborted rebase");
    Ok(AbortOutcome::Aborted {
        restored: point.orig_head,
        branch: point.branch,
    })
}

/// Move `branch` back to `orig_head` if a finish already moved it to the
/// rewritten tip before failing.
fn rewind_finished_branch(
    git: &Git,
    branch: &RefName,
    point: &RestorePoint,
) -> Result<(), RebaseError> {
    let Some(rewritten) = &point.last_commit else {
        return Ok(());
    };
    let tip = match git.resolve_ref(branch) {
        Ok(tip) => tip,
        Err(GitError::RefNotFound { .. }) => return Ok(()),
        Err(err) => return Err(err.into()),
    };
    if tip == point.orig_head || tip != *rewritten {
        return Ok(());
    }
    git.update_ref_cas(
        branch,
        &point.orig_head,
        rewritten,
        &format!("stepwise (abort): {} back to {}", branch, point.orig_head),
    )?;
    tracing::info!(branch = %branch, "moved branch back to its original tip");
    Ok(())
}

fn step_commit(step: &RebaseStep) -> Result<&Oid, RebaseError> {
    step.commit.as_ref().ok_or_else(|| {
        RebaseError::InvalidTodo(format!("step {} ({}) has no commit", step.index + 1, step.kind))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ops::state::fault_injection;
    use std::path::Path;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        repo: git2::Repository,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let repo = git2::Repository::init(dir.path()).unwrap();
            {
                let mut config = repo.config().unwrap();
                config.set_str("user.name", "Test User").unwrap();
                config.set_str("user.email", "test@example.com").unwrap();
            }
            let fixture = Self { dir, repo };
            fixture.commit("README.md", "# test\n", "initial");
            fixture
        }

        fn commit(&self, path: &str, content: &str, message: &str) -> Oid {
            std::fs::write(self.dir.path().join(path), content).unwrap();
            let mut index = self.repo.index().unwrap();
            index.add_path(Path::new(path)).unwrap();
            index.write().unwrap();
            let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();
            let sig = self.repo.signature().unwrap();
            let parent = self.repo.head().unwrap().peel_to_commit().unwrap();
            let oid = self
                .repo
                .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])
                .unwrap();
            Oid::new(oid.to_string()).unwrap()
        }

        fn git(&self) -> Git {
            Git::open(self.dir.path()).unwrap()
        }

        fn committer() -> Identity {
            Identity::new("Rebaser", "rebaser@example.com").unwrap()
        }
    }

    mod init {
        use super::*;

        #[test]
        fn empty_upstream_is_missing_argument() {
            let fx = Fixture::new();
            let err = RebaseSequencer::init(fx.git(), "  ", InitOptions::new()).unwrap_err();
            assert!(matches!(
                err,
                RebaseError::MissingArgument { name: "upstream" }
            ));
            assert!(!RebaseSequencer::in_progress(&fx.git()).unwrap());
        }

        #[test]
        fn detaches_head_at_onto() {
            let fx = Fixture::new();
            let base = fx.git().head_oid().unwrap();
            fx.commit("a.txt", "a\n", "add a");

            let seq =
                RebaseSequencer::init(fx.git(), base.as_str(), InitOptions::new()).unwrap();
            assert_eq!(seq.phase(), SequencePhase::NotStarted);
            assert_eq!(seq.total_step_count(), 1);
            assert_eq!(fx.git().head_branch().unwrap(), None);
            assert_eq!(fx.git().head_oid().unwrap(), base);
        }

        #[test]
        fn todo_editor_errors_abort_init() {
            let fx = Fixture::new();
            let base = fx.git().head_oid().unwrap();
            fx.commit("a.txt", "a\n", "add a");

            let opts = InitOptions::new().edit_todo(|todo| todo.drop(3).map(|_| ()));
            assert!(matches!(
                RebaseSequencer::init(fx.git(), base.as_str(), opts),
                Err(RebaseError::InvalidTodo(_))
            ));
            assert!(!RebaseSequencer::in_progress(&fx.git()).unwrap());
            assert!(fx.git().head_branch().unwrap().is_some());
        }
    }

    mod run {
        use super::*;

        #[test]
        fn edit_step_stops_before_committing() {
            let fx = Fixture::new();
            let base = fx.git().head_oid().unwrap();
            fx.commit("a.txt", "a\n", "add a");

            let opts = InitOptions::new()
                .edit_todo(|todo| todo.set_kind(0, RebaseStepKind::Edit));
            let mut seq = RebaseSequencer::init(fx.git(), base.as_str(), opts).unwrap();

            let result = seq
                .continue_rebase(&Fixture::committer(), &mut RebaseOptions::new())
                .unwrap();
            assert_eq!(result.status, RebaseStatus::Stop);
            assert_eq!(result.completed_step_count, 0);
            assert_eq!(seq.phase(), SequencePhase::Halted(HaltReason::Stop));
            assert_eq!(
                std::fs::read_to_string(fx.dir.path().join("a.txt")).unwrap(),
                "a\n"
            );

            let mut opts = RebaseOptions::new().with_message("edited a\n");
            let result = seq.continue_rebase(&Fixture::committer(), &mut opts).unwrap();
            assert!(result.is_complete());
            let tip = fx.git().head_oid().unwrap();
            assert_eq!(fx.git().commit_info(&tip).unwrap().message, "edited a\n");
        }

        #[test]
        fn exec_step_stops_and_completes_without_commit() {
            let fx = Fixture::new();
            let base = fx.git().head_oid().unwrap();
            let a = fx.commit("a.txt", "a\n", "add a");

            let opts = InitOptions::new().edit_todo(|todo| todo.insert_exec(1, "make check"));
            let mut seq = RebaseSequencer::init(fx.git(), base.as_str(), opts).unwrap();
            let committer = Fixture::committer();

            let result = seq
                .continue_rebase(&committer, &mut RebaseOptions::new())
                .unwrap();
            assert_eq!(result.status, RebaseStatus::Stop);
            assert_eq!(result.completed_step_count, 1);
            let info = result.current_step_info.unwrap();
            assert_eq!(info.exec.as_deref(), Some("make check"));

            let mut outcomes = Vec::new();
            let mut opts = RebaseOptions::new().on_step_completed(|i| outcomes.push(i.clone()));
            let result = seq.continue_rebase(&committer, &mut opts).unwrap();
            drop(opts);
            assert!(result.is_complete());
            assert_eq!(outcomes.len(), 1);
            assert_eq!(outcomes[0].outcome, StepOutcome::Executed);
            assert_eq!(seq.rewritten().len(), 1);
            assert_eq!(seq.rewritten()[0].original, a);
        }

        #[test]
        fn already_applied_pick_makes_no_commit() {
            let fx = Fixture::new();
            let base = fx.commit("a.txt", "a\n", "add a");
            let git = fx.git();
            let branch = git.head_branch().unwrap().unwrap();
            let initial = git.commit_info(&base).unwrap().parents[0].clone();

            // Topic replays the same change from the initial commit.
            git.update_ref_cas(&branch, &initial, &base, "rewind").unwrap();
            git.reset_hard(&initial).unwrap();
            let dup = fx.commit("a.txt", "a\n", "add a again");

            let mut seen = Vec::new();
            let mut opts = RebaseOptions::new().on_step_completed(|i| seen.push(i.clone()));
            let mut seq =
                RebaseSequencer::init(fx.git(), base.as_str(), InitOptions::new()).unwrap();
            let result = seq.continue_rebase(&Fixture::committer(), &mut opts).unwrap();
            drop(opts);

            assert!(result.is_complete());
            assert_eq!(result.completed_step_count, 1);
            assert!(seen[0].was_already_applied());
            assert!(seq.rewritten().is_empty());
            assert_eq!(fx.git().resolve_ref(&branch).unwrap(), base);
            assert_ne!(base, dup);
        }

        #[test]
        fn squash_is_unsupported_and_leaves_state() {
            let fx = Fixture::new();
            let base = fx.git().head_oid().unwrap();
            fx.commit("a.txt", "a\n", "add a");
            fx.commit("b.txt", "b\n", "add b");

            let opts = InitOptions::new()
                .edit_todo(|todo| todo.set_kind(1, RebaseStepKind::Squash));
            let mut seq = RebaseSequencer::init(fx.git(), base.as_str(), opts).unwrap();
            let committer = Fixture::committer();

            for _ in 0..2 {
                let err = seq
                    .continue_rebase(&committer, &mut RebaseOptions::new())
                    .unwrap_err();
                assert!(matches!(
                    err,
                    RebaseError::UnsupportedOperation {
                        kind: RebaseStepKind::Squash,
                        index: 1
                    }
                ));
                assert_eq!(seq.completed_step_count(), 0);
                assert_eq!(seq.current_step_index(), Some(0));
                assert_eq!(seq.last_commit(), &base);
                assert_eq!(fx.git().head_oid().unwrap(), base);

                let persisted = SequenceState::read(&seq.paths).unwrap().unwrap();
                assert_eq!(persisted.completed, 0);
                assert_eq!(persisted.last_commit, base);
                assert!(fx.git().worktree_status(false).unwrap().is_clean());
            }
        }

        #[test]
        fn failed_continue_keeps_resolution_staged() {
            let fx = Fixture::new();
            let base = fx.git().head_oid().unwrap();
            fx.commit("a.txt", "a\n", "add a");
            fx.commit("b.txt", "b\n", "add b");

            let opts = InitOptions::new().edit_todo(|todo| {
                todo.set_kind(0, RebaseStepKind::Edit)?;
                todo.set_kind(1, RebaseStepKind::Fixup)
            });
            let mut seq = RebaseSequencer::init(fx.git(), base.as_str(), opts).unwrap();
            let committer = Fixture::committer();

            let result = seq
                .continue_rebase(&committer, &mut RebaseOptions::new())
                .unwrap();
            assert_eq!(result.status, RebaseStatus::Stop);

            std::fs::write(fx.dir.path().join("a.txt"), "amended\n").unwrap();
            let mut index = fx.repo.index().unwrap();
            index.add_path(Path::new("a.txt")).unwrap();
            index.write().unwrap();

            let err = seq
                .continue_rebase(&committer, &mut RebaseOptions::new())
                .unwrap_err();
            assert!(matches!(err, RebaseError::UnsupportedOperation { index: 1, .. }));
            assert_eq!(seq.phase(), SequencePhase::Halted(HaltReason::Stop));
            assert_eq!(seq.completed_step_count(), 0);
            assert_eq!(fx.git().head_oid().unwrap(), base);
            assert_eq!(
                std::fs::read_to_string(fx.dir.path().join("a.txt")).unwrap(),
                "amended\n"
            );
            let status = fx.git().worktree_status(false).unwrap();
            assert!(status.staged > 0);
            assert_eq!(status.unstaged, 0);
        }

        #[test]
        fn failed_state_write_rolls_back_then_retry_completes() {
            let fx = Fixture::new();
            let base = fx.git().head_oid().unwrap();
            fx.commit("a.txt", "a\n", "add a");
            fx.commit("b.txt", "b\n", "add b");
            fx.commit("c.txt", "c\n", "add c");

            let mut seq =
                RebaseSequencer::init(fx.git(), base.as_str(), InitOptions::new()).unwrap();
            let committer = Fixture::committer();

            // Step 0 records, step 1's record fails.
            fault_injection::set_crash_after(2);
            let err = seq
                .continue_rebase(&committer, &mut RebaseOptions::new())
                .unwrap_err();
            fault_injection::reset();
            assert!(matches!(err, RebaseError::State(_)));

            let persisted = SequenceState::read(&seq.paths).unwrap().unwrap();
            assert_eq!(persisted.completed, 0);
            assert_eq!(persisted.last_commit, base);
            assert!(persisted.rewritten.is_empty());
            assert_eq!(seq.completed_step_count(), 0);
            assert_eq!(fx.git().head_oid().unwrap(), base);
            assert!(!fx.dir.path().join("a.txt").exists());

            let result = seq
                .continue_rebase(&committer, &mut RebaseOptions::new())
                .unwrap();
            assert!(result.is_complete());
            assert_eq!(result.completed_step_count, 3);
            assert_eq!(seq.rewritten().len(), 3);
            assert!(fx.dir.path().join("c.txt").exists());
        }

        #[test]
        fn failed_skip_restages_skipped_step() {
            let fx = Fixture::new();
            let base = fx.git().head_oid().unwrap();
            fx.commit("a.txt", "a\n", "add a");
            fx.commit("b.txt", "b\n", "add b");

            let opts = InitOptions::new().edit_todo(|todo| {
                todo.set_kind(0, RebaseStepKind::Edit)?;
                todo.set_kind(1, RebaseStepKind::Squash)
            });
            let mut seq = RebaseSequencer::init(fx.git(), base.as_str(), opts).unwrap();
            let committer = Fixture::committer();
            seq.continue_rebase(&committer, &mut RebaseOptions::new())
                .unwrap();

            let err = seq.skip(&committer, &mut RebaseOptions::new()).unwrap_err();
            assert!(matches!(err, RebaseError::UnsupportedOperation { index: 1, .. }));
            assert_eq!(seq.phase(), SequencePhase::Halted(HaltReason::Stop));
            assert_eq!(seq.current_step_index(), Some(0));
            let persisted = SequenceState::read(&seq.paths).unwrap().unwrap();
            assert_eq!(persisted.halt, Some(HaltReason::Stop));
            assert_eq!(persisted.completed, 0);
            assert_eq!(
                std::fs::read_to_string(fx.dir.path().join("a.txt")).unwrap(),
                "a\n"
            );
        }

        #[test]
        fn skip_requires_halt() {
            let fx = Fixture::new();
            let base = fx.git().head_oid().unwrap();
            fx.commit("a.txt", "a\n", "add a");

            let mut seq =
                RebaseSequencer::init(fx.git(), base.as_str(), InitOptions::new()).unwrap();
            assert!(matches!(
                seq.skip(&Fixture::committer(), &mut RebaseOptions::new()),
                Err(RebaseError::NotHalted)
            ));
        }
    }

    mod abort {
        use super::*;

        fn start_with_edit_on_second(fx: &Fixture) -> (RebaseSequencer, Oid, RefName) {
            let base = fx.git().head_oid().unwrap();
            fx.commit("a.txt", "a\n", "add a");
            let orig = fx.commit("b.txt", "b\n", "add b");
            let branch = fx.git().head_branch().unwrap().unwrap();

            let opts = InitOptions::new()
                .edit_todo(|todo| todo.set_kind(1, RebaseStepKind::Edit));
            let mut seq = RebaseSequencer::init(fx.git(), base.as_str(), opts).unwrap();
            let result = seq
                .continue_rebase(&Fixture::committer(), &mut RebaseOptions::new())
                .unwrap();
            assert_eq!(result.status, RebaseStatus::Stop);
            assert_eq!(result.completed_step_count, 1);
            (seq, orig, branch)
        }

        #[test]
        fn rewinds_branch_already_moved_to_rewritten_tip() {
            let fx = Fixture::new();
            let (mut seq, orig, branch) = start_with_edit_on_second(&fx);
            let rewritten = seq.last_commit().clone();

            // A finish that moved the branch and then failed.
            fx.git()
                .update_ref_cas(&branch, &rewritten, &orig, "finish")
                .unwrap();

            let outcome = seq.abort().unwrap();
            assert_eq!(
                outcome,
                AbortOutcome::Aborted {
                    restored: orig.clone(),
                    branch: Some(branch.clone()),
                }
            );
            assert_eq!(fx.git().resolve_ref(&branch).unwrap(), orig);
            assert_eq!(fx.git().head_branch().unwrap(), Some(branch));
            assert_eq!(fx.git().head_oid().unwrap(), orig);
        }

        #[test]
        fn leaves_branch_moved_elsewhere_alone() {
            let fx = Fixture::new();
            let (mut seq, orig, branch) = start_with_edit_on_second(&fx);
            let onto = seq.onto().clone();

            fx.git().update_ref_cas(&branch, &onto, &orig, "user").unwrap();
            seq.abort().unwrap();
            assert_eq!(fx.git().resolve_ref(&branch).unwrap(), onto);
        }

        #[test]
        fn truncated_state_is_discarded() {
            let fx = Fixture::new();
            let (seq, _, _) = start_with_edit_on_second(&fx);
            let path = seq.paths.sequence_path();
            let content = std::fs::read_to_string(&path).unwrap();
            std::fs::write(&path, &content[..content.len() / 3]).unwrap();
            assert!(RebaseSequencer::open(fx.git()).is_err());

            let outcome = RebaseSequencer::abort_in(&fx.git()).unwrap();
            assert_eq!(outcome, AbortOutcome::Discarded);
            assert!(!RebaseSequencer::in_progress(&fx.git()).unwrap());

            // Reset the staged edit so the worktree is clean again.
            let onto = seq.onto().clone();
            fx.git().reset_hard(&onto).unwrap();
            let restarted = RebaseSequencer::init(fx.git(), onto.as_str(), InitOptions::new());
            assert!(restarted.is_ok());
        }

        #[test]
        fn tampered_state_still_restores_orig_head() {
            let fx = Fixture::new();
            let (seq, orig, branch) = start_with_edit_on_second(&fx);
            let path = seq.paths.sequence_path();
            let mut json: serde_json::Value =
                serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
            json["completed"] = serde_json::json!(99);
            std::fs::write(&path, json.to_string()).unwrap();
            assert!(RebaseSequencer::open(fx.git()).is_err());

            let outcome = RebaseSequencer::abort_in(&fx.git()).unwrap();
            assert_eq!(
                outcome,
                AbortOutcome::Aborted {
                    restored: orig.clone(),
                    branch: Some(branch.clone()),
                }
            );
            assert_eq!(fx.git().head_branch().unwrap(), Some(branch));
            assert_eq!(fx.git().head_oid().unwrap(), orig);
            assert!(!RebaseSequencer::in_progress(&fx.git()).unwrap());
        }
    }
}
