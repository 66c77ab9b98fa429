//! rebase::todo
//!
//! The editable step plan, before it is frozen into a sequence.

use crate::core::step::{RebaseStep, RebaseStepKind};
use crate::core::types::Oid;

use super::error::RebaseError;

/// Planned steps. Indices are kept contiguous across edits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoList {
    steps: Vec<RebaseStep>,
}

impl TodoList {
    /// One `pick` per commit, oldest first.
    pub fn from_commits(commits: &[Oid]) -> Self {
        Self {
            steps: commits
                .iter()
                .enumerate()
                .map(|(i, oid)| RebaseStep::pick(i, oid.clone()))
                .collect(),
        }
    }

    pub fn steps(&self) -> &[RebaseStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Change what a commit step does. Exec steps cannot be retyped.
    pub fn set_kind(&mut self, index: usize, kind: RebaseStepKind) -> Result<(), RebaseError> {
        let step = self.step_mut(index)?;
        if step.kind == RebaseStepKind::Exec || kind == RebaseStepKind::Exec {
            return Err(RebaseError::InvalidTodo(format!(
                "step {} cannot change from {} to {}",
                index + 1,
                step.kind,
                kind
            )));
        }
        step.kind = kind;
        Ok(())
    }

    /// Remove a step and return it.
    pub fn drop(&mut self, index: usize) -> Result<RebaseStep, RebaseError> {
        self.step_mut(index)?;
        let removed = self.steps.remove(index);
        self.renumber();
        Ok(removed)
    }

    /// Insert an exec step so that it runs at `index`. `index == len()` appends.
    pub fn insert_exec(
        &mut self,
        index: usize,
        command: impl Into<String>,
    ) -> Result<(), RebaseError> {
        if index > self.steps.len() {
            return Err(RebaseError::InvalidTodo(format!(
                "cannot insert at {}, list has {} step(s)",
                index + 1,
                self.steps.len()
            )));
        }
        self.steps.insert(index, RebaseStep::exec(index, command));
        self.renumber();
        Ok(())
    }

    /// Append `command` after every commit step.
    pub fn exec_after_each(&mut self, command: &str) {
        let mut out = Vec::with_capacity(self.steps.len() * 2);
        for step in self.steps.drain(..) {
            let is_commit = step.kind.needs_commit();
            out.push(step);
            if is_commit {
                out.push(RebaseStep::exec(0, command));
            }
        }
        self.steps = out;
        self.renumber();
    }

    /// Reject plans the sequencer cannot start from.
    pub fn validate(&self) -> Result<(), RebaseError> {
        if let Some(first) = self.steps.iter().find(|s| s.kind != RebaseStepKind::Exec) {
            if first.kind.melds() {
                return Err(RebaseError::InvalidTodo(format!(
                    "step {} ({}) has no previous commit to meld into",
                    first.index + 1,
                    first.kind
                )));
            }
        }
        for step in &self.steps {
            match (step.kind.needs_commit(), &step.commit, &step.exec) {
                (true, None, _) => {
                    return Err(RebaseError::InvalidTodo(format!(
                        "step {} ({}) has no commit",
                        step.index + 1,
                        step.kind
                    )));
                }
                (false, _, None) => {
                    return Err(RebaseError::InvalidTodo(format!(
                        "step {} (exec) has no command",
                        step.index + 1
                    )));
                }
                (false, _, Some(cmd)) if cmd.trim().is_empty() => {
                    return Err(RebaseError::InvalidTodo(format!(
                        "step {} (exec) has an empty command",
                        step.index + 1
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn into_steps(self) -> Vec<RebaseStep> {
        self.steps
    }

    fn step_mut(&mut self, index: usize) -> Result<&mut RebaseStep, RebaseError> {
        let len = self.steps.len();
        self.steps.get_mut(index).ok_or_else(|| {
            RebaseError::InvalidTodo(format!("no step {}, list has {len} step(s)", index + 1))
        })
    }

    fn renumber(&mut self) {
        for (i, step) in self.steps.iter_mut().enumerate() {
            step.index = i;
        }
    }
}

impl std::fmt::Display for TodoList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for step in &self.steps {
            writeln!(f, "{}", step.todo_line())?;
        }
        Ok(())
    }
}
