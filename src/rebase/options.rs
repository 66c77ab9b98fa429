//! rebase::options
//!
//! Caller-supplied knobs for starting and driving a sequence.

use crate::core::step::RebaseStepInfo;
use crate::git::MergeSettings;

use super::error::RebaseError;
use super::result::AfterStepInfo;
use super::todo::TodoList;

/// Called before a step is applied.
pub type StepStartingHandler<'a> = Box<dyn FnMut(&RebaseStepInfo) + 'a>;

/// Called after a step is recorded as finished.
pub type StepCompletedHandler<'a> = Box<dyn FnMut(&AfterStepInfo) + 'a>;

/// Edits the planned steps before anything is written.
pub type TodoEditor<'a> = Box<dyn FnOnce(&mut TodoList) -> Result<(), RebaseError> + 'a>;

/// Options for `continue` and `skip`.
#[derive(Default)]
pub struct RebaseOptions<'a> {
    pub on_step_starting: Option<StepStartingHandler<'a>>,
    pub on_step_completed: Option<StepCompletedHandler<'a>>,
    /// Message for the commit made from a halted step. Ignored otherwise.
    pub message: Option<String>,
    pub merge: MergeSettings,
}

impl<'a> RebaseOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_merge(mut self, merge: MergeSettings) -> Self {
        self.merge = merge;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn on_step_starting(mut self, f: impl FnMut(&RebaseStepInfo) + 'a) -> Self {
        self.on_step_starting = Some(Box::new(f));
        self
    }

    pub fn on_step_completed(mut self, f: impl FnMut(&AfterStepInfo) + 'a) -> Self {
        self.on_step_completed = Some(Box::new(f));
        self
    }

    pub(crate) fn step_starting(&mut self, info: &RebaseStepInfo) {
        if let Some(f) = self.on_step_starting.as_mut() {
            f(info);
        }
    }

    pub(crate) fn step_completed(&mut self, info: &AfterStepInfo) {
        if let Some(f) = self.on_step_completed.as_mut() {
            f(info);
        }
    }
}

impl std::fmt::Debug for RebaseOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RebaseOptions")
            .field("on_step_starting", &self.on_step_starting.is_some())
            .field("on_step_completed", &self.on_step_completed.is_some())
            .field("message", &self.message)
            .field("merge", &self.merge)
            .finish()
    }
}

/// Options for [`RebaseSequencer::init`](super::RebaseSequencer::init).
#[derive(Default)]
pub struct InitOptions<'a> {
    /// Branch to rebase. Defaults to the branch HEAD is on (or detached HEAD).
    pub branch: Option<String>,
    /// New base. Defaults to the upstream.
    pub onto: Option<String>,
    /// Follow only first parents when collecting commits.
    pub first_parent_only: bool,
    pub edit_todo: Option<TodoEditor<'a>>,
}

impl<'a> InitOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn onto(mut self, onto: impl Into<String>) -> Self {
        self.onto = Some(onto.into());
        self
    }

    pub fn first_parent_only(mut self, yes: bool) -> Self {
        self.first_parent_only = yes;
        self
    }

    pub fn edit_todo(
        mut self,
        f: impl FnOnce(&mut TodoList) -> Result<(), RebaseError> + 'a,
    ) -> Self {
        self.edit_todo = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for InitOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitOptions")
            .field("branch", &self.branch)
            .field("onto", &self.onto)
            .field("first_parent_only", &self.first_parent_only)
            .field("edit_todo", &self.edit_todo.is_some())
            .finish()
    }
}
