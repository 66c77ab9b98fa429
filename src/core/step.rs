//! core::step
//!
//! Rebase step descriptors.

use serde::{Deserialize, Serialize};

use crate::core::types::Oid;

/// What a step does with its source commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebaseStepKind {
    /// Apply the commit as-is.
    Pick,
    /// Apply the commit, then stop so the message can be changed.
    Reword,
    /// Apply the commit, then stop so the content can be amended.
    Edit,
    /// Meld into the previous commit, combining messages.
    Squash,
    /// Meld into the previous commit, keeping its message.
    Fixup,
    /// Run a command. Carries no commit.
    Exec,
}

impl RebaseStepKind {
    /// Kinds that need a source commit.
    pub fn needs_commit(self) -> bool {
        self != Self::Exec
    }

    /// Kinds that hand control back to the caller before committing.
    pub fn pauses(self) -> bool {
        matches!(self, Self::Reword | Self::Edit | Self::Exec)
    }

    /// Kinds that fold into the previous commit.
    pub fn melds(self) -> bool {
        matches!(self, Self::Squash | Self::Fixup)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pick => "pick",
            Self::Reword => "reword",
            Self::Edit => "edit",
            Self::Squash => "squash",
            Self::Fixup => "fixup",
            Self::Exec => "exec",
        }
    }
}

impl std::fmt::Display for RebaseStepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RebaseStepKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pick" | "p" => Ok(Self::Pick),
            "reword" | "r" => Ok(Self::Reword),
            "edit" | "e" => Ok(Self::Edit),
            "squash" | "s" => Ok(Self::Squash),
            "fixup" | "f" => Ok(Self::Fixup),
            "exec" | "x" => Ok(Self::Exec),
            other => Err(format!("unknown step kind '{other}'")),
        }
    }
}

/// One unit of work in a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebaseStep {
    pub index: usize,
    pub kind: RebaseStepKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<Oid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<String>,
}

impl RebaseStep {
    pub fn pick(index: usize, commit: Oid) -> Self {
        Self {
            index,
            kind: RebaseStepKind::Pick,
            commit: Some(commit),
            exec: None,
        }
    }

    pub fn exec(index: usize, command: impl Into<String>) -> Self {
        Self {
            index,
            kind: RebaseStepKind::Exec,
            commit: None,
            exec: Some(command.into()),
        }
    }

    /// Canonical one-line form, e.g. `pick 1a2b...` or `exec make test`.
    pub fn todo_line(&self) -> String {
        match (&self.commit, &self.exec) {
            (_, Some(cmd)) => format!("{} {}", self.kind, cmd),
            (Some(commit), None) => format!("{} {}", self.kind, commit),
            (None, None) => self.kind.to_string(),
        }
    }

    /// Snapshot for reporting, given the sequence length.
    pub fn info(&self, total: usize) -> RebaseStepInfo {
        RebaseStepInfo {
            kind: self.kind,
            commit: self.commit.clone(),
            exec: self.exec.clone(),
            index: self.index,
            total,
        }
    }
}

/// Immutable snapshot of a step, handed to callbacks and results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebaseStepInfo {
    pub kind: RebaseStepKind,
    pub commit: Option<Oid>,
    pub exec: Option<String>,
    /// 0-based position in the sequence.
    pub index: usize,
    pub total: usize,
}

impl std::fmt::Display for RebaseStepInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}/{}] {}", self.index + 1, self.total, self.kind)?;
        if let Some(commit) = &self.commit {
            write!(f, " {}", commit.short(7))?;
        }
        if let Some(cmd) = &self.exec {
            write!(f, " {}", cmd)?;
        }
        Ok(())
    }
}
