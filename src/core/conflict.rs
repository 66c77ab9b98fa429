//! core::conflict
//!
//! The three-way conflict staging model.
//!
//! # Architecture
//!
//! After a failed merge the index holds up to three entries per path, one
//! per [`StageLevel`] (ancestor, ours, theirs), instead of the single
//! `Normal` entry of a fully merged path. [`ConflictIndex`] is a read-only
//! view over a [`StageStore`] that folds those entries into one
//! [`Conflict`] per path.
//!
//! Nothing here is cached. Every call re-reads the store, so a view taken
//! before the caller resolves a path never reports stale conflicts.
//!
//! # Invariants
//!
//! - Stores yield records sorted by path; grouping relies on it and does not re-sort
//! - `Normal` records never belong to a conflict
//! - A [`Conflict`] always has at least one side present
//! - A stage outside 0..=3, or a repeated stage within one path, is a corrupt
//!   store and fails loudly instead of being skipped
//!
//! # Example
//!
//! ```
//! use stepwise::core::conflict::{ConflictIndex, IndexRecord, StageLevel};
//! use stepwise::core::types::Oid;
//!
//! let id = Oid::new("a".repeat(40)).unwrap();
//! let store = vec![
//!     IndexRecord::new("file.txt", id.clone(), 0o100644, StageLevel::Ours),
//!     IndexRecord::new("file.txt", id.clone(), 0o100644, StageLevel::Theirs),
//!     IndexRecord::new("other.txt", id, 0o100644, StageLevel::Normal),
//! ];
//!
//! let index = ConflictIndex::new(&store);
//! let all = index.all().unwrap();
//! assert_eq!(all.len(), 1);
//! assert!(all[0].ancestor().is_none());
//! ```

use std::error::Error as StdError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::Oid;

/// Errors from reading the staging model.
#[derive(Debug, Error)]
pub enum ConflictError {
    /// A record carried a stage number outside 0..=3.
    #[error("invalid stage level {stage} for '{path}'")]
    InvalidStage {
        /// Path of the offending record.
        path: String,
        /// Raw stage number.
        stage: u16,
    },

    /// Two records for one path carried the same stage.
    #[error("duplicate {stage:?} entry for '{path}'")]
    DuplicateStage {
        /// Path of the offending records.
        path: String,
        /// The repeated stage.
        stage: StageLevel,
    },

    /// The backing store could not be read.
    #[error("staging store error: {0}")]
    Store(#[source] Box<dyn StdError + Send + Sync>),
}

/// Stage of an index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageLevel {
    /// Fully merged.
    Normal = 0,
    /// Common ancestor's version.
    Ancestor = 1,
    /// The side being rebased onto.
    Ours = 2,
    /// The side being applied.
    Theirs = 3,
}

impl StageLevel {
    pub fn from_raw(stage: u16) -> Option<Self> {
        match stage {
            0 => Some(Self::Normal),
            1 => Some(Self::Ancestor),
            2 => Some(Self::Ours),
            3 => Some(Self::Theirs),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u16 {
        self as u16
    }

    pub fn is_conflicted(self) -> bool {
        self != Self::Normal
    }
}

/// Git file mode of a staged entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileMode {
    Nonexistent,
    Directory,
    NonExecutableFile,
    NonExecutableGroupWritableFile,
    ExecutableFile,
    SymbolicLink,
    GitLink,
    /// A mode git does not define. Preserved verbatim.
    Unknown(u32),
}

impl FileMode {
    pub fn from_raw(mode: u32) -> Self {
        match mode {
            0 => Self::Nonexistent,
            0o040000 => Self::Directory,
            0o100644 => Self::NonExecutableFile,
            0o100664 => Self::NonExecutableGroupWritableFile,
            0o100755 => Self::ExecutableFile,
            0o120000 => Self::SymbolicLink,
            0o160000 => Self::GitLink,
            other => Self::Unknown(other),
        }
    }

    pub fn as_raw(self) -> u32 {
        match self {
            Self::Nonexistent => 0,
            Self::Directory => 0o040000,
            Self::NonExecutableFile => 0o100644,
            Self::NonExecutableGroupWritableFile => 0o100664,
            Self::ExecutableFile => 0o100755,
            Self::SymbolicLink => 0o120000,
            Self::GitLink => 0o160000,
            Self::Unknown(raw) => raw,
        }
    }
}

impl std::fmt::Display for FileMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:06o}", self.as_raw())
    }
}

/// An untyped record as a store reports it.
///
/// The stage is kept raw so that a corrupt store can be detected during
/// grouping rather than silently clamped on the way in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    pub path: String,
    pub id: Oid,
    pub mode: u32,
    pub stage: u16,
}

impl IndexRecord {
    pub fn new(path: impl Into<String>, id: Oid, mode: u32, stage: StageLevel) -> Self {
        Self {
            path: path.into(),
            id,
            mode,
            stage: stage.as_raw(),
        }
    }
}

/// One staged entry for a path at one stage level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedEntry {
    pub path: String,
    pub id: Oid,
    pub mode: FileMode,
    pub stage: StageLevel,
}

impl TryFrom<IndexRecord> for StagedEntry {
    type Error = ConflictError;

    fn try_from(record: IndexRecord) -> Result<Self, Self::Error> {
        let stage = StageLevel::from_raw(record.stage).ok_or_else(|| ConflictError::InvalidStage {
            path: record.path.clone(),
            stage: record.stage,
        })?;
        Ok(Self {
            path: record.path,
            id: record.id,
            mode: FileMode::from_raw(record.mode),
            stage,
        })
    }
}

/// The staged sides of one conflicted path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    path: String,
    ancestor: Option<StagedEntry>,
    ours: Option<StagedEntry>,
    theirs: Option<StagedEntry>,
}

impl Conflict {
    /// Build a conflict from its sides. Returns `None` when every side is absent.
    pub fn new(
        path: impl Into<String>,
        ancestor: Option<StagedEntry>,
        ours: Option<StagedEntry>,
        theirs: Option<StagedEntry>,
    ) -> Option<Self> {
        if ancestor.is_none() && ours.is_none() && theirs.is_none() {
            return None;
        }
        Some(Self {
            path: path.into(),
            ancestor,
            ours,
            theirs,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn ancestor(&self) -> Option<&StagedEntry> {
        self.ancestor.as_ref()
    }

    pub fn ours(&self) -> Option<&StagedEntry> {
        self.ours.as_ref()
    }

    pub fn theirs(&self) -> Option<&StagedEntry> {
        self.theirs.as_ref()
    }

    /// Short description of the conflict shape, e.g. "both modified".
    pub fn describe(&self) -> &'static str {
        match (self.ancestor.is_some(), self.ours.is_some(), self.theirs.is_some()) {
            (true, true, true) => "both modified",
            (false, true, true) => "both added",
            (true, true, false) => "deleted by them",
            (true, false, true) => "deleted by us",
            (false, true, false) => "added by us",
            (false, false, true) => "added by them",
            (true, false, false) => "both deleted",
            (false, false, false) => "unknown",
        }
    }

    fn slot_mut(&mut self, stage: StageLevel) -> Option<&mut Option<StagedEntry>> {
        match stage {
            StageLevel::Ancestor => Some(&mut self.ancestor),
            StageLevel::Ours => Some(&mut self.ours),
            StageLevel::Theirs => Some(&mut self.theirs),
            StageLevel::Normal => None,
        }
    }

    /// Place `entry` into its slot, refusing to overwrite an occupied one.
    fn place(&mut self, entry: StagedEntry) -> Result<(), ConflictError> {
        let stage = entry.stage;
        let path = entry.path.clone();
        match self.slot_mut(stage) {
            Some(slot) if slot.is_none() => {
                *slot = Some(entry);
                Ok(())
            }
            _ => Err(ConflictError::DuplicateStage { path, stage }),
        }
    }

    fn seeded(entry: StagedEntry) -> Result<Self, ConflictError> {
        let mut conflict = Self {
            path: entry.path.clone(),
            ancestor: None,
            ours: None,
            theirs: None,
        };
        conflict.place(entry)?;
        Ok(conflict)
    }
}

/// A source of staged index records.
pub trait StageStore {
    /// Every record, sorted by path then stage.
    fn records(&self) -> Result<Vec<IndexRecord>, ConflictError>;

    /// The conflict-stage records (1..=3) for exactly `path`.
    fn records_at(&self, path: &str) -> Result<Vec<IndexRecord>, ConflictError>;

    /// Whether any record is at a conflict stage.
    ///
    /// Rejects stages outside 0..=3 the same way [`group_conflicts`] does.
    fn has_conflicts(&self) -> Result<bool, ConflictError> {
        let mut conflicted = false;
        for record in self.records()? {
            let stage = StageLevel::from_raw(record.stage).ok_or(ConflictError::InvalidStage {
                path: record.path,
                stage: record.stage,
            })?;
            conflicted |= stage.is_conflicted();
        }
        Ok(conflicted)
    }
}

impl StageStore for Vec<IndexRecord> {
    fn records(&self) -> Result<Vec<IndexRecord>, ConflictError> {
        Ok(self.clone())
    }

    fn records_at(&self, path: &str) -> Result<Vec<IndexRecord>, ConflictError> {
        Ok(self
            .iter()
            .filter(|r| r.path == path && r.stage != 0)
            .cloned()
            .collect())
    }
}

/// Fold path-sorted records into conflicts.
///
/// `Normal` records are skipped without closing the current run; in a
/// well-formed index a path never has both a `Normal` and a conflict entry.
pub fn group_conflicts<I>(records: I) -> Result<Vec<Conflict>, ConflictError>
where
    I: IntoIterator<Item = IndexRecord>,
{
    let mut conflicts = Vec::new();
    let mut current: Option<Conflict> = None;

    for record in records {
        let entry = StagedEntry::try_from(record)?;
        if !entry.stage.is_conflicted() {
            continue;
        }
        match current.as_mut() {
            Some(open) if open.path == entry.path => open.place(entry)?,
            _ => {
                if let Some(done) = current.replace(Conflict::seeded(entry)?) {
                    conflicts.push(done);
                }
            }
        }
    }

    conflicts.extend(current);
    Ok(conflicts)
}

/// Read-only view of the conflicts currently staged in a store.
pub struct ConflictIndex<'a> {
    store: &'a dyn StageStore,
}

impl<'a> ConflictIndex<'a> {
    pub fn new(store: &'a dyn StageStore) -> Self {
        Self { store }
    }

    /// All conflicts, in store order.
    pub fn all(&self) -> Result<Vec<Conflict>, ConflictError> {
        group_conflicts(self.store.records()?)
    }

    /// The conflict at exactly `path`, if any.
    pub fn get(&self, path: &str) -> Result<Option<Conflict>, ConflictError> {
        let grouped = group_conflicts(self.store.records_at(path)?)?;
        Ok(grouped.into_iter().find(|c| c.path == path))
    }

    /// True when the store is fully merged.
    pub fn is_empty(&self) -> Result<bool, ConflictError> {
        Ok(!self.store.has_conflicts()?)
    }
}
