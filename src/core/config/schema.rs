//! core::config::schema
//!
//! Configuration schema types.
//!
//! Both scopes share the `[rebase]` table; the repo file may additionally
//! name a default upstream.
//!
//! ```toml
//! upstream = "origin/main"   # repo scope only
//!
//! [rebase]
//! first_parent_only = false
//! conflict_style = "diff3"
//! file_favor = "normal"
//! find_renames = true
//! rename_threshold = 50
//! ```

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// How conflict markers are written into the worktree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStyle {
    /// `<<<<<<<` / `=======` / `>>>>>>>`
    #[default]
    Merge,
    /// Adds the `|||||||` ancestor section.
    Diff3,
}

/// Which side wins textual conflicts inside a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFavor {
    /// Record a conflict.
    #[default]
    Normal,
    Ours,
    Theirs,
    /// Keep both sides' lines.
    Union,
}

/// The `[rebase]` table as written in a file. Unset keys fall through.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RebaseSection {
    pub first_parent_only: Option<bool>,
    pub conflict_style: Option<ConflictStyle>,
    pub file_favor: Option<FileFavor>,
    pub find_renames: Option<bool>,
    /// Similarity percentage (0-100) for rename detection.
    pub rename_threshold: Option<u32>,
}

impl RebaseSection {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(threshold) = self.rename_threshold {
            if threshold > 100 {
                return Err(ConfigError::InvalidValue(format!(
                    "rebase.rename_threshold must be 0-100, got {threshold}"
                )));
            }
        }
        Ok(())
    }
}

/// Global configuration (user scope).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    pub rebase: Option<RebaseSection>,
}

impl GlobalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rebase.as_ref().map_or(Ok(()), RebaseSection::validate)
    }
}

/// Repository configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Upstream used by `start` when none is given.
    pub upstream: Option<String>,

    pub rebase: Option<RebaseSection>,
}

impl RepoConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(upstream) = &self.upstream {
            if upstream.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "upstream cannot be empty".into(),
                ));
            }
        }
        self.rebase.as_ref().map_or(Ok(()), RebaseSection::validate)
    }
}

/// Fully resolved rebase settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebaseConfig {
    pub first_parent_only: bool,
    pub conflict_style: ConflictStyle,
    pub file_favor: FileFavor,
    pub find_renames: bool,
    pub rename_threshold: u32,
}

impl Default for RebaseConfig {
    fn default() -> Self {
        Self {
            first_parent_only: false,
            conflict_style: ConflictStyle::Merge,
            file_favor: FileFavor::Normal,
            find_renames: true,
            rename_threshold: 50,
        }
    }
}

impl RebaseConfig {
    /// Apply a file section on top, key by key.
    pub fn overlay(mut self, section: Option<&RebaseSection>) -> Self {
        let Some(section) = section else {
            return self;
        };
        if let Some(v) = section.first_parent_only {
            self.first_parent_only = v;
        }
        if let Some(v) = section.conflict_style {
            self.conflict_style = v;
        }
        if let Some(v) = section.file_favor {
            self.file_favor = v;
        }
        if let Some(v) = section.find_renames {
            self.find_renames = v;
        }
        if let Some(v) = section.rename_threshold {
            self.rename_threshold = v;
        }
        self
    }
}
