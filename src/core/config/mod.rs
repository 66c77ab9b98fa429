//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! stepwise has two configuration scopes:
//! - **Global**: User-level settings
//! - **Repo**: Repository-level overrides
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Repo config file
//! 4. CLI flags (not handled here)
//!
//! Overrides apply key by key, so a repo file that only sets
//! `rebase.conflict_style` keeps every other global setting.
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$STEPWISE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/stepwise/config.toml`
//! 3. `~/.stepwise/config.toml` (canonical write location)
//!
//! # Repo Config Location
//!
//! `<common_dir>/stepwise/config.toml`, see [`RebasePaths::repo_config_path`].
//!
//! # Example
//!
//! ```no_run
//! use stepwise::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("conflict style: {:?}", config.rebase().conflict_style);
//! ```

pub mod schema;

pub use schema::{GlobalConfig, RebaseConfig, RepoConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::paths::RebasePaths;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Merged configuration from all sources.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: GlobalConfig,
    pub repo: Option<RepoConfig>,
    global_path: Option<PathBuf>,
    repo_path: Option<PathBuf>,
}

impl Config {
    /// Load the global file and, when `paths` is given, the repo file.
    ///
    /// Missing files are not an error; unparsable or invalid ones are.
    pub fn load(paths: Option<&RebasePaths>) -> Result<Self, ConfigError> {
        let global_path = Self::find_global();
        let repo_path = paths
            .map(RebasePaths::repo_config_path)
            .filter(|p| p.exists());
        Self::load_from(global_path, repo_path)
    }

    /// Load from explicit file locations.
    pub fn load_from(
        global_path: Option<PathBuf>,
        repo_path: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let global: GlobalConfig = match &global_path {
            Some(path) => Self::read_toml(path)?,
            None => GlobalConfig::default(),
        };
        let repo: Option<RepoConfig> = match &repo_path {
            Some(path) => Some(Self::read_toml(path)?),
            None => None,
        };

        global.validate()?;
        if let Some(r) = &repo {
            r.validate()?;
        }

        tracing::debug!(
            global = ?global_path,
            repo = ?repo_path,
            "loaded configuration"
        );
        Ok(Self {
            global,
            repo,
            global_path,
            repo_path,
        })
    }

    /// First existing global config file, if any.
    fn find_global() -> Option<PathBuf> {
        let candidates = [
            std::env::var_os("STEPWISE_CONFIG").map(PathBuf::from),
            std::env::var_os("XDG_CONFIG_HOME")
                .map(|xdg| PathBuf::from(xdg).join("stepwise/config.toml")),
            dirs::home_dir().map(|home| home.join(".stepwise/config.toml")),
        ];
        candidates.into_iter().flatten().find(|p| p.exists())
    }

    fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Canonical global config path: `~/.stepwise/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".stepwise/config.toml"))
    }

    /// Write repo config atomically.
    pub fn write_repo(paths: &RebasePaths, config: &RepoConfig) -> Result<PathBuf, ConfigError> {
        config.validate()?;
        let path = paths.repo_config_path();
        Self::write_config_atomic(&path, config)?;
        Ok(path)
    }

    /// Write global config atomically.
    pub fn write_global(config: &GlobalConfig) -> Result<PathBuf, ConfigError> {
        config.validate()?;
        let path = Self::global_config_path()?;
        Self::write_config_atomic(&path, config)?;
        Ok(path)
    }

    /// Write to a sibling temp file, fsync, then rename over the target.
    fn write_config_atomic<T: serde::Serialize>(
        path: &Path,
        config: &T,
    ) -> Result<(), ConfigError> {
        let write_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| ConfigError::WriteError { path, source }
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err(path))?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(write_err(&temp_path))?;
        file.write_all(contents.as_bytes())
            .map_err(write_err(&temp_path))?;
        file.sync_all().map_err(write_err(&temp_path))?;

        fs::rename(&temp_path, path).map_err(write_err(path))?;
        Ok(())
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Rebase settings with repo keys layered over global keys.
    pub fn rebase(&self) -> RebaseConfig {
        RebaseConfig::default()
            .overlay(self.global.rebase.as_ref())
            .overlay(self.repo.as_ref().and_then(|r| r.rebase.as_ref()))
    }

    /// Upstream to use when the caller names none.
    pub fn default_upstream(&self) -> Option<&str> {
        self.repo.as_ref().and_then(|r| r.upstream.as_deref())
    }

    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    pub fn repo_config_loaded_from(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }
}
