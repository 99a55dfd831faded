//! User configuration.
//!
//! Read from `$PMFS_CONFIG` or `<config dir>/pmfs/config.yaml`. A missing file
//! yields defaults. `PMFS_BASEDIR` overrides `base_dir`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{PmfsError, Result};

pub const CONFIG_ENV: &str = "PMFS_CONFIG";
pub const BASEDIR_ENV: &str = "PMFS_BASEDIR";
const DEFAULT_BASE_DIR: &str = "database";
const DEFAULT_NOTIFY_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the store; holds `products/`.
    pub base_dir: PathBuf,
    pub ai: AiConfig,
    pub dedup: DedupConfig,
    pub notify: NotifyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            ai: AiConfig::default(),
            dedup: DedupConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

/// Model command. No `program` disables model-backed features.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub program: Option<PathBuf>,
    /// Arguments placed before the prompt.
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Ask the model for equivalence instead of comparing text.
    pub use_oracle: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Per-subscriber channel bound.
    pub capacity: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_NOTIFY_CAPACITY,
        }
    }
}

impl Config {
    /// Reads `path`; a missing file gives defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| PmfsError::io("read", path, e))?;
        serde_yaml::from_str(&content)
            .map_err(|e| PmfsError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Loads from the standard location and applies environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match config_path() {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        config.apply_base_dir_override(std::env::var(BASEDIR_ENV).ok());
        Ok(config)
    }

    /// Replaces `base_dir` when `value` is set and non-empty.
    pub fn apply_base_dir_override(&mut self, value: Option<String>) {
        if let Some(dir) = value.filter(|d| !d.trim().is_empty()) {
            self.base_dir = PathBuf::from(dir);
        }
    }
}

/// `$PMFS_CONFIG`, else `<config dir>/pmfs/config.yaml`.
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("pmfs").join("config.yaml"))
}
