//! Reduction configuration, persisted as TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::blacklist::Blacklist;
use crate::error::ConfigError;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Tunables of a reduction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdMatchConfig {
    /// Maximum distinct emails plus names a heuristic merge may produce.
    #[serde(default = "default_max_identities")]
    pub max_identities: usize,
    /// Recent commits needed before recent activity decides primary values.
    #[serde(default = "default_min_recent_count")]
    pub min_recent_count: u64,
    /// Backing file of the verified-match cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,
    /// Extra emails never used for heuristic matching.
    #[serde(default)]
    pub popular_emails: Vec<String>,
    /// Extra names never used for heuristic matching.
    #[serde(default)]
    pub popular_names: Vec<String>,
    /// Include the built-in list of bot and placeholder emails.
    #[serde(default = "default_builtin_blacklist")]
    pub builtin_blacklist: bool,
}

fn default_max_identities() -> usize {
    20
}
fn default_min_recent_count() -> u64 {
    5
}
fn default_builtin_blacklist() -> bool {
    true
}

impl Default for IdMatchConfig {
    fn default() -> Self {
        Self {
            max_identities: default_max_identities(),
            min_recent_count: default_min_recent_count(),
            cache_path: None,
            popular_emails: Vec::new(),
            popular_names: Vec::new(),
            builtin_blacklist: default_builtin_blacklist(),
        }
    }
}

impl IdMatchConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Blacklist described by this config.
    pub fn blacklist(&self) -> Blacklist {
        let mut blacklist = if self.builtin_blacklist {
            Blacklist::builtin()
        } else {
            Blacklist::new()
        };
        blacklist.extend_emails(&self.popular_emails);
        blacklist.extend_names(&self.popular_names);
        blacklist
    }
}
