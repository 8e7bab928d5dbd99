//! In-memory oracle backed by known email and commit assignments.
//!
//! Useful offline: a JSON file of already verified accounts stands in for the
//! network service.
//!
//! ```json
//! {
//!   "emails": { "alice@example.com": "alice" },
//!   "commits": { "org/repo": { "3f2a9c1": "alice" } }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{CancelToken, Oracle, OracleResult};
use crate::error::{ConfigError, OracleError};

/// Oracle answering from fixed email → account and commit → account tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableOracle {
    #[serde(default)]
    emails: HashMap<String, String>,
    /// repo → commit hash → account
    #[serde(default)]
    commits: HashMap<String, HashMap<String, String>>,
}

impl TableOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an email assignment.
    pub fn with_email(mut self, email: impl Into<String>, user: impl Into<String>) -> Self {
        self.emails.insert(email.into(), user.into());
        self
    }

    /// Add a commit assignment.
    pub fn with_commit(
        mut self,
        repo: impl Into<String>,
        hash: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        self.commits
            .entry(repo.into())
            .or_default()
            .insert(hash.into(), user.into());
        self
    }

    /// Load assignments from JSON.
    pub fn load_json(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

impl Oracle for TableOracle {
    fn supports_matching_by_commit(&self) -> bool {
        !self.commits.is_empty()
    }

    fn match_by_email(&self, cancel: &CancelToken, email: &str) -> OracleResult<String> {
        cancel.check()?;
        self.emails.get(email).cloned().ok_or(OracleError::NoMatch)
    }

    fn match_by_commit(
        &self,
        cancel: &CancelToken,
        _email: &str,
        repo: &str,
        commit: &str,
    ) -> OracleResult<String> {
        cancel.check()?;
        self.commits
            .get(repo)
            .and_then(|hashes| hashes.get(commit))
            .cloned()
            .ok_or(OracleError::NoMatch)
    }
}
