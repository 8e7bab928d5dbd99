//! External identity oracle: resolves emails (or commits) to verified accounts.
//!
//! The network-backed implementations live outside this crate; what lives here
//! is the [`Oracle`] seam, the cache-fronted wrapper [`cached::CachedOracle`],
//! and the in-memory [`table::TableOracle`].

pub mod cached;
pub mod table;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::OracleError;

/// Result type for oracle lookups.
pub type OracleResult<T> = std::result::Result<T, OracleError>;

/// Cooperative cancellation flag shared between a caller and running lookups.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every lookup holding a clone of this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(OracleError::Cancelled)` once cancellation was requested.
    pub fn check(&self) -> OracleResult<()> {
        if self.is_cancelled() {
            Err(OracleError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// An authority that maps identities to verified accounts.
///
/// Lookups return `Err(OracleError::NoMatch)` when the oracle is certain the
/// identity has no account; any other error is treated as transient.
pub trait Oracle: Send + Sync {
    /// Whether [`Oracle::match_by_commit`] is available.
    fn supports_matching_by_commit(&self) -> bool {
        false
    }

    /// Resolve an email.
    fn match_by_email(&self, cancel: &CancelToken, email: &str) -> OracleResult<String>;

    /// Resolve the author `email` of `commit` in `repo`.
    fn match_by_commit(
        &self,
        _cancel: &CancelToken,
        _email: &str,
        _repo: &str,
        _commit: &str,
    ) -> OracleResult<String> {
        Err(OracleError::Transient {
            message: "matching by commit is not supported".into(),
        })
    }

    /// Called once after a resolution pass.
    fn on_idle(&self) -> OracleResult<()> {
        Ok(())
    }
}

impl<O: Oracle + ?Sized> Oracle for Box<O> {
    fn supports_matching_by_commit(&self) -> bool {
        (**self).supports_matching_by_commit()
    }

    fn match_by_email(&self, cancel: &CancelToken, email: &str) -> OracleResult<String> {
        (**self).match_by_email(cancel, email)
    }

    fn match_by_commit(
        &self,
        cancel: &CancelToken,
        email: &str,
        repo: &str,
        commit: &str,
    ) -> OracleResult<String> {
        (**self).match_by_commit(cancel, email, repo, commit)
    }

    fn on_idle(&self) -> OracleResult<()> {
        (**self).on_idle()
    }
}
