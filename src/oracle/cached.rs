//! Oracle wrapper that memoizes verdicts in a [`MatchCache`].
//!
//! Hits never reach the wrapped oracle. Definitive answers (a match or a
//! confirmed no-match) are recorded; transient failures are not. The cache is
//! flushed to disk every [`SAVE_FREQ`] entries and on [`Oracle::on_idle`].

use std::path::PathBuf;

use super::{CancelToken, Oracle, OracleResult};
use crate::cache::{CacheResult, LookupMethod, MatchCache};
use crate::error::OracleError;

/// Flush the cache to disk each time the entry count is a multiple of this.
pub const SAVE_FREQ: usize = 20;

/// An [`Oracle`] fronted by a persistent [`MatchCache`].
pub struct CachedOracle<O> {
    oracle: O,
    cache: MatchCache,
}

impl<O: Oracle> CachedOracle<O> {
    /// Wrap `oracle` with the cache stored at `cache_path`.
    ///
    /// See [`MatchCache::open`] for how an existing or missing file is handled.
    pub fn new(oracle: O, cache_path: impl Into<PathBuf>) -> CacheResult<Self> {
        Ok(Self::with_cache(oracle, MatchCache::open(cache_path)?))
    }

    /// Wrap `oracle` with an already constructed cache.
    pub fn with_cache(oracle: O, cache: MatchCache) -> Self {
        Self { oracle, cache }
    }

    pub fn cache(&self) -> &MatchCache {
        &self.cache
    }

    pub fn inner(&self) -> &O {
        &self.oracle
    }

    fn cached_or_fetch<F>(&self, identity: &str, method: LookupMethod, fetch: F) -> OracleResult<String>
    where
        F: FnOnce() -> OracleResult<String>,
    {
        if let Some(hit) = self.cache.lookup(identity, method) {
            return if hit.matched {
                Ok(hit.user)
            } else {
                Err(OracleError::NoMatch)
            };
        }

        let result = fetch();
        let entries = match &result {
            Ok(user) => Some(self.cache.record(identity, method, user.clone(), true)),
            Err(OracleError::NoMatch) => Some(self.cache.record(identity, method, "", false)),
            Err(_) => None,
        };
        if let Some(entries) = entries {
            if entries % SAVE_FREQ == 0 {
                self.cache.flush()?;
            }
        }
        result
    }
}

impl<O: Oracle> Oracle for CachedOracle<O> {
    fn supports_matching_by_commit(&self) -> bool {
        self.oracle.supports_matching_by_commit()
    }

    fn match_by_email(&self, cancel: &CancelToken, email: &str) -> OracleResult<String> {
        self.cached_or_fetch(email, LookupMethod::ByIdentity, || {
            self.oracle.match_by_email(cancel, email)
        })
    }

    fn match_by_commit(
        &self,
        cancel: &CancelToken,
        email: &str,
        repo: &str,
        commit: &str,
    ) -> OracleResult<String> {
        self.cached_or_fetch(email, LookupMethod::ByProvenance, || {
            self.oracle.match_by_commit(cancel, email, repo, commit)
        })
    }

    /// Flush the cache regardless of the batch counter, then notify the wrapped oracle.
    fn on_idle(&self) -> OracleResult<()> {
        self.cache.flush()?;
        self.oracle.on_idle()
    }
}

impl<O> std::fmt::Debug for CachedOracle<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedOracle").field("cache", &self.cache).finish()
    }
}
