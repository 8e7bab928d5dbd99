//! Persistence tests for the verified-match cache.
//!
//! These tests verify that cached verdicts survive a restart, that flushes
//! append instead of overwrite, and that cached negatives keep the oracle idle.

use std::sync::atomic::{AtomicUsize, Ordering};

use idmatch::cache::{LookupMethod, MatchCache};
use idmatch::error::{CacheError, OracleError};
use idmatch::oracle::cached::{CachedOracle, SAVE_FREQ};
use idmatch::oracle::table::TableOracle;
use idmatch::oracle::{CancelToken, Oracle, OracleResult};

/// Oracle that counts calls and knows a single account.
#[derive(Default)]
struct CountingOracle {
    calls: AtomicUsize,
}

impl Oracle for CountingOracle {
    fn match_by_email(&self, cancel: &CancelToken, email: &str) -> OracleResult<String> {
        cancel.check()?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        match email {
            "a@x.com" => Ok("u1".into()),
            "broken@x.com" => Err(OracleError::Transient {
                message: "rate limited".into(),
            }),
            _ => Err(OracleError::NoMatch),
        }
    }
}

#[test]
fn entries_survive_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("matches.csv");

    // First session: record and flush.
    {
        let cache = MatchCache::open(&path).unwrap();
        for i in 0..50 {
            cache.record(&format!("dev{i}@x.com"), LookupMethod::ByIdentity, format!("dev{i}"), true);
        }
        cache.record("ghost@x.com", LookupMethod::ByProvenance, "", false);
        assert_eq!(cache.flush().unwrap(), 51);
    }

    // Second session: reopen and verify.
    {
        let cache = MatchCache::open(&path).unwrap();
        assert_eq!(cache.len(), 51);
        let hit = cache.lookup("dev7@x.com", LookupMethod::ByIdentity).unwrap();
        assert_eq!(hit.user, "dev7");
        assert!(hit.matched);
        assert!(cache.lookup("dev7@x.com", LookupMethod::ByProvenance).is_none());
        assert!(!cache.lookup("ghost@x.com", LookupMethod::ByProvenance).unwrap().matched);

        // Nothing new to write.
        assert_eq!(cache.flush().unwrap(), 0);
    }
}

#[test]
fn flush_keeps_records_it_does_not_know() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("matches.csv");

    let first = MatchCache::open(&path).unwrap();
    first.record("old@x.com", LookupMethod::ByIdentity, "old", true);
    first.flush().unwrap();

    // A second process that never saw old@x.com.
    let second = MatchCache::new(&path);
    second.record("new@x.com", LookupMethod::ByIdentity, "new", true);
    assert_eq!(second.flush().unwrap(), 1);

    let reloaded = MatchCache::open(&path).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.lookup("old@x.com", LookupMethod::ByIdentity).unwrap().user, "old");
}

#[test]
fn flush_output_is_sorted_and_stable() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("matches.csv");

    let cache = MatchCache::new(&path);
    cache.record("b@x.com", LookupMethod::ByProvenance, "bob", true);
    cache.record("b@x.com", LookupMethod::ByIdentity, "bob", true);
    cache.record("a@x.com", LookupMethod::ByIdentity, "", false);
    cache.flush().unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        content,
        "email,user,match,method\n\
         a@x.com,,0,by-identity\n\
         b@x.com,bob,1,by-identity\n\
         b@x.com,bob,1,by-provenance\n"
    );
}

#[test]
fn reordered_columns_and_legacy_tags_load() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("matches.csv");
    std::fs::write(
        &path,
        "method,match,user,email\nbyEmail,1,alice,a@x.com\nbyCommit,0,,b@x.com\n",
    )
    .unwrap();

    let cache = MatchCache::open(&path).unwrap();
    assert_eq!(cache.lookup("a@x.com", LookupMethod::ByIdentity).unwrap().user, "alice");
    assert!(!cache.lookup("b@x.com", LookupMethod::ByProvenance).unwrap().matched);
}

#[test]
fn flush_appends_in_the_existing_column_order() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("matches.csv");
    std::fs::write(&path, "method,match,user,email\nby-identity,1,alice,a@x.com\n").unwrap();

    let cache = MatchCache::open(&path).unwrap();
    cache.record("b@x.com", LookupMethod::ByIdentity, "bob", true);
    assert_eq!(cache.flush().unwrap(), 1);
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "method,match,user,email\n\
         by-identity,1,alice,a@x.com\n\
         by-identity,1,bob,b@x.com\n"
    );

    let reopened = MatchCache::open(&path).unwrap();
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened.lookup("a@x.com", LookupMethod::ByIdentity).unwrap().user, "alice");
    assert_eq!(reopened.lookup("b@x.com", LookupMethod::ByIdentity).unwrap().user, "bob");
    assert_eq!(reopened.flush().unwrap(), 0);
}

#[test]
fn malformed_file_is_rejected_on_open() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("matches.csv");
    std::fs::write(&path, "email,user,match,method\na@x.com,alice,1\n").unwrap();

    let err = MatchCache::open(&path).unwrap_err();
    assert!(matches!(err, CacheError::MalformedRecord { line: 2, .. }));
}

#[test]
fn cached_negative_never_reaches_the_oracle() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("matches.csv");
    std::fs::write(&path, "email,user,match,method\na@x.com,,0,by-identity\n").unwrap();

    let oracle = CachedOracle::new(CountingOracle::default(), &path).unwrap();
    let cancel = CancelToken::new();
    for _ in 0..3 {
        let err = oracle.match_by_email(&cancel, "a@x.com").unwrap_err();
        assert!(matches!(err, OracleError::NoMatch));
    }
    assert_eq!(oracle.inner().calls.load(Ordering::SeqCst), 0);
}

#[test]
fn oracle_answers_are_cached_and_persisted() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("matches.csv");
    let cancel = CancelToken::new();

    {
        let oracle = CachedOracle::new(CountingOracle::default(), &path).unwrap();
        assert_eq!(oracle.match_by_email(&cancel, "a@x.com").unwrap(), "u1");
        assert_eq!(oracle.match_by_email(&cancel, "a@x.com").unwrap(), "u1");
        assert!(oracle.match_by_email(&cancel, "nobody@x.com").is_err());
        assert!(oracle.match_by_email(&cancel, "broken@x.com").is_err());
        assert!(oracle.match_by_email(&cancel, "broken@x.com").is_err());

        // a@x.com and nobody@x.com once each, the transient failure twice.
        assert_eq!(oracle.inner().calls.load(Ordering::SeqCst), 4);
        assert_eq!(oracle.cache().len(), 2);
        oracle.on_idle().unwrap();
    }

    let reopened = CachedOracle::new(CountingOracle::default(), &path).unwrap();
    assert_eq!(reopened.match_by_email(&cancel, "a@x.com").unwrap(), "u1");
    assert!(matches!(
        reopened.match_by_email(&cancel, "nobody@x.com"),
        Err(OracleError::NoMatch)
    ));
    assert_eq!(reopened.inner().calls.load(Ordering::SeqCst), 0);
}

#[test]
fn batch_flush_reaches_disk_without_idle() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("matches.csv");
    let cancel = CancelToken::new();

    let oracle = CachedOracle::new(CountingOracle::default(), &path).unwrap();
    for i in 0..SAVE_FREQ {
        let _ = oracle.match_by_email(&cancel, &format!("dev{i}@x.com"));
    }

    let on_disk = MatchCache::open(&path).unwrap();
    assert_eq!(on_disk.len(), SAVE_FREQ);
}

#[test]
fn missing_file_is_created_on_open() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("matches.csv");

    let oracle = CachedOracle::new(TableOracle::new(), &path).unwrap();
    assert!(oracle.cache().is_empty());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "email,user,match,method\n");
}

#[test]
fn empty_path_is_rejected() {
    assert!(matches!(
        CachedOracle::new(TableOracle::new(), "").unwrap_err(),
        CacheError::EmptyPath
    ));
}

#[test]
fn compact_drops_duplicate_records() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("matches.csv");
    std::fs::write(
        &path,
        "email,user,match,method\n\
         a@x.com,,0,by-identity\n\
         a@x.com,alice,1,by-identity\n",
    )
    .unwrap();

    let cache = MatchCache::new(&path);
    assert_eq!(cache.compact().unwrap(), 1);
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "email,user,match,method\na@x.com,alice,1,by-identity\n"
    );
}
