//! Disk-persisted memo table for external oracle lookups.
//!
//! [`MatchCache`] maps `(identity, method)` keys to the oracle's verdict and
//! keeps that table in a CSV file. Flushing never rewrites what is already on
//! disk: it appends only records that are new or changed, so the file is an
//! append-only log where the last record for a key wins on reload.
//!
//! The whole table is guarded by one `RwLock`; file access is serialized by a
//! separate mutex so concurrent flushes never interleave their writes.

pub mod csv;

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use crate::error::CacheError;

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

const CSV_TRUE: &str = "1";
const CSV_FALSE: &str = "0";

const COLUMN_EMAIL: &str = "email";
const COLUMN_USER: &str = "user";
const COLUMN_MATCH: &str = "match";
const COLUMN_METHOD: &str = "method";
const HEADER: [&str; 4] = [COLUMN_EMAIL, COLUMN_USER, COLUMN_MATCH, COLUMN_METHOD];

/// How an identity was looked up in the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LookupMethod {
    /// By the identity string itself (an email).
    ByIdentity,
    /// By a commit the identity authored.
    ByProvenance,
}

impl LookupMethod {
    /// Tag written to the cache file.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ByIdentity => "by-identity",
            Self::ByProvenance => "by-provenance",
        }
    }

    /// Parse a cache file tag. The legacy `byEmail`/`byCommit` tags are accepted.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "by-identity" | "byEmail" => Some(Self::ByIdentity),
            "by-provenance" | "byCommit" => Some(Self::ByProvenance),
            _ => None,
        }
    }
}

impl std::fmt::Display for LookupMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache key: sorted by identity, then by method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub identity: String,
    pub method: LookupMethod,
}

impl CacheKey {
    pub fn new(identity: impl Into<String>, method: LookupMethod) -> Self {
        Self {
            identity: identity.into(),
            method,
        }
    }
}

/// A cached oracle verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedMatch {
    /// Resolved account; empty for negative results.
    pub user: String,
    /// `false` if the oracle confirmed there is no match.
    pub matched: bool,
}

/// Concurrency-safe match cache backed by a CSV file.
pub struct MatchCache {
    path: PathBuf,
    entries: RwLock<HashMap<CacheKey, CachedMatch>>,
    io_lock: Mutex<()>,
}

impl MatchCache {
    /// Create an empty in-memory cache bound to `path` without touching the file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: RwLock::new(HashMap::new()),
            io_lock: Mutex::new(()),
        }
    }

    /// Open the cache at `path`.
    ///
    /// An existing file is loaded and must be well-formed. A missing file is
    /// created by flushing the empty cache once, which proves write access.
    pub fn open(path: impl Into<PathBuf>) -> CacheResult<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(CacheError::EmptyPath);
        }
        tracing::info!(path = %path.display(), "caching the external identities");
        let cache = Self::new(path);
        if cache.path.exists() {
            cache.load()?;
        } else {
            cache.flush()?;
        }
        Ok(cache)
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a cached verdict.
    pub fn lookup(&self, identity: &str, method: LookupMethod) -> Option<CachedMatch> {
        let entries = self.entries.read().expect("match cache lock poisoned");
        entries.get(&CacheKey::new(identity, method)).cloned()
    }

    /// Insert or overwrite a verdict. Returns the entry count after the write.
    ///
    /// Performs no I/O.
    pub fn record(
        &self,
        identity: &str,
        method: LookupMethod,
        user: impl Into<String>,
        matched: bool,
    ) -> usize {
        let mut entries = self.entries.write().expect("match cache lock poisoned");
        entries.insert(
            CacheKey::new(identity, method),
            CachedMatch {
                user: user.into(),
                matched,
            },
        );
        entries.len()
    }

    /// Number of cached verdicts.
    pub fn len(&self) -> usize {
        self.entries.read().expect("match cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries sorted by identity, then method.
    pub fn snapshot(&self) -> Vec<(CacheKey, CachedMatch)> {
        let entries = self.entries.read().expect("match cache lock poisoned");
        let mut seq: Vec<(CacheKey, CachedMatch)> = entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        drop(entries);
        seq.sort_by(|a, b| a.0.cmp(&b.0));
        seq
    }

    /// Read the backing file into memory, overwriting entries with the same key.
    ///
    /// Returns the number of distinct keys read from the file.
    pub fn load(&self) -> CacheResult<usize> {
        let _io = self.io_lock.lock().expect("match cache io lock poisoned");
        let content = std::fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        let table = parse_table(&self.path, &content)?.entries;
        let loaded = table.len();
        self.entries
            .write()
            .expect("match cache lock poisoned")
            .extend(table);
        tracing::info!(path = %self.path.display(), loaded, "loaded the external identities cache");
        Ok(loaded)
    }

    /// Append new or changed entries to the backing file.
    ///
    /// Whatever the file already holds is read first; entries identical to the
    /// on-disk state are skipped. A missing or empty file is created with a
    /// header row. Records are written sorted by identity, then method.
    /// Returns the number of records written.
    pub fn flush(&self) -> CacheResult<usize> {
        let _io = self.io_lock.lock().expect("match cache io lock poisoned");
        tracing::info!(path = %self.path.display(), "writing the external identities cache");

        let (existing, file_columns, needs_newline) = match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let table = parse_table(&self.path, &content)?;
                let needs_newline = !content.is_empty() && !content.ends_with('\n');
                (table.entries, table.columns, needs_newline)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (HashMap::new(), None, false),
            Err(e) => return Err(self.io_error(e)),
        };

        let mut out = String::new();
        let mut options = OpenOptions::new();
        // Appended rows follow the existing header, whatever its column order.
        let columns = match file_columns {
            Some(columns) if !existing.is_empty() => columns,
            _ => Columns::CANONICAL,
        };
        if existing.is_empty() {
            options.write(true).create(true).truncate(true);
            out.push_str(&csv::encode_record(&HEADER));
        } else {
            tracing::info!(existing = existing.len(), "appending to existing records");
            options.append(true);
            if needs_newline {
                out.push('\n');
            }
        }

        let mut written = 0;
        for (key, value) in self.snapshot() {
            if existing.get(&key) == Some(&value) {
                continue;
            }
            out.push_str(&encode_entry(&key, &value, columns));
            written += 1;
        }

        let mut file = options.open(&self.path).map_err(|e| self.io_error(e))?;
        file.write_all(out.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| self.io_error(e))?;
        tracing::info!(written, "written new records");
        Ok(written)
    }

    /// Rewrite the backing file with exactly one record per key.
    ///
    /// The file is loaded first so records missing from memory survive.
    /// Returns the number of records in the rewritten file.
    pub fn compact(&self) -> CacheResult<usize> {
        if self.path.exists() {
            self.load()?;
        }
        let _io = self.io_lock.lock().expect("match cache io lock poisoned");
        let entries = self.snapshot();
        let mut out = csv::encode_record(&HEADER);
        for (key, value) in &entries {
            out.push_str(&encode_entry(key, value, Columns::CANONICAL));
        }
        std::fs::write(&self.path, out).map_err(|e| self.io_error(e))?;
        tracing::info!(path = %self.path.display(), records = entries.len(), "compacted the external identities cache");
        Ok(entries.len())
    }

    fn io_error(&self, source: std::io::Error) -> CacheError {
        CacheError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl std::fmt::Debug for MatchCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchCache")
            .field("path", &self.path)
            .field("entries", &self.len())
            .finish()
    }
}

/// Position of each named column in a cache file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    email: usize,
    user: usize,
    matched: usize,
    method: usize,
}

impl Columns {
    /// The layout of [`HEADER`], used for every file this cache creates.
    const CANONICAL: Columns = Columns {
        email: 0,
        user: 1,
        matched: 2,
        method: 3,
    };
}

fn encode_entry(key: &CacheKey, value: &CachedMatch, columns: Columns) -> String {
    let mut fields = [""; 4];
    fields[columns.email] = &key.identity;
    fields[columns.user] = &value.user;
    fields[columns.matched] = if value.matched { CSV_TRUE } else { CSV_FALSE };
    fields[columns.method] = key.method.as_str();
    csv::encode_record(&fields)
}

/// Cache file content: the header's column layout (absent for an empty
/// file) and the records.
struct ParsedTable {
    columns: Option<Columns>,
    entries: HashMap<CacheKey, CachedMatch>,
}

/// Parse cache file content. Columns may come in any order; later rows for
/// the same key replace earlier ones.
fn parse_table(path: &Path, content: &str) -> CacheResult<ParsedTable> {
    let path_str = || path.display().to_string();
    let records = csv::parse_records(content).map_err(|e| CacheError::MalformedRecord {
        path: path_str(),
        line: e.line,
        record: "unterminated quoted field".into(),
    })?;

    let mut table = HashMap::new();
    let mut rows = records.into_iter();
    let Some(header) = rows.next() else {
        return Ok(ParsedTable {
            columns: None,
            entries: table,
        });
    };
    if header.fields.len() != HEADER.len() {
        return Err(CacheError::MalformedHeader {
            path: path_str(),
            columns: header.fields.len(),
        });
    }
    let column = |name: &str| {
        header
            .fields
            .iter()
            .position(|f| f == name)
            .ok_or_else(|| CacheError::MissingColumn {
                path: path_str(),
                column: name.to_string(),
            })
    };
    let columns = Columns {
        email: column(COLUMN_EMAIL)?,
        user: column(COLUMN_USER)?,
        matched: column(COLUMN_MATCH)?,
        method: column(COLUMN_METHOD)?,
    };
    let Columns {
        email,
        user,
        matched,
        method,
    } = columns;

    for row in rows {
        if row.fields.len() != header.fields.len() {
            return Err(CacheError::MalformedRecord {
                path: path_str(),
                line: row.line,
                record: row.fields.join(","),
            });
        }
        let tag = &row.fields[method];
        let lookup_method = LookupMethod::parse(tag).ok_or_else(|| CacheError::UnknownMethod {
            path: path_str(),
            line: row.line,
            method: tag.clone(),
        })?;
        table.insert(
            CacheKey::new(row.fields[email].clone(), lookup_method),
            CachedMatch {
                user: row.fields[user].clone(),
                matched: row.fields[matched] == CSV_TRUE,
            },
        );
    }
    Ok(ParsedTable {
        columns: Some(columns),
        entries: table,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache_in(dir: &TempDir) -> MatchCache {
        MatchCache::new(dir.path().join("cache.csv"))
    }

    #[test]
    fn record_and_lookup() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        assert!(cache.lookup("a@x.com", LookupMethod::ByIdentity).is_none());
        assert_eq!(cache.record("a@x.com", LookupMethod::ByIdentity, "alice", true), 1);
        assert_eq!(cache.record("a@x.com", LookupMethod::ByProvenance, "", false), 2);

        let hit = cache.lookup("a@x.com", LookupMethod::ByIdentity).unwrap();
        assert_eq!(hit.user, "alice");
        assert!(hit.matched);
        assert!(!cache.lookup("a@x.com", LookupMethod::ByProvenance).unwrap().matched);
    }

    #[test]
    fn flush_writes_sorted_records_with_header() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        cache.record("b@x.com", LookupMethod::ByIdentity, "bob", true);
        cache.record("a@x.com", LookupMethod::ByProvenance, "alice", true);
        cache.record("a@x.com", LookupMethod::ByIdentity, "", false);

        assert_eq!(cache.flush().unwrap(), 3);
        let content = std::fs::read_to_string(cache.path()).unwrap();
        assert_eq!(
            content,
            "email,user,match,method\n\
             a@x.com,,0,by-identity\n\
             a@x.com,alice,1,by-provenance\n\
             b@x.com,bob,1,by-identity\n"
        );
    }

    #[test]
    fn second_flush_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        cache.record("a@x.com", LookupMethod::ByIdentity, "alice", true);
        assert_eq!(cache.flush().unwrap(), 1);
        assert_eq!(cache.flush().unwrap(), 0);
    }

    #[test]
    fn flush_appends_changed_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.csv");
        std::fs::write(
            &path,
            "email,user,match,method\n\
             mcuadros@gmail.com,mcuadros,1,by-identity\n\
             mcuadros-clone@gmail.com,,0,by-identity\n",
        )
        .unwrap();
        let cache = MatchCache::new(&path);
        cache.record("mcuadros@gmail.com", LookupMethod::ByIdentity, "mcuadros", true);
        cache.record("mcuadros-clone@gmail.com", LookupMethod::ByIdentity, "mcuadros", true);
        cache.record("vadim@sourced.tech", LookupMethod::ByIdentity, "vmarkovtsev", true);

        assert_eq!(cache.flush().unwrap(), 2);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "email,user,match,method\n\
             mcuadros@gmail.com,mcuadros,1,by-identity\n\
             mcuadros-clone@gmail.com,,0,by-identity\n\
             mcuadros-clone@gmail.com,mcuadros,1,by-identity\n\
             vadim@sourced.tech,vmarkovtsev,1,by-identity\n"
        );

        // The appended record supersedes the older one on reload.
        let reloaded = MatchCache::new(&path);
        assert_eq!(reloaded.load().unwrap(), 3);
        let hit = reloaded
            .lookup("mcuadros-clone@gmail.com", LookupMethod::ByIdentity)
            .unwrap();
        assert!(hit.matched);
        assert_eq!(hit.user, "mcuadros");
    }

    #[test]
    fn flush_terminates_unfinished_last_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.csv");
        std::fs::write(&path, "email,user,match,method\na@x.com,alice,1,by-identity").unwrap();
        let cache = MatchCache::new(&path);
        cache.record("b@x.com", LookupMethod::ByIdentity, "bob", true);
        assert_eq!(cache.flush().unwrap(), 1);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.ends_with("a@x.com,alice,1,by-identity\nb@x.com,bob,1,by-identity\n"));
    }

    #[test]
    fn load_accepts_reordered_columns_and_legacy_tags() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.csv");
        std::fs::write(
            &path,
            "method,match,user,email\nbyCommit,1,alice,a@x.com\nbyEmail,0,,b@x.com\n",
        )
        .unwrap();
        let cache = MatchCache::new(&path);
        assert_eq!(cache.load().unwrap(), 2);
        assert_eq!(
            cache.lookup("a@x.com", LookupMethod::ByProvenance).unwrap().user,
            "alice"
        );
        assert!(!cache.lookup("b@x.com", LookupMethod::ByIdentity).unwrap().matched);
    }

    #[test]
    fn load_rejects_wrong_header_width() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.csv");
        std::fs::write(&path, "email,user,match\n").unwrap();
        let err = MatchCache::new(&path).load().unwrap_err();
        assert!(matches!(err, CacheError::MalformedHeader { columns: 3, .. }));
    }

    #[test]
    fn load_rejects_short_row() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.csv");
        std::fs::write(&path, "email,user,match,method\na@x.com,alice,1\n").unwrap();
        let err = MatchCache::new(&path).load().unwrap_err();
        assert!(matches!(err, CacheError::MalformedRecord { line: 2, .. }));
    }

    #[test]
    fn load_rejects_unknown_method() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.csv");
        std::fs::write(&path, "email,user,match,method\na@x.com,alice,1,byPigeon\n").unwrap();
        let err = MatchCache::new(&path).load().unwrap_err();
        assert!(matches!(err, CacheError::UnknownMethod { .. }));
    }

    #[test]
    fn load_rejects_renamed_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.csv");
        std::fs::write(&path, "email,user,name,match\n").unwrap();
        let err = MatchCache::new(&path).load().unwrap_err();
        assert!(matches!(err, CacheError::MissingColumn { ref column, .. } if column == "method"));
    }

    #[test]
    fn open_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh.csv");
        let cache = MatchCache::open(&path).unwrap();
        assert!(cache.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "email,user,match,method\n");
    }

    #[test]
    fn open_rejects_empty_path() {
        assert!(matches!(MatchCache::open(""), Err(CacheError::EmptyPath)));
    }

    #[test]
    fn compact_keeps_one_record_per_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.csv");
        std::fs::write(
            &path,
            "email,user,match,method\n\
             a@x.com,,0,by-identity\n\
             a@x.com,alice,1,by-identity\n\
             b@x.com,bob,1,by-identity\n",
        )
        .unwrap();
        let cache = MatchCache::new(&path);
        assert_eq!(cache.compact().unwrap(), 2);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "email,user,match,method\na@x.com,alice,1,by-identity\nb@x.com,bob,1,by-identity\n"
        );
    }

    #[test]
    fn concurrent_record_and_flush() {
        let dir = TempDir::new().unwrap();
        let cache = std::sync::Arc::new(cache_in(&dir));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        cache.record(&format!("{t}-{i}@x.com"), LookupMethod::ByIdentity, "u", true);
                        if i % 10 == 0 {
                            cache.flush().unwrap();
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        cache.flush().unwrap();

        let reloaded = MatchCache::new(cache.path());
        assert_eq!(reloaded.load().unwrap(), 200);
    }
}
