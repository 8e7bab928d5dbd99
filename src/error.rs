//! Rich diagnostic error types for identity matching.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the idmatch crate.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum IdMatchError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Reduce(#[from] ReduceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    People(#[from] PeopleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Cache errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CacheError {
    #[error("I/O error on match cache {path}: {source}")]
    #[diagnostic(
        code(idmatch::cache::io),
        help(
            "A filesystem operation on the cache file failed. Check that the \
             directory exists, has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid cache file {path}: header has {columns} columns, expected 4")]
    #[diagnostic(
        code(idmatch::cache::malformed_header),
        help("The first row must name exactly four columns: email, user, match, method.")
    )]
    MalformedHeader { path: String, columns: usize },

    #[error("invalid cache file {path}: column \"{column}\" is missing from the header")]
    #[diagnostic(
        code(idmatch::cache::missing_column),
        help("The header must contain the columns email, user, match and method in any order.")
    )]
    MissingColumn { path: String, column: String },

    #[error("invalid cache record at {path}:{line}: {record}")]
    #[diagnostic(
        code(idmatch::cache::malformed_record),
        help(
            "Every data row must have the same number of columns as the header. \
             Fix or delete the offending row, or remove the cache file to start over."
        )
    )]
    MalformedRecord {
        path: String,
        line: usize,
        record: String,
    },

    #[error("unknown lookup method \"{method}\" at {path}:{line}")]
    #[diagnostic(
        code(idmatch::cache::unknown_method),
        help("Valid methods are \"by-identity\" and \"by-provenance\".")
    )]
    UnknownMethod {
        path: String,
        line: usize,
        method: String,
    },

    #[error("cache path must not be empty")]
    #[diagnostic(
        code(idmatch::cache::empty_path),
        help("Pass the path of the CSV file that should hold the match cache.")
    )]
    EmptyPath,
}

// ---------------------------------------------------------------------------
// Oracle errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum OracleError {
    #[error("no matches")]
    #[diagnostic(
        code(idmatch::oracle::no_match),
        help("The identity is unknown to the external oracle. This is an expected outcome.")
    )]
    NoMatch,

    #[error("lookup cancelled")]
    #[diagnostic(
        code(idmatch::oracle::cancelled),
        help("The resolution pass was cancelled by the caller.")
    )]
    Cancelled,

    #[error("oracle failure: {message}")]
    #[diagnostic(
        code(idmatch::oracle::transient),
        help(
            "The external oracle failed for a reason other than a missing match. \
             The result was not cached; rerun later to retry the lookup."
        )
    )]
    Transient { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] CacheError),
}

// ---------------------------------------------------------------------------
// People errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PeopleError {
    #[error("person {id} does not exist")]
    #[diagnostic(
        code(idmatch::people::unknown),
        help("The id was never loaded or was already absorbed by an earlier merge.")
    )]
    UnknownPerson { id: u64 },

    #[error("cannot merge people with different external ids: {first} {second}")]
    #[diagnostic(
        code(idmatch::people::conflicting_ids),
        help("All merged people must share the same external id or have none.")
    )]
    ConflictingExternalIds { first: String, second: String },

    #[error("merge requires at least one person")]
    #[diagnostic(code(idmatch::people::empty_merge))]
    EmptyMerge,

    #[error("failed to access {path}")]
    #[diagnostic(
        code(idmatch::people::io),
        help("Check that the file exists and that you have read/write permissions.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {message}")]
    #[diagnostic(
        code(idmatch::people::json),
        help("The file must be valid JSON in the documented layout.")
    )]
    Json { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Reduction errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ReduceError {
    #[error("person {person} has emails with different external ids: {first} {second}")]
    #[diagnostic(
        code(idmatch::reduce::conflicting_ids),
        help(
            "The oracle resolved two emails of the same identity to different accounts. \
             Inspect the identity and the match cache entries for its emails."
        )
    )]
    ConflictingExternalIds {
        person: String,
        first: String,
        second: String,
    },

    #[error("cannot set edge between nodes with different external ids: {first} {second}")]
    #[diagnostic(
        code(idmatch::reduce::edge_conflict),
        help("Two identities with different verified accounts must never be merged.")
    )]
    EdgeConflict { first: String, second: String },

    #[error("cannot set edge between components with different external ids: |{expected}| |{found}|")]
    #[diagnostic(
        code(idmatch::reduce::component_conflict),
        help(
            "Propagating a verified account through a component reached a member \
             verified as a different account. The input holds contradictory evidence."
        )
    )]
    ComponentConflict { expected: String, found: String },

    #[error("frequency table does not contain {value}")]
    #[diagnostic(
        code(idmatch::reduce::missing_frequency),
        help("Every name and email of every person must appear in the frequency tables.")
    )]
    MissingFrequency { value: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    People(#[from] PeopleError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(idmatch::config::read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(idmatch::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(idmatch::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias for functions returning idmatch results.
pub type IdMatchResult<T> = std::result::Result<T, IdMatchError>;
