// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # idmatch
//!
//! Identity resolution for commit authors: decides which (email, name)
//! identities belong to the same human and merges them.
//!
//! ## Architecture
//!
//! - **Identity graph** (`graph`): petgraph graph over people with external id propagation
//! - **Reduction** (`reduce`): oracle, email and name edges, then component merges
//! - **Oracles** (`oracle`): verified account lookups, fronted by a disk-persisted cache
//! - **Match cache** (`cache`): delimited-text backing store with append-only flushes
//! - **Primary values** (`primary`): frequency-driven primary name and email
//!
//! ## Library usage
//!
//! ```no_run
//! use idmatch::blacklist::Blacklist;
//! use idmatch::oracle::CancelToken;
//! use idmatch::person::{People, Person};
//! use idmatch::reduce::reduce_people;
//!
//! let mut people: People = vec![
//!     Person::new(["a@x.com"], ["Alice"]),
//!     Person::new(["a@x.com", "alice@y.com"], ["A. Liddell"]),
//! ]
//! .into_iter()
//! .collect();
//! let report = reduce_people(&mut people, None, &Blacklist::builtin(), 20, &CancelToken::new()).unwrap();
//! assert_eq!(report.people_after_reduce, 1);
//! ```

pub mod blacklist;
pub mod cache;
pub mod config;
pub mod error;
pub mod graph;
pub mod oracle;
pub mod person;
pub mod primary;
pub mod reduce;
