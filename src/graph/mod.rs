//! Identity graph: people as nodes, "same human" evidence as edges.
//!
//! - [`index::IdentityGraph`] — petgraph-backed graph with external id propagation
//! - [`traverse`] — depth-first component walks
//! - [`analytics`] — connected components and size statistics

pub mod analytics;
pub mod index;
pub mod traverse;

pub use analytics::{ComponentStats, component_size_stats};
pub use index::{GraphResult, IdentityGraph};
