//! Graph analytics: connected components and their size statistics.

use petgraph::algo::tarjan_scc;
use petgraph::graph::UnGraph;
use serde::Serialize;

use crate::person::PersonId;

/// Connected components. Members are sorted ascending and components are
/// ordered by their smallest member.
pub fn connected_components(graph: &UnGraph<PersonId, ()>) -> Vec<Vec<PersonId>> {
    // On an undirected graph every strongly connected component is a connected one.
    let mut components: Vec<Vec<PersonId>> = tarjan_scc(graph)
        .into_iter()
        .map(|indices| {
            let mut members: Vec<PersonId> = indices
                .iter()
                .filter_map(|idx| graph.node_weight(*idx).copied())
                .collect();
            members.sort_unstable();
            members
        })
        .filter(|members| !members.is_empty())
        .collect();
    components.sort_by_key(|members| members[0]);
    components
}

/// Size summary of a set of components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ComponentStats {
    pub mean: f64,
    /// Sample standard deviation.
    pub std: f64,
    pub max: usize,
}

/// Mean, sample standard deviation and maximum of `sizes`.
///
/// Undefined values (no components, or a single one for the deviation) are 0.
pub fn component_size_stats(sizes: &[usize]) -> ComponentStats {
    let n = sizes.len() as f64;
    let mean = sizes.iter().sum::<usize>() as f64 / n;
    let variance = sizes
        .iter()
        .map(|&s| (s as f64 - mean).powi(2))
        .sum::<f64>()
        / (n - 1.0);
    let std = variance.sqrt();
    ComponentStats {
        mean: if mean.is_nan() { 0.0 } else { mean },
        std: if std.is_nan() || std.is_infinite() { 0.0 } else { std },
        max: sizes.iter().copied().max().unwrap_or(0),
    }
}
