//! Depth-first walks over the identity graph.

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Dfs;

use crate::person::PersonId;

/// Every person reachable from `start`, `start` included, in visit order.
pub fn component_of(graph: &UnGraph<PersonId, ()>, start: NodeIndex) -> Vec<PersonId> {
    let mut dfs = Dfs::new(graph, start);
    let mut members = Vec::new();
    while let Some(node) = dfs.next(graph) {
        if let Some(id) = graph.node_weight(node) {
            members.push(*id);
        }
    }
    members
}
