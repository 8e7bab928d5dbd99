//! Undirected identity graph over a [`People`] collection.
//!
//! Uses `petgraph` for the edges; node weights are [`PersonId`]s and the
//! people themselves stay in the borrowed collection, so nodes never alias the
//! data they describe. Every edge insertion keeps external ids consistent
//! within a connected component.

use std::collections::HashMap;

use petgraph::graph::{NodeIndex, UnGraph};

use crate::error::{PeopleError, ReduceError};
use crate::person::{People, Person, PersonId};

use super::analytics;
use super::traverse;

/// Result type for graph operations.
pub type GraphResult<T> = std::result::Result<T, ReduceError>;

/// Identity graph: one node per person, edges mean "same human".
pub struct IdentityGraph<'p> {
    graph: UnGraph<PersonId, ()>,
    /// PersonId → NodeIndex mapping for O(1) node lookups.
    nodes: HashMap<PersonId, NodeIndex>,
    people: &'p mut People,
}

impl<'p> IdentityGraph<'p> {
    /// Create a graph with one isolated node per person.
    pub fn new(people: &'p mut People) -> Self {
        let mut graph = UnGraph::with_capacity(people.len(), people.len());
        let mut nodes = HashMap::with_capacity(people.len());
        for id in people.ids() {
            nodes.insert(id, graph.add_node(id));
        }
        Self {
            graph,
            nodes,
            people,
        }
    }

    fn node(&self, id: PersonId) -> GraphResult<NodeIndex> {
        self.nodes
            .get(&id)
            .copied()
            .ok_or(ReduceError::People(PeopleError::UnknownPerson { id }))
    }

    /// The people behind the graph.
    pub fn people(&self) -> &People {
        self.people
    }

    pub fn person(&self, id: PersonId) -> Option<&Person> {
        self.people.get(id)
    }

    /// External id of a person; empty when unknown.
    pub fn external_id(&self, id: PersonId) -> &str {
        self.people
            .get(id)
            .map(|p| p.external_id.as_str())
            .unwrap_or_default()
    }

    /// Overwrite the external id of a single person, without propagation.
    pub fn set_external_id(&mut self, id: PersonId, external_id: &str) -> GraphResult<()> {
        let person = self
            .people
            .get_mut(id)
            .ok_or(ReduceError::People(PeopleError::UnknownPerson { id }))?;
        person.external_id = external_id.to_string();
        Ok(())
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn has_edge(&self, a: PersonId, b: PersonId) -> bool {
        match (self.nodes.get(&a), self.nodes.get(&b)) {
            (Some(&na), Some(&nb)) => self.graph.contains_edge(na, nb),
            _ => false,
        }
    }

    /// Connect two people, propagating external ids.
    ///
    /// If exactly one endpoint has an external id, every member of the other
    /// endpoint's component receives it; a member already holding a different
    /// id fails the call before anything is modified. Endpoints with two
    /// different external ids are never connected.
    pub fn set_edge(&mut self, a: PersonId, b: PersonId) -> GraphResult<()> {
        let na = self.node(a)?;
        let nb = self.node(b)?;
        let id_a = self.external_id(a).to_string();
        let id_b = self.external_id(b).to_string();
        if !id_a.is_empty() && !id_b.is_empty() && id_a != id_b {
            return Err(ReduceError::EdgeConflict {
                first: id_a,
                second: id_b,
            });
        }

        let fix = match (id_a.is_empty(), id_b.is_empty()) {
            (true, false) => Some((na, id_b)),
            (false, true) => Some((nb, id_a)),
            _ => None,
        };
        if let Some((start, new_id)) = fix {
            let members = traverse::component_of(&self.graph, start);
            for member in &members {
                let found = self.external_id(*member);
                if !found.is_empty() && found != new_id {
                    return Err(ReduceError::ComponentConflict {
                        expected: new_id,
                        found: found.to_string(),
                    });
                }
            }
            for member in members {
                self.set_external_id(member, &new_id)?;
            }
        }

        if na != nb {
            self.graph.update_edge(na, nb, ());
        }
        Ok(())
    }

    /// Members of the component containing `id`, in ascending order.
    pub fn component(&self, id: PersonId) -> GraphResult<Vec<PersonId>> {
        let mut members = traverse::component_of(&self.graph, self.node(id)?);
        members.sort_unstable();
        Ok(members)
    }

    /// Distinct emails and distinct names in the component containing `id`.
    pub fn component_unique_emails_and_names(&self, id: PersonId) -> GraphResult<(usize, usize)> {
        let members = self.component(id)?;
        Ok(self.people.unique_emails_and_names(&members))
    }

    /// Whether connecting `a` and `b` keeps the merged component under
    /// `max_identities` distinct emails plus names.
    ///
    /// Refused when either side already holds `max_identities` or more, or when
    /// the union of both sides would exceed it. Linking two members of the same
    /// component adds nothing and is always allowed.
    pub fn pass_identities_limit(
        &self,
        max_identities: usize,
        a: PersonId,
        b: PersonId,
    ) -> GraphResult<bool> {
        let members_a = self.component(a)?;
        if members_a.binary_search(&b).is_ok() {
            return Ok(true);
        }
        let members_b = self.component(b)?;
        let (emails_a, names_a) = self.people.unique_emails_and_names(&members_a);
        let (emails_b, names_b) = self.people.unique_emails_and_names(&members_b);
        let union: Vec<PersonId> = members_a.iter().chain(&members_b).copied().collect();
        let (emails, names) = self.people.unique_emails_and_names(&union);

        if emails_a + names_a >= max_identities
            || emails_b + names_b >= max_identities
            || emails + names > max_identities
        {
            tracing::debug!(
                "above the identities limit: {} ({} emails, {} names) and {} ({} emails, {} names)",
                self.describe(a),
                emails_a,
                names_a,
                self.describe(b),
                emails_b,
                names_b
            );
            return Ok(false);
        }
        Ok(true)
    }

    fn describe(&self, id: PersonId) -> String {
        self.person(id).map(|p| p.to_string()).unwrap_or_default()
    }

    /// Connected components, members ascending, ordered by smallest member.
    pub fn connected_components(&self) -> Vec<Vec<PersonId>> {
        analytics::connected_components(&self.graph)
    }
}

impl std::fmt::Debug for IdentityGraph<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityGraph")
            .field("nodes", &self.graph.node_count())
            .field("edges", &self.graph.edge_count())
            .finish()
    }
}
