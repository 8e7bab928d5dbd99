//! Identity reduction: decide which people are the same human and merge them.
//!
//! The pass runs in strictly ordered stages over an [`IdentityGraph`]:
//!
//! 1. **Oracle edges** (only with an oracle): every email is resolved to a
//!    verified account; people resolving to the same account are connected.
//! 2. **Email edges**: people sharing a non-popular email are connected. With
//!    an oracle, only emails the oracle could not resolve take part.
//! 3. **Name edges**: people sharing a non-popular name and the same (possibly
//!    empty) external id are connected. Afterwards, a name seen under exactly
//!    one verified account and under no account links all its holders.
//!
//! Heuristic edges (stages 2 and 3) are subject to the identities limit. The
//! name stage is order-dependent: people are processed in ascending id order
//! and name groups in sorted order, which makes the whole pass reproducible.
//! Finally every connected component is merged into one person.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::blacklist::Blacklist;
use crate::error::{OracleError, PeopleError, ReduceError};
use crate::graph::{IdentityGraph, component_size_stats};
use crate::oracle::{CancelToken, Oracle};
use crate::person::{Commit, People, PersonId};

/// Result type for reduction operations.
pub type ReduceResult<T> = std::result::Result<T, ReduceError>;

/// Counters collected during one reduction pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReduceReport {
    pub external_emails_found: usize,
    pub external_components: usize,
    pub external_emails_not_found: usize,
    pub popular_emails_found: usize,
    pub popular_names_found: usize,
    pub people_matched_by_email: usize,
    pub people_matched_by_name: usize,
    pub graph_edges: usize,
    pub identities_limit_refusals: usize,
    pub name_conflicts_skipped: usize,
    pub component_size_mean: f64,
    pub component_size_std: f64,
    pub component_size_max: usize,
    pub people_after_reduce: usize,
}

/// Merge `people` in place.
///
/// `max_identities` bounds the distinct emails plus names a component may
/// reach through heuristic edges. A conflict between verified accounts aborts
/// the pass; `people` is left unmerged in that case.
pub fn reduce_people(
    people: &mut People,
    oracle: Option<&dyn Oracle>,
    blacklist: &Blacklist,
    max_identities: usize,
    cancel: &CancelToken,
) -> ReduceResult<ReduceReport> {
    let mut report = ReduceReport::default();
    let mut graph = IdentityGraph::new(people);

    let unresolved = match oracle {
        Some(oracle) => Some(add_edges_with_oracle(&mut graph, oracle, cancel, &mut report)?),
        None => None,
    };
    add_edges_by_email(&mut graph, unresolved.as_ref(), blacklist, max_identities, &mut report)?;
    add_edges_by_name(&mut graph, blacklist, max_identities, &mut report)?;

    report.graph_edges = graph.edge_count();
    let components = graph.connected_components();

    let mut sizes = Vec::with_capacity(components.len());
    for members in &components {
        sizes.push(members.len());
        people.merge(members)?;
    }
    let stats = component_size_stats(&sizes);
    report.component_size_mean = stats.mean;
    report.component_size_std = stats.std;
    report.component_size_max = stats.max;
    report.people_after_reduce = people.len();

    tracing::info!(
        components = components.len(),
        mean = stats.mean,
        std = stats.std,
        max = stats.max,
        people = report.people_after_reduce,
        "people reduced"
    );
    Ok(report)
}

/// Emails, sample commit and display string of one person.
fn lookup_inputs(
    graph: &IdentityGraph<'_>,
    id: PersonId,
) -> ReduceResult<(Vec<String>, Option<Commit>, String)> {
    let person = graph
        .person(id)
        .ok_or(ReduceError::People(PeopleError::UnknownPerson { id }))?;
    Ok((person.emails.clone(), person.sample_commit.clone(), person.to_string()))
}

/// Resolve one email: by commit first when possible, then by email.
fn resolve_email(
    oracle: &dyn Oracle,
    cancel: &CancelToken,
    email: &str,
    commit: Option<&Commit>,
) -> Result<String, OracleError> {
    if let (true, Some(commit)) = (oracle.supports_matching_by_commit(), commit) {
        match oracle.match_by_commit(cancel, email, &commit.repo, &commit.hash) {
            Ok(user) if !user.is_empty() => return Ok(user),
            Err(OracleError::Cancelled) => return Err(OracleError::Cancelled),
            Err(OracleError::Cache(e)) => return Err(OracleError::Cache(e)),
            _ => {}
        }
    }
    match oracle.match_by_email(cancel, email) {
        Ok(user) if user.is_empty() => Err(OracleError::NoMatch),
        other => other,
    }
}

/// Stage 1. Returns the emails the oracle could not resolve.
fn add_edges_with_oracle(
    graph: &mut IdentityGraph<'_>,
    oracle: &dyn Oracle,
    cancel: &CancelToken,
    report: &mut ReduceReport,
) -> ReduceResult<HashSet<String>> {
    let mut unresolved: HashSet<String> = HashSet::new();
    let mut anchors: HashMap<String, PersonId> = HashMap::new();
    let mut no_match_warned: HashSet<String> = HashSet::new();
    let mut error_logged: HashSet<String> = HashSet::new();

    for id in graph.people().ids() {
        let (emails, commit, person) = lookup_inputs(graph, id)?;
        for email in emails {
            let user = match resolve_email(oracle, cancel, &email, commit.as_ref()) {
                Ok(user) => user,
                Err(OracleError::NoMatch) => {
                    if no_match_warned.insert(person.clone()) {
                        tracing::warn!("no matches for person {person}");
                    }
                    unresolved.insert(email);
                    continue;
                }
                Err(OracleError::Transient { message }) => {
                    if error_logged.insert(person.clone()) {
                        tracing::error!(error = %message, "unexpected error for person {person}");
                    }
                    unresolved.insert(email);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let current = graph.external_id(id);
            if !current.is_empty() && current != user {
                return Err(ReduceError::ConflictingExternalIds {
                    person,
                    first: current.to_string(),
                    second: user,
                });
            }
            graph.set_external_id(id, &user)?;
            match anchors.get(&user) {
                Some(&anchor) => graph.set_edge(anchor, id)?,
                None => {
                    anchors.insert(user, id);
                }
            }
            report.external_emails_found += 1;
        }
    }

    oracle.on_idle()?;
    report.external_components = anchors.len();
    report.external_emails_not_found = unresolved.len();
    tracing::info!(
        found = report.external_emails_found,
        components = report.external_components,
        not_found = report.external_emails_not_found,
        "external matching done"
    );
    Ok(unresolved)
}

/// Stage 2.
fn add_edges_by_email(
    graph: &mut IdentityGraph<'_>,
    unresolved: Option<&HashSet<String>>,
    blacklist: &Blacklist,
    max_identities: usize,
    report: &mut ReduceReport,
) -> ReduceResult<()> {
    let mut anchors: HashMap<String, PersonId> = HashMap::new();
    for id in graph.people().ids() {
        let (emails, _, _) = lookup_inputs(graph, id)?;
        for email in emails {
            if unresolved.is_some_and(|set| !set.contains(&email)) {
                // Already settled by the oracle.
                continue;
            }
            if blacklist.is_popular_email(&email) {
                report.popular_emails_found += 1;
                continue;
            }
            match anchors.get(&email) {
                Some(&anchor) => {
                    if graph.pass_identities_limit(max_identities, anchor, id)? {
                        graph.set_edge(anchor, id)?;
                    } else {
                        report.identities_limit_refusals += 1;
                    }
                }
                None => {
                    anchors.insert(email, id);
                }
            }
        }
    }
    report.people_matched_by_email = anchors.len();
    tracing::info!(
        emails = anchors.len(),
        popular = report.popular_emails_found,
        "email matching done"
    );
    Ok(())
}

/// Stage 3.
fn add_edges_by_name(
    graph: &mut IdentityGraph<'_>,
    blacklist: &Blacklist,
    max_identities: usize,
    report: &mut ReduceReport,
) -> ReduceResult<()> {
    // name → external id → people that opened the group
    let mut groups: BTreeMap<String, BTreeMap<String, Vec<PersonId>>> = BTreeMap::new();

    // Ascending ids: edges propagate external ids, which changes the group
    // later people fall into.
    for id in graph.people().ids() {
        let names: Vec<String> = graph
            .person(id)
            .map(|p| p.names_with_repos.iter().map(|n| n.to_string()).collect())
            .unwrap_or_default();
        for name in names {
            if blacklist.is_popular_name(&name) {
                report.popular_names_found += 1;
                continue;
            }
            let external_id = graph.external_id(id).to_string();
            let by_id = groups.entry(name).or_default();
            match by_id.get(&external_id) {
                Some(members) => {
                    for &member in members {
                        if !graph.pass_identities_limit(max_identities, member, id)? {
                            report.identities_limit_refusals += 1;
                            continue;
                        }
                        graph.set_edge(member, id)?;
                    }
                }
                None => {
                    by_id.insert(external_id, vec![id]);
                }
            }
        }
    }

    // A name seen under one verified account and under no account at all
    // most likely belongs to that account.
    for (name, by_id) in &groups {
        if by_id.len() != 2 || !by_id.contains_key("") {
            continue;
        }
        let connected: Vec<PersonId> = by_id.values().flatten().copied().collect();
        for (x, &a) in connected.iter().enumerate() {
            for &b in &connected[x + 1..] {
                let (id_a, id_b) = (graph.external_id(a), graph.external_id(b));
                if !id_a.is_empty() && !id_b.is_empty() && id_a != id_b {
                    tracing::debug!(name = %name, first = id_a, second = id_b, "skipping name link across accounts");
                    report.name_conflicts_skipped += 1;
                    continue;
                }
                if !graph.pass_identities_limit(max_identities, a, b)? {
                    report.identities_limit_refusals += 1;
                    continue;
                }
                graph.set_edge(a, b)?;
            }
        }
    }

    report.people_matched_by_name = groups.len();
    tracing::info!(
        names = groups.len(),
        popular = report.popular_names_found,
        "name matching done"
    );
    Ok(())
}
