//! Identity candidates and the collection they live in.
//!
//! A [`Person`] is one name/email cluster observed in commit history. The
//! [`People`] collection owns every candidate under a stable [`PersonId`] and
//! collapses candidates into one representative with [`People::merge`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PeopleError;

/// Stable identifier of a person: its index in the original candidate list.
///
/// Ids are never reused or renumbered; a merge keeps the smallest id.
pub type PersonId = u64;

/// Result type for people operations.
pub type PeopleResult<T> = std::result::Result<T, PeopleError>;

/// A display name together with the repository it was seen in.
///
/// An empty `repo` means the name is global. Names scoped to a repository
/// only match other occurrences in the same repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NameWithRepo {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo: String,
}

impl NameWithRepo {
    pub fn new(name: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repo: repo.into(),
        }
    }

    /// A name not tied to any repository.
    pub fn global(name: impl Into<String>) -> Self {
        Self::new(name, "")
    }
}

impl std::fmt::Display for NameWithRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.repo.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} ({})", self.name, self.repo)
        }
    }
}

/// A commit used for provenance-based oracle lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub repo: String,
    pub hash: String,
}

/// An identity candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Unique emails, in first-seen order.
    #[serde(default)]
    pub emails: Vec<String>,
    /// Names in first-seen order.
    #[serde(default)]
    pub names_with_repos: Vec<NameWithRepo>,
    /// Externally verified account; empty when unknown.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub external_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_commit: Option<Commit>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub primary_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub primary_email: String,
}

impl Person {
    /// Create a person from emails and global names, dropping duplicates.
    pub fn new<E, N>(emails: E, names: N) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        N: IntoIterator,
        N::Item: Into<String>,
    {
        let mut person = Self::default();
        for email in emails {
            person.add_email(email);
        }
        for name in names {
            person.add_name(NameWithRepo::global(name));
        }
        person
    }

    /// Set the external id.
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = external_id.into();
        self
    }

    /// Set the sample commit.
    pub fn with_sample_commit(mut self, repo: impl Into<String>, hash: impl Into<String>) -> Self {
        self.sample_commit = Some(Commit {
            repo: repo.into(),
            hash: hash.into(),
        });
        self
    }

    /// Add an email unless already present.
    pub fn add_email(&mut self, email: impl Into<String>) {
        let email = email.into();
        if !self.emails.contains(&email) {
            self.emails.push(email);
        }
    }

    /// Add a name unless already present.
    pub fn add_name(&mut self, name: NameWithRepo) {
        if !self.names_with_repos.contains(&name) {
            self.names_with_repos.push(name);
        }
    }

    /// Bare names in first-seen order (a name seen in several repos repeats).
    pub fn names(&self) -> Vec<String> {
        self.names_with_repos.iter().map(|n| n.name.clone()).collect()
    }

    fn absorb(&mut self, other: Person) {
        for email in other.emails {
            self.add_email(email);
        }
        for name in other.names_with_repos {
            self.add_name(name);
        }
        if self.external_id.is_empty() {
            self.external_id = other.external_id;
        }
        if self.sample_commit.is_none() {
            self.sample_commit = other.sample_commit;
        }
        if self.primary_name.is_empty() {
            self.primary_name = other.primary_name;
        }
        if self.primary_email.is_empty() {
            self.primary_email = other.primary_email;
        }
    }
}

impl std::fmt::Display for Person {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.names_with_repos.iter().map(|n| n.to_string()).collect();
        write!(f, "{}|{}", names.join(","), self.emails.join(","))?;
        if !self.external_id.is_empty() {
            write!(f, "|{}", self.external_id)?;
        }
        Ok(())
    }
}

/// Commit counts of one name or email.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frequency {
    /// Commits within the recent window.
    #[serde(default)]
    pub recent: u64,
    /// Commits over the whole history.
    #[serde(default)]
    pub total: u64,
}

/// Value → commit counts.
pub type FrequencyTable = HashMap<String, Frequency>;

/// Load a frequency table from a JSON object of `{"value": {"recent": n, "total": m}}`.
pub fn load_frequencies(path: &Path) -> PeopleResult<FrequencyTable> {
    let content = std::fs::read_to_string(path).map_err(|e| PeopleError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| PeopleError::Json {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Ordered collection of identity candidates keyed by [`PersonId`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct People {
    persons: BTreeMap<PersonId, Person>,
}

impl People {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of people currently held.
    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    pub fn get(&self, id: PersonId) -> Option<&Person> {
        self.persons.get(&id)
    }

    pub fn get_mut(&mut self, id: PersonId) -> Option<&mut Person> {
        self.persons.get_mut(&id)
    }

    /// Ids in ascending order.
    pub fn ids(&self) -> Vec<PersonId> {
        self.persons.keys().copied().collect()
    }

    /// Iterate people in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (PersonId, &Person)> {
        self.persons.iter().map(|(id, p)| (*id, p))
    }

    /// Iterate people mutably in ascending id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PersonId, &mut Person)> {
        self.persons.iter_mut().map(|(id, p)| (*id, p))
    }

    /// Merge the given people into the one with the smallest id.
    ///
    /// Emails and names are combined in ascending id order, the first sample
    /// commit wins, and every non-empty external id must be identical.
    /// Returns the id of the representative.
    pub fn merge(&mut self, ids: &[PersonId]) -> PeopleResult<PersonId> {
        let mut ids: Vec<PersonId> = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        let Some(&representative) = ids.first() else {
            return Err(PeopleError::EmptyMerge);
        };

        let mut external_id = "";
        for id in &ids {
            let person = self.persons.get(id).ok_or(PeopleError::UnknownPerson { id: *id })?;
            if person.external_id.is_empty() {
                continue;
            }
            if external_id.is_empty() {
                external_id = &person.external_id;
            } else if external_id != person.external_id {
                return Err(PeopleError::ConflictingExternalIds {
                    first: external_id.to_string(),
                    second: person.external_id.clone(),
                });
            }
        }

        for id in &ids[1..] {
            if let Some(other) = self.persons.remove(id) {
                if let Some(rep) = self.persons.get_mut(&representative) {
                    rep.absorb(other);
                }
            }
        }
        Ok(representative)
    }

    /// Load people from a JSON array; ids are array positions.
    pub fn load_json(path: &Path) -> PeopleResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PeopleError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let persons: Vec<Person> =
            serde_json::from_str(&content).map_err(|e| PeopleError::Json {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Ok(persons.into_iter().collect())
    }

    /// Save people as a JSON array in ascending id order.
    pub fn save_json(&self, path: &Path) -> PeopleResult<()> {
        let persons: Vec<&Person> = self.persons.values().collect();
        let content = serde_json::to_string_pretty(&persons).map_err(|e| PeopleError::Json {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| PeopleError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Count distinct emails and distinct names across the given people.
    pub fn unique_emails_and_names(&self, ids: &[PersonId]) -> (usize, usize) {
        let mut emails: HashSet<&str> = HashSet::new();
        let mut names: HashSet<String> = HashSet::new();
        for person in ids.iter().filter_map(|id| self.persons.get(id)) {
            emails.extend(person.emails.iter().map(String::as_str));
            names.extend(person.names_with_repos.iter().map(|n| n.to_string()));
        }
        (emails.len(), names.len())
    }
}

impl FromIterator<Person> for People {
    fn from_iter<I: IntoIterator<Item = Person>>(iter: I) -> Self {
        Self {
            persons: iter
                .into_iter()
                .enumerate()
                .map(|(i, p)| (i as PersonId, p))
                .collect(),
        }
    }
}
