use super::{Annotations, Provenance, RepoId, RepoSnapshot};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Growth metrics of a project at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub stars: u64,

    /// `None` when the fork count had never been reported.
    #[serde(default)]
    pub forks: Option<u64>,
}

/// The persisted state of one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: RepoId,
    pub name: String,
    pub description: Option<String>,
    pub stars: u64,

    #[serde(default)]
    pub forks: Option<u64>,
    pub language: Option<String>,

    #[serde(default)]
    pub topics: BTreeSet<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub license: Option<String>,
    pub html_url: Option<String>,
    pub provenance: Provenance,

    /// What the sources reported about the identity when it was last observed.
    #[serde(default)]
    pub annotations: Annotations,
    pub fetched_at: DateTime<Utc>,

    /// Date of the last cycle that observed this identity.
    #[serde(default)]
    pub observed_on: Option<NaiveDate>,

    /// Append-only; entries are never rewritten or removed.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl ProjectRecord {
    /// Create the record for a first observation, with an empty history.
    #[must_use]
    pub fn from_snapshot(snapshot: &RepoSnapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            name: snapshot.name.clone(),
            description: snapshot.description.clone(),
            stars: snapshot.stars,
            forks: snapshot.forks,
            language: snapshot.language.clone(),
            topics: snapshot.topics.clone(),
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
            license: snapshot.license.clone(),
            html_url: snapshot.html_url.clone(),
            provenance: snapshot.provenance,
            annotations: snapshot.annotations.clone(),
            fetched_at: snapshot.fetched_at,
            observed_on: None,
            history: Vec::new(),
        }
    }

    /// Overlay the snapshot's known fields; fields the snapshot lacks keep their old values.
    pub fn overlay(&mut self, snapshot: &RepoSnapshot) {
        fn take<T: Clone>(slot: &mut Option<T>, value: Option<&T>) {
            if let Some(v) = value {
                *slot = Some(v.clone());
            }
        }

        if !snapshot.name.is_empty() {
            self.name.clone_from(&snapshot.name);
        }

        self.stars = snapshot.stars;
        take(&mut self.forks, snapshot.forks.as_ref());

        take(&mut self.description, snapshot.description.as_ref());
        take(&mut self.language, snapshot.language.as_ref());
        take(&mut self.created_at, snapshot.created_at.as_ref());
        take(&mut self.updated_at, snapshot.updated_at.as_ref());
        take(&mut self.license, snapshot.license.as_ref());
        take(&mut self.html_url, snapshot.html_url.as_ref());

        if !snapshot.topics.is_empty() {
            self.topics.clone_from(&snapshot.topics);
        }

        self.annotations.overlay(&snapshot.annotations);
        self.provenance = snapshot.provenance;
        self.fetched_at = snapshot.fetched_at;
    }

    /// The most recent history entry, if any.
    #[must_use]
    pub fn last_entry(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }
}
