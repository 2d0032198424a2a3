use super::RepoId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which source produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, strum::Display, strum::IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Provenance {
    Search,
    Trending,
    Watchlist,
}

impl Provenance {
    /// Whether the star and fork counts come straight from the hosting API.
    ///
    /// Trending counts are scraped from rendered text (`1.2k`) and are approximate.
    #[must_use]
    pub const fn has_exact_counts(self) -> bool {
        !matches!(self, Self::Trending)
    }
}

/// One commit as reported by the hosting API, reduced to its first message line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorSummary {
    pub login: String,
    pub contributions: u64,
}

/// Source-specific details attached to a snapshot.
///
/// Annotations from different sources for the same identity are unioned rather
/// than replaced, so no source's contribution is lost during deduplication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotations {
    /// Every source that reported this identity during the cycle.
    #[serde(default)]
    pub sources: BTreeSet<Provenance>,

    /// Search keywords that surfaced the identity.
    #[serde(default)]
    pub keywords: BTreeSet<String>,

    /// Trending boards the identity appeared on.
    #[serde(default)]
    pub trending_languages: BTreeSet<String>,

    #[serde(default)]
    pub recent_commits: Vec<CommitSummary>,

    #[serde(default)]
    pub contributors: Vec<ContributorSummary>,
}

impl Annotations {
    #[must_use]
    pub fn from_source(source: Provenance) -> Self {
        Self {
            sources: BTreeSet::from([source]),
            ..Self::default()
        }
    }

    /// Replace each part that `newer` reports; parts it leaves empty keep their values.
    pub fn overlay(&mut self, newer: &Self) {
        if !newer.sources.is_empty() {
            self.sources.clone_from(&newer.sources);
        }

        if !newer.keywords.is_empty() {
            self.keywords.clone_from(&newer.keywords);
        }

        if !newer.trending_languages.is_empty() {
            self.trending_languages.clone_from(&newer.trending_languages);
        }

        if !newer.recent_commits.is_empty() {
            self.recent_commits.clone_from(&newer.recent_commits);
        }

        if !newer.contributors.is_empty() {
            self.contributors.clone_from(&newer.contributors);
        }
    }

    /// Fold another set of annotations into this one.
    pub fn union(&mut self, other: Self) {
        self.sources.extend(other.sources);
        self.keywords.extend(other.keywords);
        self.trending_languages.extend(other.trending_languages);

        if self.recent_commits.is_empty() {
            self.recent_commits = other.recent_commits;
        }

        if self.contributors.is_empty() {
            self.contributors = other.contributors;
        }
    }
}

/// One observation of a repository at fetch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSnapshot {
    pub id: RepoId,
    pub name: String,
    pub description: Option<String>,
    pub stars: u64,

    /// Unknown for sources that don't report forks.
    pub forks: Option<u64>,
    pub language: Option<String>,

    #[serde(default)]
    pub topics: BTreeSet<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub license: Option<String>,
    pub html_url: Option<String>,
    pub provenance: Provenance,

    #[serde(default)]
    pub annotations: Annotations,
    pub fetched_at: DateTime<Utc>,
}

impl RepoSnapshot {
    /// Create a snapshot carrying only the identity and star count.
    #[must_use]
    pub fn new(id: RepoId, stars: u64, provenance: Provenance, fetched_at: DateTime<Utc>) -> Self {
        Self {
            name: id.name().to_string(),
            id,
            description: None,
            stars,
            forks: None,
            language: None,
            topics: BTreeSet::new(),
            created_at: None,
            updated_at: None,
            license: None,
            html_url: None,
            provenance,
            annotations: Annotations::from_source(provenance),
            fetched_at,
        }
    }

    /// Re-tag a snapshot for the source that is about to emit it.
    #[must_use]
    pub fn tagged(mut self, provenance: Provenance, fetched_at: DateTime<Utc>) -> Self {
        self.provenance = provenance;
        self.fetched_at = fetched_at;
        let _ = self.annotations.sources.insert(provenance);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> RepoId {
        RepoId::parse(s).unwrap()
    }

    #[test]
    fn test_new_snapshot_uses_repo_name() {
        let snap = RepoSnapshot::new(id("ollama/ollama"), 10, Provenance::Search, Utc::now());
        assert_eq!(snap.name, "ollama");
        assert_eq!(snap.forks, None);
        assert!(snap.annotations.sources.contains(&Provenance::Search));
    }

    #[test]
    fn test_tagged_records_provenance() {
        let now = Utc::now();
        let snap = RepoSnapshot::new(id("a/b"), 1, Provenance::Search, now).tagged(Provenance::Watchlist, now);
        assert_eq!(snap.provenance, Provenance::Watchlist);
        assert!(snap.annotations.sources.contains(&Provenance::Search));
        assert!(snap.annotations.sources.contains(&Provenance::Watchlist));
    }

    #[test]
    fn test_annotations_union_keeps_both_keywords() {
        let mut a = Annotations::from_source(Provenance::Search);
        let _ = a.keywords.insert("llm".to_string());

        let mut b = Annotations::from_source(Provenance::Trending);
        let _ = b.keywords.insert("gpt".to_string());
        let _ = b.trending_languages.insert("Rust".to_string());

        a.union(b);

        assert_eq!(a.keywords.len(), 2);
        assert_eq!(a.sources.len(), 2);
        assert!(a.trending_languages.contains("Rust"));
    }

    #[test]
    fn test_annotations_union_keeps_existing_commits() {
        let commit = CommitSummary {
            sha: "abc".to_string(),
            message: "first".to_string(),
            author: "me".to_string(),
            date: None,
        };

        let mut a = Annotations {
            recent_commits: vec![commit.clone()],
            ..Annotations::default()
        };
        let b = Annotations {
            recent_commits: vec![CommitSummary {
                sha: "def".to_string(),
                ..commit
            }],
            ..Annotations::default()
        };

        a.union(b);
        assert_eq!(a.recent_commits.len(), 1);
        assert_eq!(a.recent_commits[0].sha, "abc");
    }

    #[test]
    fn test_provenance_display() {
        assert_eq!(Provenance::Search.to_string(), "search");
        assert_eq!(Provenance::Trending.to_string(), "trending");
        assert_eq!(Provenance::Watchlist.to_string(), "watchlist");
    }

    #[test]
    fn test_exact_counts() {
        assert!(Provenance::Search.has_exact_counts());
        assert!(Provenance::Watchlist.has_exact_counts());
        assert!(!Provenance::Trending.has_exact_counts());
    }
}
