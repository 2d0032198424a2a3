use super::SourceBatches;
use crate::model::{Provenance, RepoSnapshot};
use std::collections::{BTreeMap, HashMap};

const TOP_LANGUAGES: usize = 5;

/// Headline numbers of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    /// Distinct projects after deduplication.
    pub total_projects: usize,
    pub total_stars: u64,
    pub total_forks: u64,

    /// How many snapshots each source produced, before deduplication.
    pub per_source: BTreeMap<Provenance, usize>,

    /// Most common primary languages with their project counts.
    pub top_languages: Vec<(String, usize)>,
}

impl Summary {
    pub(super) fn count_sources(&mut self, batches: &SourceBatches) {
        for (provenance, batch) in [
            (Provenance::Trending, &batches.trending),
            (Provenance::Search, &batches.search),
            (Provenance::Watchlist, &batches.watchlist),
        ] {
            let _ = self.per_source.insert(provenance, batch.len());
        }
    }

    pub(super) fn count_projects(&mut self, projects: &[RepoSnapshot]) {
        self.total_projects = projects.len();
        self.total_stars = projects.iter().map(|p| p.stars).sum();
        self.total_forks = projects.iter().filter_map(|p| p.forks).sum();

        let mut languages: HashMap<&str, usize> = HashMap::new();
        for language in projects.iter().filter_map(|p| p.language.as_deref()) {
            *languages.entry(language).or_default() += 1;
        }

        let mut languages: Vec<_> = languages.into_iter().map(|(l, n)| (l.to_string(), n)).collect();
        languages.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        languages.truncate(TOP_LANGUAGES);
        self.top_languages = languages;
    }
}
