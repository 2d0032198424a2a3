//! Cross-source reconciliation.
//!
//! The three sources' outputs are concatenated (trending, then search, then watchlist),
//! deduplicated globally by identity, and ranked by stars.

mod merge;
mod summary;

pub use merge::{dedup, merge_into, rank};
pub use summary::Summary;

use crate::model::RepoSnapshot;

/// Default number of projects in the highlights view.
pub const DEFAULT_HIGHLIGHTS_SIZE: usize = 10;

/// What each source produced during one cycle.
#[derive(Debug, Clone, Default)]
pub struct SourceBatches {
    pub trending: Vec<RepoSnapshot>,
    pub search: Vec<RepoSnapshot>,
    pub watchlist: Vec<RepoSnapshot>,
}

impl SourceBatches {
    /// All snapshots in aggregation order.
    fn into_ordered(self) -> impl Iterator<Item = RepoSnapshot> {
        self.trending.into_iter().chain(self.search).chain(self.watchlist)
    }
}

/// The ranked, deduplicated view of one cycle.
#[derive(Debug, Clone)]
pub struct AggregatedView {
    ranked: Vec<RepoSnapshot>,
    highlights_size: usize,
    summary: Summary,
}

impl AggregatedView {
    /// Every project, most starred first.
    #[must_use]
    pub fn ranked(&self) -> &[RepoSnapshot] {
        &self.ranked
    }

    /// The top-K projects.
    #[must_use]
    pub fn highlights(&self) -> &[RepoSnapshot] {
        &self.ranked[..self.highlights_size.min(self.ranked.len())]
    }

    #[must_use]
    pub const fn summary(&self) -> &Summary {
        &self.summary
    }
}

/// Merge, deduplicate, and rank the sources' output.
#[must_use]
pub fn aggregate(batches: SourceBatches, highlights_size: usize) -> AggregatedView {
    let mut summary = Summary::default();
    summary.count_sources(&batches);

    let ranked = rank(dedup(batches.into_ordered()));
    summary.count_projects(&ranked);

    AggregatedView {
        ranked,
        highlights_size,
        summary,
    }
}
