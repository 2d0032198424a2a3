//! Producers of repository snapshots.
//!
//! Each adapter queries one kind of source and returns what it found, tagged with its
//! provenance. Failures of individual items are logged and dropped; an adapter never fails
//! as a whole.

mod listing_parser;
mod search;
mod trending;
mod watchlist;

pub use listing_parser::{HtmlListingParser, ListingParser, RawListing};
pub use search::{NewProjectsQuery, SearchSource};
pub use trending::{TrendingSource, matches_keywords, parse_star_count};
pub use watchlist::WatchlistSource;

use crate::model::{Provenance, RepoSnapshot};
use std::collections::HashSet;

/// A producer of snapshots.
pub trait Source {
    fn provenance(&self) -> Provenance;

    /// Fetch the current snapshots. Per-item failures are dropped with a diagnostic.
    fn fetch(&self) -> impl Future<Output = Vec<RepoSnapshot>> + Send;
}

/// Trim keywords, drop blank ones, and drop case-insensitive repeats keeping the first spelling.
#[must_use]
pub fn normalize_keywords(keywords: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    keywords
        .iter()
        .map(|kw| kw.trim())
        .filter(|kw| !kw.is_empty() && seen.insert(kw.to_lowercase()))
        .map(str::to_string)
        .collect()
}
