use super::{ListingParser, RawListing, Source, normalize_keywords};
use crate::hosting::{ApiOutcome, Provider};
use crate::model::{Provenance, RepoId, RepoSnapshot};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;

const LOG_TARGET: &str = "  trending";

/// The trending board, filtered down to keyword-relevant entries.
#[derive(Debug, Clone)]
pub struct TrendingSource {
    provider: Arc<Provider>,
    parser: Arc<dyn ListingParser>,
    languages: Vec<String>,
    since: String,
    keywords: Vec<String>,
}

impl TrendingSource {
    #[must_use]
    pub fn new(provider: Arc<Provider>, parser: Arc<dyn ListingParser>, languages: Vec<String>, since: &str, keywords: &[String]) -> Self {
        Self {
            provider,
            parser,
            languages,
            since: since.to_string(),
            keywords: normalize_keywords(keywords).iter().map(|kw| kw.to_lowercase()).collect(),
        }
    }

    fn to_snapshot(&self, listing: RawListing, board: &str, fetched_at: DateTime<Utc>) -> Option<RepoSnapshot> {
        let id = match RepoId::parse(&listing.identity) {
            Ok(id) => id,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Skipping trending entry on the {board} board: {e:#}");
                return None;
            }
        };

        let Some(stars) = parse_star_count(&listing.star_text) else {
            log::warn!(target: LOG_TARGET, "Skipping trending entry '{id}': unreadable star count '{}'", listing.star_text);
            return None;
        };

        let mut snapshot = RepoSnapshot::new(id, stars, Provenance::Trending, fetched_at);
        snapshot.description = listing.description;
        snapshot.language = listing.language;
        let _ = snapshot.annotations.trending_languages.insert(board.to_string());

        if !matches_keywords(&snapshot, &self.keywords) {
            log::debug!(target: LOG_TARGET, "Trending entry '{}' matches no keyword", snapshot.id);
            return None;
        }

        Some(snapshot)
    }
}

impl Source for TrendingSource {
    fn provenance(&self) -> Provenance {
        Provenance::Trending
    }

    async fn fetch(&self) -> Vec<RepoSnapshot> {
        let pages = join_all(self.languages.iter().map(|language| async move {
            (language, self.provider.listing_page(language, &self.since).await)
        }))
        .await;

        let fetched_at = self.provider.now();
        let mut out: Vec<RepoSnapshot> = Vec::new();
        let mut index: HashMap<RepoId, usize> = HashMap::new();

        for (board, page) in pages {
            let html = match page {
                ApiOutcome::Ok(html) => html,
                outcome => {
                    log::warn!(target: LOG_TARGET, "Could not fetch the {board} trending board: {outcome}");
                    continue;
                }
            };

            let listings = self.parser.parse(&html);
            let total = listings.len();
            let mut kept = 0;

            for snapshot in listings.into_iter().filter_map(|l| self.to_snapshot(l, board, fetched_at)) {
                kept += 1;
                if let Some(&i) = index.get(&snapshot.id) {
                    // first occurrence wins, but remember every board it was on
                    out[i].annotations.union(snapshot.annotations);
                } else {
                    let _ = index.insert(snapshot.id.clone(), out.len());
                    out.push(snapshot);
                }
            }

            log::info!(target: LOG_TARGET, "Found {kept} relevant project(s) among {total} on the {board} trending board");
        }

        out
    }
}

/// Whether the snapshot's name or description contains any of the keywords, ignoring case and blank keywords.
#[must_use]
pub fn matches_keywords(snapshot: &RepoSnapshot, keywords: &[String]) -> bool {
    let text = format!("{} {}", snapshot.name, snapshot.description.as_deref().unwrap_or_default()).to_lowercase();
    keywords
        .iter()
        .map(|kw| kw.trim())
        .filter(|kw| !kw.is_empty())
        .any(|kw| text.contains(&kw.to_lowercase()))
}

/// Parse a rendered star count such as `1,234`, `1.2k`, `3m` or `567 stars`.
#[must_use]
pub fn parse_star_count(text: &str) -> Option<u64> {
    let mut s: String = text.to_lowercase().chars().filter(|c| !c.is_whitespace() && *c != ',').collect();

    if let Some(stripped) = s.strip_suffix("stars").or_else(|| s.strip_suffix("star")) {
        s = stripped.to_string();
    }

    let (number, multiplier) = if let Some(n) = s.strip_suffix('k') {
        (n, 1_000.0)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 1_000_000.0)
    } else {
        return s.parse::<u64>().ok();
    };

    let value: f64 = number.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "value is finite and non-negative")]
    let count = (value * multiplier).round() as u64;
    Some(count)
}
