use super::{Source, normalize_keywords};
use crate::hosting::{ApiOutcome, Provider, SearchQuery};
use crate::model::{Provenance, RepoId, RepoSnapshot};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Arc;

const LOG_TARGET: &str = "    search";

/// How many keywords the new-projects query ORs together.
const NEW_PROJECTS_KEYWORDS: usize = 5;

/// The optional query for recently created projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewProjectsQuery {
    /// Only projects created strictly after this date are returned.
    pub created_after: NaiveDate,
    pub cap: usize,
}

/// Keyword-driven repository search.
#[derive(Debug, Clone)]
pub struct SearchSource {
    provider: Arc<Provider>,
    keywords: Vec<String>,
    languages: Vec<String>,
    per_keyword_cap: usize,
    new_projects: Option<NewProjectsQuery>,
}

impl SearchSource {
    #[must_use]
    pub fn new(
        provider: Arc<Provider>,
        keywords: &[String],
        languages: Vec<String>,
        per_keyword_cap: usize,
        new_projects: Option<NewProjectsQuery>,
    ) -> Self {
        Self {
            provider,
            keywords: normalize_keywords(keywords),
            languages,
            per_keyword_cap,
            new_projects,
        }
    }

    /// The query text for one keyword: the keyword followed by one qualifier per language.
    #[must_use]
    pub fn keyword_query(&self, keyword: &str) -> String {
        let mut query = keyword.trim().to_string();
        for language in &self.languages {
            query.push_str(" language:");
            query.push_str(&language.to_lowercase());
        }
        query
    }

    fn new_projects_query(&self, created_after: NaiveDate) -> String {
        let keywords: Vec<_> = self
            .keywords
            .iter()
            .take(NEW_PROJECTS_KEYWORDS)
            .map(|kw| {
                let kw = kw.trim();
                if kw.contains(char::is_whitespace) {
                    format!("\"{kw}\"")
                } else {
                    kw.to_string()
                }
            })
            .collect();

        format!("created:>{} {}", created_after.format("%Y-%m-%d"), keywords.join(" OR "))
    }

    async fn run_query(&self, tag: &str, query: &SearchQuery, seen: &mut HashSet<RepoId>, out: &mut Vec<RepoSnapshot>) {
        let results = match self.provider.search(query).await {
            ApiOutcome::Ok(results) => results,
            outcome => {
                log::warn!(target: LOG_TARGET, "Search for '{tag}' returned nothing: {outcome}");
                return;
            }
        };

        let found = results.len();
        let fetched_at = self.provider.now();
        let mut added = 0;

        for snapshot in results {
            // first occurrence wins
            if !seen.insert(snapshot.id.clone()) {
                continue;
            }

            let mut snapshot = snapshot.tagged(Provenance::Search, fetched_at);
            let _ = snapshot.annotations.keywords.insert(tag.to_string());
            out.push(snapshot);
            added += 1;
        }

        log::info!(target: LOG_TARGET, "Search '{tag}': {found} result(s), {added} new");
    }
}

impl Source for SearchSource {
    fn provenance(&self) -> Provenance {
        Provenance::Search
    }

    async fn fetch(&self) -> Vec<RepoSnapshot> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for keyword in &self.keywords {
            let query = SearchQuery::by_stars(self.keyword_query(keyword), self.per_keyword_cap);
            self.run_query(keyword, &query, &mut seen, &mut out).await;
        }

        if let Some(new_projects) = self.new_projects {
            let tag = format!("created:>{}", new_projects.created_after.format("%Y-%m-%d"));
            let query = SearchQuery::by_stars(self.new_projects_query(new_projects.created_after), new_projects.cap);
            self.run_query(&tag, &query, &mut seen, &mut out).await;
        }

        // stable, so ties keep discovery order
        out.sort_by(|a, b| b.stars.cmp(&a.stars));
        out
    }
}
