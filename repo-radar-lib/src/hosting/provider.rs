use super::backoff::BackoffPolicy;
use super::cache::{Cache, CacheKey, CacheResult};
use super::client::{ApiCommit, ApiContributor, ApiRepository, Client, RateLimitResponse, SearchResponse};
use super::clock::Clock;
use super::outcome::ApiOutcome;
use super::throttler::Throttler;
use crate::Result;
use crate::model::{CommitSummary, ContributorSummary, Provenance, RepoId, RepoSnapshot};
use chrono::{DateTime, Utc};
use ohno::IntoAppError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

const LOG_TARGET: &str = "  provider";

/// Remaining/limit/reset of the core API quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    pub remaining: u64,
    pub limit: u64,
    pub reset_at: DateTime<Utc>,
}

/// Parameters of a repository search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub sort: String,
    pub order: String,
    pub page_size: usize,
}

impl SearchQuery {
    /// A query sorted by stars, most starred first.
    #[must_use]
    pub fn by_stars(query: impl Into<String>, page_size: usize) -> Self {
        Self {
            query: query.into(),
            sort: "stars".to_string(),
            order: "desc".to_string(),
            page_size,
        }
    }
}

/// Cached, throttled, retrying access to the hosting API.
///
/// Every cacheable operation consults the cache first. Rate-limited and transient outcomes
/// are retried according to the [`BackoffPolicy`]; when the budget is spent, the last
/// classified outcome is returned.
#[derive(Debug)]
pub struct Provider {
    client: Client,
    cache: Cache,
    backoff: BackoffPolicy,
    throttler: Arc<Throttler>,
    clock: Arc<dyn Clock>,
}

impl Provider {
    #[must_use]
    pub fn new(client: Client, cache: Cache, backoff: BackoffPolicy, max_concurrent_requests: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            cache,
            backoff,
            throttler: Throttler::new(max_concurrent_requests),
            clock,
        }
    }

    #[must_use]
    pub const fn cache(&self) -> &Cache {
        &self.cache
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Search repositories.
    pub async fn search(&self, query: &SearchQuery) -> ApiOutcome<Vec<RepoSnapshot>> {
        let key = CacheKey::new("search")
            .param("q", &query.query)
            .param("sort", &query.sort)
            .param("order", &query.order)
            .param("per_page", query.page_size)
            .build();

        let params = vec![
            ("q", query.query.clone()),
            ("sort", query.sort.clone()),
            ("order", query.order.clone()),
            ("per_page", query.page_size.to_string()),
        ];

        let fetched_at = self.now();
        self.cached(key, "search/repositories", &params, |body| {
            let response: SearchResponse = decode(body, "search results")?;
            log::debug!(target: LOG_TARGET, "Search '{}' matched {} repositories", query.query, response.total_count);

            Ok(response
                .items
                .into_iter()
                .filter_map(|item| match snapshot_from_api(item, Provenance::Search, fetched_at) {
                    Ok(snapshot) => Some(snapshot),
                    Err(e) => {
                        log::warn!(target: LOG_TARGET, "Skipping search result: {e:#}");
                        None
                    }
                })
                .collect())
        })
        .await
    }

    /// Fetch a repository's metadata. Direct lookups are attributed to the watchlist.
    pub async fn get_repo(&self, id: &RepoId) -> ApiOutcome<RepoSnapshot> {
        let key = CacheKey::new("repo").param("id", id).build();
        let path = format!("repos/{id}");

        let fetched_at = self.now();
        self.cached(key, &path, &[], |body| {
            let repo: ApiRepository = decode(body, "repository")?;
            snapshot_from_api(repo, Provenance::Watchlist, fetched_at)
        })
        .await
    }

    /// Fetch the most recent commits on the default branch.
    pub async fn get_recent_commits(&self, id: &RepoId, limit: usize) -> ApiOutcome<Vec<CommitSummary>> {
        let key = CacheKey::new("commits").param("id", id).param("per_page", limit).build();
        let path = format!("repos/{id}/commits");

        self.cached(key, &path, &[("per_page", limit.to_string())], |body| {
            let commits: Vec<ApiCommit> = decode(body, "commits")?;
            Ok(commits.into_iter().take(limit).map(commit_summary).collect())
        })
        .await
    }

    /// Fetch the top contributors, most contributions first.
    pub async fn get_contributors(&self, id: &RepoId, limit: usize) -> ApiOutcome<Vec<ContributorSummary>> {
        let key = CacheKey::new("contributors").param("id", id).param("per_page", limit).build();
        let path = format!("repos/{id}/contributors");

        self.cached(key, &path, &[("per_page", limit.to_string())], |body| {
            let contributors: Vec<ApiContributor> = decode(body, "contributors")?;
            Ok(contributors
                .into_iter()
                .filter_map(|c| {
                    c.login.map(|login| ContributorSummary {
                        login,
                        contributions: c.contributions,
                    })
                })
                .take(limit)
                .collect())
        })
        .await
    }

    /// Query the remaining API quota. Never cached.
    pub async fn quota_status(&self) -> ApiOutcome<QuotaStatus> {
        let outcome = self.with_backoff("rate_limit", || self.client.api_get("rate_limit", &[])).await;
        convert(outcome, |body| {
            let response: RateLimitResponse = decode(body, "rate limit status")?;
            let core = response.resources.core;
            let reset_at = DateTime::from_timestamp(core.reset, 0).into_app_err_with(|| format!("invalid quota reset timestamp {}", core.reset))?;

            Ok(QuotaStatus {
                remaining: core.remaining,
                limit: core.limit,
                reset_at,
            })
        })
    }

    /// Fetch the raw trending page for a language.
    pub async fn listing_page(&self, language: &str, since: &str) -> ApiOutcome<String> {
        let slug = language_slug(language);
        let key = CacheKey::new("listing").param("language", &slug).param("since", since).build();

        match self.cache.load::<String>(&key) {
            CacheResult::Data(page) => return ApiOutcome::Ok(page),
            CacheResult::NoData(_) => return ApiOutcome::NotFound,
            CacheResult::Miss => {}
        }

        log::debug!(target: LOG_TARGET, "Fetching trending page for '{language}'");
        let outcome = self.with_backoff(key.as_str(), || self.client.listing_get(&slug, since)).await;
        self.store(&key, convert(outcome, |body| Ok(body.to_string())))
    }

    async fn cached<T, F>(&self, key: CacheKey, path: &str, query: &[(&str, String)], decode_body: F) -> ApiOutcome<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&str) -> Result<T> + Send,
    {
        match self.cache.load::<T>(&key) {
            CacheResult::Data(data) => return ApiOutcome::Ok(data),
            CacheResult::NoData(_) => return ApiOutcome::NotFound,
            CacheResult::Miss => {}
        }

        log::debug!(target: LOG_TARGET, "Querying GitHub for {key}");
        let outcome = self.with_backoff(key.as_str(), || self.client.api_get(path, query)).await;
        self.store(&key, convert(outcome, decode_body))
    }

    fn store<T: Serialize>(&self, key: &CacheKey, outcome: ApiOutcome<T>) -> ApiOutcome<T> {
        match &outcome {
            ApiOutcome::Ok(data) => {
                if let Err(e) = self.cache.save(key, data) {
                    log::debug!(target: LOG_TARGET, "Could not save cache entry for {key}: {e:#}");
                }
            }
            ApiOutcome::NotFound => self.cache.save_no_data(key, "not found"),
            _ => {}
        }

        outcome
    }

    /// Run a request, retrying rate-limited and transient outcomes with backoff.
    ///
    /// A rate-limited attempt pauses the throttler for the backoff interval so that sibling
    /// requests hold off too.
    async fn with_backoff<F, Fut>(&self, what: &str, mut call: F) -> ApiOutcome<String>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = ApiOutcome<String>> + Send,
    {
        let mut attempt = 0;
        loop {
            let outcome = {
                let _permit = self.throttler.acquire().await;
                call().await
            };

            if !outcome.is_retryable() {
                return outcome;
            }

            if !self.backoff.allows_retry(attempt) {
                log::warn!(target: LOG_TARGET, "Giving up on {what} after {} attempt(s): {outcome}", attempt + 1);
                return outcome;
            }

            let hint = match &outcome {
                ApiOutcome::RateLimited(Some(info)) => info.retry_after,
                _ => None,
            };

            let delay = self.backoff.delay_for(attempt, hint);
            if matches!(outcome, ApiOutcome::RateLimited(_)) && self.throttler.pause_for(delay) {
                log::info!(target: LOG_TARGET, "GitHub rate limit hit, pausing requests for {}ms", delay.as_millis());
            }

            log::debug!(
                target: LOG_TARGET,
                "Retrying {what} (attempt {}, delay {}ms): {outcome}",
                attempt + 1,
                delay.as_millis()
            );

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Trending page slug for a language: lowercase, spaces become dashes.
#[must_use]
pub fn language_slug(language: &str) -> String {
    language.trim().to_lowercase().replace(' ', "-")
}

fn convert<T>(outcome: ApiOutcome<String>, decode_body: impl FnOnce(&str) -> Result<T>) -> ApiOutcome<T> {
    match outcome {
        ApiOutcome::Ok(body) => match decode_body(&body) {
            Ok(data) => ApiOutcome::Ok(data),
            Err(e) => ApiOutcome::Failed(Arc::new(e)),
        },
        ApiOutcome::NotFound => ApiOutcome::NotFound,
        ApiOutcome::RateLimited(info) => ApiOutcome::RateLimited(info),
        ApiOutcome::Transient(e) => ApiOutcome::Transient(e),
        ApiOutcome::Failed(e) => ApiOutcome::Failed(e),
    }
}

fn decode<R: DeserializeOwned>(body: &str, what: &str) -> Result<R> {
    serde_json::from_str(body).into_app_err_with(|| format!("decoding {what}"))
}

fn snapshot_from_api(repo: ApiRepository, provenance: Provenance, fetched_at: DateTime<Utc>) -> Result<RepoSnapshot> {
    let id = RepoId::parse(&repo.full_name)?;

    let mut snapshot = RepoSnapshot::new(id, repo.stargazers_count, provenance, fetched_at);
    if !repo.name.is_empty() {
        snapshot.name = repo.name;
    }
    snapshot.description = repo.description.filter(|d| !d.trim().is_empty());
    snapshot.forks = repo.forks_count;
    snapshot.language = repo.language;
    snapshot.topics = repo.topics.into_iter().collect();
    snapshot.created_at = repo.created_at;
    snapshot.updated_at = repo.updated_at;
    snapshot.license = repo
        .license
        .and_then(|l| l.name.filter(|n| !n.trim().is_empty()).or_else(|| l.spdx_id.filter(|s| s != "NOASSERTION")));
    snapshot.html_url = repo.html_url;

    Ok(snapshot)
}

fn commit_summary(commit: ApiCommit) -> CommitSummary {
    let git_author = commit.commit.author;
    let author = commit
        .author
        .map(|u| u.login)
        .or_else(|| git_author.as_ref().and_then(|a| a.name.clone()))
        .unwrap_or_else(|| "unknown".to_string());

    CommitSummary {
        message: commit.commit.message.lines().next().unwrap_or_default().to_string(),
        author,
        date: git_author.and_then(|a| a.date),
        sha: commit.sha,
    }
}
