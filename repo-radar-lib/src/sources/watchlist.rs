use super::Source;
use crate::hosting::{ApiOutcome, Provider};
use crate::model::{Provenance, RepoId, RepoSnapshot};
use futures_util::future::join_all;
use std::sync::Arc;

const LOG_TARGET: &str = " watchlist";

/// A curated list of repositories that are always tracked.
#[derive(Debug, Clone)]
pub struct WatchlistSource {
    provider: Arc<Provider>,
    ids: Vec<RepoId>,
    detail_count: usize,
    enrich: bool,
}

impl WatchlistSource {
    /// Build the source from configured identities; invalid entries are skipped with a warning.
    ///
    /// When `enrich` is false only core metadata is fetched, without recent commits and
    /// contributors.
    #[must_use]
    pub fn new(provider: Arc<Provider>, entries: &[String], detail_count: usize, enrich: bool) -> Self {
        let ids = entries
            .iter()
            .filter_map(|entry| match RepoId::parse(entry) {
                Ok(id) => Some(id),
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Ignoring watchlist entry: {e:#}");
                    None
                }
            })
            .collect();

        Self {
            provider,
            ids,
            detail_count,
            enrich,
        }
    }

    #[must_use]
    pub fn ids(&self) -> &[RepoId] {
        &self.ids
    }

    async fn fetch_one(&self, id: &RepoId) -> Option<RepoSnapshot> {
        let mut snapshot = match self.provider.get_repo(id).await {
            ApiOutcome::Ok(snapshot) => snapshot,
            outcome => {
                log::warn!(target: LOG_TARGET, "Could not fetch watchlist entry '{id}': {outcome}");
                return None;
            }
        };

        if self.enrich {
            let (commits, contributors) = tokio::join!(
                self.provider.get_recent_commits(id, self.detail_count),
                self.provider.get_contributors(id, self.detail_count)
            );

            match commits {
                ApiOutcome::Ok(commits) => snapshot.annotations.recent_commits = commits,
                outcome => log::warn!(target: LOG_TARGET, "Could not fetch recent commits of '{id}': {outcome}"),
            }

            match contributors {
                ApiOutcome::Ok(contributors) => snapshot.annotations.contributors = contributors,
                outcome => log::warn!(target: LOG_TARGET, "Could not fetch contributors of '{id}': {outcome}"),
            }
        }

        log::info!(target: LOG_TARGET, "Watchlist: {id} ({} stars)", snapshot.stars);
        Some(snapshot.tagged(Provenance::Watchlist, self.provider.now()))
    }
}

impl Source for WatchlistSource {
    fn provenance(&self) -> Provenance {
        Provenance::Watchlist
    }

    async fn fetch(&self) -> Vec<RepoSnapshot> {
        // join_all keeps the configured order; the provider's throttler bounds concurrency
        join_all(self.ids.iter().map(|id| self.fetch_one(id)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::hosting::{BackoffPolicy, Cache, Client, Clock, ManualClock};
    use chrono::{DateTime, Utc};
    use core::time::Duration;
    use serde_json::json;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_provider(server: &MockServer) -> Arc<Provider> {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(DateTime::<Utc>::from_timestamp(1_704_067_200, 0).unwrap()));
        let client = Client::new(None, &server.uri(), &server.uri()).unwrap();
        let cache = Cache::new(Duration::from_secs(3600), Arc::clone(&clock));
        let backoff = BackoffPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        Arc::new(Provider::new(client, cache, backoff, 3, clock))
    }

    async fn mount_repo(server: &MockServer, full_name: &str, stars: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/repos/{full_name}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "full_name": full_name,
                "name": full_name.split('/').nth(1).unwrap(),
                "stargazers_count": stars,
                "forks_count": 1
            })))
            .mount(server)
            .await;
    }

    fn entries(ids: &[&str]) -> Vec<String> {
        ids.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn not_found_entry_is_skipped_and_order_kept() {
        let server = MockServer::start().await;
        for (name, stars) in [("a/one", 1), ("b/two", 2), ("d/four", 4), ("e/five", 5)] {
            mount_repo(&server, name, stars).await;
        }
        Mock::given(method("GET"))
            .and(path("/repos/c/three"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/[^/]+/[^/]+/(commits|contributors)$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let source = WatchlistSource::new(make_provider(&server), &entries(&["a/one", "b/two", "c/three", "d/four", "e/five"]), 5, true);
        let results = source.fetch().await;

        let ids: Vec<_> = results.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["a/one", "b/two", "d/four", "e/five"]);
        assert!(results.iter().all(|s| s.provenance == Provenance::Watchlist));
    }

    #[tokio::test]
    async fn enrichment_failure_keeps_entry() {
        let server = MockServer::start().await;
        mount_repo(&server, "a/one", 10).await;
        Mock::given(method("GET"))
            .and(path("/repos/a/one/commits"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/a/one/contributors"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"login": "jane", "contributions": 3}])))
            .mount(&server)
            .await;

        let source = WatchlistSource::new(make_provider(&server), &entries(&["a/one"]), 5, true);
        let results = source.fetch().await;

        assert_eq!(results.len(), 1);
        assert!(results[0].annotations.recent_commits.is_empty());
        assert_eq!(results[0].annotations.contributors.len(), 1);
    }

    #[tokio::test]
    async fn without_enrichment_only_metadata_is_fetched() {
        let server = MockServer::start().await;
        mount_repo(&server, "a/one", 10).await;
        Mock::given(method("GET"))
            .and(path_regex(r"/(commits|contributors)$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let source = WatchlistSource::new(make_provider(&server), &entries(&["a/one"]), 5, false);
        assert_eq!(source.fetch().await.len(), 1);
    }

    #[tokio::test]
    async fn rate_limited_metadata_skips_entry() {
        let server = MockServer::start().await;
        mount_repo(&server, "a/one", 10).await;
        Mock::given(method("GET"))
            .and(path("/repos/b/two"))
            .respond_with(ResponseTemplate::new(429))
            .expect(2)
            .mount(&server)
            .await;

        let source = WatchlistSource::new(make_provider(&server), &entries(&["a/one", "b/two"]), 5, false);
        let results = source.fetch().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id.as_str(), "a/one");
    }

    #[test]
    fn test_invalid_entries_are_dropped() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
        let provider = Arc::new(Provider::new(
            Client::new(None, "http://127.0.0.1:1", "http://127.0.0.1:1").unwrap(),
            Cache::new(Duration::from_secs(1), Arc::clone(&clock)),
            BackoffPolicy::default(),
            1,
            clock,
        ));

        let source = WatchlistSource::new(provider, &entries(&[" StabilityAI/StableDiffusion", "nope", "a/b/c", ""]), 5, true);
        let ids: Vec<_> = source.ids().iter().map(RepoId::as_str).collect();
        assert_eq!(ids, ["StabilityAI/StableDiffusion"]);
    }
}
