use super::{CycleMode, QuotaGate};
use crate::Result;
use crate::aggregate::{AggregatedView, SourceBatches, aggregate};
use crate::history::{CycleChanges, ProjectStore};
use crate::hosting::Provider;
use crate::model::{Provenance, RepoSnapshot};
use crate::reports::{DailyReport, ReportArchive, generate_markdown};
use crate::sources::{ListingParser, NewProjectsQuery, SearchSource, Source, TrendingSource, WatchlistSource};
use chrono::{Days, NaiveDate};
use core::time::Duration;
use ohno::IntoAppError;
use std::path::PathBuf;
use std::sync::Arc;

const LOG_TARGET: &str = "   tracker";

const SECONDS_PER_DAY: u64 = 86_400;

/// What a cycle fetches and how long it may take.
#[derive(Debug, Clone)]
pub struct CycleOptions {
    pub keywords: Vec<String>,
    pub search_languages: Vec<String>,
    pub trending_languages: Vec<String>,
    pub trending_since: String,
    pub watchlist: Vec<String>,
    pub per_keyword_cap: usize,

    /// How far back the new-projects query looks; `None` disables it.
    pub new_projects_window: Option<Duration>,
    pub new_projects_cap: usize,
    pub watchlist_detail_count: usize,
    pub highlights_size: usize,
    pub report_retention: usize,
    pub quota: QuotaGate,
    pub source_timeout: Duration,
    pub cycle_deadline: Duration,
}

/// Result of a committed cycle.
#[derive(Debug)]
pub struct CycleOutcome {
    pub date: NaiveDate,
    pub mode: CycleMode,
    pub view: AggregatedView,
    pub changes: CycleChanges,

    /// Sources that ran out of time and contributed nothing.
    pub timed_out: Vec<Provenance>,
    pub report_path: PathBuf,
    pub pruned_reports: usize,
}

/// Runs fetch cycles against one provider and one data directory.
#[derive(Debug)]
pub struct Tracker {
    provider: Arc<Provider>,
    parser: Arc<dyn ListingParser>,
    store: ProjectStore,
    archive: ReportArchive,
    options: CycleOptions,
}

impl Tracker {
    #[must_use]
    pub fn new(
        provider: Arc<Provider>,
        parser: Arc<dyn ListingParser>,
        store: ProjectStore,
        archive: ReportArchive,
        options: CycleOptions,
    ) -> Self {
        Self {
            provider,
            parser,
            store,
            archive,
            options,
        }
    }

    /// Run one cycle dated `today`.
    ///
    /// The quota gate and the source fan-out must finish within the cycle deadline, or the
    /// cycle fails without touching persisted state. Afterwards the project table is
    /// updated under the store lock and the day's report is written.
    pub async fn run(&self, today: NaiveDate) -> Result<CycleOutcome> {
        let deadline = self.options.cycle_deadline;
        log::info!(target: LOG_TARGET, "Starting cycle for {today}");

        let fetch = async {
            let budget = deadline.saturating_sub(self.options.source_timeout);
            let mode = self.options.quota.check(&self.provider, budget).await;
            let (batches, timed_out) = self.fetch_all(mode, today).await;
            (mode, batches, timed_out)
        };

        let (mode, batches, timed_out) = tokio::time::timeout(deadline, fetch)
            .await
            .into_app_err_with(|| format!("fetching sources did not finish within the cycle deadline of {}s", deadline.as_secs()))?;

        let view = aggregate(batches, self.options.highlights_size);
        log::info!(
            target: LOG_TARGET,
            "Aggregated {} project(s) with {} star(s)",
            view.summary().total_projects,
            view.summary().total_stars
        );

        let lock = self.store.lock().await?;
        let mut table = self.store.load(&lock)?;
        let changes = table.apply_cycle(view.ranked(), today);
        self.store.commit(&lock, &table)?;

        let report = DailyReport {
            date: today,
            generated_at: self.provider.now(),
            view: &view,
            changes: &changes.changes,
            degraded: mode == CycleMode::Degraded,
        };

        let mut text = String::new();
        generate_markdown(&report, &mut text)?;
        let report_path = self.archive.write(today, &text)?;
        let pruned_reports = self.archive.prune(self.options.report_retention)?.len();
        drop(lock);

        log::info!(target: LOG_TARGET, "Cycle for {today} complete: {} project(s) grew", changes.changes.len());

        Ok(CycleOutcome {
            date: today,
            mode,
            view,
            changes,
            timed_out,
            report_path,
            pruned_reports,
        })
    }

    async fn fetch_all(&self, mode: CycleMode, today: NaiveDate) -> (SourceBatches, Vec<Provenance>) {
        let options = &self.options;
        let full = mode == CycleMode::Full;

        let trending = TrendingSource::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.parser),
            options.trending_languages.clone(),
            &options.trending_since,
            &options.keywords,
        );

        let search = full.then(|| {
            SearchSource::new(
                Arc::clone(&self.provider),
                &options.keywords,
                options.search_languages.clone(),
                options.per_keyword_cap,
                self.new_projects_query(today),
            )
        });

        let watchlist = WatchlistSource::new(Arc::clone(&self.provider), &options.watchlist, options.watchlist_detail_count, full);

        if !full {
            log::warn!(target: LOG_TARGET, "Degraded cycle: skipping keyword search and watchlist enrichment");
        }

        let (trending, search, watchlist) = tokio::join!(
            self.timed(&trending),
            async {
                match &search {
                    Some(search) => self.timed(search).await,
                    None => Some(Vec::new()),
                }
            },
            self.timed(&watchlist),
        );

        let mut timed_out = Vec::new();
        let mut take = |batch: Option<Vec<RepoSnapshot>>, provenance: Provenance| {
            batch.unwrap_or_else(|| {
                timed_out.push(provenance);
                Vec::new()
            })
        };

        let batches = SourceBatches {
            trending: take(trending, Provenance::Trending),
            search: take(search, Provenance::Search),
            watchlist: take(watchlist, Provenance::Watchlist),
        };

        (batches, timed_out)
    }

    /// Run a source under the per-source timeout; `None` when it ran out of time.
    async fn timed<S: Source>(&self, source: &S) -> Option<Vec<RepoSnapshot>> {
        let provenance = source.provenance();

        if let Ok(snapshots) = tokio::time::timeout(self.options.source_timeout, source.fetch()).await {
            log::info!(target: LOG_TARGET, "Source {provenance} produced {} snapshot(s)", snapshots.len());
            Some(snapshots)
        } else {
            log::warn!(
                target: LOG_TARGET,
                "Source {provenance} did not finish within {}s and contributes nothing",
                self.options.source_timeout.as_secs()
            );
            None
        }
    }

    fn new_projects_query(&self, today: NaiveDate) -> Option<NewProjectsQuery> {
        let window = self.options.new_projects_window?;
        let created_after = today.checked_sub_days(Days::new(window.as_secs() / SECONDS_PER_DAY))?;

        Some(NewProjectsQuery {
            created_after,
            cap: self.options.new_projects_cap,
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::cycle::LowQuotaPolicy;
    use crate::hosting::{BackoffPolicy, Cache, Client, Clock, ManualClock};
    use crate::model::RepoId;
    use crate::sources::HtmlListingParser;
    use chrono::{DateTime, Utc};
    use serde_json::json;
    use std::fs;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    fn options(policy: LowQuotaPolicy) -> CycleOptions {
        CycleOptions {
            keywords: vec!["llm".to_string()],
            search_languages: vec!["python".to_string()],
            trending_languages: vec!["Python".to_string()],
            trending_since: "daily".to_string(),
            watchlist: vec!["ollama/ollama".to_string()],
            per_keyword_cap: 10,
            new_projects_window: None,
            new_projects_cap: 20,
            watchlist_detail_count: 3,
            highlights_size: 10,
            report_retention: 90,
            quota: QuotaGate {
                reserve: 100,
                policy,
                max_wait: Duration::from_secs(60),
            },
            source_timeout: Duration::from_secs(10),
            cycle_deadline: Duration::from_secs(30),
        }
    }

    fn tracker(server: &MockServer, dir: &std::path::Path, options: CycleOptions) -> Tracker {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(DateTime::<Utc>::from_timestamp(1_712_000_000, 0).unwrap()));
        let client = Client::new(Some("token"), &server.uri(), &server.uri()).unwrap();
        let cache = Cache::new(Duration::from_secs(3600), Arc::clone(&clock));
        let backoff = BackoffPolicy {
            max_retries: 0,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };
        let provider = Arc::new(Provider::new(client, cache, backoff, 4, clock));

        Tracker::new(
            provider,
            Arc::new(HtmlListingParser),
            ProjectStore::new(dir),
            ReportArchive::new(dir.join("daily")),
            options,
        )
    }

    fn repo_json(full_name: &str, stars: u64) -> serde_json::Value {
        json!({
            "full_name": full_name,
            "name": full_name.split('/').nth(1).unwrap(),
            "description": "an llm project",
            "stargazers_count": stars,
            "forks_count": 7,
            "language": "Python"
        })
    }

    fn trending_html(id: &str, stars: &str) -> String {
        format!(
            r#"<html><article class="Box-row"><h2><a href="/{id}">{id}</a></h2><p>Local llm runner</p><a href="/{id}/stargazers">{stars}</a></article></html>"#
        )
    }

    async fn mount_quota(server: &MockServer, remaining: u64) {
        Mock::given(method("GET"))
            .and(path("/rate_limit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resources": {"core": {"limit": 5000, "remaining": remaining, "reset": 1_712_003_600}}
            })))
            .mount(server)
            .await;
    }

    async fn mount_sources(server: &MockServer, search_stars: u64, watch_stars: u64) {
        Mock::given(method("GET"))
            .and(path("/python"))
            .respond_with(ResponseTemplate::new(200).set_body_string(trending_html("hot/runner", "1.5k")))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/search/repositories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 2,
                "items": [repo_json("big/model", search_stars), repo_json("hot/runner", 1520)]
            })))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/repos/ollama/ollama"))
            .respond_with(ResponseTemplate::new(200).set_body_json(repo_json("ollama/ollama", watch_stars)))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/ollama/ollama/(commits|contributors)$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_full_cycle_commits_and_reports() {
        let server = MockServer::start().await;
        mount_quota(&server, 5000).await;
        mount_sources(&server, 900, 5000).await;
        let tmp = tempfile::tempdir().unwrap();

        let outcome = tracker(&server, tmp.path(), options(LowQuotaPolicy::Degrade)).run(day(1)).await.unwrap();

        assert_eq!(outcome.mode, CycleMode::Full);
        assert!(outcome.timed_out.is_empty());
        let ids: Vec<_> = outcome.view.ranked().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["ollama/ollama", "hot/runner", "big/model"]);

        // trending came first, but the exact API count replaced the scraped one
        let hot = &outcome.view.ranked()[1];
        assert_eq!(hot.provenance, Provenance::Trending);
        assert_eq!(hot.stars, 1520);

        assert_eq!(outcome.changes.created, 3);
        assert!(outcome.changes.changes.is_empty());
        assert!(tmp.path().join("projects.json").exists());
        assert_eq!(outcome.report_path, tmp.path().join("daily").join("2024-04-01.md"));

        let report = fs::read_to_string(&outcome.report_path).unwrap();
        assert!(report.contains("# Repository radar - 2024-04-01"));
    }

    #[tokio::test]
    async fn test_next_day_reports_growth_and_rerun_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();

        let server = MockServer::start().await;
        mount_quota(&server, 5000).await;
        mount_sources(&server, 900, 5000).await;
        let _ = tracker(&server, tmp.path(), options(LowQuotaPolicy::Degrade)).run(day(1)).await.unwrap();

        let server = MockServer::start().await;
        mount_quota(&server, 5000).await;
        mount_sources(&server, 950, 5000).await;
        let first = tracker(&server, tmp.path(), options(LowQuotaPolicy::Degrade)).run(day(2)).await.unwrap();
        let committed = fs::read_to_string(tmp.path().join("projects.json")).unwrap();

        let rerun = tracker(&server, tmp.path(), options(LowQuotaPolicy::Degrade)).run(day(2)).await.unwrap();

        assert_eq!(first.changes.changes.len(), 1);
        assert_eq!(first.changes.changes[0].id.as_str(), "big/model");
        assert_eq!(first.changes.changes[0].delta, 50);
        assert_eq!(rerun.changes.changes, first.changes.changes);
        assert_eq!(rerun.changes.refreshed, 3);
        assert_eq!(fs::read_to_string(tmp.path().join("projects.json")).unwrap(), committed);

        let store = ProjectStore::new(tmp.path());
        let lock = store.lock().await.unwrap();
        let table = store.load(&lock).unwrap();
        let record = table.get(&RepoId::parse("big/model").unwrap()).unwrap();
        assert_eq!(record.stars, 950);
        assert_eq!(record.history.len(), 1);
        assert_eq!(record.history[0].stars, 900);
    }

    #[tokio::test]
    async fn test_low_quota_degrades() {
        let server = MockServer::start().await;
        mount_quota(&server, 10).await;
        mount_sources(&server, 900, 5000).await;

        let tmp = tempfile::tempdir().unwrap();
        let outcome = tracker(&server, tmp.path(), options(LowQuotaPolicy::Degrade)).run(day(1)).await.unwrap();

        assert_eq!(outcome.mode, CycleMode::Degraded);
        assert_eq!(outcome.view.summary().per_source[&Provenance::Search], 0);
        assert_eq!(outcome.view.summary().per_source[&Provenance::Watchlist], 1);

        let requests = server.received_requests().await.unwrap();
        assert!(requests.iter().all(|r| !r.url.path().ends_with("/commits")));
        assert!(requests.iter().all(|r| r.url.path() != "/search/repositories"));

        let report = fs::read_to_string(&outcome.report_path).unwrap();
        assert!(report.contains("Degraded run"));
    }

    #[tokio::test]
    async fn test_unreachable_quota_degrades() {
        let server = MockServer::start().await;
        mount_sources(&server, 900, 5000).await;

        let tmp = tempfile::tempdir().unwrap();
        let outcome = tracker(&server, tmp.path(), options(LowQuotaPolicy::Defer)).run(day(1)).await.unwrap();

        assert_eq!(outcome.mode, CycleMode::Degraded);
    }

    #[tokio::test]
    async fn test_slow_source_times_out_alone() {
        let server = MockServer::start().await;
        mount_quota(&server, 5000).await;

        Mock::given(method("GET"))
            .and(path("/python"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(trending_html("hot/runner", "10"))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;
        mount_sources(&server, 900, 5000).await;

        let mut opts = options(LowQuotaPolicy::Degrade);
        opts.source_timeout = Duration::from_millis(500);

        let tmp = tempfile::tempdir().unwrap();
        let outcome = tracker(&server, tmp.path(), opts).run(day(1)).await.unwrap();

        assert_eq!(outcome.timed_out, [Provenance::Trending]);
        assert_eq!(outcome.view.summary().per_source[&Provenance::Trending], 0);
        assert_eq!(outcome.view.summary().per_source[&Provenance::Search], 2);
    }

    #[tokio::test]
    async fn test_defer_leaves_room_for_the_sources() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rate_limit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resources": {"core": {"limit": 5000, "remaining": 10, "reset": 1_712_000_002}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/python"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(trending_html("hot/runner", "10"))
                    .set_delay(Duration::from_millis(800)),
            )
            .mount(&server)
            .await;
        mount_sources(&server, 900, 5000).await;

        // waiting 2s for the reset would leave the 800ms board no room within 2.5s
        let mut opts = options(LowQuotaPolicy::Defer);
        opts.source_timeout = Duration::from_secs(1);
        opts.cycle_deadline = Duration::from_millis(2500);

        let tmp = tempfile::tempdir().unwrap();
        let outcome = tracker(&server, tmp.path(), opts).run(day(1)).await.unwrap();

        assert_eq!(outcome.mode, CycleMode::Degraded);
        assert!(outcome.timed_out.is_empty());
        assert_eq!(outcome.view.summary().per_source[&Provenance::Trending], 1);
        assert!(tmp.path().join("projects.json").exists());
    }

    #[tokio::test]
    async fn test_deadline_fails_cycle_without_committing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rate_limit"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let mut opts = options(LowQuotaPolicy::Degrade);
        opts.cycle_deadline = Duration::from_millis(300);

        let tmp = tempfile::tempdir().unwrap();
        let result = tracker(&server, tmp.path(), opts).run(day(1)).await;

        let _ = result.unwrap_err();
        assert!(!tmp.path().join("projects.json").exists());
        assert!(!tmp.path().join("daily").exists());
    }

    #[test]
    fn test_new_projects_query_window() {
        let mut opts = options(LowQuotaPolicy::Degrade);
        opts.new_projects_window = Some(Duration::from_secs(7 * SECONDS_PER_DAY));

        let server_uri = "http://127.0.0.1:9";
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
        let client = Client::new(None, server_uri, server_uri).unwrap();
        let provider = Arc::new(Provider::new(
            client,
            Cache::new(Duration::from_secs(1), Arc::clone(&clock)),
            BackoffPolicy::default(),
            1,
            clock,
        ));
        let tmp = tempfile::tempdir().unwrap();
        let tracker = Tracker::new(
            provider,
            Arc::new(HtmlListingParser),
            ProjectStore::new(tmp.path()),
            ReportArchive::new(tmp.path()),
            opts,
        );

        let query = tracker.new_projects_query(day(10)).unwrap();
        assert_eq!(query.created_after, day(3));
        assert_eq!(query.cap, 20);
    }
}
