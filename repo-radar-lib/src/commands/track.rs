use super::Host;
use super::config::Config;
use super::data_dir::resolve_data_dir;
use super::logging::{LogLevel, init_logging};
use crate::Result;
use crate::cycle::{CycleMode, CycleOutcome, Tracker};
use crate::history::ProjectStore;
use crate::hosting::{Cache, Client, Clock, Provider, SystemClock};
use crate::model::Provenance;
use crate::reports::ReportArchive;
use crate::sources::HtmlListingParser;
use camino::Utf8PathBuf;
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::io::Write;
use std::sync::Arc;

const LOG_TARGET: &str = "     track";

/// Subdirectory of the data directory that holds the daily reports.
const REPORTS_DIR_NAME: &str = "daily";

/// Growth entries echoed to the console after a cycle.
const CONSOLE_GROWTH_ROWS: usize = 5;

#[derive(Parser, Debug)]
pub struct TrackArgs {
    /// Date the cycle is recorded under, as YYYY-MM-DD (default is today)
    #[arg(long, value_name = "DATE")]
    pub date: Option<NaiveDate>,

    /// Path to configuration file (default is `repo-radar.toml` in the data directory)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Directory holding the project history and reports
    #[arg(long, value_name = "PATH")]
    pub data_dir: Option<Utf8PathBuf>,

    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Shorthand for `--log-level debug`
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

pub async fn track<H: Host>(host: &mut H, args: &TrackArgs) -> Result<()> {
    init_logging(if args.verbose { LogLevel::Debug } else { args.log_level });

    let today = args.date.unwrap_or_else(|| Local::now().date_naive());

    match run_cycle(args, today).await {
        Ok(outcome) => {
            print_outcome(host, &outcome);
            Ok(())
        }
        Err(e) => {
            log::error!(target: LOG_TARGET, "Cycle for {today} failed");
            let _ = writeln!(host.error(), "❌ Cycle for {today} failed: {e}");
            host.exit(1);
            Err(e)
        }
    }
}

async fn run_cycle(args: &TrackArgs, today: NaiveDate) -> Result<CycleOutcome> {
    let data_dir = resolve_data_dir(args.data_dir.as_ref())?;
    let config = Config::load(&data_dir, args.config.as_ref())?;

    let token = args.github_token.as_deref().filter(|t| !t.trim().is_empty());
    if token.is_none() {
        log::warn!(target: LOG_TARGET, "No GitHub token provided, API quota will be very limited");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let client = Client::new(token, &config.api_base_url, &config.trending_base_url)?;
    let cache = Cache::new(config.cache_ttl, Arc::clone(&clock));
    let provider = Arc::new(Provider::new(
        client,
        cache,
        config.backoff(),
        config.max_concurrent_requests,
        clock,
    ));

    let tracker = Tracker::new(
        provider,
        Arc::new(HtmlListingParser),
        ProjectStore::new(data_dir.as_std_path()),
        ReportArchive::new(data_dir.join(REPORTS_DIR_NAME).into_std_path_buf()),
        config.cycle_options(),
    );

    tracker.run(today).await
}

fn print_outcome<H: Host>(host: &mut H, outcome: &CycleOutcome) {
    let summary = outcome.view.summary();
    let count = |provenance: Provenance| summary.per_source.get(&provenance).copied().unwrap_or_default();

    let mut out = host.output();
    let _ = writeln!(out, "✅ Report for {} written to {}", outcome.date, outcome.report_path.display());
    let _ = writeln!(out, "   - {} trending project(s)", count(Provenance::Trending));
    let _ = writeln!(out, "   - {} search result(s)", count(Provenance::Search));
    let _ = writeln!(out, "   - {} watchlist project(s)", count(Provenance::Watchlist));
    let _ = writeln!(
        out,
        "   - {} distinct project(s) with {} star(s)",
        summary.total_projects, summary.total_stars
    );
    let _ = writeln!(
        out,
        "   - history: {} new, {} updated, {} refreshed",
        outcome.changes.created, outcome.changes.updated, outcome.changes.refreshed
    );

    if outcome.changes.changes.is_empty() {
        let _ = writeln!(out, "   - no star growth since the previous observation");
    } else {
        let _ = writeln!(out, "   - {} project(s) grew:", outcome.changes.changes.len());
        for delta in outcome.changes.changes.iter().take(CONSOLE_GROWTH_ROWS) {
            let _ = writeln!(out, "       {} +{} ({})", delta.id, delta.delta, delta.current_stars);
        }
    }

    if outcome.mode == CycleMode::Degraded {
        let _ = writeln!(out, "⚠️ Degraded run: keyword search and watchlist enrichment were skipped");
    }

    for provenance in &outcome.timed_out {
        let _ = writeln!(out, "⚠️ Source {provenance} timed out and contributed nothing");
    }

    if outcome.pruned_reports > 0 {
        let _ = writeln!(out, "   - pruned {} old report(s)", outcome.pruned_reports);
    }
}
