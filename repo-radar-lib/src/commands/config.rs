use crate::Result;
use crate::cycle::{CycleOptions, LowQuotaPolicy, QuotaGate};
use crate::hosting::BackoffPolicy;
use crate::model::RepoId;
use crate::sources::normalize_keywords;
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use ohno::{EnrichableExt, IntoAppError, app_err, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

const LOG_TARGET: &str = "    config";

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// Name of the configuration file looked up in the data directory
pub const CONFIG_FILE_NAME: &str = "repo-radar.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Domain keywords driving search and filtering trending entries
    pub keywords: Vec<String>,

    /// Languages every keyword search is restricted to
    #[serde(default)]
    pub search_languages: Vec<String>,

    /// Trending boards to monitor
    #[serde(default)]
    pub trending_languages: Vec<String>,

    /// Trending window (daily, weekly, monthly)
    #[serde(default = "default_trending_since")]
    pub trending_since: String,

    /// Curated `owner/name` identities
    #[serde(default)]
    pub watchlist: Vec<String>,

    /// Search page size per keyword
    #[serde(default = "default_per_keyword_cap")]
    pub per_keyword_cap: usize,

    /// Window of the new-projects search; absent disables it
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub new_projects_window: Option<Duration>,

    /// Page size of the new-projects search
    #[serde(default = "default_new_projects_cap")]
    pub new_projects_cap: usize,

    /// Commits and contributors fetched per watchlist identity
    #[serde(default = "default_watchlist_detail_count")]
    pub watchlist_detail_count: usize,

    /// Number of projects in the highlights view
    #[serde(default = "default_highlights_size")]
    pub highlights_size: usize,

    /// Daily reports kept
    #[serde(default = "default_report_retention")]
    pub report_retention: usize,

    /// Duration API responses are reused
    #[serde(default = "default_cache_ttl", with = "humantime_serde")]
    pub cache_ttl: Duration,

    /// Remaining requests below which the low-quota policy applies
    #[serde(default = "default_quota_reserve")]
    pub quota_reserve: u64,

    #[serde(default = "default_low_quota_policy")]
    pub low_quota_policy: LowQuotaPolicy,

    /// Longest a deferred cycle waits for the quota to reset
    #[serde(default = "default_max_quota_wait", with = "humantime_serde")]
    pub max_quota_wait: Duration,

    /// Retries of a rate-limited or transient request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay", with = "humantime_serde")]
    pub retry_base_delay: Duration,

    #[serde(default = "default_retry_max_delay", with = "humantime_serde")]
    pub retry_max_delay: Duration,

    /// Requests in flight at once
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Time allowed for each source
    #[serde(default = "default_source_timeout", with = "humantime_serde")]
    pub source_timeout: Duration,

    /// Time allowed for the whole fetch phase
    #[serde(default = "default_cycle_deadline", with = "humantime_serde")]
    pub cycle_deadline: Duration,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_trending_base_url")]
    pub trending_base_url: String,
}

fn default_trending_since() -> String {
    "daily".to_string()
}

const fn default_per_keyword_cap() -> usize {
    10
}

const fn default_new_projects_cap() -> usize {
    20
}

const fn default_watchlist_detail_count() -> usize {
    5
}

const fn default_highlights_size() -> usize {
    crate::aggregate::DEFAULT_HIGHLIGHTS_SIZE
}

const fn default_report_retention() -> usize {
    90
}

const fn default_cache_ttl() -> Duration {
    crate::hosting::DEFAULT_CACHE_TTL
}

const fn default_quota_reserve() -> u64 {
    100
}

const fn default_low_quota_policy() -> LowQuotaPolicy {
    LowQuotaPolicy::Degrade
}

const fn default_max_quota_wait() -> Duration {
    Duration::from_secs(15 * 60)
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_retry_base_delay() -> Duration {
    Duration::from_secs(1)
}

const fn default_retry_max_delay() -> Duration {
    Duration::from_secs(60)
}

const fn default_max_concurrent_requests() -> usize {
    5
}

const fn default_source_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

const fn default_cycle_deadline() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_trending_base_url() -> String {
    "https://github.com/trending".to_string()
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// Without an explicit path, `repo-radar.toml` in the data directory is used if present.
    pub fn load(data_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading repo-radar configuration file '{path}'"))?;
            (path.clone(), text)
        } else {
            let path = data_dir.join(CONFIG_FILE_NAME);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::debug!(target: LOG_TARGET, "No configuration at '{path}', using defaults");
                    return Ok(Self::default());
                }
                Err(e) => return Err(e).into_app_err_with(|| format!("reading repo-radar configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config
            .validate()
            .map_err(|e| e.enrich_with(|| format!("validating configuration file '{final_path}'")))?;

        Ok(config)
    }

    /// Save the default configuration to a TOML file
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent).into_app_err_with(|| format!("creating directory '{parent}'"))?;
        }

        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.keywords.is_empty() {
            bail!("keywords must contain at least one keyword");
        }

        if let Some(i) = self.keywords.iter().position(|k| k.trim().is_empty()) {
            bail!("keywords[{i}] is blank");
        }

        for (name, value) in [
            ("per_keyword_cap", self.per_keyword_cap),
            ("new_projects_cap", self.new_projects_cap),
            ("highlights_size", self.highlights_size),
            ("report_retention", self.report_retention),
            ("max_concurrent_requests", self.max_concurrent_requests),
        ] {
            if value == 0 {
                bail!("{name} must be at least 1");
            }
        }

        if self.source_timeout > self.cycle_deadline {
            return Err(app_err!(
                "source_timeout ({}s) must not exceed cycle_deadline ({}s)",
                self.source_timeout.as_secs(),
                self.cycle_deadline.as_secs()
            ));
        }

        if self.retry_base_delay > self.retry_max_delay {
            return Err(app_err!(
                "retry_base_delay ({}ms) must not exceed retry_max_delay ({}ms)",
                self.retry_base_delay.as_millis(),
                self.retry_max_delay.as_millis()
            ));
        }

        if !matches!(self.trending_since.as_str(), "daily" | "weekly" | "monthly") {
            bail!("trending_since must be daily, weekly, or monthly, got '{}'", self.trending_since);
        }

        for (name, value) in [("api_base_url", &self.api_base_url), ("trending_base_url", &self.trending_base_url)] {
            let _ = url::Url::parse(value).into_app_err_with(|| format!("{name} is not a valid URL: '{value}'"))?;
        }

        for entry in &self.watchlist {
            if let Err(e) = RepoId::parse(entry) {
                return Err(e.enrich_with(|| format!("invalid watchlist entry '{entry}'")));
            }
        }

        Ok(())
    }

    #[must_use]
    pub const fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_retries: self.max_retries,
            base_delay: self.retry_base_delay,
            max_delay: self.retry_max_delay,
        }
    }

    #[must_use]
    pub fn cycle_options(&self) -> CycleOptions {
        CycleOptions {
            keywords: normalize_keywords(&self.keywords),
            search_languages: self.search_languages.clone(),
            trending_languages: self.trending_languages.clone(),
            trending_since: self.trending_since.clone(),
            watchlist: self.watchlist.clone(),
            per_keyword_cap: self.per_keyword_cap,
            new_projects_window: self.new_projects_window,
            new_projects_cap: self.new_projects_cap,
            watchlist_detail_count: self.watchlist_detail_count,
            highlights_size: self.highlights_size,
            report_retention: self.report_retention,
            quota: QuotaGate {
                reserve: self.quota_reserve,
                policy: self.low_quota_policy,
                max_wait: self.max_quota_wait,
            },
            source_timeout: self.source_timeout,
            cycle_deadline: self.cycle_deadline,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("default_config.toml should be valid TOML that deserializes to Config")
    }
}
