//! GitHub API client
//!
//! Minimal client that performs one GET per call and classifies the response. Retries,
//! caching and throttling are layered on top by [`Provider`](super::Provider).

use super::outcome::ApiOutcome;
use chrono::{DateTime, Utc};
use core::time::Duration;
use ohno::{EnrichableExt, IntoAppError};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::Deserialize;
use std::sync::Arc;

/// Timeout for a single request, connect to last body byte.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const USER_AGENT: &str = "repo-radar";

#[derive(Debug, Clone, Deserialize)]
pub struct ApiRepository {
    pub full_name: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    pub forks_count: Option<u64>,
    pub language: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub license: Option<ApiLicense>,
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiLicense {
    pub name: Option<String>,
    pub spdx_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub items: Vec<ApiRepository>,
}

#[derive(Debug, Deserialize)]
pub struct ApiCommit {
    pub sha: String,
    pub commit: ApiCommitDetail,
    pub author: Option<ApiUser>,
}

#[derive(Debug, Deserialize)]
pub struct ApiCommitDetail {
    pub message: String,
    pub author: Option<ApiGitAuthor>,
}

#[derive(Debug, Deserialize)]
pub struct ApiGitAuthor {
    pub name: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiUser {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiContributor {
    pub login: Option<String>,
    #[serde(default)]
    pub contributions: u64,
}

#[derive(Debug, Deserialize)]
pub struct RateLimitResponse {
    pub resources: RateLimitResources,
}

#[derive(Debug, Deserialize)]
pub struct RateLimitResources {
    pub core: RateLimitBucket,
}

#[derive(Debug, Deserialize)]
pub struct RateLimitBucket {
    pub limit: u64,
    pub remaining: u64,
    pub reset: i64,
}

/// Rate limit information from response headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,

    /// The server's `Retry-After` hint, if any.
    pub retry_after: Option<Duration>,
}

/// Hosting API client
#[derive(Debug, Clone)]
#[expect(clippy::struct_field_names, reason = "the client fields store the underlying HTTP clients")]
pub struct Client {
    api_client: reqwest::Client,
    listing_client: reqwest::Client,
    api_base_url: String,
    listing_base_url: String,
}

impl Client {
    /// Create a client with an optional authentication token.
    ///
    /// The token is only sent to the API; listing pages are always fetched anonymously.
    pub fn new(token: Option<&str>, api_base_url: &str, listing_base_url: &str) -> crate::Result<Self> {
        use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};

        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

        if let Some(t) = token {
            let mut auth_val = HeaderValue::from_str(&format!("token {t}")).into_app_err("invalid characters in API token")?;
            auth_val.set_sensitive(true);
            let _ = headers.insert(AUTHORIZATION, auth_val);
        }

        let api_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .into_app_err("building HTTP client")?;

        let listing_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .into_app_err("building HTTP client")?;

        Ok(Self {
            api_client,
            listing_client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            listing_base_url: listing_base_url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    #[must_use]
    pub fn listing_base_url(&self) -> &str {
        &self.listing_base_url
    }

    /// GET an API path (relative to the base URL) and return the body of a successful response.
    pub async fn api_get(&self, path: &str, query: &[(&str, String)]) -> ApiOutcome<String> {
        let url = format!("{}/{}", self.api_base_url, path.trim_start_matches('/'));
        classify(self.api_client.get(&url).query(query).send().await, &url).await
    }

    /// GET a raw listing page, `{listing_base}/{slug}?since={since}`.
    pub async fn listing_get(&self, slug: &str, since: &str) -> ApiOutcome<String> {
        let url = format!("{}/{slug}", self.listing_base_url);
        classify(self.listing_client.get(&url).query(&[("since", since)]).send().await, &url).await
    }
}

async fn classify(result: reqwest::Result<reqwest::Response>, url: &str) -> ApiOutcome<String> {
    let resp = match result {
        Ok(r) => r,
        Err(e) => {
            // connection failures and timeouts are transient
            return ApiOutcome::Transient(Arc::new(ohno::AppError::from(e).enrich_with(|| format!("requesting '{url}'"))));
        }
    };

    let status = resp.status();
    if status.is_success() {
        return match resp.text().await {
            Ok(body) => ApiOutcome::Ok(body),
            Err(e) => ApiOutcome::Transient(Arc::new(ohno::AppError::from(e).enrich_with(|| format!("reading response body from '{url}'")))),
        };
    }

    let rate_limit = extract_rate_limit_from_headers(resp.headers());

    if status == StatusCode::NOT_FOUND {
        return ApiOutcome::NotFound;
    }

    if is_rate_limited(status, resp.headers()) {
        return ApiOutcome::RateLimited(rate_limit);
    }

    let error = ohno::app_err!("HTTP {status} from '{url}'");
    if status.is_server_error() {
        ApiOutcome::Transient(Arc::new(error))
    } else {
        ApiOutcome::Failed(Arc::new(error))
    }
}

/// 429 always; 403 only when the quota is spent or the server asks us to back off.
fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    match status {
        StatusCode::TOO_MANY_REQUESTS => true,
        StatusCode::FORBIDDEN => {
            header_value::<u64>(headers, "x-ratelimit-remaining") == Some(0) || headers.contains_key(RETRY_AFTER)
        }
        _ => false,
    }
}

fn header_value<T: core::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers.get(name)?.to_str().ok()?.trim().parse::<T>().ok()
}

/// Extract rate limit information from API response headers
fn extract_rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let retry_after = header_value::<u64>(headers, RETRY_AFTER.as_str()).map(Duration::from_secs);

    let remaining = header_value::<u64>(headers, "x-ratelimit-remaining");
    let reset_at = header_value::<i64>(headers, "x-ratelimit-reset").and_then(|ts| DateTime::from_timestamp(ts, 0));

    match (remaining, reset_at, retry_after) {
        (Some(remaining), Some(reset_at), _) => Some(RateLimitInfo {
            remaining,
            reset_at,
            retry_after,
        }),
        (_, _, Some(delay)) => Some(RateLimitInfo {
            remaining: remaining.unwrap_or(0),
            reset_at: Utc::now() + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::hours(1)),
            retry_after,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_repository_deserialize() {
        let json = r#"{
            "full_name": "ollama/ollama",
            "name": "ollama",
            "description": "Get up and running with LLMs",
            "stargazers_count": 1000,
            "forks_count": 200,
            "language": "Go",
            "topics": ["llm", "go"],
            "created_at": "2023-06-26T19:00:00Z",
            "license": {"name": "MIT License", "spdx_id": "MIT"},
            "html_url": "https://github.com/ollama/ollama"
        }"#;

        let repo: ApiRepository = serde_json::from_str(json).unwrap();
        assert_eq!(repo.full_name, "ollama/ollama");
        assert_eq!(repo.stargazers_count, 1000);
        assert_eq!(repo.forks_count, Some(200));
        assert_eq!(repo.topics.len(), 2);
        assert!(repo.updated_at.is_none());
        assert_eq!(repo.license.unwrap().spdx_id.as_deref(), Some("MIT"));
    }

    #[test]
    fn test_repository_deserialize_minimal() {
        let json = r#"{"full_name": "a/b", "name": "b"}"#;
        let repo: ApiRepository = serde_json::from_str(json).unwrap();
        assert_eq!(repo.stargazers_count, 0);
        assert!(repo.forks_count.is_none());
        assert!(repo.license.is_none());
    }

    #[test]
    fn test_commit_deserialize() {
        let json = r#"{
            "sha": "abc123",
            "commit": {"message": "Fix bug\n\nDetails", "author": {"name": "Jane", "date": "2024-01-01T00:00:00Z"}},
            "author": {"login": "jane"}
        }"#;

        let commit: ApiCommit = serde_json::from_str(json).unwrap();
        assert_eq!(commit.sha, "abc123");
        assert_eq!(commit.author.unwrap().login, "jane");
        assert!(commit.commit.message.starts_with("Fix bug"));
    }

    #[test]
    fn test_rate_limit_response_deserialize() {
        let json = r#"{"resources": {"core": {"limit": 5000, "remaining": 4321, "reset": 1704067200, "used": 679}}, "rate": {}}"#;
        let rl: RateLimitResponse = serde_json::from_str(json).unwrap();
        assert_eq!(rl.resources.core.limit, 5000);
        assert_eq!(rl.resources.core.remaining, 4321);
    }

    #[test]
    fn test_extract_rate_limit_from_headers() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("4999"));
        let _ = headers.insert("x-ratelimit-reset", HeaderValue::from_static("1704067200"));

        let rate_limit = extract_rate_limit_from_headers(&headers).unwrap();

        assert_eq!(rate_limit.remaining, 4999);
        assert_eq!(rate_limit.reset_at.timestamp(), 1_704_067_200);
        assert_eq!(rate_limit.retry_after, None);
    }

    #[test]
    fn test_extract_rate_limit_retry_after_only() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));

        let rate_limit = extract_rate_limit_from_headers(&headers).unwrap();
        assert_eq!(rate_limit.remaining, 0);
        assert_eq!(rate_limit.retry_after, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_extract_rate_limit_missing_headers() {
        assert!(extract_rate_limit_from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_extract_rate_limit_invalid_values() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("invalid"));
        let _ = headers.insert("x-ratelimit-reset", HeaderValue::from_static("1704067200"));
        assert!(extract_rate_limit_from_headers(&headers).is_none());
    }

    #[test]
    fn test_forbidden_without_hints_is_not_rate_limited() {
        assert!(!is_rate_limited(StatusCode::FORBIDDEN, &HeaderMap::new()));

        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        assert!(is_rate_limited(StatusCode::FORBIDDEN, &headers));
        assert!(is_rate_limited(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new()));
    }

    #[test]
    fn test_client_trims_base_urls() {
        let client = Client::new(Some("secret"), "https://api.github.com/", "https://github.com/trending/").unwrap();
        assert_eq!(client.api_base_url(), "https://api.github.com");
        assert_eq!(client.listing_base_url(), "https://github.com/trending");
    }

    #[tokio::test]
    async fn test_api_get_classifies_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/a/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/a/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/a/limited"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("x-ratelimit-remaining", "0")
                    .insert_header("x-ratelimit-reset", "1704067200"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/a/broken"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/a/gone"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;

        let client = Client::new(None, &server.uri(), &server.uri()).unwrap();

        assert!(matches!(client.api_get("repos/a/ok", &[]).await, ApiOutcome::Ok(body) if body == "{}"));
        assert!(matches!(client.api_get("repos/a/missing", &[]).await, ApiOutcome::NotFound));
        assert!(matches!(
            client.api_get("repos/a/limited", &[]).await,
            ApiOutcome::RateLimited(Some(RateLimitInfo { remaining: 0, .. }))
        ));
        assert!(matches!(client.api_get("repos/a/broken", &[]).await, ApiOutcome::Transient(_)));
        assert!(matches!(client.api_get("repos/a/gone", &[]).await, ApiOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_listing_get_passes_since() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jupyter-notebook"))
            .and(query_param("since", "daily"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new(None, &server.uri(), &server.uri()).unwrap();
        let outcome = client.listing_get("jupyter-notebook", "daily").await;
        assert!(matches!(outcome, ApiOutcome::Ok(body) if body.contains("html")));
    }

    #[tokio::test]
    async fn test_network_error_is_transient() {
        // nothing listens on port 9 on the loopback interface
        let client = Client::new(None, "http://127.0.0.1:9", "http://127.0.0.1:9").unwrap();
        assert!(matches!(client.api_get("rate_limit", &[]).await, ApiOutcome::Transient(_)));
    }
}
