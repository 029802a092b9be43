//! Access to the GitHub pull request list endpoint.
//!
//! `PullRequestSource` is the seam between the fetcher and the network: the
//! fetcher only ever asks for "page N of size M", and `GitHubClient` is the
//! production implementation backed by Octocrab.

use crate::error::{Result, StatsError};
use crate::types::{Credential, PullRequestPage, PullRequestRecord, RepoId};
use chrono::{DateTime, Utc};
use octocrab::service::middleware::retry::RetryConfig;
use octocrab::Octocrab;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::time::Duration as StdDuration;

/// A paginated list of pull requests, newest first by creation time.
pub trait PullRequestSource {
    /// Fetches one page (1-based) of at most `per_page` pull requests.
    fn fetch_page(
        &self,
        repo: &RepoId,
        page: u32,
        per_page: u8,
    ) -> impl Future<Output = Result<PullRequestPage>> + Send;
}

#[derive(Clone)]
pub struct GitHubClient {
    octocrab: Octocrab,
    base_url: String,
    timeout: StdDuration,
}

impl GitHubClient {
    /// Builds a client that authenticates every request with `credential`.
    ///
    /// `timeout` bounds each page request, including reading its body.
    pub fn new(base_url: &str, credential: &Credential, timeout: StdDuration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let octocrab = Octocrab::builder()
            .base_uri(base_url.as_str())
            .map_err(|e| StatsError::unavailable(format!("invalid GitHub API URL: {e}")))?
            .personal_token(credential.expose().to_string())
            // Retry policy belongs to the caller.
            .add_retry_config(RetryConfig::None)
            .build()
            .map_err(|e| StatsError::unavailable(format!("failed to build GitHub client: {e}")))?;

        Ok(Self {
            octocrab,
            base_url,
            timeout,
        })
    }
}

impl PullRequestSource for GitHubClient {
    async fn fetch_page(&self, repo: &RepoId, page: u32, per_page: u8) -> Result<PullRequestPage> {
        let url = pulls_url(&self.base_url, repo, page, per_page);
        tracing::debug!(repo = %repo, page, "Requesting pull request page");

        let request = async {
            let response = self.octocrab._get(url.as_str()).await?;
            let status = response.status().as_u16();
            let headers = response.headers();
            let rate_limit = RateLimitHeaders {
                reset: header_str(headers.get("x-ratelimit-reset")),
                retry_after: header_str(headers.get("retry-after")),
                remaining: header_str(headers.get("x-ratelimit-remaining")),
            };
            let body = self.octocrab.body_to_string(response).await?;
            Ok::<_, octocrab::Error>((status, rate_limit, body))
        };

        let (status, rate_limit, body) = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| {
                StatsError::unavailable(format!(
                    "request for page {page} of {repo} timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(classify_octocrab_error)?;

        if !(200..300).contains(&status) {
            return Err(classify_status(status, &rate_limit, body));
        }

        parse_page(&body)
    }
}

fn header_str<V: AsRef<[u8]>>(value: Option<V>) -> Option<String> {
    value.and_then(|v| std::str::from_utf8(v.as_ref()).ok().map(str::to_string))
}

pub(crate) fn pulls_url(base_url: &str, repo: &RepoId, page: u32, per_page: u8) -> String {
    format!(
        "{}/repos/{}/{}/pulls?state=all&per_page={per_page}&page={page}&sort=created&direction=desc",
        base_url.trim_end_matches('/'),
        repo.owner,
        repo.repo,
    )
}

/// Raw rate limit headers of an upstream response.
#[derive(Debug, Default)]
pub(crate) struct RateLimitHeaders {
    pub reset: Option<String>,
    pub retry_after: Option<String>,
    pub remaining: Option<String>,
}

/// Maps a non-success status to an error. 403 and 429 are GitHub's throttling responses.
pub(crate) fn classify_status(status: u16, rate_limit: &RateLimitHeaders, body: String) -> StatsError {
    if matches!(status, 403 | 429) {
        let parse = |v: &Option<String>| v.as_deref().and_then(|s| s.trim().parse::<u64>().ok());
        return StatsError::RateLimited {
            reset_at: rate_limit
                .reset
                .as_deref()
                .and_then(|s| s.trim().parse::<i64>().ok())
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            retry_after_secs: parse(&rate_limit.retry_after),
            remaining: parse(&rate_limit.remaining),
        };
    }

    StatsError::SourceUnavailable {
        status: Some(status),
        message: body,
    }
}

fn classify_octocrab_error(err: octocrab::Error) -> StatsError {
    match err {
        octocrab::Error::GitHub { source, .. } => classify_status(
            source.status_code.as_u16(),
            &RateLimitHeaders::default(),
            source.message.clone(),
        ),
        other => StatsError::unavailable(other.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    id: Option<u64>,
    number: Option<u64>,
    created_at: Option<String>,
    merged_at: Option<String>,
    closed_at: Option<String>,
    user: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: Option<String>,
}

/// Parses one page of the list endpoint.
///
/// Items without a usable `created_at` are skipped, so `records` may be
/// shorter than `raw_len`. A body that is valid JSON but not an array is an
/// empty page.
pub(crate) fn parse_page(body: &str) -> Result<PullRequestPage> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| StatsError::unavailable(format!("invalid JSON from GitHub: {e}")))?;

    let Value::Array(items) = value else {
        return Ok(PullRequestPage::default());
    };

    let raw_len = items.len();
    let records = items
        .into_iter()
        .filter_map(|item| match parse_record(item) {
            Some(record) => Some(record),
            None => {
                tracing::debug!("Skipping pull request without a usable created_at");
                None
            }
        })
        .collect();

    Ok(PullRequestPage { records, raw_len })
}

fn parse_record(item: Value) -> Option<PullRequestRecord> {
    let raw: RawPullRequest = serde_json::from_value(item).ok()?;
    let created_at = parse_timestamp(raw.created_at.as_deref())?;

    Some(PullRequestRecord {
        id: raw.id.unwrap_or_default(),
        number: raw.number,
        created_at,
        merged_at: parse_timestamp(raw.merged_at.as_deref()),
        closed_at: parse_timestamp(raw.closed_at.as_deref()),
        author: raw.user.and_then(|user| user.login),
    })
}

fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value?)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
