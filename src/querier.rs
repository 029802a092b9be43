//! Service layer for computing pull request statistics.
//!
//! This module implements `StatsQuerier`, which acts as the main entry point for
//! producing a `StatsResult`. It handles:
//! 1. Validating the inbound query.
//! 2. Building the bucket timeline for the requested window.
//! 3. Fetching the pull requests in that window from GitHub.
//! 4. Folding them into per-author, per-bucket counts.

use crate::config::AppConfig;
use crate::error::{Result, StatsError};
use crate::fetcher::{self, FetchOptions};
use crate::github::{GitHubClient, PullRequestSource};
use crate::metrics::{self, StatsResult};
use crate::timeline::{self, Granularity};
use crate::types::{Credential, RepoId};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// The inbound request, as received from the HTTP layer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsQuery {
    /// Repository as `owner/name`.
    pub repo: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    /// `day`, `week` or `month`. Defaults to `day`.
    pub bucket: Option<String>,
    pub author: Option<String>,
}

/// A validated `StatsQuery`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRequest {
    pub repo: RepoId,
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub granularity: Granularity,
    pub author: Option<String>,
}

impl StatsQuery {
    pub fn validate(&self) -> Result<StatsRequest> {
        let repo = self
            .repo
            .as_deref()
            .ok_or_else(|| StatsError::InvalidRequest("repo is required".to_string()))?
            .parse::<RepoId>()?;

        let since = required_instant("since", self.since.as_deref())?;
        let until = required_instant("until", self.until.as_deref())?;
        timeline::validate_window(since, until)?;

        let granularity = match self.bucket.as_deref().map(str::trim) {
            None | Some("") => Granularity::default(),
            Some(bucket) => bucket.parse()?,
        };

        let author = self
            .author
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        Ok(StatsRequest {
            repo,
            since,
            until,
            granularity,
            author,
        })
    }
}

fn required_instant(name: &str, value: Option<&str>) -> Result<DateTime<Utc>> {
    match value.map(str::trim) {
        None | Some("") => Err(StatsError::InvalidWindow(format!("{name} is required"))),
        Some(value) => timeline::parse_instant(value),
    }
}

/// Runs the fetch-then-aggregate pipeline against any pull request source.
///
/// When the window produces no buckets the source is never called.
pub async fn compute_stats<S: PullRequestSource>(
    source: &S,
    request: &StatsRequest,
    options: FetchOptions,
) -> Result<StatsResult> {
    let repo_label = request.repo.to_string();
    let buckets = timeline::build_timeline(request.since, request.until, request.granularity);
    if buckets.is_empty() {
        return Ok(StatsResult::empty(&repo_label, request.granularity));
    }

    let prs = fetcher::fetch_pull_requests(
        source,
        &request.repo,
        request.since,
        request.until,
        request.author.as_deref(),
        options,
    )
    .await?;

    let result = metrics::aggregate_timeline(&prs, buckets, request.granularity, &repo_label);

    tracing::debug!(
        repo = %request.repo,
        bucket = %request.granularity,
        prs = prs.len(),
        authors = result.authors.len(),
        "Aggregated pull request stats"
    );

    Ok(result)
}

#[derive(Clone, Debug)]
pub struct StatsQuerier {
    config: AppConfig,
}

impl StatsQuerier {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Computes statistics for a validated request from GitHub.
    pub async fn get(&self, request: &StatsRequest, credential: &Credential) -> Result<StatsResult> {
        let client = GitHubClient::new(
            &self.config.github_api_url,
            credential,
            self.config.request_timeout(),
        )?;

        compute_stats(&client, request, self.config.fetch_options()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{merged, pr, utc, FakeSource};

    fn query(repo: &str, since: &str, until: &str) -> StatsQuery {
        StatsQuery {
            repo: Some(repo.to_string()),
            since: Some(since.to_string()),
            until: Some(until.to_string()),
            ..StatsQuery::default()
        }
    }

    #[test]
    fn test_validate() {
        let mut q = query("octo/widgets", "2024-01-01T00:00:00Z", "2024-01-03T00:00:00Z");
        q.bucket = Some("Week".to_string());
        q.author = Some("  alice ".to_string());

        let request = q.validate().unwrap();
        assert_eq!(request.repo.to_string(), "octo/widgets");
        assert_eq!(request.since, utc(2024, 1, 1, 0, 0));
        assert_eq!(request.until, utc(2024, 1, 3, 0, 0));
        assert_eq!(request.granularity, Granularity::Week);
        assert_eq!(request.author.as_deref(), Some("alice"));
    }

    #[test]
    fn test_validate_defaults() {
        let mut q = query("octo/widgets", "2024-01-01", "2024-01-03");
        q.author = Some(String::new());

        let request = q.validate().unwrap();
        assert_eq!(request.granularity, Granularity::Day);
        assert_eq!(request.author, None);
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let cases = [
            (query("octo", "2024-01-01", "2024-01-03"), "invalid request"),
            (query("octo/widgets", "", "2024-01-03"), "invalid time window"),
            (query("octo/widgets", "2024-01-01", "soon"), "invalid time window"),
            (query("octo/widgets", "2024-01-03", "2024-01-01"), "invalid time window"),
            (query("octo/widgets", "2024-01-03", "2024-01-03"), "invalid time window"),
            (StatsQuery::default(), "invalid request"),
        ];

        for (q, expected) in cases {
            let err = q.validate().unwrap_err();
            assert!(err.to_string().starts_with(expected), "{q:?}: {err}");
        }

        let mut q = query("octo/widgets", "2024-01-01", "2024-01-03");
        q.bucket = Some("fortnight".to_string());
        assert!(matches!(q.validate(), Err(StatsError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_compute_stats() {
        let source = FakeSource::new(vec![vec![
            pr(3, utc(2024, 1, 2, 12, 0), Some("bob")),
            merged(pr(2, utc(2024, 1, 2, 0, 0), Some("alice")), utc(2024, 1, 2, 6, 0)),
            pr(1, utc(2024, 1, 1, 23, 59), Some("alice")),
            pr(0, utc(2023, 12, 31, 0, 0), Some("alice")),
        ]]);
        let request = query("octo/widgets", "2024-01-01T00:00:00Z", "2024-01-03T00:00:00Z")
            .validate()
            .unwrap();

        let result = compute_stats(&source, &request, FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(result.repo, "octo/widgets");
        assert_eq!(result.buckets.len(), 2);
        assert_eq!(result.authors[0].author, "alice");
        assert_eq!(result.authors[0].series[0].created, 1);
        assert_eq!(result.authors[0].series[1].created, 1);
        assert_eq!(result.authors[0].series[1].merged, 1);
        assert_eq!(result.authors[1].author, "bob");
        assert_eq!(result.totals.created, 3);
        assert_eq!(source.requested(), vec![1]);
    }

    #[tokio::test]
    async fn test_compute_stats_with_author_filter() {
        let source = FakeSource::new(vec![vec![
            pr(2, utc(2024, 1, 2, 0, 0), Some("Alice")),
            pr(1, utc(2024, 1, 1, 0, 0), Some("bob")),
        ]]);
        let mut q = query("octo/widgets", "2024-01-01", "2024-01-03");
        q.author = Some("alice".to_string());
        let request = q.validate().unwrap();

        let result = compute_stats(&source, &request, FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(result.authors.len(), 1);
        assert_eq!(result.authors[0].author, "Alice");
        assert_eq!(result.totals.created, 1);
    }

    #[tokio::test]
    async fn test_compute_stats_empty_window_skips_upstream() {
        let source = FakeSource::new(vec![vec![pr(1, utc(2024, 1, 1, 0, 0), None)]]);
        let request = StatsRequest {
            repo: "octo/widgets".parse().unwrap(),
            since: utc(2024, 1, 2, 0, 0),
            until: utc(2024, 1, 2, 0, 0),
            granularity: Granularity::Month,
            author: None,
        };

        let result = compute_stats(&source, &request, FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(result, StatsResult::empty("octo/widgets", Granularity::Month));
        assert!(source.requested().is_empty());
    }

    #[tokio::test]
    async fn test_compute_stats_propagates_rate_limit() {
        let source = FakeSource::new(Vec::new()).rate_limited_on(1);
        let request = query("octo/widgets", "2024-01-01", "2024-01-03")
            .validate()
            .unwrap();

        let result = compute_stats(&source, &request, FetchOptions::default()).await;

        assert!(matches!(result, Err(StatsError::RateLimited { .. })));
    }
}
