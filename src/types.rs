use crate::error::StatsError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A unique identifier for a GitHub repository.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    /// The owner of the repository (e.g., "facebook").
    pub owner: String,
    /// The name of the repository (e.g., "react").
    pub repo: String,
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for RepoId {
    type Err = StatsError;

    /// Parses `"owner/name"`. Both halves end up embedded in an API path, so only
    /// the characters GitHub allows in owner and repository names are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StatsError::InvalidRequest(format!("repo must be owner/name, got '{s}'"));

        let (owner, repo) = s.trim().split_once('/').ok_or_else(invalid)?;
        let (owner, repo) = (owner.trim(), repo.trim());
        if !is_valid_segment(owner) || !is_valid_segment(repo) {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// A pull request as seen by the aggregation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRecord {
    pub id: u64,
    pub number: Option<u64>,
    pub created_at: DateTime<Utc>,
    /// `None` means not (yet) merged.
    pub merged_at: Option<DateTime<Utc>>,
    /// `None` means not (yet) closed.
    pub closed_at: Option<DateTime<Utc>>,
    /// Login of the author, when the upstream reported one.
    pub author: Option<String>,
}

/// One page of upstream results after malformed items have been dropped.
#[derive(Debug, Clone, Default)]
pub struct PullRequestPage {
    pub records: Vec<PullRequestRecord>,
    /// Number of items the upstream actually returned for this page.
    pub raw_len: usize,
}

impl PullRequestPage {
    pub fn new(records: Vec<PullRequestRecord>) -> Self {
        let raw_len = records.len();
        Self { records, raw_len }
    }
}

/// Opaque bearer token for the pull-request source.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}
