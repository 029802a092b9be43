//! Windowed retrieval of pull requests.
//!
//! Pages are requested newest-first and strictly one at a time: whether page
//! N+1 is needed at all depends on what page N contained. Because the list is
//! sorted by creation time descending, the first record created before `since`
//! proves every later record is too old, and fetching stops there.

use crate::error::Result;
use crate::github::PullRequestSource;
use crate::types::{PullRequestPage, PullRequestRecord, RepoId};
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, TryStreamExt};

pub const DEFAULT_PER_PAGE: u8 = 100;
pub const DEFAULT_MAX_PAGES: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Records requested per page.
    pub per_page: u8,
    /// Hard ceiling on the number of pages requested per fetch.
    pub max_pages: u32,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// Lazily yields pages starting at page 1.
///
/// The next page is only requested when the consumer polls for it, so dropping
/// the stream stops all further requests. The stream ends on its own after an
/// empty or short page, or once `max_pages` pages have been yielded.
pub fn page_stream<'a, S: PullRequestSource>(
    source: &'a S,
    repo: &'a RepoId,
    options: FetchOptions,
) -> impl Stream<Item = Result<PullRequestPage>> + 'a {
    stream::try_unfold(Some(1u32), move |next| next_page(source, repo, options, next))
}

async fn next_page<S: PullRequestSource>(
    source: &S,
    repo: &RepoId,
    options: FetchOptions,
    next: Option<u32>,
) -> Result<Option<(PullRequestPage, Option<u32>)>> {
    let Some(page_num) = next.filter(|&n| n <= options.max_pages) else {
        return Ok(None);
    };

    let page = source.fetch_page(repo, page_num, options.per_page).await?;
    if page.raw_len == 0 {
        return Ok(None);
    }

    let next = (page.raw_len >= usize::from(options.per_page)).then_some(page_num + 1);
    Ok(Some((page, next)))
}

/// Retrieves every pull request created within `[since, until]`.
///
/// When `author` is set, only records whose author matches it
/// case-insensitively are kept; records without an author are dropped in
/// that case. No retries are attempted: upstream errors are returned as is.
pub async fn fetch_pull_requests<S: PullRequestSource>(
    source: &S,
    repo: &RepoId,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
    author: Option<&str>,
    options: FetchOptions,
) -> Result<Vec<PullRequestRecord>> {
    let author = author
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_lowercase);

    let mut pages = std::pin::pin!(page_stream(source, repo, options));
    let mut prs = Vec::new();
    let mut pages_fetched = 0u32;
    let mut last_page_full = false;
    let mut reached_since = false;

    'pages: while let Some(page) = pages.try_next().await? {
        pages_fetched += 1;
        last_page_full = page.raw_len >= usize::from(options.per_page);

        for pr in page.records {
            if pr.created_at < since {
                reached_since = true;
                break 'pages;
            }
            // Newer than the window. Only possible before the first in-window
            // record, given the descending order.
            if pr.created_at > until {
                continue;
            }
            if !matches_author(pr.author.as_deref(), author.as_deref()) {
                continue;
            }
            prs.push(pr);
        }
    }

    if !reached_since && last_page_full && pages_fetched >= options.max_pages {
        tracing::warn!(
            repo = %repo,
            max_pages = options.max_pages,
            "Hit page limit before reaching the start of the window. Data may be incomplete."
        );
    }

    tracing::debug!(
        repo = %repo,
        pages = pages_fetched,
        records = prs.len(),
        early_exit = reached_since,
        "Fetched pull requests"
    );

    Ok(prs)
}

fn matches_author(pr_author: Option<&str>, filter: Option<&str>) -> bool {
    match (filter, pr_author) {
        (None, _) => true,
        (Some(filter), Some(login)) => login.trim().to_lowercase() == filter,
        (Some(_), None) => false,
    }
}
