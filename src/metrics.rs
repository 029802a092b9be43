use crate::error::Result;
use crate::timeline::{self, Granularity, TimeBucket};
use crate::types::PullRequestRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::AddAssign;

/// Author key used when a pull request has no (or a blank) author login.
pub const UNKNOWN_AUTHOR: &str = "unknown";

/// Pull request event counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub created: u64,
    pub merged: u64,
    pub closed: u64,
}

impl AddAssign for Metric {
    fn add_assign(&mut self, rhs: Self) {
        self.created += rhs.created;
        self.merged += rhs.merged;
        self.closed += rhs.closed;
    }
}

/// Per-bucket counts for one author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSeries {
    pub author: String,
    /// One entry per timeline bucket, in timeline order.
    pub series: Vec<Metric>,
    /// Elementwise sum of `series`.
    pub totals: Metric,
}

/// The public response structure for PR statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsResult {
    pub repo: String,
    pub bucket: Granularity,
    pub buckets: Vec<TimeBucket>,
    /// Sorted by merged count, then created count, both descending.
    pub authors: Vec<AuthorSeries>,
    pub totals: Metric,
}

impl StatsResult {
    pub fn empty(repo: &str, granularity: Granularity) -> Self {
        Self {
            repo: repo.to_string(),
            bucket: granularity,
            buckets: Vec::new(),
            authors: Vec::new(),
            totals: Metric::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Event {
    Created,
    Merged,
    Closed,
}

/// Folds pull requests into per-author, per-bucket counts.
///
/// Authors are kept in first-seen order until the final sort.
struct Aggregator<'a> {
    timeline: &'a [TimeBucket],
    authors: Vec<AuthorSeries>,
    index: HashMap<String, usize>,
    totals: Metric,
}

impl<'a> Aggregator<'a> {
    fn new(timeline: &'a [TimeBucket]) -> Self {
        Self {
            timeline,
            authors: Vec::new(),
            index: HashMap::new(),
            totals: Metric::default(),
        }
    }

    fn add(&mut self, pr: &PullRequestRecord) {
        // A pull request created outside the timeline contributes nothing,
        // even if it was merged or closed inside it.
        let Some(created_idx) = timeline::bucket_index(self.timeline, pr.created_at) else {
            return;
        };

        let slot = self.author_slot(author_key(pr.author.as_deref()));
        self.record(slot, created_idx, Event::Created);

        for (at, event) in [(pr.merged_at, Event::Merged), (pr.closed_at, Event::Closed)] {
            if let Some(idx) = at.and_then(|at| timeline::bucket_index(self.timeline, at)) {
                self.record(slot, idx, event);
            }
        }
    }

    fn author_slot(&mut self, author: &str) -> usize {
        if let Some(&slot) = self.index.get(author) {
            return slot;
        }

        let slot = self.authors.len();
        self.authors.push(AuthorSeries {
            author: author.to_string(),
            series: vec![Metric::default(); self.timeline.len()],
            totals: Metric::default(),
        });
        self.index.insert(author.to_string(), slot);
        slot
    }

    fn record(&mut self, slot: usize, bucket: usize, event: Event) {
        let author = &mut self.authors[slot];
        for metric in [&mut author.series[bucket], &mut author.totals, &mut self.totals] {
            match event {
                Event::Created => metric.created += 1,
                Event::Merged => metric.merged += 1,
                Event::Closed => metric.closed += 1,
            }
        }
    }

    fn finish(mut self) -> (Vec<AuthorSeries>, Metric) {
        sort_authors(&mut self.authors);
        (self.authors, self.totals)
    }
}

fn author_key(login: Option<&str>) -> &str {
    match login.map(str::trim) {
        Some(login) if !login.is_empty() => login,
        _ => UNKNOWN_AUTHOR,
    }
}

/// Orders authors by merged count, then created count, both descending.
/// The sort is stable, so exact ties keep their incoming order.
pub fn sort_authors(authors: &mut [AuthorSeries]) {
    authors.sort_by(|a, b| {
        b.totals
            .merged
            .cmp(&a.totals.merged)
            .then_with(|| b.totals.created.cmp(&a.totals.created))
    });
}

/// Aggregates pull requests into a bucketed statistics table.
///
/// # Arguments
/// * `prs` - The pull requests to fold in, in any order.
/// * `since` / `until` - The requested window; `since` must be before `until`.
/// * `granularity` - The bucket unit.
/// * `repo` - Label echoed back in the result.
pub fn aggregate(
    prs: &[PullRequestRecord],
    since: DateTime<Utc>,
    until: DateTime<Utc>,
    granularity: Granularity,
    repo: &str,
) -> Result<StatsResult> {
    timeline::validate_window(since, until)?;
    let buckets = timeline::build_timeline(since, until, granularity);
    Ok(aggregate_timeline(prs, buckets, granularity, repo))
}

/// Folds `prs` into an already-built timeline.
pub fn aggregate_timeline(
    prs: &[PullRequestRecord],
    buckets: Vec<TimeBucket>,
    granularity: Granularity,
    repo: &str,
) -> StatsResult {
    if buckets.is_empty() {
        return StatsResult::empty(repo, granularity);
    }

    let mut aggregator = Aggregator::new(&buckets);
    for pr in prs {
        aggregator.add(pr);
    }
    let (authors, totals) = aggregator.finish();

    StatsResult {
        repo: repo.to_string(),
        bucket: granularity,
        buckets,
        authors,
        totals,
    }
}
