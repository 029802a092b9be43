//! In-memory pull request source shared by unit tests.

use crate::error::{Result, StatsError};
use crate::github::PullRequestSource;
use crate::types::{PullRequestPage, PullRequestRecord, RepoId};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Mutex;

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn pr(id: u64, created_at: DateTime<Utc>, author: Option<&str>) -> PullRequestRecord {
    PullRequestRecord {
        id,
        number: Some(id),
        created_at,
        merged_at: None,
        closed_at: None,
        author: author.map(str::to_string),
    }
}

pub fn merged(mut record: PullRequestRecord, merged_at: DateTime<Utc>) -> PullRequestRecord {
    record.merged_at = Some(merged_at);
    record.closed_at = Some(merged_at);
    record
}

/// Serves a fixed sequence of pages and records which pages were requested.
pub struct FakeSource {
    pages: Vec<Vec<PullRequestRecord>>,
    rate_limited_page: Option<u32>,
    requested: Mutex<Vec<u32>>,
}

impl FakeSource {
    pub fn new(pages: Vec<Vec<PullRequestRecord>>) -> Self {
        Self {
            pages,
            rate_limited_page: None,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn rate_limited_on(mut self, page: u32) -> Self {
        self.rate_limited_page = Some(page);
        self
    }

    pub fn requested(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }
}

impl PullRequestSource for FakeSource {
    async fn fetch_page(&self, _repo: &RepoId, page: u32, _per_page: u8) -> Result<PullRequestPage> {
        self.requested.lock().unwrap().push(page);

        if self.rate_limited_page == Some(page) {
            return Err(StatsError::RateLimited {
                reset_at: None,
                retry_after_secs: Some(60),
                remaining: Some(0),
            });
        }

        let records = self
            .pages
            .get(page as usize - 1)
            .cloned()
            .unwrap_or_default();
        Ok(PullRequestPage::new(records))
    }
}
