//! Read side: keyset-paginated events of a job, and a user's job list.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{event_repo, file_repo, Database, DatabaseError, EventRow, FileRow};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Page size must be at least 1")]
    InvalidPageSize,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub job_id: String,
    pub user_id: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Largest event id already seen; 0 starts from the beginning.
    #[serde(default)]
    pub last_id: i64,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl PageRequest {
    pub fn new(job_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            user_id: user_id.into(),
            page_size: DEFAULT_PAGE_SIZE,
            last_id: 0,
        }
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn after(mut self, last_id: i64) -> Self {
        self.last_id = last_id;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub events: Vec<EventRow>,
    /// Pass back as `last_id` to get the next page.
    pub next_last_id: i64,
    pub page_size: u32,
}

impl Page {
    /// A short page means there is nothing after it.
    pub fn is_last(&self) -> bool {
        self.events.len() < self.page_size as usize
    }
}

#[derive(Clone)]
pub struct StatsReader {
    db: Database,
}

impl StatsReader {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn page(&self, request: &PageRequest) -> Result<Page, StatsError> {
        if request.page_size == 0 {
            return Err(StatsError::InvalidPageSize);
        }

        let events = event_repo::page_for_job(
            &self.db,
            &request.job_id,
            &request.user_id,
            request.last_id,
            request.page_size,
        )?;
        let next_last_id = events.last().map_or(request.last_id, |e| e.id);

        Ok(Page {
            events,
            next_last_id,
            page_size: request.page_size,
        })
    }

    /// Walks every page of `request` and returns all events in id order.
    pub fn all_events(&self, request: &PageRequest) -> Result<Vec<EventRow>, StatsError> {
        let mut request = request.clone();
        let mut events = Vec::new();
        loop {
            let page = self.page(&request)?;
            let last = page.is_last();
            request.last_id = page.next_last_id;
            events.extend(page.events);
            if last {
                return Ok(events);
            }
        }
    }

    /// The user's jobs with their aggregate counters, newest first.
    pub fn jobs_for_user(&self, user_id: &str) -> Result<Vec<FileRow>, StatsError> {
        Ok(file_repo::list_by_user(&self.db, user_id)?)
    }
}
