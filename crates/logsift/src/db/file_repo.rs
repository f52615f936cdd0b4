//! File repository: one `file_stats` row per submitted log file (the job row).

use std::fmt;
use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::chunk::KeywordStats;

use super::{Database, DatabaseError};

/// Lifecycle state of a job row. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(DatabaseError::InvalidColumn {
                column: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// A `file_stats` row.
#[derive(Debug, Clone, Serialize)]
pub struct FileRow {
    pub file_id: i64,
    pub file_name: String,
    pub file_path: String,
    pub file_size_bytes: i64,
    pub user_id: String,
    pub job_id: Option<String>,
    pub status: JobStatus,
    pub created_at: String,
    pub process_start_time: Option<String>,
    pub completed_at: Option<String>,
    pub processing_time_sec: Option<f64>,
    pub error_count: i64,
    pub failure_reason: Option<String>,
    /// Keyword counts as stored (JSON object text).
    pub keyword_stats: Option<String>,
}

impl FileRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let status: String = row.get("status")?;
        let status = status.parse::<JobStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;
        Ok(Self {
            file_id: row.get("file_id")?,
            file_name: row.get("file_name")?,
            file_path: row.get("file_path")?,
            file_size_bytes: row.get("file_size_bytes")?,
            user_id: row.get("user_id")?,
            job_id: row.get("job_id")?,
            status,
            created_at: row.get("created_at")?,
            process_start_time: row.get("process_start_time")?,
            completed_at: row.get("completed_at")?,
            processing_time_sec: row.get("processing_time_sec")?,
            error_count: row.get("error_count")?,
            failure_reason: row.get("failure_reason")?,
            keyword_stats: row.get("keyword_stats")?,
        })
    }

    /// Decodes the stored keyword counts, if any.
    pub fn keyword_counts(&self) -> Result<Option<KeywordStats>, DatabaseError> {
        self.keyword_stats
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(DatabaseError::from)
    }
}

/// Columns supplied when a file is first registered.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub file_name: String,
    pub file_path: String,
    pub file_size_bytes: i64,
    pub user_id: String,
    pub created_at: String,
}

/// A status transition plus the columns that change with it.
///
/// Serializes to exactly the columns being written, which is also the body of
/// the `log-table-update` notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusUpdate {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_stats: Option<KeywordStats>,
}

impl StatusUpdate {
    pub fn completed(
        process_start_time: String,
        completed_at: String,
        processing_time_sec: f64,
        error_count: u64,
        keyword_stats: KeywordStats,
    ) -> Self {
        Self {
            status: JobStatus::Completed,
            process_start_time: Some(process_start_time),
            completed_at: Some(completed_at),
            processing_time_sec: Some(processing_time_sec),
            error_count: Some(error_count),
            failure_reason: None,
            keyword_stats: Some(keyword_stats),
        }
    }

    pub fn failed(reason: String, completed_at: String) -> Self {
        Self {
            status: JobStatus::Failed,
            process_start_time: None,
            completed_at: Some(completed_at),
            processing_time_sec: None,
            error_count: None,
            failure_reason: Some(reason),
            keyword_stats: None,
        }
    }

    /// Adds how long the failed run took before it gave up.
    pub fn with_timing(mut self, process_start_time: String, processing_time_sec: f64) -> Self {
        self.process_start_time = Some(process_start_time);
        self.processing_time_sec = Some(processing_time_sec);
        self
    }
}

/// Inserts a new `pending` row and returns its generated `file_id`.
pub fn insert(db: &Database, file: &NewFile) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO file_stats (file_name, file_path, file_size_bytes, user_id, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                file.file_name,
                file.file_path,
                file.file_size_bytes,
                file.user_id,
                JobStatus::Pending.as_str(),
                file.created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Records the queue task id once the job has been enqueued.
pub fn set_job_id(db: &Database, file_id: i64, job_id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE file_stats SET job_id = ?2 WHERE file_id = ?1",
            params![file_id, job_id],
        )?;
        ensure_changed(changed, file_id)
    })
}

/// Finds a file row by its id.
pub fn find_by_id(db: &Database, file_id: i64) -> Result<Option<FileRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM file_stats WHERE file_id = ?1",
                params![file_id],
                FileRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Lists a user's rows, newest first.
pub fn list_by_user(db: &Database, user_id: &str) -> Result<Vec<FileRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM file_stats WHERE user_id = ?1 ORDER BY file_id DESC")?;
        let rows = stmt
            .query_map(params![user_id], FileRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Rows still waiting for a worker, oldest first.
pub fn list_pending(db: &Database) -> Result<Vec<FileRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM file_stats WHERE status = ?1 ORDER BY file_id ASC")?;
        let rows = stmt
            .query_map(params![JobStatus::Pending.as_str()], FileRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Applies `update` on `conn`, which may be an open transaction.
///
/// Columns left as `None` in the update keep their stored value.
pub fn update_status_in(
    conn: &Connection,
    file_id: i64,
    update: &StatusUpdate,
) -> Result<(), DatabaseError> {
    let changed = apply_update(conn, file_id, update, false)?;
    ensure_changed(changed, file_id)
}

/// Applies `update` outside of any caller transaction.
pub fn update_status(
    db: &Database,
    file_id: i64,
    update: &StatusUpdate,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| update_status_in(conn, file_id, update))
}

/// Applies `update` only while the row is still `pending`.
///
/// Returns `false` when the row is missing or already terminal, in which case
/// nothing was written.
pub fn update_status_if_pending(
    db: &Database,
    file_id: i64,
    update: &StatusUpdate,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| Ok(apply_update(conn, file_id, update, true)? > 0))
}

fn apply_update(
    conn: &Connection,
    file_id: i64,
    update: &StatusUpdate,
    only_pending: bool,
) -> Result<usize, DatabaseError> {
    let keyword_stats = update
        .keyword_stats
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let error_count = update.error_count.map(|n| n as i64);

    let changed = conn.execute(
        "UPDATE file_stats SET
           status = ?2,
           process_start_time = COALESCE(?3, process_start_time),
           completed_at = COALESCE(?4, completed_at),
           processing_time_sec = COALESCE(?5, processing_time_sec),
           error_count = COALESCE(?6, error_count),
           failure_reason = COALESCE(?7, failure_reason),
           keyword_stats = COALESCE(?8, keyword_stats)
         WHERE file_id = ?1 AND (?9 = 0 OR status = ?10)",
        params![
            file_id,
            update.status.as_str(),
            update.process_start_time,
            update.completed_at,
            update.processing_time_sec,
            error_count,
            update.failure_reason,
            keyword_stats,
            only_pending,
            JobStatus::Pending.as_str(),
        ],
    )?;
    Ok(changed)
}

fn ensure_changed(changed: usize, file_id: i64) -> Result<(), DatabaseError> {
    if changed == 0 {
        return Err(DatabaseError::RowNotFound {
            table: "file_stats",
            key: file_id.to_string(),
        });
    }
    Ok(())
}
