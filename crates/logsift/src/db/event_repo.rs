//! Event repository: persisted `log_stats` rows.

use rusqlite::types::ToSql;
use rusqlite::{params, Connection, Row};
use serde::Serialize;

use crate::parser::LogEvent;

use super::{format_timestamp, Database, DatabaseError};

/// Upper bound on rows per INSERT statement, keeping the bound-parameter count
/// (7 per row) under SQLite's variable limit.
const MAX_ROWS_PER_STATEMENT: usize = 4096;
const COLUMNS_PER_ROW: usize = 7;

/// A persisted event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRow {
    /// Monotonic row id; the keyset pagination key.
    pub id: i64,
    pub file_id: i64,
    pub timestamp: String,
    pub level: String,
    pub message: String,
    pub keyword: Option<String>,
    pub ip: Option<String>,
    pub created_at: String,
}

impl EventRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            file_id: row.get("file_id")?,
            timestamp: row.get("err_timestamp")?,
            level: row.get("log_level")?,
            message: row.get("err_mssg")?,
            keyword: row.get("keyword_detected")?,
            ip: row.get("ip")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Inserts `events` in statements of at most `batch_size` rows.
///
/// Meant to run inside the caller's transaction; returns the number of rows
/// written.
pub fn insert_all(
    conn: &Connection,
    events: &[LogEvent],
    batch_size: usize,
    created_at: &str,
) -> Result<usize, DatabaseError> {
    let batch_size = batch_size.clamp(1, MAX_ROWS_PER_STATEMENT);
    let mut written = 0;

    for batch in events.chunks(batch_size) {
        let timestamps: Vec<String> = batch.iter().map(|e| format_timestamp(e.timestamp)).collect();

        let mut values: Vec<&dyn ToSql> = Vec::with_capacity(batch.len() * COLUMNS_PER_ROW);
        for (event, timestamp) in batch.iter().zip(&timestamps) {
            values.push(&event.file_id);
            values.push(timestamp);
            values.push(&event.level);
            values.push(&event.message);
            values.push(&event.keyword);
            values.push(&event.ip);
            values.push(&created_at);
        }

        let mut stmt = conn.prepare_cached(&insert_sql(batch.len()))?;
        written += stmt.execute(values.as_slice())?;
    }

    Ok(written)
}

fn insert_sql(rows: usize) -> String {
    let mut sql = String::from(
        "INSERT INTO log_stats (file_id, err_timestamp, log_level, err_mssg, keyword_detected, ip, created_at) VALUES ",
    );
    for i in 0..rows {
        if i > 0 {
            sql.push(',');
        }
        sql.push_str("(?,?,?,?,?,?,?)");
    }
    sql
}

/// One keyset page of a job's events: rows with `id > last_id`, ascending.
///
/// Only returns rows whose job row matches both `job_id` and `user_id`.
pub fn page_for_job(
    db: &Database,
    job_id: &str,
    user_id: &str,
    last_id: i64,
    limit: u32,
) -> Result<Vec<EventRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare_cached(
            "SELECT l.id, l.file_id, l.err_timestamp, l.log_level, l.err_mssg,
                    l.keyword_detected, l.ip, l.created_at
             FROM log_stats l
             JOIN file_stats f ON f.file_id = l.file_id
             WHERE f.job_id = ?1 AND f.user_id = ?2 AND l.id > ?3
             ORDER BY l.id ASC
             LIMIT ?4",
        )?;
        let rows = stmt
            .query_map(params![job_id, user_id, last_id, limit], EventRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Counts the persisted events of one file.
pub fn count_for_file(db: &Database, file_id: i64) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM log_stats WHERE file_id = ?1",
            params![file_id],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
