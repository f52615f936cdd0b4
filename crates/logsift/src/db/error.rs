//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// An update or lookup matched no row.
    #[error("No row in {table} for {key}")]
    RowNotFound { table: &'static str, key: String },

    /// A JSON column could not be encoded or decoded.
    #[error("Invalid JSON column: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored value does not map onto its Rust type.
    #[error("Invalid value '{value}' in column {column}")]
    InvalidColumn { column: &'static str, value: String },
}
