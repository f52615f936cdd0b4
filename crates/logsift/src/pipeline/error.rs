use thiserror::Error;

use crate::chunk::ChunkError;
use crate::db::DatabaseError;
use crate::error::{QueueError, StorageError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid task: {0}")]
    Task(#[from] QueueError),

    #[error("No file row with id {0}")]
    FileNotFound(i64),

    #[error("Download failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Scratch file error: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("Parsing failed: {0}")]
    Chunk(#[from] ChunkError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Job panicked: {0}")]
    Panicked(String),
}
