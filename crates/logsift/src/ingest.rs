//! Accepting a new log file: store it, register it, queue it.

use std::sync::Arc;

use chrono::Utc;
use log::{error, info};
use serde::Serialize;
use thiserror::Error;

use crate::broadcast::{EventType, Notifier};
use crate::db::{file_repo, format_timestamp, Database, DatabaseError, NewFile, StatusUpdate};
use crate::error::{QueueError, StorageError};
use crate::pipeline::{PipelineConfig, ServiceContext};
use crate::queue::{new_log_process_task, EnqueueOptions, Lane, LogProcessPayload, TaskQueue};
use crate::storage::ObjectStore;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Upload failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Could not queue job: {0}")]
    Queue(#[from] QueueError),
}

/// Result of a successful submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedJob {
    pub file_id: i64,
    pub job_id: String,
    pub lane: Lane,
    pub file_path: String,
    pub file_size_bytes: i64,
}

pub struct Ingestor {
    db: Database,
    store: Arc<dyn ObjectStore>,
    queue: Arc<dyn TaskQueue>,
    notifier: Arc<dyn Notifier>,
    config: Arc<PipelineConfig>,
}

impl Ingestor {
    pub fn new(ctx: &ServiceContext, queue: Arc<dyn TaskQueue>) -> Self {
        Self {
            db: ctx.db.clone(),
            store: Arc::clone(&ctx.store),
            queue,
            notifier: Arc::clone(&ctx.notifier),
            config: Arc::clone(&ctx.config),
        }
    }

    /// Uploads `content` as `file_name` and queues it for processing.
    ///
    /// A name already present in the bucket is rejected with
    /// [`StorageError::AlreadyExists`] before anything is recorded.
    pub fn submit(
        &self,
        user_id: &str,
        file_name: &str,
        content: &[u8],
    ) -> Result<SubmittedJob, IngestError> {
        let file_path = self.store.upload(&self.config.bucket, file_name, content)?;
        let file_size_bytes = content.len() as i64;

        let file_id = file_repo::insert(
            &self.db,
            &NewFile {
                file_name: file_name.to_string(),
                file_path: file_path.clone(),
                file_size_bytes,
                user_id: user_id.to_string(),
                created_at: format_timestamp(Utc::now()),
            },
        )?;

        let lane = self.config.lane_for(content.len() as u64);
        let payload = LogProcessPayload {
            file_id,
            file_path: file_path.clone(),
            file_size_bytes,
            user_id: user_id.to_string(),
        };

        let job_id = match self.enqueue(&payload, lane) {
            Ok(job_id) => job_id,
            Err(e) => {
                self.abandon(file_id, &e);
                return Err(e);
            }
        };
        file_repo::set_job_id(&self.db, file_id, &job_id)?;

        info!(
            "Queued {} ({} bytes) as job {} on {} lane",
            file_path, file_size_bytes, job_id, lane
        );

        match file_repo::find_by_id(&self.db, file_id)? {
            Some(row) => match serde_json::to_value(&row) {
                Ok(data) => self
                    .notifier
                    .notify(user_id, EventType::LogTableUpdate, data),
                Err(e) => error!("Failed to encode row for file {}: {}", file_id, e),
            },
            None => error!("File {} vanished right after insert", file_id),
        }

        Ok(SubmittedJob {
            file_id,
            job_id,
            lane,
            file_path,
            file_size_bytes,
        })
    }

    /// Queues every row still `pending`, e.g. after a restart lost the
    /// in-process queue. Rows already carrying a job id get a new one.
    pub fn requeue_pending(&self) -> Result<Vec<SubmittedJob>, IngestError> {
        let mut queued = Vec::new();
        for row in file_repo::list_pending(&self.db)? {
            let lane = self.config.lane_for(row.file_size_bytes.max(0) as u64);
            let payload = LogProcessPayload {
                file_id: row.file_id,
                file_path: row.file_path.clone(),
                file_size_bytes: row.file_size_bytes,
                user_id: row.user_id.clone(),
            };
            let job_id = self.enqueue(&payload, lane)?;
            file_repo::set_job_id(&self.db, row.file_id, &job_id)?;
            info!(
                "Requeued pending file {} as job {} (was {})",
                row.file_id,
                job_id,
                row.job_id.as_deref().unwrap_or("unqueued")
            );
            queued.push(SubmittedJob {
                file_id: row.file_id,
                job_id,
                lane,
                file_path: row.file_path,
                file_size_bytes: row.file_size_bytes,
            });
        }
        Ok(queued)
    }

    fn enqueue(&self, payload: &LogProcessPayload, lane: Lane) -> Result<String, IngestError> {
        let task = new_log_process_task(payload)?;
        let options = EnqueueOptions::new(lane).max_retry(self.config.max_retry);
        Ok(self.queue.enqueue(task, options)?)
    }

    // A row that never got a task would stay pending forever.
    fn abandon(&self, file_id: i64, cause: &IngestError) {
        let update = StatusUpdate::failed(cause.to_string(), format_timestamp(Utc::now()));
        if let Err(e) = file_repo::update_status(&self.db, file_id, &update) {
            error!("Could not mark unqueued file {} failed: {}", file_id, e);
        }
    }
}
