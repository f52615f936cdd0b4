use serde::{Deserialize, Serialize};

use crate::error::QueueError;

use super::Task;

/// Task type of a log-processing job.
pub const TYPE_LOG_PROCESS: &str = "log:process";

/// Payload of a `log:process` task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogProcessPayload {
    pub file_id: i64,
    /// Object-store path of the uploaded file.
    pub file_path: String,
    pub file_size_bytes: i64,
    pub user_id: String,
}

impl LogProcessPayload {
    /// Decodes the payload of `task`, rejecting other task types.
    pub fn decode(task: &Task) -> Result<Self, QueueError> {
        if task.task_type != TYPE_LOG_PROCESS {
            return Err(QueueError::UnknownTaskType(task.task_type.clone()));
        }
        Ok(serde_json::from_slice(&task.payload)?)
    }
}

pub fn new_log_process_task(payload: &LogProcessPayload) -> Result<Task, QueueError> {
    Ok(Task {
        task_type: TYPE_LOG_PROCESS.to_string(),
        payload: serde_json::to_vec(payload)?,
    })
}
