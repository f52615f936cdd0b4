use serde::Serialize;

use crate::error::QueueError;

use super::{Inspector, Lane, LogProcessPayload, QueueInfo, Task};

/// Active tasks listed per lane.
pub const ACTIVE_PAGE_SIZE: usize = 10;

/// One running task as shown in the queue status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTask {
    pub id: String,
    pub lane: Lane,
    pub task_type: String,
    pub retried: u32,
    pub max_retry: u32,
    /// `None` when the payload is not a `log:process` payload.
    pub payload: Option<LogProcessPayload>,
}

/// Snapshot of both lanes.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub high: QueueInfo,
    pub low: QueueInfo,
    pub total: QueueInfo,
    pub active: Vec<ActiveTask>,
}

impl QueueStatus {
    pub fn collect(inspector: &dyn Inspector) -> Result<Self, QueueError> {
        let high = inspector.queue_info(Lane::High)?;
        let low = inspector.queue_info(Lane::Low)?;

        let mut active = Vec::new();
        for lane in Lane::ALL {
            for info in inspector.list_active(lane, ACTIVE_PAGE_SIZE)? {
                let task = Task {
                    task_type: info.task_type,
                    payload: info.payload,
                };
                let payload = LogProcessPayload::decode(&task)
                    .inspect_err(|e| log::debug!("Active task {} has no log payload: {}", info.id, e))
                    .ok();
                active.push(ActiveTask {
                    id: info.id,
                    lane,
                    task_type: task.task_type,
                    retried: info.retried,
                    max_retry: info.max_retry,
                    payload,
                });
            }
        }

        Ok(Self {
            high,
            low,
            total: high + low,
            active,
        })
    }
}
