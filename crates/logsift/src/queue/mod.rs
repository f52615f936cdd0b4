//! Task queue contract: at-least-once delivery over two priority lanes with
//! per-task retry counters, plus a read-only inspector.
//!
//! `max_retry` counts total deliveries. A task delivered with `retried == n`
//! is on its final attempt when `n + 1 >= max_retry`; nacking it then
//! archives the task instead of redelivering it.

pub mod memory;
pub mod status;
pub mod task;

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::Serialize;

use crate::error::QueueError;

pub use memory::MemoryQueue;
pub use status::{ActiveTask, QueueStatus};
pub use task::{new_log_process_task, LogProcessPayload, TYPE_LOG_PROCESS};

/// Default total delivery count for a task.
pub const DEFAULT_MAX_RETRY: u32 = 3;

/// Priority lane. Workers drain `High` before `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    High,
    Low,
}

impl Lane {
    /// Lanes in the order workers serve them.
    pub const ALL: [Lane; 2] = [Lane::High, Lane::Low];

    /// Files larger than `threshold` bytes go to the low lane.
    pub fn for_file_size(size: u64, threshold: u64) -> Self {
        if size > threshold {
            Lane::Low
        } else {
            Lane::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::High => "high",
            Lane::Low => "low",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work: a type tag and an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub task_type: String,
    pub payload: Vec<u8>,
}

/// Where a task is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Scheduled,
    Active,
    Retry,
    Archived,
}

/// Inspector view of one task.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub id: String,
    pub lane: Lane,
    pub task_type: String,
    pub payload: Vec<u8>,
    pub state: TaskState,
    /// Deliveries that have already failed.
    pub retried: u32,
    pub max_retry: u32,
    pub last_error: Option<String>,
}

/// A task handed to a consumer, with the retry metadata current at delivery.
#[derive(Debug, Clone)]
pub struct DeliveredTask {
    pub id: String,
    pub lane: Lane,
    pub task: Task,
    pub retried: u32,
    pub max_retry: u32,
}

/// Per-lane counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueInfo {
    pub pending: u64,
    pub active: u64,
    pub scheduled: u64,
    pub retry: u64,
    pub processed: u64,
    pub failed: u64,
}

impl QueueInfo {
    /// Tasks not yet settled (waiting, running or due for redelivery).
    pub fn in_flight(&self) -> u64 {
        self.pending + self.active + self.scheduled + self.retry
    }
}

impl std::ops::Add for QueueInfo {
    type Output = QueueInfo;

    fn add(self, rhs: QueueInfo) -> QueueInfo {
        QueueInfo {
            pending: self.pending + rhs.pending,
            active: self.active + rhs.active,
            scheduled: self.scheduled + rhs.scheduled,
            retry: self.retry + rhs.retry,
            processed: self.processed + rhs.processed,
            failed: self.failed + rhs.failed,
        }
    }
}

/// Enqueue parameters.
#[derive(Debug, Clone, Copy)]
pub struct EnqueueOptions {
    pub lane: Lane,
    pub max_retry: u32,
    /// Delay before the first delivery.
    pub process_in: Option<Duration>,
}

impl EnqueueOptions {
    pub fn new(lane: Lane) -> Self {
        Self {
            lane,
            max_retry: DEFAULT_MAX_RETRY,
            process_in: None,
        }
    }

    pub fn max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    pub fn process_in(mut self, delay: Duration) -> Self {
        self.process_in = Some(delay);
        self
    }
}

/// What `nack` did with the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackOutcome {
    /// Will be delivered again with this `retried` count.
    Retrying { retried: u32 },
    /// Out of deliveries; kept for inspection only.
    Archived,
}

/// Producer and consumer side of the queue.
pub trait TaskQueue: Send + Sync {
    /// Adds a task and returns its id.
    fn enqueue(&self, task: Task, options: EnqueueOptions) -> Result<String, QueueError>;

    /// Waits up to `timeout` for the next ready task, high lane first.
    fn dequeue(&self, timeout: Duration) -> Result<Option<DeliveredTask>, QueueError>;

    /// Marks an active task as processed.
    fn ack(&self, id: &str) -> Result<(), QueueError>;

    /// Reports a failed delivery. The task is redelivered while deliveries
    /// remain, otherwise archived.
    fn nack(&self, id: &str, error: &str) -> Result<NackOutcome, QueueError>;
}

/// Read-only view of queue state.
pub trait Inspector: Send + Sync {
    fn task_info(&self, lane: Lane, id: &str) -> Result<TaskInfo, QueueError>;

    /// Up to `page_size` active tasks of `lane`.
    fn list_active(&self, lane: Lane, page_size: usize) -> Result<Vec<TaskInfo>, QueueError>;

    fn queue_info(&self, lane: Lane) -> Result<QueueInfo, QueueError>;
}

/// Looks up a task, giving up after `timeout`.
///
/// The lookup runs on its own thread; a lookup that outlives the timeout is
/// left to finish in the background and its answer dropped.
pub fn task_info_with_timeout(
    inspector: &Arc<dyn Inspector>,
    lane: Lane,
    id: &str,
    timeout: Duration,
) -> Result<TaskInfo, QueueError> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let inspector = Arc::clone(inspector);
    let id = id.to_string();

    thread::Builder::new()
        .name("queue-inspect".to_string())
        .spawn(move || {
            let _ = tx.send(inspector.task_info(lane, &id));
        })
        .map_err(|e| QueueError::Unavailable(e.to_string()))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(crossbeam_channel::RecvTimeoutError::Timeout) => Err(QueueError::Timeout),
        Err(crossbeam_channel::RecvTimeoutError::Disconnected) => Err(QueueError::Unavailable(
            "inspector thread exited without an answer".to_string(),
        )),
    }
}
