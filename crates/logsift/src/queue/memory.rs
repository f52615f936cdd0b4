//! In-process queue honoring the [`TaskQueue`] contract.

use std::collections::{HashMap, VecDeque};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::debug;

use crate::error::QueueError;

use super::{
    DeliveredTask, EnqueueOptions, Inspector, Lane, NackOutcome, QueueInfo, Task, TaskInfo,
    TaskQueue, TaskState,
};

struct Entry {
    info: TaskInfo,
    seq: u64,
    /// Set while the task is `Scheduled` or `Retry`.
    ready_at: Option<Instant>,
}

#[derive(Default, Clone, Copy)]
struct LaneCounters {
    processed: u64,
    failed: u64,
}

#[derive(Default)]
struct State {
    tasks: HashMap<String, Entry>,
    ready: [VecDeque<String>; 2],
    delayed: Vec<String>,
    counters: [LaneCounters; 2],
    next_seq: u64,
    closed: bool,
}

fn lane_index(lane: Lane) -> usize {
    match lane {
        Lane::High => 0,
        Lane::Low => 1,
    }
}

impl State {
    fn promote_due(&mut self, now: Instant) {
        let tasks = &mut self.tasks;
        let ready = &mut self.ready;
        self.delayed.retain(|id| match tasks.get_mut(id) {
            Some(entry) if entry.ready_at.map_or(true, |at| at <= now) => {
                entry.ready_at = None;
                entry.info.state = TaskState::Pending;
                ready[lane_index(entry.info.lane)].push_back(id.clone());
                false
            }
            Some(_) => true,
            None => false,
        });
    }

    fn next_wake(&self) -> Option<Instant> {
        self.delayed
            .iter()
            .filter_map(|id| self.tasks.get(id).and_then(|e| e.ready_at))
            .min()
    }

    fn pop_ready(&mut self) -> Option<DeliveredTask> {
        for lane in Lane::ALL {
            while let Some(id) = self.ready[lane_index(lane)].pop_front() {
                let Some(entry) = self.tasks.get_mut(&id) else {
                    continue;
                };
                entry.info.state = TaskState::Active;
                return Some(DeliveredTask {
                    id,
                    lane,
                    task: Task {
                        task_type: entry.info.task_type.clone(),
                        payload: entry.info.payload.clone(),
                    },
                    retried: entry.info.retried,
                    max_retry: entry.info.max_retry,
                });
            }
        }
        None
    }

    fn active_entry(&mut self, id: &str) -> Result<&mut Entry, QueueError> {
        let entry = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| QueueError::TaskNotFound(id.to_string()))?;
        if entry.info.state != TaskState::Active {
            return Err(QueueError::NotActive {
                task_id: id.to_string(),
            });
        }
        Ok(entry)
    }

    fn is_idle(&self) -> bool {
        self.tasks
            .values()
            .all(|e| e.info.state == TaskState::Archived)
    }
}

/// Mutex-and-condvar queue with two lanes.
///
/// Acknowledged tasks are forgotten; archived tasks stay visible to the
/// inspector. Nacked tasks become deliverable again after `retry_delay`.
pub struct MemoryQueue {
    state: Mutex<State>,
    changed: Condvar,
    retry_delay: Duration,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::with_retry_delay(Duration::ZERO)
    }

    pub fn with_retry_delay(retry_delay: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            changed: Condvar::new(),
            retry_delay,
        }
    }

    /// Stops accepting and delivering tasks. Blocked consumers wake up with
    /// [`QueueError::Closed`].
    pub fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_all();
    }

    /// Blocks until every task is acknowledged or archived. Returns `false` if
    /// `timeout` elapses first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if state.is_idle() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TaskQueue for MemoryQueue {
    fn enqueue(&self, task: Task, options: EnqueueOptions) -> Result<String, QueueError> {
        let mut state = self.lock();
        if state.closed {
            return Err(QueueError::Closed);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let ready_at = options
            .process_in
            .filter(|d| !d.is_zero())
            .map(|d| Instant::now() + d);
        let seq = state.next_seq;
        state.next_seq += 1;

        let entry = Entry {
            info: TaskInfo {
                id: id.clone(),
                lane: options.lane,
                task_type: task.task_type,
                payload: task.payload,
                state: if ready_at.is_some() {
                    TaskState::Scheduled
                } else {
                    TaskState::Pending
                },
                retried: 0,
                max_retry: options.max_retry.max(1),
                last_error: None,
            },
            seq,
            ready_at,
        };

        if ready_at.is_some() {
            state.delayed.push(id.clone());
        } else {
            state.ready[lane_index(options.lane)].push_back(id.clone());
        }
        state.tasks.insert(id.clone(), entry);
        drop(state);

        debug!("Enqueued task {} on {} lane", id, options.lane);
        self.changed.notify_all();
        Ok(id)
    }

    fn dequeue(&self, timeout: Duration) -> Result<Option<DeliveredTask>, QueueError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if state.closed {
                return Err(QueueError::Closed);
            }
            let now = Instant::now();
            state.promote_due(now);
            if let Some(task) = state.pop_ready() {
                return Ok(Some(task));
            }
            if now >= deadline {
                return Ok(None);
            }
            let wake = state.next_wake().map_or(deadline, |at| at.min(deadline));
            state = self
                .changed
                .wait_timeout(state, wake.saturating_duration_since(now))
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn ack(&self, id: &str) -> Result<(), QueueError> {
        let mut state = self.lock();
        let lane = state.active_entry(id)?.info.lane;
        state.tasks.remove(id);
        state.counters[lane_index(lane)].processed += 1;
        drop(state);

        self.changed.notify_all();
        Ok(())
    }

    fn nack(&self, id: &str, error: &str) -> Result<NackOutcome, QueueError> {
        let retry_at = (!self.retry_delay.is_zero()).then(|| Instant::now() + self.retry_delay);
        let mut state = self.lock();

        let entry = state.active_entry(id)?;
        let lane = entry.info.lane;
        let delivered = entry.info.retried + 1;
        entry.info.retried = delivered;
        entry.info.last_error = Some(error.to_string());
        let retrying = delivered < entry.info.max_retry;
        if retrying {
            entry.ready_at = retry_at;
            entry.info.state = if retry_at.is_some() {
                TaskState::Retry
            } else {
                TaskState::Pending
            };
        } else {
            entry.info.state = TaskState::Archived;
        }

        let outcome = if retrying {
            if retry_at.is_some() {
                state.delayed.push(id.to_string());
            } else {
                state.ready[lane_index(lane)].push_back(id.to_string());
            }
            NackOutcome::Retrying { retried: delivered }
        } else {
            state.counters[lane_index(lane)].failed += 1;
            NackOutcome::Archived
        };
        drop(state);

        debug!("Task {} nacked: {:?}", id, outcome);
        self.changed.notify_all();
        Ok(outcome)
    }
}

impl Inspector for MemoryQueue {
    fn task_info(&self, lane: Lane, id: &str) -> Result<TaskInfo, QueueError> {
        let state = self.lock();
        state
            .tasks
            .get(id)
            .filter(|e| e.info.lane == lane)
            .map(|e| e.info.clone())
            .ok_or_else(|| QueueError::TaskNotFound(id.to_string()))
    }

    fn list_active(&self, lane: Lane, page_size: usize) -> Result<Vec<TaskInfo>, QueueError> {
        let state = self.lock();
        let mut active: Vec<&Entry> = state
            .tasks
            .values()
            .filter(|e| e.info.lane == lane && e.info.state == TaskState::Active)
            .collect();
        active.sort_by_key(|e| e.seq);
        Ok(active
            .into_iter()
            .take(page_size)
            .map(|e| e.info.clone())
            .collect())
    }

    fn queue_info(&self, lane: Lane) -> Result<QueueInfo, QueueError> {
        let state = self.lock();
        let counters = state.counters[lane_index(lane)];
        let mut info = QueueInfo {
            processed: counters.processed,
            failed: counters.failed,
            ..Default::default()
        };
        for entry in state.tasks.values().filter(|e| e.info.lane == lane) {
            match entry.info.state {
                TaskState::Pending => info.pending += 1,
                TaskState::Active => info.active += 1,
                TaskState::Scheduled => info.scheduled += 1,
                TaskState::Retry => info.retry += 1,
                TaskState::Archived => {}
            }
        }
        Ok(info)
    }
}
