use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, error, info, warn};

use crate::chunk::panic_message;
use crate::error::{QueueError, WorkerError};
use crate::queue::{DeliveredTask, Lane, NackOutcome, TaskQueue};

use super::TaskHandler;

/// What happened to a task after its handler returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Acked,
    Retrying { retried: u32 },
    Archived,
    /// The queue rejected the ack or nack.
    Lost(String),
}

#[derive(Debug, Clone)]
pub struct TaskReport {
    pub worker_id: usize,
    pub task_id: String,
    pub lane: Lane,
    pub error: Option<String>,
    pub disposition: Disposition,
}

/// Fixed set of threads consuming one task queue.
pub struct WorkerPool {
    report_receiver: Receiver<TaskReport>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts `worker_count` consumers, each polling with `poll_interval`.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn start(
        queue: Arc<dyn TaskQueue>,
        handler: Arc<dyn TaskHandler>,
        worker_count: usize,
        poll_interval: Duration,
    ) -> Result<Self, WorkerError> {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (report_sender, report_receiver) = bounded::<TaskReport>(worker_count * 64);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let worker = Worker {
                id: worker_id,
                queue: Arc::clone(&queue),
                handler: Arc::clone(&handler),
                reports: report_sender.clone(),
                shutdown: Arc::clone(&shutdown),
                poll_interval,
            };

            let handle = thread::Builder::new()
                .name(format!("logsift-worker-{}", worker_id))
                .spawn(move || worker.run());

            match handle {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    shutdown.store(true, Ordering::Relaxed);
                    for started in workers {
                        let _ = started.join();
                    }
                    return Err(WorkerError::SpawnFailed(e.to_string()));
                }
            }
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            report_receiver,
            workers,
            shutdown,
        })
    }

    pub fn try_recv_report(&self) -> Option<TaskReport> {
        self.report_receiver.try_recv().ok()
    }

    pub fn recv_report_timeout(&self, timeout: Duration) -> Option<TaskReport> {
        self.report_receiver.recv_timeout(timeout).ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Signals shutdown and joins every worker. A task being handled is
    /// finished first.
    pub fn wait(self) {
        self.shutdown.store(true, Ordering::Relaxed);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

struct Worker {
    id: usize,
    queue: Arc<dyn TaskQueue>,
    handler: Arc<dyn TaskHandler>,
    reports: Sender<TaskReport>,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl Worker {
    fn run(self) {
        debug!("Worker {} started", self.id);

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                debug!("Worker {} received shutdown signal", self.id);
                break;
            }

            match self.queue.dequeue(self.poll_interval) {
                Ok(Some(task)) => self.process(task),
                Ok(None) => continue,
                Err(QueueError::Closed) => {
                    debug!("Worker {} queue closed", self.id);
                    break;
                }
                Err(e) => {
                    error!("Worker {} failed to dequeue: {}", self.id, e);
                    thread::sleep(self.poll_interval);
                }
            }
        }

        debug!("Worker {} stopped", self.id);
    }

    fn process(&self, task: DeliveredTask) {
        debug!(
            "Worker {} processing task {} from {} lane",
            self.id, task.id, task.lane
        );

        let error = match panic::catch_unwind(AssertUnwindSafe(|| self.handler.run_task(&task))) {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(format!("handler panicked: {}", panic_message(panic.as_ref()))),
        };

        let disposition = match &error {
            None => match self.queue.ack(&task.id) {
                Ok(()) => Disposition::Acked,
                Err(e) => Disposition::Lost(e.to_string()),
            },
            Some(message) => match self.queue.nack(&task.id, message) {
                Ok(NackOutcome::Retrying { retried }) => Disposition::Retrying { retried },
                Ok(NackOutcome::Archived) => Disposition::Archived,
                Err(e) => Disposition::Lost(e.to_string()),
            },
        };

        if let Disposition::Lost(reason) = &disposition {
            error!(
                "Worker {} could not settle task {}: {}",
                self.id, task.id, reason
            );
        }

        let report = TaskReport {
            worker_id: self.id,
            task_id: task.id,
            lane: task.lane,
            error,
            disposition,
        };
        match self.reports.try_send(report) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(report)) => {
                warn!("Report buffer full; dropping report for task {}", report.task_id)
            }
        }
    }
}
