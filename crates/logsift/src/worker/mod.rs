pub mod pool;

pub use pool::{Disposition, TaskReport, WorkerPool};

use crate::pipeline::{JobController, PipelineError};
use crate::queue::DeliveredTask;

/// Work done for one delivered task. `Ok` acknowledges the task, `Err`
/// hands it back to the queue.
pub trait TaskHandler: Send + Sync {
    fn run_task(&self, task: &DeliveredTask) -> Result<(), PipelineError>;
}

impl TaskHandler for JobController {
    fn run_task(&self, task: &DeliveredTask) -> Result<(), PipelineError> {
        self.handle(task).map(|_| ())
    }
}

// Re-export crossbeam_channel for use in main
pub use crossbeam_channel;
