//! Test harness wiring the real queue, worker pool and job controller.

#![allow(dead_code)]

use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use logsift::db::{file_repo, Database, FileRow};
use logsift::error::StorageError;
use logsift::pipeline::{JobController, PipelineConfig, ServiceContext};
use logsift::queue::MemoryQueue;
use logsift::storage::{FsObjectStore, ObjectStore, RetryPolicy};
use logsift::{Ingestor, KeywordList, SubmittedJob, WorkerPool};

use super::RecordingNotifier;

/// Filesystem store whose next `n` downloads fail with a 503.
pub struct FlakyStore {
    inner: FsObjectStore,
    failures: AtomicUsize,
    downloads: AtomicUsize,
}

impl FlakyStore {
    pub fn new(root: &Path) -> Self {
        Self {
            inner: FsObjectStore::new(root),
            failures: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
        }
    }

    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

impl ObjectStore for FlakyStore {
    fn download(&self, path: &str) -> Result<Box<dyn Read + Send>, StorageError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StorageError::Status {
                status: 503,
                path: path.to_string(),
            });
        }
        self.inner.download(path)
    }

    fn upload(&self, bucket: &str, name: &str, content: &[u8]) -> Result<String, StorageError> {
        self.inner.upload(bucket, name, content)
    }
}

/// One isolated processing environment.
pub struct TestHarness {
    temp_dir: TempDir,
    pub db: Database,
    pub store: Arc<FlakyStore>,
    pub queue: Arc<MemoryQueue>,
    pub notifier: Arc<RecordingNotifier>,
    pub ctx: ServiceContext,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Starts from a config tuned for tests: keywords `timeout,refused`,
    /// single download attempt, three deliveries per task.
    pub fn with_config(customize: impl FnOnce(&mut PipelineConfig)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(FlakyStore::new(&temp_dir.path().join("objects")));
        let db = Database::open_in_memory().expect("Failed to open database");
        let queue = Arc::new(MemoryQueue::new());
        let notifier = Arc::new(RecordingNotifier::default());

        let mut config = PipelineConfig {
            keywords: KeywordList::parse("timeout,refused"),
            scratch_dir: Some(temp_dir.path().join("scratch")),
            download_retry: RetryPolicy {
                attempts: 1,
                backoff: Duration::ZERO,
            },
            max_retry: 3,
            inspect_timeout: Duration::from_secs(1),
            ..Default::default()
        };
        customize(&mut config);

        let ctx = ServiceContext::new(
            db.clone(),
            store.clone(),
            queue.clone(),
            notifier.clone(),
            config,
        );

        Self {
            temp_dir,
            db,
            store,
            queue,
            notifier,
            ctx,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn ingestor(&self) -> Ingestor {
        Ingestor::new(&self.ctx, self.queue.clone())
    }

    pub fn controller(&self) -> JobController {
        JobController::new(self.ctx.clone())
    }

    pub fn start_pool(&self, workers: usize) -> WorkerPool {
        WorkerPool::start(
            self.queue.clone(),
            Arc::new(self.controller()),
            workers,
            Duration::from_millis(10),
        )
        .expect("Failed to start worker pool")
    }

    pub fn submit(&self, user: &str, name: &str, content: &str) -> SubmittedJob {
        self.ingestor()
            .submit(user, name, content.as_bytes())
            .expect("Failed to submit file")
    }

    /// Submits, processes everything queued with `workers` threads and stops.
    pub fn run_all(&self, workers: usize) {
        let pool = self.start_pool(workers);
        let idle = self.queue.wait_idle(Duration::from_secs(30));
        pool.wait();
        assert!(idle, "queue did not drain");
    }

    pub fn row(&self, file_id: i64) -> FileRow {
        file_repo::find_by_id(&self.db, file_id)
            .expect("Failed to load row")
            .expect("Row missing")
    }
}
