use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, info_span, warn};

use crate::broadcast::{EventType, JobPhase};
use crate::chunk::{self, panic_message, KeywordStats, ProcessingStrategy};
use crate::db::{event_repo, file_repo, format_timestamp, JobStatus, StatusUpdate};
use crate::parser::LineParser;
use crate::queue::{task_info_with_timeout, DeliveredTask, LogProcessPayload};
use crate::storage::download_with_retry;

use super::context::ServiceContext;
use super::error::PipelineError;

/// Prefix of the reason stored when a job runs out of attempts.
pub const PERMANENT_FAILURE_PREFIX: &str = "task permanently failed after max retries";

/// What a successful run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub file_id: i64,
    pub job_id: String,
    pub events: usize,
    pub error_count: u64,
    pub keyword_counts: KeywordStats,
    pub processing_time_sec: f64,
    pub chunks: usize,
}

#[derive(Debug, Clone)]
pub enum JobOutcome {
    Completed(JobSummary),
    /// The row was already `completed` or `failed`; nothing was done.
    AlreadyTerminal { file_id: i64, status: JobStatus },
}

/// Position of the current delivery within the task's retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Attempt {
    retried: u32,
    max_retry: u32,
}

/// Start of the current delivery, for the timing columns.
struct Clock {
    started_at: DateTime<Utc>,
    timer: Instant,
}

impl Clock {
    fn start() -> Self {
        Self {
            started_at: Utc::now(),
            timer: Instant::now(),
        }
    }

    fn started_at(&self) -> String {
        format_timestamp(self.started_at)
    }

    fn elapsed_sec(&self) -> f64 {
        self.timer.elapsed().as_secs_f64()
    }
}

impl Attempt {
    fn is_first(&self) -> bool {
        self.retried == 0
    }

    fn is_final(&self) -> bool {
        self.retried.saturating_add(1) >= self.max_retry
    }
}

/// Runs one `log:process` task from download to terminal notification.
///
/// Every error is returned so the queue can decide between redelivery and
/// archival. The row is marked `failed` and the client told only when the
/// current delivery is the last one the queue will make.
pub struct JobController {
    ctx: ServiceContext,
    parser: LineParser,
}

impl JobController {
    pub fn new(ctx: ServiceContext) -> Self {
        let parser = LineParser::new(ctx.config.keywords.clone());
        Self { ctx, parser }
    }

    pub fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    pub fn handle(&self, task: &DeliveredTask) -> Result<JobOutcome, PipelineError> {
        let payload = LogProcessPayload::decode(&task.task)?;
        let _job_span = info_span!("log_job",
            job_id = %task.id,
            file_id = payload.file_id,
            lane = %task.lane,
        )
        .entered();

        let clock = Clock::start();
        let attempt = self.attempt(task);

        let row = match file_repo::find_by_id(&self.ctx.db, payload.file_id) {
            Ok(Some(row)) => row,
            Ok(None) => {
                let err = PipelineError::FileNotFound(payload.file_id);
                return Err(self.fail(task, &payload, &clock, err));
            }
            Err(e) => return Err(self.fail(task, &payload, &clock, e.into())),
        };
        if row.status.is_terminal() {
            info!(
                "File {} is already {}; acknowledging redelivered task {}",
                payload.file_id, row.status, task.id
            );
            return Ok(JobOutcome::AlreadyTerminal {
                file_id: payload.file_id,
                status: row.status,
            });
        }

        if attempt.is_first() {
            self.notify_job(&payload, &task.id, JobPhase::Active);
        } else {
            debug!(
                "Delivery {} of {} for task {}",
                attempt.retried + 1,
                attempt.max_retry,
                task.id
            );
        }

        // The guarded section ends at the commit; nothing after it may turn a
        // completed row into a failed one.
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run(&payload, &clock)))
            .unwrap_or_else(|panic| Err(PipelineError::Panicked(panic_message(panic.as_ref()))));

        match result {
            Ok((summary, update)) => {
                self.guarded(&task.id, "table update", || {
                    self.notify_table(&payload, &task.id, &update)
                });
                self.guarded(&task.id, "completion notice", || {
                    self.notify_job(&payload, &task.id, JobPhase::Completed)
                });
                info!(
                    "Job {} completed: {} events, {} flagged, {:.3}s",
                    task.id, summary.events, summary.error_count, summary.processing_time_sec
                );
                Ok(JobOutcome::Completed(JobSummary {
                    job_id: task.id.clone(),
                    ..summary
                }))
            }
            Err(err) => Err(self.fail(task, &payload, &clock, err)),
        }
    }

    /// Download, parse and persist. Returns once the transaction committed.
    fn run(
        &self,
        payload: &LogProcessPayload,
        clock: &Clock,
    ) -> Result<(JobSummary, StatusUpdate), PipelineError> {
        let config = &self.ctx.config;

        // Step 1: Acquire the file
        let (scratch, file_size) = {
            let _step = info_span!("acquire").entered();
            let mut scratch = self.scratch_file()?;
            let file_size = download_with_retry(
                self.ctx.store.as_ref(),
                &payload.file_path,
                &mut scratch,
                &config.download_retry,
            )?;
            if file_size != payload.file_size_bytes as u64 {
                warn!(
                    "Downloaded {} bytes for file {}, expected {}",
                    file_size, payload.file_id, payload.file_size_bytes
                );
            }
            (scratch, file_size)
        };

        // Step 2: Parse
        let stats = {
            let strategy = ProcessingStrategy::for_size(
                file_size,
                config.large_file_threshold,
                config.chunk_count,
            );
            let _step = info_span!("process", strategy = ?strategy, bytes = file_size).entered();
            chunk::parse_file(
                scratch.path(),
                file_size,
                strategy,
                &self.parser,
                payload.file_id,
            )?
        };
        drop(scratch);

        // Step 3: Persist
        let completed_at = Utc::now();
        let processing_time_sec = clock.elapsed_sec();
        let update = StatusUpdate::completed(
            clock.started_at(),
            format_timestamp(completed_at),
            processing_time_sec,
            stats.error_count,
            stats.keyword_counts.clone(),
        );
        let inserted = {
            let _step = info_span!("persist", events = stats.events.len()).entered();
            let created_at = format_timestamp(completed_at);
            self.ctx.db.with_transaction(|tx| {
                let inserted = event_repo::insert_all(
                    tx,
                    &stats.events,
                    config.insert_batch_size,
                    &created_at,
                )?;
                file_repo::update_status_in(tx, payload.file_id, &update)?;
                Ok(inserted)
            })?
        };

        let summary = JobSummary {
            file_id: payload.file_id,
            job_id: String::new(),
            events: inserted,
            error_count: stats.error_count,
            keyword_counts: stats.keyword_counts,
            processing_time_sec,
            chunks: stats.chunks,
        };
        Ok((summary, update))
    }

    /// Failure path. Records a final failure and hands `err` back for the
    /// queue. Anything that goes wrong here is logged, never returned.
    fn fail(
        &self,
        task: &DeliveredTask,
        payload: &LogProcessPayload,
        clock: &Clock,
        err: PipelineError,
    ) -> PipelineError {
        let attempt = self.attempt(task);
        if !attempt.is_final() {
            warn!(
                "Job {} failed on delivery {} of {}; leaving it to the queue: {}",
                task.id,
                attempt.retried + 1,
                attempt.max_retry,
                err
            );
            return err;
        }

        error!("Job {} failed permanently: {}", task.id, err);
        let update = StatusUpdate::failed(
            format!("{}: {}", PERMANENT_FAILURE_PREFIX, err),
            format_timestamp(Utc::now()),
        )
        .with_timing(clock.started_at(), clock.elapsed_sec());

        match file_repo::update_status_if_pending(&self.ctx.db, payload.file_id, &update) {
            Ok(true) => {
                self.guarded(&task.id, "table update", || {
                    self.notify_table(payload, &task.id, &update)
                });
            }
            Ok(false) => {
                // Missing, or finished by another delivery.
                warn!(
                    "File {} is no longer pending; not reporting job {} as failed",
                    payload.file_id, task.id
                );
                return err;
            }
            Err(e) => error!(
                "Could not record failure of file {} (job {}): {}",
                payload.file_id, task.id, e
            ),
        }
        self.guarded(&task.id, "failure notice", || {
            self.notify_job(payload, &task.id, JobPhase::Failed)
        });
        err
    }

    /// Runs a notification, logging a panic instead of unwinding into the
    /// queue after the row has reached its terminal state.
    fn guarded(&self, job_id: &str, what: &str, send: impl FnOnce()) {
        if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(send)) {
            error!(
                "Sending {} for job {} panicked: {}",
                what,
                job_id,
                panic_message(panic.as_ref())
            );
        }
    }

    /// Reads the retry counters from the queue, falling back to the ones
    /// delivered with the task when the inspector is slow or unavailable.
    fn attempt(&self, task: &DeliveredTask) -> Attempt {
        match task_info_with_timeout(
            &self.ctx.inspector,
            task.lane,
            &task.id,
            self.ctx.config.inspect_timeout,
        ) {
            Ok(info) => Attempt {
                retried: info.retried,
                max_retry: info.max_retry,
            },
            Err(e) => {
                warn!(
                    "Task inspection failed for {}: {}; using delivery metadata",
                    task.id, e
                );
                Attempt {
                    retried: task.retried,
                    max_retry: task.max_retry,
                }
            }
        }
    }

    fn scratch_file(&self) -> Result<NamedTempFile, PipelineError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("logsift-").suffix(".log");
        match &self.ctx.config.scratch_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(PipelineError::Scratch)?;
                builder.tempfile_in(dir)
            }
            None => builder.tempfile(),
        }
        .map_err(PipelineError::Scratch)
    }

    fn notify_job(&self, payload: &LogProcessPayload, job_id: &str, phase: JobPhase) {
        self.ctx
            .notifier
            .notify(&payload.user_id, EventType::JobUpdate, phase.payload(job_id));
    }

    fn notify_table(&self, payload: &LogProcessPayload, job_id: &str, update: &StatusUpdate) {
        let mut data = match serde_json::to_value(update) {
            Ok(Value::Object(map)) => map,
            Ok(_) => serde_json::Map::new(),
            Err(e) => {
                error!("Failed to encode table update for file {}: {}", payload.file_id, e);
                return;
            }
        };
        data.insert("file_id".to_string(), Value::from(payload.file_id));
        data.insert("job_id".to_string(), Value::from(job_id));
        self.ctx
            .notifier
            .notify(&payload.user_id, EventType::LogTableUpdate, Value::Object(data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{Notification, Notifier};
    use crate::db::{Database, NewFile};
    use crate::error::{QueueError, StorageError};
    use crate::queue::{
        new_log_process_task, Inspector, Lane, QueueInfo, TaskInfo, TaskState,
    };
    use crate::storage::{FsObjectStore, ObjectStore, RetryPolicy};
    use crate::pipeline::PipelineConfig;
    use crate::parser::KeywordList;
    use std::io::Read;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, Notification)>>,
        /// Simulates a push transport that blows up on table updates.
        panic_on_table: AtomicBool,
    }

    impl Notifier for Recorder {
        fn notify(&self, user_id: &str, event_type: EventType, data: Value) {
            if event_type == EventType::LogTableUpdate && self.panic_on_table.load(Ordering::SeqCst)
            {
                panic!("push transport closed");
            }
            self.sent
                .lock()
                .unwrap()
                .push((user_id.to_string(), Notification { event_type, data }));
        }
    }

    impl Recorder {
        fn job_updates(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, n)| n.event_type == EventType::JobUpdate)
                .map(|(_, n)| n.data.as_str().unwrap().to_string())
                .collect()
        }
    }

    /// Inspector that reports fixed counters, or nothing at all.
    struct FixedInspector(Option<(u32, u32)>);

    impl Inspector for FixedInspector {
        fn task_info(&self, lane: Lane, id: &str) -> Result<TaskInfo, QueueError> {
            let (retried, max_retry) = self
                .0
                .ok_or_else(|| QueueError::Unavailable("down".to_string()))?;
            Ok(TaskInfo {
                id: id.to_string(),
                lane,
                task_type: String::new(),
                payload: Vec::new(),
                state: TaskState::Active,
                retried,
                max_retry,
                last_error: None,
            })
        }

        fn list_active(&self, _: Lane, _: usize) -> Result<Vec<TaskInfo>, QueueError> {
            Ok(Vec::new())
        }

        fn queue_info(&self, _: Lane) -> Result<QueueInfo, QueueError> {
            Ok(QueueInfo::default())
        }
    }

    /// Filesystem store whose downloads can be made to panic.
    struct TestStore {
        inner: FsObjectStore,
        panic_on_download: AtomicBool,
    }

    impl ObjectStore for TestStore {
        fn download(&self, path: &str) -> Result<Box<dyn Read + Send>, StorageError> {
            if self.panic_on_download.load(Ordering::SeqCst) {
                panic!("object stream corrupted");
            }
            self.inner.download(path)
        }

        fn upload(&self, bucket: &str, name: &str, content: &[u8]) -> Result<String, StorageError> {
            self.inner.upload(bucket, name, content)
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        controller: JobController,
        notifier: Arc<Recorder>,
        store: Arc<TestStore>,
        db: Database,
    }

    fn fixture(counters: Option<(u32, u32)>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(TestStore {
            inner: FsObjectStore::new(dir.path().join("objects")),
            panic_on_download: AtomicBool::new(false),
        });
        let notifier = Arc::new(Recorder::default());
        let db = Database::open_in_memory().unwrap();
        let config = PipelineConfig {
            keywords: KeywordList::parse("timeout,refused"),
            scratch_dir: Some(dir.path().join("scratch")),
            download_retry: RetryPolicy {
                attempts: 1,
                backoff: Duration::ZERO,
            },
            inspect_timeout: Duration::from_millis(500),
            ..Default::default()
        };
        let ctx = ServiceContext::new(
            db.clone(),
            store.clone(),
            Arc::new(FixedInspector(counters)),
            notifier.clone(),
            config,
        );
        Fixture {
            _dir: dir,
            controller: JobController::new(ctx),
            notifier,
            store,
            db,
        }
    }

    fn submit(f: &Fixture, name: &str, content: Option<&str>, retried: u32) -> DeliveredTask {
        let file_path = match content {
            Some(content) => f.store.upload("logs", name, content.as_bytes()).unwrap(),
            None => format!("logs/{}", name),
        };
        let size = content.map_or(0, str::len) as i64;
        let file_id = file_repo::insert(
            &f.db,
            &NewFile {
                file_name: name.to_string(),
                file_path: file_path.clone(),
                file_size_bytes: size,
                user_id: "u1".to_string(),
                created_at: "2026-01-01T00:00:00.000Z".to_string(),
            },
        )
        .unwrap();
        let payload = LogProcessPayload {
            file_id,
            file_path,
            file_size_bytes: size,
            user_id: "u1".to_string(),
        };
        DeliveredTask {
            id: format!("task-{}", file_id),
            lane: Lane::High,
            task: new_log_process_task(&payload).unwrap(),
            retried,
            max_retry: 3,
        }
    }

    const LOG: &str = "[2024-01-01 10:00:00] ERROR connection refused from 10.0.0.1\n\
                       [2024-01-01 10:00:01] INFO all good\n\
                       not a log line\n";

    #[test]
    fn test_completes_job() {
        let f = fixture(Some((0, 3)));
        let task = submit(&f, "app.log", Some(LOG), 0);

        let outcome = f.controller.handle(&task).unwrap();
        let JobOutcome::Completed(summary) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(summary.events, 2);
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.keyword_counts.get("refused"), Some(&1));

        let file_id = summary.file_id;
        let row = file_repo::find_by_id(&f.db, file_id).unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Completed);
        assert_eq!(row.error_count, 1);
        assert!(row.process_start_time.is_some());
        assert_eq!(event_repo::count_for_file(&f.db, file_id).unwrap(), 2);

        assert_eq!(
            f.notifier.job_updates(),
            vec![
                format!("Job {} active", task.id),
                format!("Job {} completed", task.id)
            ]
        );
    }

    #[test]
    fn test_non_final_failure_is_silent() {
        let f = fixture(Some((0, 3)));
        let task = submit(&f, "missing.log", None, 0);

        let err = f.controller.handle(&task).unwrap_err();
        assert!(matches!(err, PipelineError::Storage(_)));

        let file_id = LogProcessPayload::decode(&task.task).unwrap().file_id;
        let row = file_repo::find_by_id(&f.db, file_id).unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Pending);
        assert_eq!(f.notifier.job_updates(), vec![format!("Job {} active", task.id)]);
    }

    #[test]
    fn test_final_failure_marks_row_failed() {
        let f = fixture(Some((2, 3)));
        let task = submit(&f, "missing.log", None, 2);

        assert!(f.controller.handle(&task).is_err());

        let file_id = LogProcessPayload::decode(&task.task).unwrap().file_id;
        let row = file_repo::find_by_id(&f.db, file_id).unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Failed);
        assert!(row.process_start_time.is_some());
        assert!(row.processing_time_sec.is_some());
        assert!(row
            .failure_reason
            .unwrap()
            .starts_with("task permanently failed after max retries: "));
        assert_eq!(f.notifier.job_updates(), vec![format!("Job {} failed", task.id)]);
    }

    #[test]
    fn test_notifier_panic_after_commit_keeps_row_completed() {
        let f = fixture(Some((2, 3)));
        let task = submit(&f, "app.log", Some(LOG), 2);
        f.notifier.panic_on_table.store(true, Ordering::SeqCst);

        let outcome = f.controller.handle(&task).unwrap();
        assert!(matches!(outcome, JobOutcome::Completed(_)));

        let file_id = LogProcessPayload::decode(&task.task).unwrap().file_id;
        let row = file_repo::find_by_id(&f.db, file_id).unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Completed);
        assert!(row.failure_reason.is_none());
        assert_eq!(event_repo::count_for_file(&f.db, file_id).unwrap(), 2);
        assert_eq!(
            f.notifier.job_updates(),
            vec![format!("Job {} completed", task.id)]
        );
    }

    #[test]
    fn test_panic_on_non_final_delivery_is_retryable() {
        let f = fixture(Some((0, 3)));
        let task = submit(&f, "app.log", Some(LOG), 0);
        f.store.panic_on_download.store(true, Ordering::SeqCst);

        let err = f.controller.handle(&task).unwrap_err();
        assert!(
            matches!(&err, PipelineError::Panicked(msg) if msg == "object stream corrupted"),
            "{err}"
        );

        let file_id = LogProcessPayload::decode(&task.task).unwrap().file_id;
        let row = file_repo::find_by_id(&f.db, file_id).unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Pending);
        assert_eq!(event_repo::count_for_file(&f.db, file_id).unwrap(), 0);
        assert_eq!(f.notifier.job_updates(), vec![format!("Job {} active", task.id)]);
    }

    #[test]
    fn test_panic_on_final_delivery_fails_job_once() {
        let f = fixture(Some((2, 3)));
        let task = submit(&f, "app.log", Some(LOG), 2);
        f.store.panic_on_download.store(true, Ordering::SeqCst);

        let err = f.controller.handle(&task).unwrap_err();
        assert!(matches!(err, PipelineError::Panicked(_)));

        let file_id = LogProcessPayload::decode(&task.task).unwrap().file_id;
        let row = file_repo::find_by_id(&f.db, file_id).unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Failed);
        let reason = row.failure_reason.unwrap();
        assert!(reason.contains("Job panicked: object stream corrupted"), "{reason}");
        assert_eq!(f.notifier.job_updates(), vec![format!("Job {} failed", task.id)]);
    }

    #[test]
    fn test_row_lookup_error_on_final_delivery_reports_failure() {
        let f = fixture(Some((2, 3)));
        let task = submit(&f, "app.log", Some(LOG), 2);
        f.db
            .with_conn(|conn| {
                conn.execute_batch("ALTER TABLE file_stats RENAME TO file_stats_moved")?;
                Ok(())
            })
            .unwrap();

        let err = f.controller.handle(&task).unwrap_err();
        assert!(matches!(err, PipelineError::Database(_)), "{err}");
        assert_eq!(f.notifier.job_updates(), vec![format!("Job {} failed", task.id)]);
    }

    #[test]
    fn test_missing_row_on_final_delivery_is_not_announced() {
        let f = fixture(Some((2, 3)));
        let payload = LogProcessPayload {
            file_id: 404,
            file_path: "logs/gone.log".to_string(),
            file_size_bytes: 0,
            user_id: "u1".to_string(),
        };
        let task = DeliveredTask {
            id: "t".to_string(),
            lane: Lane::High,
            task: new_log_process_task(&payload).unwrap(),
            retried: 2,
            max_retry: 3,
        };

        assert!(matches!(
            f.controller.handle(&task),
            Err(PipelineError::FileNotFound(404))
        ));
        assert!(f.notifier.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_inspector_outage_uses_delivery_metadata() {
        let f = fixture(None);
        let task = submit(&f, "missing.log", None, 2);

        assert!(f.controller.handle(&task).is_err());
        assert_eq!(f.notifier.job_updates(), vec![format!("Job {} failed", task.id)]);
    }

    #[test]
    fn test_terminal_row_is_skipped() {
        let f = fixture(Some((1, 3)));
        let task = submit(&f, "app.log", Some(LOG), 1);
        let file_id = LogProcessPayload::decode(&task.task).unwrap().file_id;
        file_repo::update_status(
            &f.db,
            file_id,
            &StatusUpdate::failed("earlier".to_string(), "2026-01-01T00:00:00.000Z".to_string()),
        )
        .unwrap();

        let outcome = f.controller.handle(&task).unwrap();
        assert!(matches!(
            outcome,
            JobOutcome::AlreadyTerminal {
                status: JobStatus::Failed,
                ..
            }
        ));
        assert!(f.notifier.sent.lock().unwrap().is_empty());
        assert_eq!(event_repo::count_for_file(&f.db, file_id).unwrap(), 0);
    }

    #[test]
    fn test_missing_row() {
        let f = fixture(Some((0, 3)));
        let payload = LogProcessPayload {
            file_id: 999,
            file_path: "logs/x.log".to_string(),
            file_size_bytes: 0,
            user_id: "u1".to_string(),
        };
        let task = DeliveredTask {
            id: "t".to_string(),
            lane: Lane::High,
            task: new_log_process_task(&payload).unwrap(),
            retried: 0,
            max_retry: 3,
        };
        assert!(matches!(
            f.controller.handle(&task),
            Err(PipelineError::FileNotFound(999))
        ));
    }

    #[test]
    fn test_table_update_payload() {
        let f = fixture(Some((0, 3)));
        let task = submit(&f, "app.log", Some(LOG), 0);
        f.controller.handle(&task).unwrap();

        let notifications = f.notifier.sent.lock().unwrap();
        let (user, table) = notifications
            .iter()
            .find(|(_, n)| n.event_type == EventType::LogTableUpdate)
            .unwrap();
        assert_eq!(user, "u1");
        assert_eq!(table.data["status"], "completed");
        assert_eq!(table.data["job_id"], task.id.as_str());
        assert_eq!(table.data["error_count"], 1);
        assert_eq!(table.data["keyword_stats"]["refused"], 1);
        assert!(table.data.get("failure_reason").is_none());
    }
}
