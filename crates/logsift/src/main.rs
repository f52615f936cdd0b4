use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use serde::Serialize;

use logsift::broadcast::NotificationHub;
use logsift::config::{load_or_default, Config};
use logsift::db::{default_database_path, file_repo, Database};
use logsift::error::{ConfigError, LogsiftError};
use logsift::logging::{self, LogFormat};
use logsift::queue::{MemoryQueue, QueueStatus};
use logsift::stats::{PageRequest, StatsReader};
use logsift::storage::open_store;
use logsift::worker::crossbeam_channel::{self, Receiver};
use logsift::{Ingestor, JobController, PipelineConfig, ServiceContext, WorkerPool};

/// Asynchronous log processing with keyword statistics
#[derive(Parser, Debug)]
#[command(name = "logsift")]
#[command(version)]
#[command(about = "Parse uploaded log files into searchable events and per-job statistics")]
struct Cli {
    /// Configuration file (JSON); built-in defaults when omitted
    #[arg(short, long, env = "LOGSIFT_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format: text or json
    #[arg(long, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process pending jobs until interrupted
    Worker {
        /// Seconds between queue status log lines
        #[arg(long, default_value_t = 30)]
        status_interval: u64,
    },

    /// Upload files, process them and print the resulting jobs
    Submit {
        /// Owner of the submitted files
        #[arg(short, long)]
        user: String,

        /// Give up waiting after this many seconds
        #[arg(long, default_value_t = 3600)]
        timeout: u64,

        #[arg(required = true, num_args = 1..)]
        files: Vec<PathBuf>,
    },

    /// Print one page of a job's events
    Stats {
        #[arg(short, long)]
        job: String,

        #[arg(short, long)]
        user: String,

        #[arg(long, default_value_t = logsift::stats::DEFAULT_PAGE_SIZE)]
        page_size: u32,

        /// Largest event id already seen
        #[arg(long, default_value_t = 0)]
        last_id: i64,

        /// Follow pages until the end
        #[arg(long, default_value_t = false)]
        all: bool,
    },

    /// List a user's jobs with their statistics
    Jobs {
        #[arg(short, long)]
        user: String,
    },
}

/// Services shared by the processing commands.
struct Runtime {
    config: Config,
    queue: Arc<MemoryQueue>,
    hub: Arc<NotificationHub>,
    ctx: ServiceContext,
}

impl Runtime {
    fn build(config: Config) -> Result<Self, LogsiftError> {
        let db = open_database(&config)?;
        let store = open_store(&config.storage)?;
        let queue = Arc::new(MemoryQueue::with_retry_delay(Duration::from_millis(
            config.queue.retry_delay_ms,
        )));
        let hub = Arc::new(NotificationHub::default());
        let ctx = ServiceContext::new(
            db,
            store,
            queue.clone(),
            hub.clone(),
            PipelineConfig::from_config(&config),
        );
        Ok(Self {
            config,
            queue,
            hub,
            ctx,
        })
    }

    fn start_workers(&self) -> Result<WorkerPool, LogsiftError> {
        let controller = Arc::new(JobController::new(self.ctx.clone()));
        Ok(WorkerPool::start(
            self.queue.clone(),
            controller,
            self.config.queue.concurrency,
            Duration::from_millis(self.config.queue.poll_interval_ms),
        )?)
    }

    fn ingestor(&self) -> Ingestor {
        Ingestor::new(&self.ctx, self.queue.clone())
    }

    fn stop(&self, pool: WorkerPool) {
        pool.shutdown();
        pool.wait();
        self.queue.close();
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.log_format) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), LogsiftError> {
    let config = load_or_default(cli.config.as_deref())?;

    match cli.command {
        Command::Worker { status_interval } => run_worker(config, status_interval),
        Command::Submit {
            user,
            timeout,
            files,
        } => run_submit(config, &user, &files, Duration::from_secs(timeout)),
        Command::Stats {
            job,
            user,
            page_size,
            last_id,
            all,
        } => {
            let reader = StatsReader::new(open_database(&config)?);
            let request = PageRequest::new(job, user)
                .page_size(page_size)
                .after(last_id);
            if all {
                print_json(&reader.all_events(&request)?)
            } else {
                print_json(&reader.page(&request)?)
            }
        }
        Command::Jobs { user } => {
            let reader = StatsReader::new(open_database(&config)?);
            print_json(&reader.jobs_for_user(&user)?)
        }
    }
}

fn run_worker(config: Config, status_interval: u64) -> Result<(), LogsiftError> {
    let runtime = Runtime::build(config)?;
    let interrupted = interrupt_channel()?;

    let requeued = runtime.ingestor().requeue_pending()?;
    if !requeued.is_empty() {
        info!("Requeued {} pending jobs", requeued.len());
    }

    let pool = runtime.start_workers()?;
    let interval = Duration::from_secs(status_interval.max(1));
    loop {
        match interrupted.recv_timeout(interval) {
            Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                match QueueStatus::collect(runtime.queue.as_ref()) {
                    Ok(status) => info!(
                        "Queue: {} pending, {} active, {} processed, {} failed",
                        status.total.pending,
                        status.total.active,
                        status.total.processed,
                        status.total.failed
                    ),
                    Err(e) => warn!("Could not read queue status: {}", e),
                }
            }
        }
    }

    info!("Interrupted; finishing in-flight jobs");
    runtime.stop(pool);
    Ok(())
}

#[derive(Serialize)]
struct SubmitReport {
    jobs: Vec<file_repo::FileRow>,
    queue: QueueStatus,
}

fn run_submit(
    config: Config,
    user: &str,
    files: &[PathBuf],
    timeout: Duration,
) -> Result<(), LogsiftError> {
    let runtime = Runtime::build(config)?;
    let interrupted = interrupt_channel()?;
    let printer = spawn_notification_printer(&runtime.hub, user);
    let pool = runtime.start_workers()?;
    let ingestor = runtime.ingestor();

    let mut file_ids = Vec::with_capacity(files.len());
    for path in files {
        let content = std::fs::read(path).map_err(|source| LogsiftError::Io {
            path: path.clone(),
            source,
        })?;
        match ingestor.submit(user, &file_name(path), &content) {
            Ok(job) => file_ids.push(job.file_id),
            Err(e) => error!("Skipping {}: {}", path.display(), e),
        }
    }

    let deadline = Instant::now() + timeout;
    while !runtime.queue.wait_idle(Duration::from_millis(200)) {
        if interrupted.try_recv().is_ok() {
            warn!("Interrupted before all jobs finished");
            break;
        }
        if Instant::now() >= deadline {
            warn!("Timed out waiting for jobs");
            break;
        }
    }

    let queue = QueueStatus::collect(runtime.queue.as_ref())?;
    runtime.stop(pool);

    runtime.hub.disconnect(user);
    if printer.join().is_err() {
        warn!("Notification printer panicked");
    }

    let mut jobs = Vec::with_capacity(file_ids.len());
    for file_id in file_ids {
        if let Some(row) = file_repo::find_by_id(&runtime.ctx.db, file_id)? {
            jobs.push(row);
        }
    }
    print_json(&SubmitReport { jobs, queue })
}

/// Prints the user's notifications as JSON lines until the user is disconnected.
fn spawn_notification_printer(hub: &NotificationHub, user: &str) -> thread::JoinHandle<()> {
    let mut receiver = hub.connect(user);
    thread::spawn(move || {
        use tokio::sync::broadcast::error::RecvError;
        loop {
            match receiver.blocking_recv() {
                Ok(notification) => match serde_json::to_string(&notification) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!("Could not encode notification: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => warn!("Skipped {} notifications", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn interrupt_channel() -> Result<Receiver<()>, LogsiftError> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })?;
    Ok(rx)
}

fn open_database(config: &Config) -> Result<Database, LogsiftError> {
    let path = config
        .database_path
        .clone()
        .or_else(default_database_path)
        .ok_or_else(|| ConfigError::Validation {
            message: "No database_path configured and no home directory found".to_string(),
        })?;
    Ok(Database::open(&path)?)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), LogsiftError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
