pub mod broadcast;
pub mod chunk;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod parser;
pub mod pipeline;
pub mod queue;
pub mod secrets;
pub mod stats;
pub mod storage;
pub mod worker;

pub use broadcast::{EventType, JobPhase, NotificationHub, Notifier};
pub use config::{load_config, Config};
pub use db::Database;
pub use error::{ConfigError, LogsiftError, QueueError, Result, StorageError, WorkerError};
pub use ingest::{Ingestor, SubmittedJob};
pub use parser::{KeywordList, LineParser, LogEvent};
pub use pipeline::{JobController, JobOutcome, PipelineConfig, PipelineError, ServiceContext};
pub use queue::{Lane, MemoryQueue, TaskQueue};
pub use stats::{Page, PageRequest, StatsReader};
pub use storage::ObjectStore;
pub use worker::WorkerPool;
