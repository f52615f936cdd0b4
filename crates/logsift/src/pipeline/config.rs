use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::parser::KeywordList;
use crate::queue::{Lane, DEFAULT_MAX_RETRY};
use crate::storage::RetryPolicy;

/// Settings the job controller and ingest read on every job.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub keywords: KeywordList,
    pub bucket: String,
    pub large_file_threshold: u64,
    pub chunk_count: usize,
    pub insert_batch_size: usize,
    pub scratch_dir: Option<PathBuf>,
    pub download_retry: RetryPolicy,
    pub max_retry: u32,
    pub inspect_timeout: Duration,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            keywords: config.keyword_list(),
            bucket: config.storage.bucket.clone(),
            large_file_threshold: config.processing.large_file_threshold_bytes,
            chunk_count: config.processing.chunk_count,
            insert_batch_size: config.processing.insert_batch_size,
            scratch_dir: config.processing.scratch_dir.clone(),
            download_retry: RetryPolicy {
                attempts: config.storage.download_attempts,
                backoff: Duration::from_millis(config.storage.download_backoff_ms),
            },
            max_retry: config.queue.max_retry,
            inspect_timeout: Duration::from_millis(config.queue.inspect_timeout_ms),
        }
    }

    pub fn lane_for(&self, file_size: u64) -> Lane {
        Lane::for_file_size(file_size, self.large_file_threshold)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            keywords: KeywordList::default(),
            bucket: "logs".to_string(),
            large_file_threshold: 1024 * 1024 * 1024,
            chunk_count: 4,
            insert_batch_size: 1000,
            scratch_dir: None,
            download_retry: RetryPolicy::default(),
            max_retry: DEFAULT_MAX_RETRY,
            inspect_timeout: Duration::from_secs(5),
        }
    }
}
