use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::parser::KeywordList;
use crate::secrets::SecretSource;

/// Only supported config version.
pub const CONFIG_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// SQLite file; `~/.logsift/data/logsift.db` when unset.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Comma-separated keyword list, e.g. `"timeout, refused"`.
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            database_path: None,
            keywords: String::new(),
            storage: StorageConfig::default(),
            processing: ProcessingConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

impl Config {
    pub fn keyword_list(&self) -> KeywordList {
        KeywordList::parse(&self.keywords)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_download_attempts")]
    pub download_attempts: u32,
    #[serde(default = "default_download_backoff_ms")]
    pub download_backoff_ms: u64,
}

fn default_bucket() -> String {
    "logs".to_string()
}

fn default_download_attempts() -> u32 {
    3
}

fn default_download_backoff_ms() -> u64 {
    500
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            backend: StorageBackend::default(),
            download_attempts: default_download_attempts(),
            download_backoff_ms: default_download_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageBackend {
    Filesystem {
        root: PathBuf,
    },
    Http {
        /// Storage API root, e.g. `https://<project>.supabase.co/storage/v1`.
        base_url: String,
        api_key: SecretSource,
    },
}

impl Default for StorageBackend {
    fn default() -> Self {
        let root = dirs::home_dir()
            .map(|home| home.join(".logsift").join("storage"))
            .unwrap_or_else(|| PathBuf::from("storage"));
        StorageBackend::Filesystem { root }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Files strictly larger than this are chunked and routed to the low lane.
    #[serde(default = "default_large_file_threshold")]
    pub large_file_threshold_bytes: u64,
    #[serde(default = "default_chunk_count")]
    pub chunk_count: usize,
    #[serde(default = "default_insert_batch_size")]
    pub insert_batch_size: usize,
    /// Where downloads are staged; the system temp dir when unset.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

fn default_large_file_threshold() -> u64 {
    1024 * 1024 * 1024
}

fn default_chunk_count() -> usize {
    4
}

fn default_insert_batch_size() -> usize {
    1000
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            large_file_threshold_bytes: default_large_file_threshold(),
            chunk_count: default_chunk_count(),
            insert_batch_size: default_insert_batch_size(),
            scratch_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Total deliveries per task.
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,
    #[serde(default = "default_inspect_timeout_ms")]
    pub inspect_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Delay before a failed task is delivered again.
    #[serde(default)]
    pub retry_delay_ms: u64,
}

fn default_concurrency() -> usize {
    num_cpus::get()
}

fn default_max_retry() -> u32 {
    3
}

fn default_inspect_timeout_ms() -> u64 {
    5000
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_retry: default_max_retry(),
            inspect_timeout_ms: default_inspect_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            retry_delay_ms: 0,
        }
    }
}
