//! Object storage for uploaded log files.
//!
//! Objects are addressed by `bucket/name` keys. Uploads never overwrite: a
//! second upload under the same key fails with
//! [`StorageError::AlreadyExists`].

pub mod filesystem;
pub mod http;
pub mod retry;

use std::io::Read;
use std::sync::Arc;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{LogsiftError, StorageError};

pub use filesystem::FsObjectStore;
pub use http::HttpObjectStore;
pub use retry::{download_with_retry, RetryPolicy};

pub trait ObjectStore: Send + Sync {
    /// Opens the object at `path` for streaming.
    fn download(&self, path: &str) -> Result<Box<dyn Read + Send>, StorageError>;

    /// Stores `content` as `bucket/name` and returns that key.
    fn upload(&self, bucket: &str, name: &str, content: &[u8]) -> Result<String, StorageError>;
}

/// Builds the backend named in the storage section.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, LogsiftError> {
    match &config.backend {
        StorageBackend::Filesystem { root } => {
            log::debug!("Using filesystem object store at {}", root.display());
            Ok(Arc::new(FsObjectStore::new(root)))
        }
        StorageBackend::Http { base_url, api_key } => {
            let api_key = api_key.resolve()?;
            Ok(Arc::new(HttpObjectStore::new(base_url, api_key)?))
        }
    }
}

/// Rejects empty segments, `.`/`..`, separators and NUL bytes.
pub(crate) fn validate_segment(key: &str, segment: &str) -> Result<(), StorageError> {
    let reason = if segment.is_empty() {
        Some("empty path segment")
    } else if segment == "." || segment == ".." {
        Some("relative path segment")
    } else if segment.contains(['/', '\\', '\0']) {
        Some("separator or NUL in name")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StorageError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Validates a `bucket/name/...` key and returns its segments.
pub(crate) fn split_key(key: &str) -> Result<Vec<&str>, StorageError> {
    let segments: Vec<&str> = key.split('/').collect();
    if segments.len() < 2 {
        return Err(StorageError::InvalidKey {
            key: key.to_string(),
            reason: "expected bucket/name".to_string(),
        });
    }
    for segment in &segments {
        validate_segment(key, segment)?;
    }
    Ok(segments)
}
