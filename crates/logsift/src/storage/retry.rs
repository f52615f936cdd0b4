use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::warn;
use tempfile::NamedTempFile;

use crate::error::StorageError;

use super::ObjectStore;

/// Fixed-backoff retry for object downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Copies the object at `path` into `dest`, retrying transient failures.
///
/// Each attempt starts from an empty file, so a stream that broke halfway
/// never leaves stale bytes behind. Returns the number of bytes written.
pub fn download_with_retry(
    store: &dyn ObjectStore,
    path: &str,
    dest: &mut NamedTempFile,
    policy: &RetryPolicy,
) -> Result<u64, StorageError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match download_once(store, path, dest) {
            Ok(written) => return Ok(written),
            Err(e) if attempt < attempts && e.is_transient() => {
                warn!(
                    "Download of '{}' failed (attempt {}/{}): {}",
                    path, attempt, attempts, e
                );
                thread::sleep(policy.backoff);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn download_once(
    store: &dyn ObjectStore,
    path: &str,
    dest: &mut NamedTempFile,
) -> Result<u64, StorageError> {
    let scratch = dest.path().to_path_buf();
    let write_err = |source: io::Error| StorageError::WriteObject {
        path: scratch.clone(),
        source,
    };

    let file = dest.as_file_mut();
    file.set_len(0).map_err(write_err)?;
    file.rewind().map_err(write_err)?;

    let reader = store.download(path)?;
    let written = copy_object(reader, file, path, &scratch)?;
    file.flush().map_err(write_err)?;
    Ok(written)
}

/// Copies `reader` into `dest`, telling remote read failures apart from
/// local write failures. Only the former are worth retrying.
fn copy_object<R: Read, W: Write>(
    reader: R,
    dest: &mut W,
    path: &str,
    scratch: &Path,
) -> Result<u64, StorageError> {
    let mut reader = TrackedReader {
        inner: reader,
        failed: false,
    };
    io::copy(&mut reader, dest).map_err(|source| {
        if reader.failed {
            StorageError::ReadObject {
                path: PathBuf::from(path),
                source,
            }
        } else {
            StorageError::WriteObject {
                path: scratch.to_path_buf(),
                source,
            }
        }
    })
}

struct TrackedReader<R> {
    inner: R,
    failed: bool,
}

impl<R: Read> Read for TrackedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = self.inner.read(buf);
        if let Err(e) = &result {
            // io::copy retries interrupted reads itself.
            if e.kind() != io::ErrorKind::Interrupted {
                self.failed = true;
            }
        }
        result
    }
}
