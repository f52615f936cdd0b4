use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::StorageError;

use super::{split_key, validate_segment, ObjectStore};

/// Object store over a local directory: key `bucket/name` maps to
/// `<root>/bucket/name`.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let mut path = self.root.clone();
        path.extend(split_key(key)?);
        Ok(path)
    }
}

impl ObjectStore for FsObjectStore {
    fn download(&self, path: &str) -> Result<Box<dyn Read + Send>, StorageError> {
        let file_path = self.object_path(path)?;
        match File::open(&file_path) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(StorageError::ReadObject {
                path: file_path,
                source: e,
            }),
        }
    }

    fn upload(&self, bucket: &str, name: &str, content: &[u8]) -> Result<String, StorageError> {
        let key = format!("{}/{}", bucket, name);
        validate_segment(&key, bucket)?;
        validate_segment(&key, name)?;

        let dir_path = self.root.join(bucket);
        self.ensure_directory(&dir_path)?;
        let file_path = dir_path.join(name);

        // create_new is an atomic check-and-create, so concurrent uploads of
        // one name cannot both succeed.
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&file_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(key));
            }
            Err(e) => {
                return Err(StorageError::WriteObject {
                    path: file_path,
                    source: e,
                });
            }
        };

        if let Err(e) = file.write_all(content).and_then(|()| file.sync_all()) {
            drop(file);
            let _ = std::fs::remove_file(&file_path);
            return Err(StorageError::WriteObject {
                path: file_path,
                source: e,
            });
        }

        Ok(key)
    }
}
