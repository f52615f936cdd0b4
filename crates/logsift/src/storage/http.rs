//! Storage REST adapter (Supabase-style object API) over blocking `reqwest`.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::StorageError;

use super::{split_key, validate_segment, ObjectStore};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(rename = "Key")]
    key: Option<String>,
}

/// Client for `<base_url>/object/...` endpoints, authenticated with a bearer
/// API key.
pub struct HttpObjectStore {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl HttpObjectStore {
    pub fn new(base_url: &str, api_key: SecretString) -> Result<Self, StorageError> {
        // No overall timeout: downloads of multi-gigabyte files stream for a long time.
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn download_url(&self, key: &str) -> String {
        format!("{}/object/authenticated/{}", self.base_url, key)
    }

    fn upload_url(&self, bucket: &str, name: &str) -> String {
        format!("{}/object/{}/{}", self.base_url, bucket, name)
    }
}

impl ObjectStore for HttpObjectStore {
    fn download(&self, path: &str) -> Result<Box<dyn Read + Send>, StorageError> {
        split_key(path)?;
        let response = self
            .client
            .get(self.download_url(path))
            .bearer_auth(self.api_key.expose_secret())
            .send()?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(StorageError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }
        Ok(Box::new(response))
    }

    fn upload(&self, bucket: &str, name: &str, content: &[u8]) -> Result<String, StorageError> {
        let key = format!("{}/{}", bucket, name);
        validate_segment(&key, bucket)?;
        validate_segment(&key, name)?;

        let response = self
            .client
            .post(self.upload_url(bucket, name))
            .bearer_auth(self.api_key.expose_secret())
            .header("x-upsert", "false")
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(content.to_vec())
            .send()?;

        let status = response.status();
        let body = response.text()?;
        upload_result(status, &body, key)
    }
}

/// Maps an upload response onto the stored key or an error.
///
/// The storage API reports a duplicate either as 409 or as 400 with an
/// "already exists" message.
fn upload_result(status: StatusCode, body: &str, key: String) -> Result<String, StorageError> {
    if status == StatusCode::CONFLICT
        || (status == StatusCode::BAD_REQUEST && body.contains("already exists"))
    {
        return Err(StorageError::AlreadyExists(key));
    }
    if !status.is_success() {
        return Err(StorageError::Status {
            status: status.as_u16(),
            path: key,
        });
    }
    let stored = serde_json::from_str::<UploadResponse>(body)
        .ok()
        .and_then(|r| r.key);
    Ok(stored.unwrap_or(key))
}
