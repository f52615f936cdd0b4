//! Secret resolution for credentials named in the configuration.
//!
//! A [`SecretSource`] may name the secret directly, point at a file holding it
//! (Docker secrets), or name an environment variable. The first configured
//! source in that order wins.

use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source configured (need one of: value, file, env_var)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

/// Where to find one secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_var: Option<String>,
}

impl SecretSource {
    pub fn is_configured(&self) -> bool {
        self.value.as_deref().is_some_and(|s| !s.is_empty())
            || self.file.as_ref().is_some_and(|p| !p.as_os_str().is_empty())
            || self.env_var.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// Resolves the secret. File and environment values are trimmed.
    pub fn resolve(&self) -> Result<SecretString, SecretError> {
        if let Some(value) = self.value.as_deref().filter(|s| !s.is_empty()) {
            return Ok(SecretString::from(value.to_string()));
        }

        if let Some(path) = self.file.as_ref().filter(|p| !p.as_os_str().is_empty()) {
            let path = expand_home(path);
            return std::fs::read_to_string(&path)
                .map(|content| SecretString::from(content.trim().to_string()))
                .map_err(|source| SecretError::FileRead { path, source });
        }

        if let Some(name) = self.env_var.as_deref().filter(|s| !s.is_empty()) {
            return match std::env::var(name) {
                Ok(value) => Ok(SecretString::from(value.trim().to_string())),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            };
        }

        Err(SecretError::NoSourceProvided)
    }
}

fn expand_home(path: &std::path::Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
