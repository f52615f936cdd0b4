use std::path::{Path, PathBuf};

use crate::config::schema::{Config, StorageBackend, CONFIG_VERSION};
use crate::error::ConfigError;
use crate::storage::split_key;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

/// Overrides `keywords`.
pub const ENV_KEYWORDS: &str = "KEYWORD_CONFIG";
/// Overrides `database_path`.
pub const ENV_DATABASE_PATH: &str = "LOGSIFT_DATABASE_PATH";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let mut config: Config = serde_json::from_value(json_value)?;
    apply_env_overrides(&mut config);

    validate_config(&config)?;

    Ok(config)
}

/// Loads `path` when given, otherwise starts from defaults. Environment
/// overrides apply either way.
pub fn load_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let mut config = Config::default();
            apply_env_overrides(&mut config);
            validate_config(&config)?;
            Ok(config)
        }
    }
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(keywords) = std::env::var(ENV_KEYWORDS) {
        log::debug!("Keywords overridden by {}", ENV_KEYWORDS);
        config.keywords = keywords;
    }
    if let Some(path) = std::env::var_os(ENV_DATABASE_PATH).filter(|p| !p.is_empty()) {
        config.database_path = Some(PathBuf::from(path));
    }
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |message: String| Err(ConfigError::Validation { message });

    if config.version != CONFIG_VERSION {
        return invalid(format!("Unsupported config version: {}", config.version));
    }

    // The bucket becomes the first segment of every object key.
    if let Err(e) = split_key(&format!("{}/probe", config.storage.bucket)) {
        return invalid(format!("Invalid storage bucket: {}", e));
    }

    if let StorageBackend::Http { api_key, .. } = &config.storage.backend {
        if !api_key.is_configured() {
            return invalid("HTTP storage backend needs an api_key source".to_string());
        }
    }

    if config.processing.chunk_count == 0 {
        return invalid("processing.chunk_count must be at least 1".to_string());
    }
    if config.processing.insert_batch_size == 0 {
        return invalid("processing.insert_batch_size must be at least 1".to_string());
    }
    if config.queue.concurrency == 0 {
        return invalid("queue.concurrency must be at least 1".to_string());
    }
    if config.queue.max_retry == 0 {
        return invalid("queue.max_retry must be at least 1".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_load_minimal_config() {
        let config = load_config_from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.processing.chunk_count, 4);
        assert_eq!(config.queue.max_retry, 3);
        assert!(matches!(
            config.storage.backend,
            StorageBackend::Filesystem { .. }
        ));
    }

    #[test]
    #[serial]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "database_path": "/var/lib/logsift/logsift.db",
            "keywords": "Timeout, refused",
            "storage": {
                "bucket": "uploads",
                "backend": { "type": "filesystem", "root": "/srv/objects" },
                "download_attempts": 5,
                "download_backoff_ms": 100
            },
            "processing": {
                "large_file_threshold_bytes": 1048576,
                "chunk_count": 8,
                "insert_batch_size": 500,
                "scratch_dir": "/tmp/logsift"
            },
            "queue": {
                "concurrency": 2,
                "max_retry": 5,
                "inspect_timeout_ms": 1000,
                "poll_interval_ms": 50
            }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(
            config.database_path.as_deref(),
            Some(Path::new("/var/lib/logsift/logsift.db"))
        );
        assert_eq!(config.keyword_list().as_slice(), ["timeout", "refused"]);
        assert_eq!(config.storage.bucket, "uploads");
        assert_eq!(config.storage.download_attempts, 5);
        assert_eq!(config.processing.large_file_threshold_bytes, 1048576);
        assert_eq!(config.processing.chunk_count, 8);
        assert_eq!(config.queue.concurrency, 2);
        assert_eq!(config.queue.max_retry, 5);
    }

    #[test]
    #[serial]
    fn test_load_http_backend() {
        let config_json = r#"
        {
            "version": "1.0",
            "storage": {
                "backend": {
                    "type": "http",
                    "base_url": "https://project.supabase.co/storage/v1",
                    "api_key": { "env_var": "SUPABASE_KEY" }
                }
            }
        }
        "#;
        let config = load_config_from_str(config_json).unwrap();
        assert!(matches!(config.storage.backend, StorageBackend::Http { .. }));
    }

    #[test]
    fn test_invalid_version() {
        let result = load_config_from_str(r#"{ "version": "2.0" }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = load_config_from_str(r#"{ "version": "1.0", "workers": 4 }"#);
        assert!(matches!(result, Err(ConfigError::SchemaValidation { .. })));
    }

    #[test]
    fn test_zero_chunk_count_rejected() {
        let result =
            load_config_from_str(r#"{ "version": "1.0", "processing": { "chunk_count": 0 } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_http_backend_without_key_source_rejected() {
        let config_json = r#"
        {
            "version": "1.0",
            "storage": {
                "backend": {
                    "type": "http",
                    "base_url": "https://project.supabase.co/storage/v1",
                    "api_key": {}
                }
            }
        }
        "#;
        assert!(load_config_from_str(config_json).is_err());
    }

    #[test]
    #[serial]
    fn test_bucket_with_separator_rejected() {
        let result =
            load_config_from_str(r#"{ "version": "1.0", "storage": { "bucket": "a/b" } }"#);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            load_config_from_str("{ not json"),
            Err(ConfigError::ParseJson(_))
        ));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var(ENV_KEYWORDS, "disk full,OOM");
        std::env::set_var(ENV_DATABASE_PATH, "/tmp/override.db");

        let config = load_config_from_str(r#"{ "version": "1.0", "keywords": "timeout" }"#);
        let defaulted = load_or_default(None);

        std::env::remove_var(ENV_KEYWORDS);
        std::env::remove_var(ENV_DATABASE_PATH);

        let config = config.unwrap();
        assert_eq!(config.keyword_list().as_slice(), ["disk full", "oom"]);
        assert_eq!(
            config.database_path.as_deref(),
            Some(Path::new("/tmp/override.db"))
        );
        assert_eq!(
            defaulted.unwrap().keyword_list().as_slice(),
            ["disk full", "oom"]
        );
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            load_config("/nonexistent/logsift.json"),
            Err(ConfigError::ReadFile { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logsift.json");
        std::fs::write(&path, r#"{ "version": "1.0", "keywords": "error" }"#).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.keyword_list().as_slice(), ["error"]);
    }
}
