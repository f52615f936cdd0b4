//! Table-driven tests for configuration loading and validation.

use logsift::config::{load_config, load_config_from_str, StorageBackend};
use logsift::pipeline::PipelineConfig;
use logsift::storage::open_store;

/// Represents a single config loading test case.
struct ConfigTestCase {
    /// Test case name for identification.
    name: &'static str,
    /// The config JSON content to test.
    config_json: &'static str,
    /// Whether loading should succeed.
    should_succeed: bool,
    /// Expected error substring (if should_succeed is false).
    expected_error: Option<&'static str>,
}

const JSON_CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "valid_minimal",
        config_json: r#"{ "version": "1.0" }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_full",
        config_json: r#"{
            "version": "1.0",
            "database_path": "/var/lib/logsift/logsift.db",
            "keywords": "timeout, connection refused, OOM",
            "storage": {
                "bucket": "uploads",
                "backend": { "type": "filesystem", "root": "/srv/objects" },
                "download_attempts": 4,
                "download_backoff_ms": 250
            },
            "processing": {
                "large_file_threshold_bytes": 536870912,
                "chunk_count": 8,
                "insert_batch_size": 2000
            },
            "queue": {
                "concurrency": 4,
                "max_retry": 5,
                "inspect_timeout_ms": 2000,
                "poll_interval_ms": 50,
                "retry_delay_ms": 1000
            }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "missing_version",
        config_json: r#"{ "keywords": "timeout" }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "wrong_version",
        config_json: r#"{ "version": "0.9" }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "unknown_section",
        config_json: r#"{ "version": "1.0", "ocr": { "enabled": true } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "zero_max_retry",
        config_json: r#"{ "version": "1.0", "queue": { "max_retry": 0 } }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "unknown_backend",
        config_json: r#"{
            "version": "1.0",
            "storage": { "backend": { "type": "s3", "root": "/x" } }
        }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "http_backend_bad_url",
        config_json: r#"{
            "version": "1.0",
            "storage": {
                "backend": {
                    "type": "http",
                    "base_url": "ftp://example.com",
                    "api_key": { "value": "k" }
                }
            }
        }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "bucket_with_dots",
        config_json: r#"{ "version": "1.0", "storage": { "bucket": ".." } }"#,
        should_succeed: false,
        expected_error: Some("Invalid storage bucket"),
    },
    ConfigTestCase {
        name: "not_json",
        config_json: "version = 1.0",
        should_succeed: false,
        expected_error: Some("Failed to parse config JSON"),
    },
];

#[test]
fn test_json_config_loading() {
    for test_case in JSON_CONFIG_TESTS {
        let result = load_config_from_str(test_case.config_json);

        if test_case.should_succeed {
            assert!(
                result.is_ok(),
                "Test '{}': Expected success but got error: {:?}",
                test_case.name,
                result.err()
            );
        } else {
            assert!(
                result.is_err(),
                "Test '{}': Expected error but got success",
                test_case.name
            );

            if let Some(expected_error) = test_case.expected_error {
                let error_msg = result.err().unwrap().to_string();
                assert!(
                    error_msg.contains(expected_error),
                    "Test '{}': Expected error containing '{}', got '{}'",
                    test_case.name,
                    expected_error,
                    error_msg
                );
            }
        }
    }
}

#[test]
fn test_config_file_drives_pipeline_and_store() {
    let dir = tempfile::tempdir().unwrap();
    let objects = dir.path().join("objects");
    let path = dir.path().join("logsift.json");
    std::fs::write(
        &path,
        serde_json::json!({
            "version": "1.0",
            "storage": {
                "bucket": "uploads",
                "backend": { "type": "filesystem", "root": objects },
                "download_attempts": 2
            },
            "processing": { "large_file_threshold_bytes": 1024 },
            "queue": { "max_retry": 4, "inspect_timeout_ms": 10 }
        })
        .to_string(),
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    assert!(matches!(
        &config.storage.backend,
        StorageBackend::Filesystem { root } if *root == objects
    ));

    let pipeline = PipelineConfig::from_config(&config);
    assert_eq!(pipeline.bucket, "uploads");
    assert_eq!(pipeline.max_retry, 4);
    assert_eq!(pipeline.download_retry.attempts, 2);
    assert_eq!(pipeline.large_file_threshold, 1024);

    let store = open_store(&config.storage).unwrap();
    let key = store.upload("uploads", "a.log", b"hello").unwrap();
    assert_eq!(key, "uploads/a.log");
    assert!(objects.join("uploads").join("a.log").exists());
}
