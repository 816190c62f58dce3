//! Table-driven tests for configuration loading and validation.

mod common;

use std::path::PathBuf;

use serial_test::serial;

use common::{ConfigJsonBuilder, TestHarness};
use permitflow::config::{load_config, load_config_from_str, DATABASE_PATH_ENV};

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
        name: "empty_object_uses_defaults",
        config_json: "{}",
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_full",
        config_json: r#"{
            "version": "1.0",
            "databasePath": "/var/lib/permitflow/permitflow.db",
            "logLevel": "permitflow=debug",
            "evidence": {
                "maxSizeBytes": 1048576,
                "allowedMimeTypes": ["image/png"]
            },
            "permitTypes": [
                { "name": "altura", "description": "Trabajos en altura", "rank": 1 },
                { "name": "cierre", "rank": 2 }
            ]
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "unsupported_version",
        config_json: r#"{ "version": "2.0" }"#,
        should_succeed: false,
        expected_error: Some("Unsupported config version"),
    },
    ConfigTestCase {
        name: "duplicate_name",
        config_json: r#"{
            "permitTypes": [
                { "name": "altura", "rank": 1 },
                { "name": "altura", "rank": 2 }
            ]
        }"#,
        should_succeed: false,
        expected_error: Some("Duplicate permit type name"),
    },
    ConfigTestCase {
        name: "duplicate_rank",
        config_json: r#"{
            "permitTypes": [
                { "name": "altura", "rank": 1 },
                { "name": "enganche", "rank": 1 }
            ]
        }"#,
        should_succeed: false,
        expected_error: Some("Rank 1 is already used"),
    },
    ConfigTestCase {
        name: "empty_catalog",
        config_json: r#"{ "permitTypes": [] }"#,
        should_succeed: false,
        expected_error: Some("at least one entry"),
    },
    ConfigTestCase {
        name: "negative_rank",
        config_json: r#"{ "permitTypes": [{ "name": "altura", "rank": -1 }] }"#,
        should_succeed: false,
        expected_error: Some("parse"),
    },
    ConfigTestCase {
        name: "no_mime_types",
        config_json: r#"{ "evidence": { "allowedMimeTypes": [] } }"#,
        should_succeed: false,
        expected_error: Some("allowedMimeTypes"),
    },
];

#[test]
#[serial]
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
#[serial]
fn test_load_config_from_file() {
    let harness = TestHarness::new();
    let path = harness.temp_path().join("permitflow.json");
    let json = ConfigJsonBuilder::new()
        .database_path("/srv/permitflow.db")
        .max_size_bytes(2048)
        .permit_type("altura", 1)
        .permit_type("cierre", 2)
        .build();
    std::fs::write(&path, json).unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.database_path, Some(PathBuf::from("/srv/permitflow.db")));
    assert_eq!(config.evidence.max_size_bytes, 2048);
    assert_eq!(config.evidence.allowed_mime_types.len(), 4);
    let names: Vec<&str> = config.permit_types.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["altura", "cierre"]);
}

#[test]
#[serial]
fn test_env_overrides_database_path() {
    std::env::set_var(DATABASE_PATH_ENV, "/tmp/from-env.db");
    let json = ConfigJsonBuilder::new()
        .database_path("/srv/permitflow.db")
        .build();
    let config = load_config_from_str(&json);
    std::env::remove_var(DATABASE_PATH_ENV);

    assert_eq!(
        config.unwrap().database_path,
        Some(PathBuf::from("/tmp/from-env.db"))
    );
}

#[test]
#[serial]
fn test_blank_env_value_is_ignored() {
    std::env::set_var(DATABASE_PATH_ENV, "   ");
    let config = load_config_from_str("{}");
    std::env::remove_var(DATABASE_PATH_ENV);

    assert!(config.unwrap().database_path.is_none());
}
