//! Integration tests for configuration loader
//!
//! Tests loading a client configuration from files and building a client
//! from it.

use std::io::Write;
use std::time::Duration;

use graphlink_infra::{config, GraphClient};
use tempfile::Builder;

#[test]
fn test_load_config_from_json_file() {
    let json_content = r#"{
        "api_url": "https://graph.example.com/v1",
        "credentials": {
            "username": "alice",
            "password": "hunter2",
            "client_id": "app-id",
            "client_secret": "app-secret"
        },
        "max_retries": 4,
        "request_timeout_ms": 15000,
        "user_agent": "integration/1.0"
    }"#;

    let mut temp_file = Builder::new().suffix(".json").tempfile().expect("temp file");
    temp_file.write_all(json_content.as_bytes()).expect("write temp file");

    let config = config::load_from_file(Some(temp_file.path().to_path_buf()))
        .expect("config from JSON file");

    assert_eq!(config.api_url, "https://graph.example.com/v1");
    assert_eq!(config.credentials.client_id, "app-id");
    assert_eq!(config.max_retries, 4);
    assert_eq!(config.request_timeout, Duration::from_secs(15));
    assert_eq!(config.refresh_offset, Duration::from_secs(30));
    assert_eq!(config.user_agent, "integration/1.0");
}

#[test]
fn test_load_config_from_toml_file() {
    let toml_content = r#"
api_url = "https://graph.example.com/v1"
fresh_buffer_ms = 500
refresh_offset_ms = 120000

[credentials]
username = "alice"
password = "hunter2"
client_id = "app-id"
client_secret = "app-secret"
"#;

    let mut temp_file = Builder::new().suffix(".toml").tempfile().expect("temp file");
    temp_file.write_all(toml_content.as_bytes()).expect("write temp file");

    let config = config::load_from_file(Some(temp_file.path().to_path_buf()))
        .expect("config from TOML file");

    assert_eq!(config.fresh_buffer, Duration::from_millis(500));
    assert_eq!(config.refresh_offset, Duration::from_secs(120));
    assert_eq!(config.max_retries, 3);
}

#[test]
fn test_loaded_config_builds_client() {
    let json_content = r#"{
        "api_url": "https://graph.example.com/v1/",
        "credentials": {
            "username": "u", "password": "p", "client_id": "c", "client_secret": "s"
        }
    }"#;

    let mut temp_file = Builder::new().suffix(".json").tempfile().expect("temp file");
    temp_file.write_all(json_content.as_bytes()).expect("write temp file");

    let config = config::load_from_file(Some(temp_file.path().to_path_buf())).expect("config");
    let client = GraphClient::new(config).expect("client");

    assert_eq!(client.config().endpoint_url("nodes"), "https://graph.example.com/v1/nodes");
    assert!(!client.credentials().is_authenticated());
}

#[test]
fn test_blank_credentials_are_rejected() {
    let json_content = r#"{
        "api_url": "https://graph.example.com/v1",
        "credentials": {
            "username": "u", "password": "", "client_id": "c", "client_secret": "s"
        }
    }"#;

    let mut temp_file = Builder::new().suffix(".json").tempfile().expect("temp file");
    temp_file.write_all(json_content.as_bytes()).expect("write temp file");

    let err = config::load_from_file(Some(temp_file.path().to_path_buf())).unwrap_err();
    assert!(err.to_string().contains("credentials.password"));
}
