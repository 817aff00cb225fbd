//! File-based loading tests.

use std::fs;

use tempfile::TempDir;
use weft_config::{ConfigError, ConfigLoader};

#[test]
fn test_toml_file_then_json_file() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("weft.toml");
    fs::write(
        &base,
        r#"
[server]
http_addr = "127.0.0.1:3000"
request_timeout_ms = 2000

[static_files]
root = "./public"
spa_file = "index.html"
"#,
    )
    .unwrap();
    let local = dir.path().join("local.json");
    fs::write(&local, r#"{"logging": {"level": "debug"}}"#).unwrap();

    let config = ConfigLoader::new()
        .with_file(&base)
        .unwrap()
        .with_optional_file(&local)
        .unwrap()
        .with_optional_file(dir.path().join("absent.toml"))
        .unwrap()
        .load()
        .unwrap();

    assert_eq!(config.server.http_addr, "127.0.0.1:3000");
    assert_eq!(config.server.request_timeout_ms, Some(2000));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.static_files.spa_file.as_deref(), Some("index.html"));
    assert_eq!(config.static_files.index_file.as_deref(), Some("index.html"));
}

#[test]
fn test_missing_required_file() {
    let dir = TempDir::new().unwrap();
    let err = ConfigLoader::new()
        .with_file(dir.path().join("nope.toml"))
        .unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound { .. }));
}

#[test]
fn test_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("weft.yaml");
    fs::write(&path, "server: {}").unwrap();
    assert!(matches!(
        ConfigLoader::new().with_file(&path),
        Err(ConfigError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_invalid_value_fails_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("weft.toml");
    fs::write(&path, "[server]\nhttp_addr = \"not an address\"").unwrap();

    let err = ConfigLoader::new().with_file(&path).unwrap().load().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
}
