//! Config Tests
//!
//! Tests for defaults, the builder and the JSON configuration file.

use std::fs;
use std::path::PathBuf;

use squidgate::config::{Config, SyncStrategy};
use squidgate::StoreError;
use tempfile::TempDir;

#[test]
fn test_config_defaults() {
    let config = Config::default();

    assert_eq!(config.db_file, PathBuf::from("./squidgate.db"));
    assert_eq!(config.cache_size, 64 * 1024 * 1024);
    assert_eq!(config.sync_strategy, SyncStrategy::EveryCommit);
}

#[test]
fn test_config_builder() {
    let config = Config::builder()
        .db_file("/tmp/gw.db")
        .cache_size(1024)
        .sync_strategy(SyncStrategy::Eventual)
        .build();

    assert_eq!(config.db_file, PathBuf::from("/tmp/gw.db"));
    assert_eq!(config.cache_size, 1024);
    assert_eq!(config.sync_strategy, SyncStrategy::Eventual);
}

#[test]
fn test_from_file_reads_gateway_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(
        &path,
        r#"{
            "proxy": {
                "ssl": {"enabled": false, "listener": ":443", "key": "k", "cert": "c"},
                "http": {"enabled": true, "listener": ":80"}
            },
            "admin": {"listener": ":8443", "key": "k", "cert": "c"},
            "jwt_key": "secret",
            "bolt_db_file": "/var/lib/gw/state.db",
            "sync_strategy": "eventual"
        }"#,
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();

    assert_eq!(config.db_file, PathBuf::from("/var/lib/gw/state.db"));
    assert_eq!(config.sync_strategy, SyncStrategy::Eventual);
    assert_eq!(config.cache_size, Config::default().cache_size);
}

#[test]
fn test_from_file_db_file_key() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{"db_file": "gw.db", "cache_size": 4096}"#).unwrap();

    let config = Config::from_file(&path).unwrap();

    assert_eq!(config.db_file, PathBuf::from("gw.db"));
    assert_eq!(config.cache_size, 4096);
}

#[test]
fn test_from_file_invalid_json() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();

    let err = Config::from_file(&path).unwrap_err();
    assert!(matches!(err, StoreError::Config(_)));
}

#[test]
fn test_from_file_unknown_sync_strategy() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{"sync_strategy": "sometimes"}"#).unwrap();

    assert!(matches!(
        Config::from_file(&path).unwrap_err(),
        StoreError::Config(_)
    ));
}

#[test]
fn test_from_file_missing() {
    let temp_dir = TempDir::new().unwrap();

    let err = Config::from_file(temp_dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, StoreError::Io(_)));
}

#[test]
fn test_validate_rejects_directory() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder().db_file(temp_dir.path()).build();

    assert!(matches!(config.validate().unwrap_err(), StoreError::Config(_)));
}

#[test]
fn test_validate_rejects_empty_path() {
    let config = Config::builder().db_file("").build();

    assert!(matches!(config.validate().unwrap_err(), StoreError::Config(_)));
}
