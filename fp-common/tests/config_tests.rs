//! Tests for configuration loading and root folder resolution
//!
//! Covers:
//! - Missing TOML files do not cause failure
//! - Priority order CLI > env > TOML > compiled default
//! - Database creation on first run
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate FP_ROOT_FOLDER are marked with #[serial].

use fp_common::config::{
    default_root_folder, resolve_root_folder, ServerConfig, TomlConfig, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root = resolve_root_folder(None, ROOT_FOLDER_ENV, &TomlConfig::default());

    assert!(!root.as_os_str().is_empty());
    assert_eq!(root, default_root_folder());
}

#[test]
#[serial]
fn test_resolver_env_var_over_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/fp-test-env-folder");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/fp-test-toml-folder")),
        ..Default::default()
    };

    let root = resolve_root_folder(None, ROOT_FOLDER_ENV, &toml);
    assert_eq!(root, PathBuf::from("/tmp/fp-test-env-folder"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_cli_over_env() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/fp-test-env-folder");

    let root = resolve_root_folder(
        Some(Path::new("/tmp/fp-test-cli-folder")),
        ROOT_FOLDER_ENV,
        &TomlConfig::default(),
    );
    assert_eq!(root, PathBuf::from("/tmp/fp-test-cli-folder"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
fn test_toml_file_parsed() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "root_folder = \"/srv/feedplay\"\nport = 6100\ndedup_window_hours = 12\nledger_max_attempts = 5"
    )
    .unwrap();

    let toml = TomlConfig::load(file.path()).unwrap();
    assert_eq!(toml.root_folder, Some(PathBuf::from("/srv/feedplay")));
    assert_eq!(toml.port, Some(6100));
    assert_eq!(toml.dedup_window_hours, Some(12));
    assert_eq!(toml.ledger_max_attempts, Some(5));
    assert!(toml.event_capacity.is_none());
}

#[test]
fn test_malformed_toml_is_config_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = \"not a number").unwrap();

    let err = TomlConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, fp_common::Error::Config(_)));
}

#[test]
fn test_missing_config_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");

    let toml = TomlConfig::load_or_default(Some(&missing));
    assert!(toml.root_folder.is_none());
    assert!(toml.port.is_none());
}

#[test]
#[serial]
fn test_server_config_merges_sources() {
    env::remove_var(ROOT_FOLDER_ENV);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "root_folder = \"/srv/fp\"\nport = 6200\nevent_capacity = 32").unwrap();
    let toml = TomlConfig::load_or_default(Some(file.path()));

    let cfg = ServerConfig::resolve(None, None, &toml);
    assert_eq!(cfg.root_folder, PathBuf::from("/srv/fp"));
    assert_eq!(cfg.port, 6200);
    assert_eq!(cfg.event_capacity, 32);
    assert_eq!(cfg.dedup_window_hours, 24);
    assert_eq!(cfg.max_play_weight, 10.0);
}

#[test]
#[serial]
fn test_max_play_weight_from_toml() {
    env::remove_var(ROOT_FOLDER_ENV);
    let toml = TomlConfig {
        max_play_weight: Some(4.0),
        ..Default::default()
    };
    assert_eq!(ServerConfig::resolve(None, None, &toml).max_play_weight, 4.0);

    // Unusable bounds fall back to the default
    let toml = TomlConfig {
        max_play_weight: Some(f64::INFINITY),
        ..Default::default()
    };
    assert_eq!(ServerConfig::resolve(None, None, &toml).max_play_weight, 10.0);
}

#[tokio::test]
async fn test_database_created_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("feedplay.db");

    let pool = fp_common::db::init_database(&db_path).await.unwrap();
    assert!(db_path.exists(), "Database file was not created");

    let tracks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tracks")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(tracks, 0);

    // Reopening an existing database succeeds
    drop(pool);
    assert!(fp_common::db::init_database(&db_path).await.is_ok());
}
