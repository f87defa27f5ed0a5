//! Integration tests for ConfigStore and the persisted settings file
//!
//! These tests verify:
//! - Default generation and write-back on first start
//! - Migrations keyed by version range, and fatal migration failures
//! - `namespace.fieldName` get/set/reset
//! - Change emission only on effective change, with full old/new snapshots

use camino::Utf8PathBuf;
use semver::Version;
use serde_json::json;
use std::fs;
use tempfile::TempDir;
use tokio::time::{Duration, timeout};
use ytmshell::config::{CONFIG_FILE_NAME, Migration};
use ytmshell::{ConfigError, ConfigSnapshot, ConfigStore};

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

fn app_version() -> Version {
    Version::parse("2.1.0").unwrap()
}

#[test]
fn test_missing_file_yields_defaults_and_is_written() {
    let (_temp_dir, config_dir) = create_test_config_dir();

    let store = ConfigStore::load(&config_dir, &app_version()).unwrap();

    assert_eq!(*store.snapshot(), ConfigSnapshot::default());
    let written = fs::read_to_string(config_dir.join(CONFIG_FILE_NAME)).unwrap();
    assert!(written.contains("2.1.0"), "missing version marker:\n{}", written);
    assert!(written.contains("companionServerPort: 9863"));
}

#[test]
fn test_nested_config_dir_is_created() {
    let (_temp_dir, config_dir) = create_test_config_dir();
    let nested = config_dir.join("a").join("b");

    let store = ConfigStore::load(&nested, &app_version()).unwrap();

    assert_eq!(store.config_path(), Some(nested.join(CONFIG_FILE_NAME).as_path()));
    assert!(nested.join(CONFIG_FILE_NAME).exists());
}

#[test]
fn test_partial_file_is_filled_with_defaults() {
    let (_temp_dir, config_dir) = create_test_config_dir();
    fs::write(
        config_dir.join(CONFIG_FILE_NAME),
        "version: 2.1.0\nappearance:\n  zoom: 150\n",
    )
    .unwrap();

    let store = ConfigStore::load(&config_dir, &app_version()).unwrap();
    let snapshot = store.snapshot();

    assert_eq!(snapshot.appearance.zoom, 150);
    assert_eq!(snapshot.integrations.companion_server_port, 9863);
    assert!(snapshot.playback.continue_where_you_left_off);
}

#[test]
fn test_legacy_file_is_migrated_on_load() {
    let (_temp_dir, config_dir) = create_test_config_dir();
    fs::write(
        config_dir.join(CONFIG_FILE_NAME),
        "version: 1.9.0\nappearance:\n  zoom: 1.1\nintegrations:\n  lastFMSessionKey: sk-legacy\n",
    )
    .unwrap();

    let store = ConfigStore::load(&config_dir, &app_version()).unwrap();

    assert_eq!(store.snapshot().appearance.zoom, 110);
    assert_eq!(
        store.snapshot().credentials.last_fm_session_key.as_deref(),
        Some("sk-legacy")
    );

    // Rewritten under the new version, so a second load runs nothing
    let reloaded = ConfigStore::load(&config_dir, &app_version()).unwrap();
    assert_eq!(reloaded.snapshot().appearance.zoom, 110);
}

#[test]
fn test_failing_migration_is_fatal() {
    let (_temp_dir, config_dir) = create_test_config_dir();
    fs::write(config_dir.join(CONFIG_FILE_NAME), "version: 1.0.0\n").unwrap();

    let migrations = [Migration {
        range: ">=2.0.0",
        description: "always fails",
        apply: |_| Err("broken".to_string()),
    }];

    let result = ConfigStore::load_with_migrations(&config_dir, &app_version(), &migrations);

    match result {
        Err(ConfigError::Migration { range, message }) => {
            assert_eq!(range, ">=2.0.0");
            assert_eq!(message, "broken");
        }
        Err(other) => panic!("Expected migration error, got: {}", other),
        Ok(_) => panic!("Expected migration error, got a store"),
    }
}

#[test]
fn test_invalid_stored_version_is_rejected() {
    let (_temp_dir, config_dir) = create_test_config_dir();
    fs::write(config_dir.join(CONFIG_FILE_NAME), "version: not-a-version\n").unwrap();

    let result = ConfigStore::load(&config_dir, &app_version());

    assert!(matches!(result, Err(ConfigError::InvalidVersion(raw)) if raw == "not-a-version"));
}

#[test]
fn test_malformed_yaml_is_a_parse_error() {
    let (_temp_dir, config_dir) = create_test_config_dir();
    fs::write(config_dir.join(CONFIG_FILE_NAME), "appearance: [unclosed\n").unwrap();

    let result = ConfigStore::load(&config_dir, &app_version());

    assert!(matches!(result, Err(ConfigError::Parse { .. })));
}

#[test]
fn test_get_by_path() {
    let store = ConfigStore::in_memory(ConfigSnapshot::default());

    assert_eq!(store.get("appearance.zoom").unwrap(), json!(100));
    assert_eq!(
        store.get("integrations.companionServerPort").unwrap(),
        json!(9863)
    );
    assert!(store.get("playback").unwrap().is_object());
    assert!(matches!(
        store.get("appearance.nope"),
        Err(ConfigError::UnknownKey(_))
    ));
}

#[test]
fn test_set_persists_and_survives_reload() {
    let (_temp_dir, config_dir) = create_test_config_dir();
    let store = ConfigStore::load(&config_dir, &app_version()).unwrap();

    store
        .set("integrations.companionServerEnabled", json!(true))
        .unwrap()
        .expect("effective change");

    let reloaded = ConfigStore::load(&config_dir, &app_version()).unwrap();
    assert!(reloaded.snapshot().integrations.companion_server_enabled);
}

#[test]
fn test_set_rejects_type_mismatch_without_side_effects() {
    let store = ConfigStore::in_memory(ConfigSnapshot::default());
    let mut rx = store.subscribe();

    let result = store.set("appearance.zoom", json!("large"));

    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    assert_eq!(store.snapshot().appearance.zoom, 100);
    assert!(rx.try_recv().is_err(), "No change may be emitted");
}

#[test]
fn test_set_unknown_key_is_rejected() {
    let store = ConfigStore::in_memory(ConfigSnapshot::default());

    assert!(matches!(
        store.set("nope.field", json!(true)),
        Err(ConfigError::UnknownKey(key)) if key == "nope.field"
    ));
}

#[tokio::test]
async fn test_change_carries_full_snapshots() {
    let store = ConfigStore::in_memory(ConfigSnapshot::default());
    let mut rx = store.subscribe();

    store.set("appearance.zoom", json!(125)).unwrap();

    let change = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for change")
        .expect("Channel closed");

    assert_eq!(change.old.appearance.zoom, 100);
    assert_eq!(change.new.appearance.zoom, 125);
    // Untouched namespaces are present in both halves
    assert_eq!(change.new.integrations, change.old.integrations);
}

#[tokio::test]
async fn test_no_change_is_emitted_for_identical_value() {
    let store = ConfigStore::in_memory(ConfigSnapshot::default());
    let mut rx = store.subscribe();

    let change = store.set("appearance.zoom", json!(100)).unwrap();
    assert!(change.is_none());

    let result = timeout(Duration::from_millis(50), rx.recv()).await;
    assert!(result.is_err(), "Identical write must not emit");
}

#[tokio::test]
async fn test_reset_namespace() {
    let store = ConfigStore::in_memory(ConfigSnapshot::default());
    store
        .update(|s| {
            s.appearance.zoom = 200;
            s.playback.ratio_volume = true;
        })
        .unwrap();
    let mut rx = store.subscribe();

    store.reset("appearance").unwrap();

    let change = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout")
        .expect("Channel closed");
    assert_eq!(change.new.appearance.zoom, 100);
    // Other namespaces are left alone
    assert!(change.new.playback.ratio_volume);

    assert!(matches!(
        store.reset("unknown"),
        Err(ConfigError::UnknownKey(_))
    ));
}

#[tokio::test]
async fn test_clones_share_state_and_channel() {
    let store = ConfigStore::in_memory(ConfigSnapshot::default());
    let clone = store.clone();
    let mut rx = store.subscribe();

    clone.update(|s| s.general.start_on_boot = true).unwrap();

    assert!(store.snapshot().general.start_on_boot);
    let change = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout")
        .expect("Channel closed");
    assert!(change.new.general.start_on_boot);
}
