/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::fs;
use std::path::Path;

use opensphere_shell::services::app_path::BuildMode;
use opensphere_shell::services::settings::types::{DisabledEntryPolicy, OverrideManifest, SettingsFileEntry};
use opensphere_shell::services::settings::worker::SettingsWorker;
use opensphere_shell::services::settings::{SettingsPaths, SettingsStore};
use opensphere_shell::test_utils::write_shipped_settings;
use tempfile::TempDir;

fn compiled_paths(dir: &TempDir) -> SettingsPaths {
    let app_path = dir.path().join("opensphere");
    write_shipped_settings(&app_path, r#"{"admin": {"theme": "dark"}}"#);
    SettingsPaths::for_app(&app_path, BuildMode::Compiled, &dir.path().join("userData"))
}

fn read_descriptors(paths: &SettingsPaths) -> Vec<SettingsFileEntry> {
    serde_json::from_slice(&fs::read(&paths.descriptor_file).unwrap()).unwrap()
}

fn read_manifest(paths: &SettingsPaths) -> OverrideManifest {
    serde_json::from_slice(&fs::read(&paths.manifest_file).unwrap()).unwrap()
}

#[test]
fn first_run_seeds_the_default_entry() {
    let dir = TempDir::new().unwrap();
    let paths = compiled_paths(&dir);
    fs::create_dir_all(&paths.user_settings_dir).unwrap();
    fs::write(&paths.descriptor_file, "").unwrap();

    let store = SettingsStore::initialize(paths.clone(), DisabledEntryPolicy::Omit).unwrap();

    let entries = store.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].enabled);
    assert!(entries[0].default);
    assert_eq!(Path::new(&entries[0].path), paths.default_settings_file);
    assert_eq!(
        fs::read_to_string(&paths.default_settings_file).unwrap(),
        r#"{"admin": {"theme": "dark"}}"#
    );
    assert_eq!(read_manifest(&paths).overrides.len(), 1);
}

#[test]
fn restart_keeps_the_descriptor_list() {
    let dir = TempDir::new().unwrap();
    let paths = compiled_paths(&dir);

    let mut store = SettingsStore::initialize(paths.clone(), DisabledEntryPolicy::Negate).unwrap();
    store
        .add(SettingsFileEntry::new("https://example.com/a.json", "A"), None)
        .unwrap();
    let mut disabled = SettingsFileEntry::new("b.json", "B");
    disabled.enabled = false;
    store.add(disabled, Some("{}")).unwrap();
    let before = store.entries().to_vec();
    drop(store);

    let reloaded = SettingsStore::initialize(paths.clone(), DisabledEntryPolicy::Negate).unwrap();
    assert_eq!(reloaded.entries(), before.as_slice());
    assert_eq!(read_descriptors(&paths), before);

    let manifest = read_manifest(&paths);
    assert_eq!(manifest.overrides.len(), 3);
    assert!(manifest.overrides[2].starts_with('!'));
}

#[test]
fn default_entry_survives_remove() {
    let dir = TempDir::new().unwrap();
    let paths = compiled_paths(&dir);
    let mut store = SettingsStore::initialize(paths, DisabledEntryPolicy::Omit).unwrap();
    let default_entry = store.entries()[0].clone();

    let after = store.remove(&default_entry).unwrap().to_vec();
    assert_eq!(after, vec![default_entry]);
}

#[tokio::test]
async fn add_writes_local_content_and_both_artifacts() {
    let dir = TempDir::new().unwrap();
    let paths = compiled_paths(&dir);
    let store = SettingsStore::initialize(paths.clone(), DisabledEntryPolicy::Omit).unwrap();
    let (handle, _worker) = SettingsWorker::spawn(store);

    let entries = handle
        .add(SettingsFileEntry::new("custom.json", "Custom"), Some("{}".to_string()))
        .await
        .unwrap();

    let custom = paths.user_settings_dir.join("custom.json");
    assert_eq!(fs::read_to_string(&custom).unwrap(), "{}");
    assert_eq!(entries.len(), 2);
    assert_eq!(Path::new(&entries[1].path), custom);
    assert_eq!(read_descriptors(&paths), entries);
    assert_eq!(read_manifest(&paths).overrides.len(), 2);
}

#[tokio::test]
async fn concurrent_adds_are_both_persisted() {
    let dir = TempDir::new().unwrap();
    let paths = compiled_paths(&dir);
    let store = SettingsStore::initialize(paths.clone(), DisabledEntryPolicy::Omit).unwrap();
    let (handle, _worker) = SettingsWorker::spawn(store);

    let first = handle.clone();
    let second = handle.clone();
    let (a, b) = tokio::join!(
        first.add(SettingsFileEntry::new("one.json", "One"), Some("{}".to_string())),
        second.add(SettingsFileEntry::new("two.json", "Two"), Some("{}".to_string())),
    );
    a.unwrap();
    b.unwrap();

    let persisted = read_descriptors(&paths);
    let labels: Vec<&str> = persisted.iter().map(|entry| entry.label.as_str()).collect();
    assert_eq!(persisted.len(), 3);
    assert!(labels.contains(&"One"));
    assert!(labels.contains(&"Two"));
    assert_eq!(handle.entries().await.unwrap(), persisted);
}
