/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! User settings override store.
//!
//! Owns the ordered list of settings sources and the two files derived from
//! it in the user settings directory:
//! - `.settings-files.json`: the descriptor list, including disabled entries
//! - `.settings.json`: the override manifest the web application loads
//!
//! Both files are rewritten in full after every mutation. Mutations from
//! other tasks go through [`worker::SettingsHandle`], which serializes them.

pub mod types;
pub mod worker;

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use log::{debug, error, info, warn};

use crate::services::app_path::BuildMode;
use types::{DisabledEntryPolicy, OverrideManifest, SettingsFileEntry};

pub use types::is_remote_path;

/// Manifest consumed by the web application.
pub const MANIFEST_FILE_NAME: &str = ".settings.json";
/// Shipped settings copied into the user directory.
pub const DEFAULT_SETTINGS_FILE_NAME: &str = ".settings-default.json";
/// Persisted descriptor list.
pub const DESCRIPTOR_FILE_NAME: &str = ".settings-files.json";
/// Label of the seeded default entry.
pub const DEFAULT_ENTRY_LABEL: &str = "Default";

/// Filesystem locations used by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettingsPaths {
    /// Shipped application settings file copied in at initialization.
    pub shipped_settings_file: PathBuf,
    pub user_settings_dir: PathBuf,
    pub manifest_file: PathBuf,
    pub descriptor_file: PathBuf,
    pub default_settings_file: PathBuf,
}

impl SettingsPaths {
    /// Paths for the base application at `app_path`.
    ///
    /// The debug build keeps everything under the app's `.build` directory,
    /// the compiled development build next to the compiled app, and packaged
    /// builds in the per-user data directory.
    pub fn for_app(app_path: &Path, mode: BuildMode, user_data_dir: &Path) -> Self {
        let (app_settings_dir, user_settings_dir) = match mode {
            BuildMode::Debug => {
                let app_settings_dir = app_path.join(".build");
                let user_settings_dir = app_settings_dir.join("userConfig");
                (app_settings_dir, user_settings_dir)
            },
            BuildMode::Compiled => (app_path.join("config"), app_path.join("userConfig")),
            BuildMode::Production => (app_path.join("config"), user_data_dir.join("config")),
        };
        let shipped_name = if mode.is_debug() {
            "settings-debug.json"
        } else {
            "settings.json"
        };
        Self::new(app_settings_dir.join(shipped_name), user_settings_dir)
    }

    pub fn new(shipped_settings_file: PathBuf, user_settings_dir: PathBuf) -> Self {
        Self {
            shipped_settings_file,
            manifest_file: user_settings_dir.join(MANIFEST_FILE_NAME),
            descriptor_file: user_settings_dir.join(DESCRIPTOR_FILE_NAME),
            default_settings_file: user_settings_dir.join(DEFAULT_SETTINGS_FILE_NAME),
            user_settings_dir,
        }
    }

    fn default_settings_path(&self) -> String {
        self.default_settings_file.to_string_lossy().into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    Io(String),
    Parse(String),
    Serialize(String),
    /// A local entry path that would land outside the user settings directory.
    InvalidPath(String),
    /// User settings are disabled by configuration.
    Unsupported,
    /// The mutation worker has shut down.
    WorkerClosed,
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "settings IO error: {e}"),
            Self::Parse(e) => write!(f, "settings parse error: {e}"),
            Self::Serialize(e) => write!(f, "settings serialization error: {e}"),
            Self::InvalidPath(path) => write!(f, "settings path '{path}' is outside the user settings directory"),
            Self::Unsupported => write!(f, "user settings are not enabled"),
            Self::WorkerClosed => write!(f, "settings worker is no longer running"),
        }
    }
}

impl std::error::Error for SettingsError {}

/// In-memory entry list plus its on-disk artifacts.
#[derive(Debug)]
pub struct SettingsStore {
    paths: SettingsPaths,
    entries: Vec<SettingsFileEntry>,
    disabled_policy: DisabledEntryPolicy,
}

impl SettingsStore {
    /// Run the initialization protocol. Safe to call again on every start.
    pub fn initialize(paths: SettingsPaths, disabled_policy: DisabledEntryPolicy) -> Result<Self, SettingsError> {
        fs::create_dir_all(&paths.user_settings_dir).map_err(|e| {
            SettingsError::Io(format!(
                "failed to create {}: {e}",
                paths.user_settings_dir.display()
            ))
        })?;

        let entries = load_descriptor_list(&paths.descriptor_file)?;
        let mut store = Self {
            paths,
            entries,
            disabled_policy,
        };

        if store.copy_shipped_settings() && store.entries.is_empty() {
            store.entries.push(SettingsFileEntry {
                default: true,
                ..SettingsFileEntry::new(store.paths.default_settings_path(), DEFAULT_ENTRY_LABEL)
            });
        }

        store.persist()?;
        info!(
            "settings: initialized {} entries in {}",
            store.entries.len(),
            store.paths.user_settings_dir.display()
        );
        Ok(store)
    }

    pub fn paths(&self) -> &SettingsPaths {
        &self.paths
    }

    pub fn entries(&self) -> &[SettingsFileEntry] {
        &self.entries
    }

    pub fn disabled_policy(&self) -> DisabledEntryPolicy {
        self.disabled_policy
    }

    pub fn manifest(&self) -> OverrideManifest {
        OverrideManifest::derive_now(&self.entries, self.disabled_policy)
    }

    /// Store `entry`, writing `content` next to the other user settings when
    /// the entry is local. Remote entries are never written to disk. An entry
    /// with the same path is replaced in place.
    ///
    /// Local paths must stay inside the user settings directory: relative
    /// paths without `..`, or absolute paths already under it.
    pub fn add(&mut self, mut entry: SettingsFileEntry, content: Option<&str>) -> Result<&[SettingsFileEntry], SettingsError> {
        if !entry.is_remote() {
            let local_path = self.local_settings_path(&entry.path)?;
            if let Some(content) = content {
                write_file(&local_path, content.as_bytes())?;
            }
            entry.path = local_path.to_string_lossy().into_owned();
        }

        match self.position(&entry.path) {
            Some(index) => self.entries[index] = entry,
            None => self.entries.push(entry),
        }
        self.persist()?;
        Ok(&self.entries)
    }

    /// Remove the entry with `entry.path`. The default entry is never removed.
    pub fn remove(&mut self, entry: &SettingsFileEntry) -> Result<&[SettingsFileEntry], SettingsError> {
        if self.is_default_path(&entry.path) {
            debug!("settings: refusing to remove default entry {}", entry.path);
        } else if let Some(index) = self.position(&entry.path) {
            let removed = self.entries.remove(index);
            if !removed.is_remote()
                && let Err(e) = fs::remove_file(&removed.path)
            {
                error!("settings: failed deleting config file at {}: {e}", removed.path);
            }
        }
        self.persist()?;
        Ok(&self.entries)
    }

    /// Replace the entry with the same path; unknown paths are ignored.
    pub fn update(&mut self, entry: SettingsFileEntry) -> Result<&[SettingsFileEntry], SettingsError> {
        if let Some(index) = self.position(&entry.path) {
            self.entries[index] = entry;
        }
        self.persist()?;
        Ok(&self.entries)
    }

    /// Substitute the whole list. A list missing the default entry gets it
    /// back at the front.
    pub fn replace_all(&mut self, entries: Vec<SettingsFileEntry>) -> Result<&[SettingsFileEntry], SettingsError> {
        let default_entry = self.entries.iter().find(|entry| entry.default).cloned();
        self.entries = entries;
        if let Some(default_entry) = default_entry
            && self.position(&default_entry.path).is_none()
        {
            warn!("settings: replacement list dropped the default entry; restoring it");
            self.entries.insert(0, default_entry);
        }
        self.persist()?;
        Ok(&self.entries)
    }

    /// Rewrite the manifest and the descriptor list from the current entries.
    pub fn persist(&self) -> Result<(), SettingsError> {
        let manifest = serde_json::to_vec_pretty(&self.manifest())
            .map_err(|e| SettingsError::Serialize(e.to_string()))?;
        write_file(&self.paths.manifest_file, &manifest)?;

        let descriptors = serde_json::to_vec_pretty(&self.entries)
            .map_err(|e| SettingsError::Serialize(e.to_string()))?;
        write_file(&self.paths.descriptor_file, &descriptors)
    }

    fn local_settings_path(&self, path: &str) -> Result<PathBuf, SettingsError> {
        let requested = Path::new(path);
        let relative = if requested.is_absolute() {
            requested
                .strip_prefix(&self.paths.user_settings_dir)
                .map_err(|_| SettingsError::InvalidPath(path.to_string()))?
        } else {
            requested
        };

        let contained = relative
            .components()
            .any(|component| matches!(component, Component::Normal(_)))
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if !contained {
            warn!("settings: rejecting settings path {path}");
            return Err(SettingsError::InvalidPath(path.to_string()));
        }
        Ok(self.paths.user_settings_dir.join(relative))
    }

    fn position(&self, path: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.path == path)
    }

    fn is_default_path(&self, path: &str) -> bool {
        path == self.paths.default_settings_path()
            || self
                .entries
                .iter()
                .any(|entry| entry.default && entry.path == path)
    }

    /// Copy the shipped settings over the previous copy. Returns whether the
    /// default entry has a backing file.
    fn copy_shipped_settings(&self) -> bool {
        let shipped = &self.paths.shipped_settings_file;
        if !shipped.exists() {
            warn!("settings: unable to locate app settings file at {}", shipped.display());
            return false;
        }
        match fs::copy(shipped, &self.paths.default_settings_file) {
            Ok(_) => true,
            Err(e) => {
                error!(
                    "settings: failed copying {} to {}: {e}",
                    shipped.display(),
                    self.paths.default_settings_file.display()
                );
                false
            },
        }
    }
}

fn load_descriptor_list(path: &Path) -> Result<Vec<SettingsFileEntry>, SettingsError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let bytes = fs::read(path).map_err(|e| SettingsError::Io(format!("failed to read {}: {e}", path.display())))?;
    if bytes.trim_ascii().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&bytes).map_err(|e| SettingsError::Parse(format!("{}: {e}", path.display())))
}

/// Write through a sibling temp file so readers never see a torn file.
fn write_file(path: &Path, contents: &[u8]) -> Result<(), SettingsError> {
    let io_err = |e: std::io::Error| SettingsError::Io(format!("failed to write {}: {e}", path.display()));
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = fs::File::create(&tmp_path).map_err(io_err)?;
    file.write_all(contents).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    drop(file);
    fs::rename(&tmp_path, path).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SHIPPED: &str = r#"{"admin": {"theme": "dark"}}"#;

    fn test_paths(dir: &TempDir) -> SettingsPaths {
        let shipped = dir.path().join("app").join("config").join("settings.json");
        SettingsPaths::new(shipped, dir.path().join("userConfig"))
    }

    fn create_test_store(dir: &TempDir) -> SettingsStore {
        let paths = test_paths(dir);
        fs::create_dir_all(paths.shipped_settings_file.parent().unwrap()).unwrap();
        fs::write(&paths.shipped_settings_file, SHIPPED).unwrap();
        SettingsStore::initialize(paths, DisabledEntryPolicy::Omit).unwrap()
    }

    fn read_descriptors(store: &SettingsStore) -> Vec<SettingsFileEntry> {
        serde_json::from_slice(&fs::read(&store.paths().descriptor_file).unwrap()).unwrap()
    }

    fn read_manifest(store: &SettingsStore) -> OverrideManifest {
        serde_json::from_slice(&fs::read(&store.paths().manifest_file).unwrap()).unwrap()
    }

    #[test]
    fn paths_follow_build_mode() {
        let app = Path::new("/base/opensphere");
        let user_data = Path::new("/home/u/.config/OpenSphere");

        let debug = SettingsPaths::for_app(app, BuildMode::Debug, user_data);
        assert_eq!(debug.shipped_settings_file, app.join(".build/settings-debug.json"));
        assert_eq!(debug.user_settings_dir, app.join(".build/userConfig"));

        let compiled = SettingsPaths::for_app(app, BuildMode::Compiled, user_data);
        assert_eq!(compiled.shipped_settings_file, app.join("config/settings.json"));
        assert_eq!(compiled.user_settings_dir, app.join("userConfig"));

        let production = SettingsPaths::for_app(app, BuildMode::Production, user_data);
        assert_eq!(production.shipped_settings_file, app.join("config/settings.json"));
        assert_eq!(production.user_settings_dir, user_data.join("config"));
        assert_eq!(production.manifest_file, user_data.join("config/.settings.json"));
        assert_eq!(production.descriptor_file, user_data.join("config/.settings-files.json"));
    }

    #[test]
    fn first_run_seeds_single_default_entry() {
        let dir = TempDir::new().unwrap();
        let store = create_test_store(&dir);

        let entries = store.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].default);
        assert!(entries[0].enabled);
        assert_eq!(entries[0].label, DEFAULT_ENTRY_LABEL);
        assert_eq!(entries[0].path, store.paths().default_settings_path());
        assert_eq!(
            fs::read_to_string(&store.paths().default_settings_file).unwrap(),
            SHIPPED
        );
        assert_eq!(read_manifest(&store).overrides.len(), 1);
        assert_eq!(read_descriptors(&store), entries);
    }

    #[test]
    fn empty_descriptor_file_is_seeded() {
        let dir = TempDir::new().unwrap();
        let paths = test_paths(&dir);
        fs::create_dir_all(&paths.user_settings_dir).unwrap();
        fs::write(&paths.descriptor_file, "[]").unwrap();
        fs::create_dir_all(paths.shipped_settings_file.parent().unwrap()).unwrap();
        fs::write(&paths.shipped_settings_file, SHIPPED).unwrap();

        let store = SettingsStore::initialize(paths, DisabledEntryPolicy::Omit).unwrap();
        assert_eq!(store.entries().len(), 1);
        assert!(store.entries()[0].default);
    }

    #[test]
    fn initialize_is_idempotent_and_keeps_existing_list() {
        let dir = TempDir::new().unwrap();
        let mut store = create_test_store(&dir);
        store
            .add(SettingsFileEntry::new("custom.json", "Custom"), Some("{}"))
            .unwrap();
        let before = store.entries().to_vec();
        drop(store);

        let reopened = create_test_store(&dir);
        assert_eq!(reopened.entries(), before.as_slice());
    }

    #[test]
    fn missing_shipped_settings_skips_seeding() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::initialize(test_paths(&dir), DisabledEntryPolicy::Omit).unwrap();
        assert!(store.entries().is_empty());
        assert!(read_manifest(&store).overrides.is_empty());
    }

    #[test]
    fn corrupt_descriptor_list_is_reported() {
        let dir = TempDir::new().unwrap();
        let paths = test_paths(&dir);
        fs::create_dir_all(&paths.user_settings_dir).unwrap();
        fs::write(&paths.descriptor_file, "{not json").unwrap();

        let result = SettingsStore::initialize(paths, DisabledEntryPolicy::Omit);
        assert!(matches!(result, Err(SettingsError::Parse(_))));
    }

    #[test]
    fn add_writes_local_content_and_appends() {
        let dir = TempDir::new().unwrap();
        let mut store = create_test_store(&dir);

        let entries = store
            .add(SettingsFileEntry::new("custom.json", "Custom"), Some("{}"))
            .unwrap()
            .to_vec();

        let custom_path = store.paths().user_settings_dir.join("custom.json");
        assert_eq!(fs::read_to_string(&custom_path).unwrap(), "{}");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].path, custom_path.to_string_lossy());
        assert_eq!(read_descriptors(&store), entries);
        assert_eq!(read_manifest(&store).overrides.len(), 2);
    }

    #[test]
    fn add_replaces_entry_with_same_path() {
        let dir = TempDir::new().unwrap();
        let mut store = create_test_store(&dir);
        store
            .add(SettingsFileEntry::new("custom.json", "First"), Some("{}"))
            .unwrap();
        let entries = store
            .add(SettingsFileEntry::new("custom.json", "Second"), Some(r#"{"a": 1}"#))
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].label, "Second");
    }

    #[test]
    fn add_accepts_paths_already_in_user_dir() {
        let dir = TempDir::new().unwrap();
        let mut store = create_test_store(&dir);
        let custom_path = store.paths().user_settings_dir.join("custom.json");

        let entries = store
            .add(
                SettingsFileEntry::new(custom_path.to_string_lossy(), "Custom"),
                Some("{}"),
            )
            .unwrap()
            .to_vec();

        assert_eq!(entries[1].path, custom_path.to_string_lossy());
        assert_eq!(fs::read_to_string(&custom_path).unwrap(), "{}");
    }

    #[test]
    fn add_rejects_paths_escaping_user_dir() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let mut store = create_test_store(&dir);
        let absolute = outside.path().join("elsewhere.json");

        let rejected = [
            absolute.to_string_lossy().into_owned(),
            "../escape.json".to_string(),
            "a/../../b.json".to_string(),
            ".".to_string(),
            String::new(),
        ];
        for path in rejected {
            let result = store.add(SettingsFileEntry::new(path.clone(), "Bad"), Some(r#"{"x": 1}"#));
            assert_eq!(result.err(), Some(SettingsError::InvalidPath(path)));
        }

        assert!(!absolute.exists());
        assert!(!dir.path().join("escape.json").exists());
        assert_eq!(store.entries().len(), 1);
        assert_eq!(read_descriptors(&store).len(), 1);
    }

    #[test]
    fn add_never_writes_remote_entries() {
        let dir = TempDir::new().unwrap();
        let mut store = create_test_store(&dir);
        let remote = "https://example.com/settings.json";

        let entries = store
            .add(SettingsFileEntry::new(remote, "Remote"), Some("{}"))
            .unwrap()
            .to_vec();

        assert_eq!(entries[1].path, remote);
        let files: Vec<_> = fs::read_dir(&store.paths().user_settings_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(files.len(), 3, "only the three managed files: {files:?}");
        let manifest = read_manifest(&store);
        assert!(manifest.overrides[1].starts_with("https://example.com/settings.json?_="));
    }

    #[test]
    fn remove_refuses_default_entry() {
        let dir = TempDir::new().unwrap();
        let mut store = create_test_store(&dir);
        let default_entry = store.entries()[0].clone();

        let entries = store.remove(&default_entry).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(store.paths().default_settings_file.exists());
    }

    #[test]
    fn remove_deletes_backing_file() {
        let dir = TempDir::new().unwrap();
        let mut store = create_test_store(&dir);
        let added = store
            .add(SettingsFileEntry::new("custom.json", "Custom"), Some("{}"))
            .unwrap()[1]
            .clone();

        let entries = store.remove(&added).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(!Path::new(&added.path).exists());
        assert_eq!(read_descriptors(&store).len(), 1);
    }

    #[test]
    fn remove_with_missing_backing_file_still_removes_entry() {
        let dir = TempDir::new().unwrap();
        let mut store = create_test_store(&dir);
        let added = store
            .add(SettingsFileEntry::new("custom.json", "Custom"), None)
            .unwrap()[1]
            .clone();

        let entries = store.remove(&added).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn update_replaces_in_place_and_ignores_unknown() {
        let dir = TempDir::new().unwrap();
        let mut store = create_test_store(&dir);
        let mut entry = store.entries()[0].clone();
        entry.enabled = false;

        let entries = store.update(entry).unwrap();
        assert!(!entries[0].enabled);
        assert!(read_manifest(&store).overrides.is_empty());

        let entries = store
            .update(SettingsFileEntry::new("/nowhere.json", "Nowhere"))
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn replace_all_keeps_order_and_restores_default() {
        let dir = TempDir::new().unwrap();
        let mut store = create_test_store(&dir);
        let default_entry = store.entries()[0].clone();

        let a = SettingsFileEntry::new("/cfg/a.json", "A");
        let b = SettingsFileEntry::new("/cfg/b.json", "B");
        let entries = store
            .replace_all(vec![b.clone(), default_entry.clone(), a.clone()])
            .unwrap()
            .to_vec();
        assert_eq!(entries, vec![b.clone(), default_entry.clone(), a.clone()]);

        let entries = store.replace_all(vec![a.clone()]).unwrap().to_vec();
        assert_eq!(entries, vec![default_entry, a]);
        assert_eq!(read_descriptors(&store), entries);
    }

    #[test]
    fn descriptor_list_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let mut store = create_test_store(&dir);
        let mut disabled = SettingsFileEntry::new("https://example.com/s.json", "Remote");
        disabled.enabled = false;
        store.add(disabled, None).unwrap();
        store
            .add(SettingsFileEntry::new("custom.json", "Custom"), Some("{}"))
            .unwrap();

        let reloaded = load_descriptor_list(&store.paths().descriptor_file).unwrap();
        assert_eq!(reloaded, store.entries());
    }

    #[test]
    fn persist_reports_write_failures_without_rollback() {
        let dir = TempDir::new().unwrap();
        let mut store = create_test_store(&dir);
        fs::remove_dir_all(&store.paths().user_settings_dir).unwrap();

        let result = store.update(SettingsFileEntry::new("/x.json", "X"));
        assert!(matches!(result, Err(SettingsError::Io(_))));
        assert_eq!(store.entries().len(), 1);
    }
}
