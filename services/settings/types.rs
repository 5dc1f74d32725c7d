/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Serializable types for the settings override files.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::services::app_path::file_url;

/// Query parameter appended to remote locators so the web application never
/// loads a cached copy.
pub const CACHE_BUST_PARAM: &str = "_";

/// Prefix marking a known-but-disabled locator in the manifest.
pub const NEGATION_MARKER: char = '!';

/// One entry in the user's settings override list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsFileEntry {
    /// Local filesystem path or remote URL.
    pub path: String,
    #[serde(default)]
    pub label: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Marks the entry copied from the application's shipped settings.
    #[serde(default)]
    pub default: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl SettingsFileEntry {
    pub fn new(path: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
            enabled: true,
            default: false,
        }
    }

    pub fn is_remote(&self) -> bool {
        is_remote_path(&self.path)
    }
}

/// Whether a settings path names a remote resource rather than a local file.
pub fn is_remote_path(path: &str) -> bool {
    Url::parse(path).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

/// How disabled entries appear in the derived manifest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisabledEntryPolicy {
    /// Leave disabled entries out of the manifest.
    #[default]
    Omit,
    /// Emit disabled entries prefixed with [`NEGATION_MARKER`].
    Negate,
}

/// Manifest read by the web application at load time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideManifest {
    pub overrides: Vec<String>,
}

impl OverrideManifest {
    /// Derive the manifest from the entry list. Remote locators get a fresh
    /// cache-busting token from `now_ms`.
    pub fn derive(entries: &[SettingsFileEntry], policy: DisabledEntryPolicy, now_ms: u64) -> Self {
        let overrides = entries
            .iter()
            .filter_map(|entry| {
                let locator = override_locator(entry, now_ms);
                match (entry.enabled, policy) {
                    (true, _) => Some(locator),
                    (false, DisabledEntryPolicy::Omit) => None,
                    (false, DisabledEntryPolicy::Negate) => Some(format!("{NEGATION_MARKER}{locator}")),
                }
            })
            .collect();
        Self { overrides }
    }

    pub fn derive_now(entries: &[SettingsFileEntry], policy: DisabledEntryPolicy) -> Self {
        Self::derive(entries, policy, now_unix_ms())
    }
}

fn override_locator(entry: &SettingsFileEntry, now_ms: u64) -> String {
    match Url::parse(&entry.path) {
        Ok(mut url) if matches!(url.scheme(), "http" | "https") => {
            url.query_pairs_mut()
                .append_pair(CACHE_BUST_PARAM, &now_ms.to_string());
            url.to_string()
        },
        _ => file_url(Path::new(&entry.path)),
    }
}

pub(crate) fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
