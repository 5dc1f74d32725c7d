/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Application name ⇄ location resolution.
//!
//! Every sub-application lives under a shared base path. The on-disk layout
//! depends on how the shell is running: a packaged build already contains the
//! final layout, a development checkout nests a compiled copy of each app
//! under `dist/`, and the debug build loads the uncompiled sources directly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

/// Page loaded when an application directory is opened.
pub const APP_INDEX_FILE: &str = "index.html";

/// How the shell was launched, which decides the application layout on disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BuildMode {
    /// Packaged build.
    #[default]
    Production,
    /// Development checkout loading the compiled (`dist`) applications.
    Compiled,
    /// Development checkout loading uncompiled debug applications.
    Debug,
}

impl BuildMode {
    pub fn from_flags(dev: bool, debug: bool) -> Self {
        match (dev, debug) {
            (false, _) => Self::Production,
            (true, false) => Self::Compiled,
            (true, true) => Self::Debug,
        }
    }

    pub fn is_dev(self) -> bool {
        !matches!(self, Self::Production)
    }

    pub fn is_debug(self) -> bool {
        matches!(self, Self::Debug)
    }
}

/// One configured sub-application.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct AppDescriptor {
    /// Relative path override. The app name is used when absent.
    #[serde(default)]
    pub path: Option<String>,
}

/// Configured applications keyed by name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppTable {
    apps: BTreeMap<String, AppDescriptor>,
}

impl AppTable {
    pub fn new(apps: BTreeMap<String, AppDescriptor>) -> Self {
        Self { apps }
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.apps.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&AppDescriptor> {
        self.apps.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.apps.keys().map(String::as_str)
    }

    /// Relative path segment for an app. Unconfigured apps resolve to their
    /// own name.
    pub fn relative_path<'a>(&'a self, name: &'a str) -> &'a str {
        self.apps
            .get(name)
            .and_then(|app| app.path.as_deref())
            .filter(|path| !path.is_empty())
            .unwrap_or(name)
    }
}

impl FromIterator<(String, AppDescriptor)> for AppTable {
    fn from_iter<T: IntoIterator<Item = (String, AppDescriptor)>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Resolves application names to paths/URLs and URLs back to application
/// names. Holds no mutable state and is shared freely between windows.
#[derive(Clone, Debug, Default)]
pub struct AppResolver {
    apps: AppTable,
    mode: BuildMode,
    extra_resource_path: PathBuf,
}

impl AppResolver {
    pub fn new(apps: AppTable, mode: BuildMode) -> Self {
        Self {
            apps,
            mode,
            extra_resource_path: PathBuf::new(),
        }
    }

    pub fn with_extra_resource_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.extra_resource_path = path.into();
        self
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    pub fn apps(&self) -> &AppTable {
        &self.apps
    }

    /// Absolute directory of `app_name` under `base_path`.
    pub fn resolve_path(&self, app_name: &str, base_path: &Path) -> PathBuf {
        resolve_app_path(&self.apps, app_name, base_path, self.mode)
    }

    /// `file://` URL of the app's index page.
    pub fn resolve_url(&self, app_name: &str, base_path: &Path) -> String {
        file_url(&self.resolve_path(app_name, base_path).join(APP_INDEX_FILE))
    }

    /// `file://` URL for a bundled extra resource.
    pub fn resource_url(&self, resource: &str) -> String {
        file_url(&self.extra_resource_path.join(resource))
    }

    /// Name of the configured app that `url` belongs to.
    ///
    /// Path segments are checked from the end of the URL toward the root and
    /// the first configured name wins, so `…/sitemap/index.html` resolves to
    /// `sitemap` even when `map` is also configured.
    pub fn match_app_for_url(&self, url: &str) -> Option<String> {
        if self.apps.is_empty() {
            return None;
        }
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(error) => {
                log::debug!("app_path: cannot match app for unparseable URL {url}: {error}");
                return None;
            },
        };
        parsed
            .path()
            .rsplit('/')
            .filter(|segment| !segment.is_empty())
            .find_map(|segment| {
                if self.apps.contains(segment) {
                    return Some(segment.to_string());
                }
                let decoded = urlencoding::decode(segment).ok()?;
                self.apps
                    .contains(decoded.as_ref())
                    .then(|| decoded.into_owned())
            })
    }
}

/// Pure path derivation shared by the resolver and the settings paths.
pub fn resolve_app_path(apps: &AppTable, app_name: &str, base_path: &Path, mode: BuildMode) -> PathBuf {
    let relative = apps.relative_path(app_name);
    let app_path = base_path.join(relative);
    match mode {
        BuildMode::Compiled => app_path.join("dist").join(relative),
        BuildMode::Debug | BuildMode::Production => app_path,
    }
}

/// Format a local path as a `file://` URL.
///
/// Relative paths cannot be represented by [`Url::from_file_path`]; those are
/// formatted by hand so callers always get a URL back.
pub fn file_url(path: &Path) -> String {
    match Url::from_file_path(path) {
        Ok(url) => url.to_string(),
        Err(()) => {
            let normalized = path.to_string_lossy().replace('\\', "/");
            if normalized.starts_with('/') {
                format!("file://{normalized}")
            } else {
                format!("file:///{normalized}")
            }
        },
    }
}

/// The `?query` / `#fragment` tail of a URL, if any.
pub fn url_suffix(url: &str) -> &str {
    url.find(['?', '#']).map_or("", |index| &url[index..])
}
