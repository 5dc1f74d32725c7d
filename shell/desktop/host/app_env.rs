/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Where things live for the current launch.

use std::env;
use std::path::{Path, PathBuf};

use crate::prefs::{CONFIG_FILE_NAME, ShellConfig, ShellOptions};
use crate::services::app_path::BuildMode;

/// Set by portable launchers to the directory holding the executable.
pub const PORTABLE_DIR_ENV: &str = "PORTABLE_EXECUTABLE_DIR";

/// Directory under the resources path holding preload scripts.
pub const PRELOAD_DIR_NAME: &str = "preload";

/// Directory under the resources path holding packaged applications.
const PACKAGED_APPS_DIR: &str = "app";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppEnv {
    pub mode: BuildMode,
    /// Root under which every application lives.
    pub base_path: PathBuf,
    /// Bundled resources and configuration.
    pub extra_resource_path: PathBuf,
    pub user_data_dir: PathBuf,
    pub preload_dir: PathBuf,
    pub icon_path: Option<PathBuf>,
    pub portable: bool,
}

impl AppEnv {
    /// Minimal environment rooted at `base_path`, used by tests and embedders.
    pub fn new(mode: BuildMode, base_path: impl Into<PathBuf>) -> Self {
        let base_path = absolute_path(base_path.into());
        Self {
            mode,
            extra_resource_path: base_path.clone(),
            user_data_dir: base_path.join("userData"),
            preload_dir: base_path.join(PRELOAD_DIR_NAME),
            base_path,
            icon_path: None,
            portable: false,
        }
    }

    /// Resolve the launch environment from the command line.
    ///
    /// A development checkout runs from the shell's own directory with the
    /// applications next to it; a packaged build runs from its resources
    /// directory.
    pub fn from_options(options: &ShellOptions, app_name: &str) -> Self {
        let mode = BuildMode::from_flags(options.dev, options.debug);
        let working_dir = env::current_dir().unwrap_or_default();

        let extra_resource_path = options.resources_path.clone().unwrap_or_else(|| {
            if mode.is_dev() {
                working_dir.clone()
            } else {
                packaged_resources_dir().unwrap_or_else(|| working_dir.clone())
            }
        });
        let base_path = options.base_path.clone().unwrap_or_else(|| {
            if mode.is_dev() {
                working_dir.parent().map(Path::to_path_buf).unwrap_or(working_dir.clone())
            } else {
                extra_resource_path.join(PACKAGED_APPS_DIR)
            }
        });
        let user_data_dir = options
            .user_data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join(app_name)))
            .unwrap_or_else(|| working_dir.join("userData"));

        let extra_resource_path = absolute_path(extra_resource_path);
        let base_path = absolute_path(base_path);
        let user_data_dir = absolute_path(user_data_dir);

        Self {
            mode,
            preload_dir: extra_resource_path.join(PRELOAD_DIR_NAME),
            extra_resource_path,
            base_path,
            user_data_dir,
            icon_path: None,
            portable: options.portable || env::var_os(PORTABLE_DIR_ENV).is_some(),
        }
    }

    /// Resolve the configured icon against the base path.
    pub fn with_icon_from(mut self, config: &ShellConfig) -> Self {
        let icon = if self.mode.is_dev() {
            config.icon_dev.as_ref()
        } else {
            config.icon.as_ref()
        };
        self.icon_path = icon.map(|icon| self.base_path.join(icon));
        self
    }

    /// Configuration files tried in order when none is named explicitly.
    pub fn config_candidates(&self) -> Vec<PathBuf> {
        vec![
            self.extra_resource_path.join("config").join(CONFIG_FILE_NAME),
            self.extra_resource_path.join(CONFIG_FILE_NAME),
        ]
    }

    /// Sorted preload scripts. A missing directory yields none.
    pub fn preload_scripts(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.preload_dir) {
            Ok(entries) => entries,
            Err(error) => {
                log::debug!(
                    "app_env: no preload scripts at {} ({error})",
                    self.preload_dir.display()
                );
                return Vec::new();
            },
        };
        let mut scripts: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        scripts.sort();
        scripts
    }
}

/// Anchor a relative path at the working directory. `file://` URLs and
/// base-path checks need absolute paths.
fn absolute_path(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    std::path::absolute(&path).unwrap_or_else(|error| {
        log::warn!("app_env: cannot make {} absolute ({error}); using it as given", path.display());
        path
    })
}

fn packaged_resources_dir() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    Some(exe.parent()?.join("resources"))
}
