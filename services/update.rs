/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Auto-update decisions.
//!
//! The coordinator reacts to updater events and decides what to ask the user
//! and what to tell the updater next. Fetching and installing packages belongs
//! to the [`Updater`] implementation.

use std::fs;
use std::path::{Path, PathBuf};

/// Versions the user asked never to be offered again.
pub const IGNORE_FILE_NAME: &str = ".autoupdateignore";

/// Presence of this file in the working directory enables update checks in a
/// development checkout.
pub const DEV_UPDATE_CONFIG_FILE: &str = "dev-app-update.yml";

/// Progress value that removes the progress bar.
pub const PROGRESS_NONE: f64 = -1.0;

#[derive(Debug)]
pub enum UpdateError {
    Io(String),
    Serialize(String),
}

impl std::fmt::Display for UpdateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "update IO error: {e}"),
            Self::Serialize(e) => write!(f, "update serialize error: {e}"),
        }
    }
}

impl std::error::Error for UpdateError {}

/// Package updater.
pub trait Updater: Send {
    fn check_for_updates(&mut self);
    fn download_update(&mut self);
    fn quit_and_install(&mut self);
}

impl<U: Updater + ?Sized> Updater for Box<U> {
    fn check_for_updates(&mut self) {
        (**self).check_for_updates()
    }

    fn download_update(&mut self) {
        (**self).download_update()
    }

    fn quit_and_install(&mut self) {
        (**self).quit_and_install()
    }
}

/// Answer to the "update available" prompt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateAvailableChoice {
    pub download: bool,
    pub do_not_ask_again: bool,
}

/// Informational messages shown during an update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateNotice {
    Downloading,
    UpToDate { app_name: String },
    Failed { app_name: String },
    AppliedOnNextLaunch { app_name: String },
}

impl UpdateNotice {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Downloading => "Update Downloading",
            Self::UpToDate { .. } => "Update Not Available",
            Self::Failed { .. } => "Update Failed",
            Self::AppliedOnNextLaunch { .. } => "Update Downloaded",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Downloading => {
                "Update is being downloaded, and you will be notified when it completes.".to_string()
            },
            Self::UpToDate { app_name } => format!("{app_name} is up to date."),
            Self::Failed { app_name } => format!("Unable to update {app_name}."),
            Self::AppliedOnNextLaunch { app_name } => {
                format!("Update has been downloaded, and will be applied the next time {app_name} is launched.")
            },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// User-facing side of the update flow.
pub trait UpdateDialogs {
    /// Whether any window exists to parent a dialog.
    fn has_target_window(&self) -> bool;
    /// Progress on every window, `0.0..=1.0`, or [`PROGRESS_NONE`].
    fn set_progress(&mut self, fraction: f64);
    fn prompt_update_available(&mut self, app_name: &str, version: &str) -> UpdateAvailableChoice;
    /// Offer the release page after a failed update. True means "open it".
    fn prompt_manual_download(&mut self, app_name: &str) -> bool;
    /// True means "install now", false means "wait for next launch".
    fn prompt_install(&mut self, app_name: &str) -> bool;
    fn notify(&mut self, notice: UpdateNotice);
    fn open_external(&mut self, url: &str);
}

#[derive(Clone, Debug, Default)]
pub struct UpdateSettings {
    pub app_name: String,
    pub release_url: Option<String>,
    pub dev: bool,
    pub portable: bool,
    /// macOS cannot install in place; the user is told to relaunch instead.
    pub macos: bool,
    pub ignore_file: PathBuf,
    pub dev_update_config: PathBuf,
}

impl UpdateSettings {
    /// Development checkouts keep update state in the working directory;
    /// installed builds keep it in the user data directory.
    pub fn new(app_name: impl Into<String>, dev: bool, working_dir: &Path, user_data_dir: &Path) -> Self {
        let state_dir = if dev { working_dir } else { user_data_dir };
        Self {
            app_name: app_name.into(),
            release_url: None,
            dev,
            portable: false,
            macos: cfg!(target_os = "macos"),
            ignore_file: state_dir.join(IGNORE_FILE_NAME),
            dev_update_config: working_dir.join(DEV_UPDATE_CONFIG_FILE),
        }
    }
}

pub struct UpdateCoordinator<U: Updater> {
    updater: U,
    settings: UpdateSettings,
    updating: bool,
    ignored_versions: Vec<String>,
}

impl<U: Updater> UpdateCoordinator<U> {
    pub fn new(updater: U, settings: UpdateSettings) -> Self {
        let ignored_versions = load_ignored_versions(&settings.ignore_file);
        Self {
            updater,
            settings,
            updating: false,
            ignored_versions,
        }
    }

    pub fn is_updating(&self) -> bool {
        self.updating
    }

    pub fn ignored_versions(&self) -> &[String] {
        &self.ignored_versions
    }

    pub fn updater(&self) -> &U {
        &self.updater
    }

    /// Returns whether the updater was asked to check.
    pub fn check_for_updates(&mut self, user_initiated: bool) -> bool {
        if user_initiated {
            self.ignored_versions.clear();
            self.updating = true;
        }

        let allowed = user_initiated || !self.settings.dev || self.settings.dev_update_config.is_file();
        if allowed {
            log::info!("update: checking for updates (user initiated: {user_initiated})");
            self.updater.check_for_updates();
        } else {
            log::debug!("update: skipping check in development checkout");
        }
        allowed
    }

    pub fn on_download_progress(&mut self, percent: f64, dialogs: &mut dyn UpdateDialogs) {
        dialogs.set_progress(percent / 100.0);
    }

    pub fn on_error(&mut self, error: &str, dialogs: &mut dyn UpdateDialogs) {
        log::error!("update: {error}");

        if self.updating {
            dialogs.set_progress(PROGRESS_NONE);
            if dialogs.has_target_window() {
                match self.release_url() {
                    Some(release_url) => {
                        if dialogs.prompt_manual_download(&self.settings.app_name) {
                            dialogs.open_external(&release_url);
                        }
                    },
                    None => dialogs.notify(UpdateNotice::Failed {
                        app_name: self.settings.app_name.clone(),
                    }),
                }
            }
        }
        self.updating = false;
    }

    pub fn on_update_not_available(&mut self, dialogs: &mut dyn UpdateDialogs) {
        if !self.updating {
            return;
        }
        self.updating = false;
        if dialogs.has_target_window() {
            dialogs.notify(UpdateNotice::UpToDate {
                app_name: self.settings.app_name.clone(),
            });
        }
    }

    pub fn on_update_available(&mut self, version: &str, dialogs: &mut dyn UpdateDialogs) -> Result<(), UpdateError> {
        if self.ignored_versions.iter().any(|ignored| ignored == version) {
            log::info!("update: version {version} previously ignored, skipping");
            return Ok(());
        }

        // Portable builds cannot install in place, so only prompt when there
        // is a release page to send the user to.
        let can_offer = !self.settings.portable || self.release_url().is_some();
        if !dialogs.has_target_window() || !can_offer {
            return Ok(());
        }

        let choice = dialogs.prompt_update_available(&self.settings.app_name, version);
        if choice.download {
            if self.settings.dev || self.settings.portable {
                if let Some(release_url) = self.release_url() {
                    dialogs.open_external(&release_url);
                }
            } else {
                self.updating = true;
                dialogs.notify(UpdateNotice::Downloading);
                self.updater.download_update();
            }
        } else if choice.do_not_ask_again {
            self.ignored_versions.push(version.to_string());
            self.persist_ignored_versions()?;
        }
        Ok(())
    }

    pub fn on_update_downloaded(&mut self, dialogs: &mut dyn UpdateDialogs) {
        self.updating = false;
        if !dialogs.has_target_window() {
            return;
        }
        dialogs.set_progress(PROGRESS_NONE);

        if self.settings.macos {
            dialogs.notify(UpdateNotice::AppliedOnNextLaunch {
                app_name: self.settings.app_name.clone(),
            });
        } else if dialogs.prompt_install(&self.settings.app_name) {
            log::debug!("update: restarting to install update");
            self.updater.quit_and_install();
        }
    }

    fn release_url(&self) -> Option<String> {
        self.settings.release_url.clone().filter(|url| !url.is_empty())
    }

    fn persist_ignored_versions(&self) -> Result<(), UpdateError> {
        let json = serde_json::to_string(&self.ignored_versions).map_err(|e| UpdateError::Serialize(e.to_string()))?;
        fs::write(&self.settings.ignore_file, json).map_err(|e| {
            UpdateError::Io(format!("failed to write {}: {e}", self.settings.ignore_file.display()))
        })
    }
}

fn load_ignored_versions(path: &Path) -> Vec<String> {
    let Ok(text) = fs::read_to_string(path) else {
        return Vec::new();
    };
    serde_json::from_str(&text).unwrap_or_else(|e| {
        log::warn!("update: ignoring corrupt {}: {e}", path.display());
        Vec::new()
    })
}
