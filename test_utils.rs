/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Recording collaborators for tests.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::prefs::ShellConfig;
use crate::services::app_path::{AppDescriptor, AppTable, BuildMode};
use crate::services::update::Updater;
use crate::shell::desktop::host::app_env::AppEnv;
use crate::shell::desktop::host::headless::{HeadlessHost, HeadlessWindow};
use crate::shell::desktop::host::window::{
    ExternalOpener, MessageBox, MessageBoxResponse, WebPreferences, WindowBounds, WindowHost, WindowId,
    WindowOptions,
};
use crate::shell::desktop::host::window_coordinator::WindowCoordinator;
use crate::shell::desktop::lifecycle::web_request::WebRequestRules;

/// [`HeadlessHost`] that records message boxes and answers them from a
/// script. Unscripted boxes take their default button.
#[derive(Debug, Default)]
pub struct RecordingHost {
    inner: HeadlessHost,
    responses: VecDeque<MessageBoxResponse>,
    pub message_boxes: Vec<MessageBox>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(&mut self, response: usize, checkbox_checked: bool) {
        self.responses.push_back(MessageBoxResponse {
            response,
            checkbox_checked,
        });
    }

    pub fn window(&self, window: WindowId) -> Option<&HeadlessWindow> {
        self.inner.window(window)
    }

    pub fn url(&self, window: WindowId) -> Option<&str> {
        self.inner.window(window)?.url.as_deref()
    }

    pub fn headless(&self) -> &HeadlessHost {
        &self.inner
    }
}

impl WindowHost for RecordingHost {
    fn create_window(&mut self, options: WindowOptions) -> WindowId {
        self.inner.create_window(options)
    }

    fn load_url(&mut self, window: WindowId, url: &str) {
        self.inner.load_url(window, url)
    }

    fn close_window(&mut self, window: WindowId) {
        self.inner.close_window(window)
    }

    fn focused_window(&self) -> Option<WindowId> {
        self.inner.focused_window()
    }

    fn all_windows(&self) -> Vec<WindowId> {
        self.inner.all_windows()
    }

    fn bounds(&self, window: WindowId) -> Option<WindowBounds> {
        self.inner.bounds(window)
    }

    fn web_preferences(&self, window: WindowId) -> Option<WebPreferences> {
        self.inner.web_preferences(window)
    }

    fn set_progress_bar(&mut self, window: WindowId, progress: f64) {
        self.inner.set_progress_bar(window, progress)
    }

    fn install_preloads(&mut self, window: WindowId, scripts: &[PathBuf]) {
        self.inner.install_preloads(window, scripts)
    }

    fn install_web_request_rules(&mut self, window: WindowId, rules: &WebRequestRules) {
        self.inner.install_web_request_rules(window, rules)
    }

    fn show_message_box(&mut self, window: WindowId, message: &MessageBox) -> MessageBoxResponse {
        self.message_boxes.push(message.clone());
        self.responses
            .pop_front()
            .unwrap_or_else(|| self.inner.show_message_box(window, message))
    }

    fn relaunch(&mut self) {
        self.inner.relaunch()
    }

    fn quit(&mut self) {
        self.inner.quit()
    }
}

/// Opener that records URLs instead of launching a browser. Clones share the
/// record.
#[derive(Clone, Debug, Default)]
pub struct RecordingOpener {
    opened: Arc<Mutex<Vec<String>>>,
}

impl RecordingOpener {
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

impl ExternalOpener for RecordingOpener {
    fn open_external(&self, url: &str) -> Result<(), String> {
        self.opened.lock().push(url.to_string());
        Ok(())
    }
}

/// Updater that counts requests.
#[derive(Clone, Debug, Default)]
pub struct CountingUpdater {
    pub checks: usize,
    pub downloads: usize,
    pub installs: usize,
}

impl Updater for CountingUpdater {
    fn check_for_updates(&mut self) {
        self.checks += 1;
    }

    fn download_update(&mut self) {
        self.downloads += 1;
    }

    fn quit_and_install(&mut self) {
        self.installs += 1;
    }
}

pub fn app_table(names: &[&str]) -> AppTable {
    names
        .iter()
        .map(|name| (name.to_string(), AppDescriptor::default()))
        .collect()
}

/// Config with `opensphere` as base app plus `extra` configured apps.
pub fn shell_config(extra: &[&str]) -> ShellConfig {
    let mut names = vec!["opensphere"];
    names.extend_from_slice(extra);
    ShellConfig {
        apps: app_table(&names),
        ..ShellConfig::default()
    }
}

pub type TestCoordinator = WindowCoordinator<RecordingHost, RecordingOpener>;

/// Coordinator over `/base` in production layout, plus a handle on its opener.
pub fn coordinator(config: &ShellConfig) -> (TestCoordinator, RecordingOpener) {
    coordinator_at(config, AppEnv::new(BuildMode::Production, "/base"))
}

pub fn coordinator_at(config: &ShellConfig, env: AppEnv) -> (TestCoordinator, RecordingOpener) {
    let opener = RecordingOpener::default();
    let coordinator = WindowCoordinator::new(RecordingHost::new(), opener.clone(), config, env);
    (coordinator, opener)
}

/// Write a shipped settings file under `app_path/config`.
pub fn write_shipped_settings(app_path: &Path, contents: &str) -> PathBuf {
    let config_dir = app_path.join("config");
    fs::create_dir_all(&config_dir).expect("create config dir");
    let shipped = config_dir.join("settings.json");
    fs::write(&shipped, contents).expect("write shipped settings");
    shipped
}
