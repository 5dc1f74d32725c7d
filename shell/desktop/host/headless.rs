/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Window host without native windows.
//!
//! Keeps the window table in memory and logs every request. The binary uses
//! it when the GUI runtime drives the shell over IPC; tests use it to observe
//! what the coordinator asked for.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::shell::desktop::host::window::{
    MessageBox, MessageBoxResponse, WebPreferences, WindowBounds, WindowHost, WindowId, WindowOptions,
};
use crate::shell::desktop::lifecycle::web_request::WebRequestRules;

#[derive(Clone, Debug, PartialEq)]
pub struct HeadlessWindow {
    pub options: WindowOptions,
    pub url: Option<String>,
    /// Every URL loaded, oldest first.
    pub history: Vec<String>,
    pub progress: Option<f64>,
    pub preloads: Vec<PathBuf>,
    pub web_request_rules: Option<WebRequestRules>,
}

#[derive(Debug, Default)]
pub struct HeadlessHost {
    windows: BTreeMap<WindowId, HeadlessWindow>,
    focused: Option<WindowId>,
    next_id: u64,
    relaunch_requested: bool,
    quit_requested: bool,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window(&self, window: WindowId) -> Option<&HeadlessWindow> {
        self.windows.get(&window)
    }

    pub fn focus(&mut self, window: WindowId) {
        if self.windows.contains_key(&window) {
            self.focused = Some(window);
        }
    }

    pub fn relaunch_requested(&self) -> bool {
        self.relaunch_requested
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }
}

impl WindowHost for HeadlessHost {
    fn create_window(&mut self, options: WindowOptions) -> WindowId {
        self.next_id += 1;
        let window = WindowId(self.next_id);
        log::info!(
            "headless: create {window} {}x{}",
            options.bounds.width,
            options.bounds.height
        );
        self.windows.insert(
            window,
            HeadlessWindow {
                options,
                url: None,
                history: Vec::new(),
                progress: None,
                preloads: Vec::new(),
                web_request_rules: None,
            },
        );
        self.focused = Some(window);
        window
    }

    fn load_url(&mut self, window: WindowId, url: &str) {
        log::info!("headless: {window} load {url}");
        if let Some(state) = self.windows.get_mut(&window) {
            state.url = Some(url.to_string());
            state.history.push(url.to_string());
        }
    }

    fn close_window(&mut self, window: WindowId) {
        log::info!("headless: close {window}");
        self.windows.remove(&window);
        if self.focused == Some(window) {
            self.focused = self.windows.keys().next_back().copied();
        }
    }

    fn focused_window(&self) -> Option<WindowId> {
        self.focused
    }

    fn all_windows(&self) -> Vec<WindowId> {
        self.windows.keys().copied().collect()
    }

    fn bounds(&self, window: WindowId) -> Option<WindowBounds> {
        self.windows.get(&window).map(|state| state.options.bounds)
    }

    fn web_preferences(&self, window: WindowId) -> Option<WebPreferences> {
        self.windows
            .get(&window)
            .map(|state| state.options.web_preferences.clone())
    }

    fn set_progress_bar(&mut self, window: WindowId, progress: f64) {
        if let Some(state) = self.windows.get_mut(&window) {
            state.progress = (progress >= 0.0).then_some(progress);
        }
    }

    fn install_preloads(&mut self, window: WindowId, scripts: &[PathBuf]) {
        if let Some(state) = self.windows.get_mut(&window) {
            state.preloads = scripts.to_vec();
        }
    }

    fn install_web_request_rules(&mut self, window: WindowId, rules: &WebRequestRules) {
        if let Some(state) = self.windows.get_mut(&window) {
            state.web_request_rules = Some(rules.clone());
        }
    }

    fn show_message_box(&mut self, window: WindowId, message: &MessageBox) -> MessageBoxResponse {
        log::info!("headless: {window} message '{}': {}", message.title, message.message);
        MessageBoxResponse {
            response: message.default_id,
            checkbox_checked: false,
        }
    }

    fn relaunch(&mut self) {
        self.relaunch_requested = true;
    }

    fn quit(&mut self) {
        log::info!("headless: quit requested");
        self.quit_requested = true;
    }
}
