/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Seams to the host GUI runtime.
//!
//! The shell never creates native windows itself. Everything it needs from the
//! runtime goes through [`WindowHost`], and URLs leaving the application go
//! through [`ExternalOpener`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::shell::desktop::lifecycle::web_request::WebRequestRules;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    /// `None` lets the runtime place the window.
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: u32,
    pub height: u32,
}

impl WindowBounds {
    pub const DEFAULT_WIDTH: u32 = 1600;
    pub const DEFAULT_HEIGHT: u32 = 900;
    /// Offset of a new window from its opener.
    pub const CASCADE_OFFSET: i32 = 25;

    /// Bounds for a window opened from `parent`: same size, shifted down and
    /// right so both stay visible.
    pub fn cascade_from(parent: Option<WindowBounds>) -> Self {
        match parent {
            Some(parent) => Self {
                x: Some(parent.x.unwrap_or(0).saturating_add(Self::CASCADE_OFFSET)),
                y: Some(parent.y.unwrap_or(0).saturating_add(Self::CASCADE_OFFSET)),
                width: parent.width,
                height: parent.height,
            },
            None => Self::default(),
        }
    }
}

impl Default for WindowBounds {
    fn default() -> Self {
        Self {
            x: None,
            y: None,
            width: Self::DEFAULT_WIDTH,
            height: Self::DEFAULT_HEIGHT,
        }
    }
}

/// Runtime web preferences, passed through to the host by key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WebPreferences(BTreeMap<String, Value>);

impl WebPreferences {
    /// Preferences every shell window starts from.
    pub fn shell_defaults() -> Self {
        let mut prefs = Self::default();
        // Keep timers and animations running in background windows.
        prefs.set("backgroundThrottling", Value::Bool(false));
        // window.open returns a real window so children can reach their opener.
        prefs.set("nativeWindowOpen", Value::Bool(true));
        prefs.set("contextIsolation", Value::Bool(true));
        prefs
    }

    /// Apply `overrides` on top of these preferences.
    pub fn merged(mut self, overrides: &BTreeMap<String, Value>) -> Self {
        for (key, value) in overrides {
            self.0.insert(key.clone(), value.clone());
        }
        self
    }

    /// Lock down preferences requested for an embedded webview.
    pub fn harden_for_webview(&mut self) {
        self.0.remove("preload");
        self.0.remove("preloadURL");
        self.set("nodeIntegration", Value::Bool(false));
        self.set("webSecurity", Value::Bool(true));
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.0
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WindowOptions {
    pub bounds: WindowBounds,
    pub web_preferences: WebPreferences,
    pub icon: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MessageKind {
    #[default]
    Info,
    Error,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageBox {
    pub kind: MessageKind,
    pub title: String,
    pub message: String,
    pub buttons: Vec<String>,
    pub default_id: usize,
    /// Button reported when the box is dismissed.
    pub cancel_id: Option<usize>,
    pub checkbox_label: Option<String>,
    pub icon: Option<PathBuf>,
}

impl MessageBox {
    pub fn new(kind: MessageKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            buttons: vec!["OK".to_string()],
            ..Self::default()
        }
    }

    pub fn with_buttons(mut self, buttons: &[&str]) -> Self {
        self.buttons = buttons.iter().map(|button| button.to_string()).collect();
        self
    }

    pub fn with_cancel_id(mut self, cancel_id: usize) -> Self {
        self.cancel_id = Some(cancel_id);
        self
    }

    pub fn with_checkbox(mut self, label: impl Into<String>) -> Self {
        self.checkbox_label = Some(label.into());
        self
    }

    pub fn with_icon(mut self, icon: Option<PathBuf>) -> Self {
        self.icon = icon;
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MessageBoxResponse {
    /// Index of the pressed button.
    pub response: usize,
    pub checkbox_checked: bool,
}

/// Host GUI runtime.
pub trait WindowHost {
    fn create_window(&mut self, options: WindowOptions) -> WindowId;
    fn load_url(&mut self, window: WindowId, url: &str);
    fn close_window(&mut self, window: WindowId);
    fn focused_window(&self) -> Option<WindowId>;
    fn all_windows(&self) -> Vec<WindowId>;
    fn bounds(&self, window: WindowId) -> Option<WindowBounds>;
    fn web_preferences(&self, window: WindowId) -> Option<WebPreferences>;
    /// `0.0..=1.0`, or negative to remove the bar.
    fn set_progress_bar(&mut self, window: WindowId, progress: f64);
    fn install_preloads(&mut self, window: WindowId, scripts: &[PathBuf]);
    fn install_web_request_rules(&mut self, window: WindowId, rules: &WebRequestRules);
    /// Modal message box; blocks until the user answers.
    fn show_message_box(&mut self, window: WindowId, message: &MessageBox) -> MessageBoxResponse;
    fn relaunch(&mut self);
    fn quit(&mut self);

    /// Focused window, else the first open one.
    fn target_window(&self) -> Option<WindowId> {
        self.focused_window().or_else(|| self.all_windows().into_iter().next())
    }
}

/// Hands URLs to the operating system's default handler.
pub trait ExternalOpener {
    fn open_external(&self, url: &str) -> Result<(), String>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct OsExternalOpener;

impl ExternalOpener for OsExternalOpener {
    fn open_external(&self, url: &str) -> Result<(), String> {
        open::that(url).map_err(|e| e.to_string())
    }
}
