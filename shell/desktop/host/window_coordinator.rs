/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Owns the shell's windows and applies navigation decisions to them.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value;

use crate::prefs::ShellConfig;
use crate::services::app_path::AppResolver;
use crate::services::update::{PROGRESS_NONE, UpdateAvailableChoice, UpdateDialogs, UpdateNotice};
use crate::shell::desktop::host::app_env::AppEnv;
use crate::shell::desktop::host::window::{
    ExternalOpener, MessageBox, MessageKind, WebPreferences, WindowBounds, WindowHost, WindowId, WindowOptions,
};
use crate::shell::desktop::lifecycle::navigation_policy::{
    NavigationAction, NavigationEvent, NavigationPolicy, UnloadChoice, UnloadPrompt,
};
use crate::shell::desktop::lifecycle::web_request::WebRequestRules;

/// Result of handling one window event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EventOutcome {
    /// Whether the runtime must suppress its own handling of the event.
    pub prevent_default: bool,
    pub action: NavigationAction,
    /// Window opened in response, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened: Option<WindowId>,
    /// Hardened preferences to attach an embedded webview with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webview_preferences: Option<WebPreferences>,
}

impl EventOutcome {
    fn from_action(action: NavigationAction) -> Self {
        Self {
            prevent_default: action.prevents_default(),
            action,
            opened: None,
            webview_preferences: None,
        }
    }
}

pub struct WindowCoordinator<H: WindowHost, O: ExternalOpener> {
    host: H,
    opener: O,
    env: AppEnv,
    policy: NavigationPolicy,
    base_app: String,
    web_preference_overrides: BTreeMap<String, Value>,
    web_request_rules: WebRequestRules,
    home_url: Option<String>,
    main_window: Option<WindowId>,
    /// Application currently shown by each window.
    window_apps: HashMap<WindowId, String>,
}

impl<H: WindowHost, O: ExternalOpener> WindowCoordinator<H, O> {
    pub fn new(host: H, opener: O, config: &ShellConfig, env: AppEnv) -> Self {
        let resolver = AppResolver::new(config.apps.clone(), env.mode)
            .with_extra_resource_path(env.extra_resource_path.clone());
        let policy = NavigationPolicy::new(resolver, config.internal_links.clone(), env.base_path.clone());
        Self {
            host,
            opener,
            policy,
            base_app: config.base_app.clone(),
            web_preference_overrides: config.web_preferences.clone(),
            web_request_rules: WebRequestRules::new(config.request_headers.clone()),
            home_url: None,
            main_window: None,
            window_apps: HashMap::new(),
            env,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn opener(&self) -> &O {
        &self.opener
    }

    pub fn policy(&self) -> &NavigationPolicy {
        &self.policy
    }

    pub fn env(&self) -> &AppEnv {
        &self.env
    }

    pub fn main_window(&self) -> Option<WindowId> {
        self.main_window
    }

    pub fn home_url(&self) -> Option<&str> {
        self.home_url.as_deref()
    }

    pub fn current_app(&self, window: WindowId) -> Option<&str> {
        self.window_apps.get(&window).map(String::as_str)
    }

    /// Open the base application. Reuses the main window if it still exists.
    pub fn create_main_window(&mut self) -> WindowId {
        if let Some(window) = self.main_window {
            return window;
        }

        let prefs = WebPreferences::shell_defaults().merged(&self.web_preference_overrides);
        let window = self.create_browser_window(prefs, None);
        let app_url = self.policy.resolver().resolve_url(&self.base_app, &self.env.base_path);
        log::info!("window_coordinator: loading {app_url}");
        self.host.load_url(window, &app_url);

        self.home_url = Some(app_url);
        self.main_window = Some(window);
        self.window_apps.insert(window, self.base_app.clone());
        window
    }

    /// Create a window with session preloads and header rules installed.
    pub fn create_browser_window(&mut self, web_preferences: WebPreferences, parent: Option<WindowId>) -> WindowId {
        let parent_bounds = parent.and_then(|parent| self.host.bounds(parent));
        let window = self.host.create_window(WindowOptions {
            bounds: WindowBounds::cascade_from(parent_bounds),
            web_preferences,
            icon: self.env.icon_path.clone(),
        });

        let preloads = self.env.preload_scripts();
        if !preloads.is_empty() {
            self.host.install_preloads(window, &preloads);
        }
        self.host.install_web_request_rules(window, &self.web_request_rules);
        log::debug!("window_coordinator: created {window}");
        window
    }

    pub fn handle_event(&mut self, window: WindowId, event: &NavigationEvent) -> EventOutcome {
        let current_app = self.window_apps.get(&window).cloned();
        let action = self.policy.decide(event, current_app.as_deref());
        let mut outcome = EventOutcome::from_action(action.clone());

        match action {
            NavigationAction::Allow | NavigationAction::Block => {},
            NavigationAction::OpenAppWindow { app_name, url } => {
                log::debug!("window_coordinator: launching app {app_name} with URL {url}");
                let prefs = self
                    .host
                    .web_preferences(window)
                    .unwrap_or_else(WebPreferences::shell_defaults);
                let opened = self.create_browser_window(prefs, Some(window));
                self.host.load_url(opened, &url);
                self.window_apps.insert(opened, app_name);
                outcome.opened = Some(opened);
            },
            NavigationAction::LoadInPlace { app_name, url } => {
                log::debug!("window_coordinator: loading app URL {url}");
                self.host.load_url(window, &url);
                self.window_apps.insert(window, app_name);
            },
            NavigationAction::OpenExternal { url } => self.open_external(&url),
            NavigationAction::AttachWebview => {
                let mut prefs = self.host.web_preferences(window).unwrap_or_default();
                prefs.harden_for_webview();
                outcome.webview_preferences = Some(prefs);
            },
            NavigationAction::ConfirmUnload => {
                let icon = self.env.icon_path.clone();
                // Leaving overrides the page's attempt to keep itself open.
                outcome.prevent_default = self.host.confirm_unload(window, icon) == UnloadChoice::Leave;
            },
            NavigationAction::Observe => {
                if let NavigationEvent::DidNavigate { url } = event
                    && let Some(app_name) = self.policy.resolver().match_app_for_url(url)
                {
                    self.window_apps.insert(window, app_name);
                }
            },
        }
        outcome
    }

    pub fn open_external(&self, url: &str) {
        log::info!("window_coordinator: opening external window: {url}");
        if let Err(error) = self.opener.open_external(url) {
            log::info!("window_coordinator: failed to open {url}: {error}");
        }
    }

    pub fn go_home(&mut self, window: WindowId) {
        match self.home_url.clone() {
            Some(home_url) => {
                self.host.load_url(window, &home_url);
                self.window_apps.insert(window, self.base_app.clone());
            },
            None => log::warn!("window_coordinator: no home URL yet; ignoring go home for {window}"),
        }
    }

    pub fn window_closed(&mut self, window: WindowId) {
        self.window_apps.remove(&window);
        if self.main_window == Some(window) {
            log::info!("window_coordinator: main window closed");
            self.main_window = None;
        }
    }

    /// Restart the shell. Development checkouts cannot relaunch themselves and
    /// just quit.
    pub fn relaunch(&mut self) {
        if self.env.mode.is_dev() {
            log::info!("window_coordinator: relaunch is unavailable in development; restart manually");
        } else {
            log::info!("window_coordinator: restarting application");
            self.host.relaunch();
        }
        self.host.quit();
    }

    /// Update dialogs parented to this coordinator's windows.
    pub fn update_dialogs(&mut self, app_name: &str) -> HostUpdateDialogs<'_, H, O> {
        HostUpdateDialogs {
            host: &mut self.host,
            opener: &self.opener,
            app_name: app_name.to_string(),
        }
    }
}

/// [`UpdateDialogs`] shown through the window host.
pub struct HostUpdateDialogs<'a, H: WindowHost, O: ExternalOpener> {
    host: &'a mut H,
    opener: &'a O,
    app_name: String,
}

impl<H: WindowHost, O: ExternalOpener> HostUpdateDialogs<'_, H, O> {
    fn ask(&mut self, message: MessageBox) -> Option<usize> {
        let window = self.host.target_window()?;
        Some(self.host.show_message_box(window, &message).response)
    }
}

impl<H: WindowHost, O: ExternalOpener> UpdateDialogs for HostUpdateDialogs<'_, H, O> {
    fn has_target_window(&self) -> bool {
        self.host.target_window().is_some()
    }

    fn set_progress(&mut self, fraction: f64) {
        let progress = if fraction < 0.0 { PROGRESS_NONE } else { fraction };
        for window in self.host.all_windows() {
            self.host.set_progress_bar(window, progress);
        }
    }

    fn prompt_update_available(&mut self, app_name: &str, version: &str) -> UpdateAvailableChoice {
        let Some(window) = self.host.target_window() else {
            return UpdateAvailableChoice::default();
        };
        let message = MessageBox::new(
            MessageKind::Info,
            "Update Available",
            format!("A new version of {app_name} ({version}) is available. Would you like to download it now?"),
        )
        .with_buttons(&["Yes", "No"])
        .with_checkbox("Do not ask again for this version");
        let response = self.host.show_message_box(window, &message);
        UpdateAvailableChoice {
            download: response.response == 0,
            do_not_ask_again: response.checkbox_checked,
        }
    }

    fn prompt_manual_download(&mut self, app_name: &str) -> bool {
        let message = MessageBox::new(
            MessageKind::Error,
            "Update Failed",
            format!("Unable to update {app_name}. Would you like to download the new version manually?"),
        )
        .with_buttons(&["Yes", "No"]);
        self.ask(message) == Some(0)
    }

    fn prompt_install(&mut self, app_name: &str) -> bool {
        let message = MessageBox::new(
            MessageKind::Info,
            "Update Downloaded",
            format!(
                "Update has been downloaded. Would you like to install it now, or wait until the next time {app_name} is launched?"
            ),
        )
        .with_buttons(&["Install", "Wait"]);
        self.ask(message) == Some(0)
    }

    fn notify(&mut self, notice: UpdateNotice) {
        let kind = if notice.is_error() {
            MessageKind::Error
        } else {
            MessageKind::Info
        };
        log::debug!("window_coordinator: update notice for {}: {}", self.app_name, notice.title());
        self.ask(MessageBox::new(kind, notice.title(), notice.message()));
    }

    fn open_external(&mut self, url: &str) {
        if let Err(error) = self.opener.open_external(url) {
            log::info!("window_coordinator: failed to open {url}: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::app_path::BuildMode;
    use crate::services::update::{UpdateCoordinator, UpdateSettings};
    use crate::test_utils::{CountingUpdater, coordinator, coordinator_at, shell_config};

    #[test]
    fn main_window_loads_base_app_with_default_preferences() {
        let (mut windows, _) = coordinator(&shell_config(&[]));
        let main = windows.create_main_window();

        assert_eq!(windows.host().url(main), Some("file:///base/opensphere/index.html"));
        assert_eq!(windows.home_url(), Some("file:///base/opensphere/index.html"));
        assert_eq!(windows.current_app(main), Some("opensphere"));

        let prefs = windows.host().web_preferences(main).unwrap();
        assert_eq!(prefs.get("contextIsolation"), Some(&Value::Bool(true)));
        assert!(windows.host().window(main).unwrap().web_request_rules.is_some());
        assert_eq!(windows.create_main_window(), main);
    }

    #[test]
    fn app_window_inherits_preferences_and_cascades() {
        let mut config = shell_config(&["tools"]);
        config
            .web_preferences
            .insert("spellcheck".to_string(), Value::Bool(false));
        let (mut windows, _) = coordinator(&config);
        let main = windows.create_main_window();

        let outcome = windows.handle_event(
            main,
            &NavigationEvent::NewWindow {
                url: "file:///base/tools#/layers".into(),
            },
        );
        assert!(outcome.prevent_default);
        let opened = outcome.opened.unwrap();
        assert_eq!(windows.host().url(opened), Some("file:///base/tools/index.html#/layers"));
        assert_eq!(windows.current_app(opened), Some("tools"));
        assert_eq!(
            windows.host().web_preferences(opened).unwrap().get("spellcheck"),
            Some(&Value::Bool(false))
        );
        let bounds = windows.host().bounds(opened).unwrap();
        assert_eq!((bounds.x, bounds.y), (Some(25), Some(25)));
    }

    #[test]
    fn external_links_go_to_the_opener() {
        let (mut windows, opener) = coordinator(&shell_config(&[]));
        let main = windows.create_main_window();
        let outcome = windows.handle_event(
            main,
            &NavigationEvent::WillNavigate {
                url: "https://example.com/other".into(),
            },
        );
        assert!(outcome.prevent_default);
        assert_eq!(opener.opened(), vec!["https://example.com/other".to_string()]);
        assert_eq!(windows.host().all_windows().len(), 1);
    }

    #[test]
    fn unload_prompt_leave_prevents_default() {
        let (mut windows, _) = coordinator(&shell_config(&[]));
        let main = windows.create_main_window();

        windows.host_mut().answer(0, false);
        assert!(windows.handle_event(main, &NavigationEvent::WillPreventUnload).prevent_default);

        windows.host_mut().answer(1, false);
        assert!(!windows.handle_event(main, &NavigationEvent::WillPreventUnload).prevent_default);
        assert_eq!(windows.host().message_boxes[0].buttons, vec!["Leave", "Stay"]);
    }

    #[test]
    fn did_navigate_tracks_current_app() {
        let (mut windows, _) = coordinator(&shell_config(&["tools"]));
        let main = windows.create_main_window();
        windows.handle_event(
            main,
            &NavigationEvent::DidNavigate {
                url: "file:///base/tools/index.html".into(),
            },
        );
        assert_eq!(windows.current_app(main), Some("tools"));

        windows.go_home(main);
        assert_eq!(windows.current_app(main), Some("opensphere"));
        assert_eq!(windows.host().url(main), Some("file:///base/opensphere/index.html"));
    }

    #[test]
    fn relaunch_only_restarts_packaged_builds() {
        let (mut windows, _) = coordinator(&shell_config(&[]));
        windows.relaunch();
        assert!(windows.host().headless().relaunch_requested());
        assert!(windows.host().headless().quit_requested());

        let (mut dev, _) = coordinator_at(&shell_config(&[]), AppEnv::new(BuildMode::Compiled, "/base"));
        dev.relaunch();
        assert!(!dev.host().headless().relaunch_requested());
        assert!(dev.host().headless().quit_requested());
    }

    #[test]
    fn update_dialogs_drive_host_windows() {
        let (mut windows, _) = coordinator(&shell_config(&[]));
        let main = windows.create_main_window();
        let dir = tempfile::TempDir::new().unwrap();
        let settings = UpdateSettings::new("OpenSphere", false, dir.path(), dir.path());
        let mut updates = UpdateCoordinator::new(CountingUpdater::default(), settings);

        windows.host_mut().answer(0, false);
        updates
            .on_update_available("2.0.0", &mut windows.update_dialogs("OpenSphere"))
            .unwrap();
        assert_eq!(updates.updater().downloads, 1);

        updates.on_download_progress(40.0, &mut windows.update_dialogs("OpenSphere"));
        assert_eq!(windows.host().window(main).unwrap().progress, Some(0.4));
    }
}
