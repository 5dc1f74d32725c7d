/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Navigation policy for shell windows.
//!
//! Every navigation a window attempts is classified as same-app, other-app,
//! external or blocked, and turned into a [`NavigationAction`] that the window
//! coordinator carries out. The policy holds no per-event state, so one
//! instance serves every window.
//!
//! External content is never loaded inside an application window: it goes to
//! the system browser, where the user's sessions already live.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::prefs::InternalLinks;
use crate::services::app_path::{AppResolver, url_suffix};
use crate::shell::desktop::host::window::{MessageBox, MessageKind, WindowHost, WindowId};

const ABOUT_BLANK: &str = "about:blank";

/// Navigation-related events raised by a window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NavigationEvent {
    /// The page asked for a new window (`window.open`, `target=_blank`).
    NewWindow { url: String },
    /// Top-level navigation of the window itself.
    WillNavigate { url: String },
    DidNavigate { url: String },
    DidNavigateInPage { url: String },
    /// The page is trying to cancel its own unload.
    WillPreventUnload,
    /// The page is embedding a `<webview>` with this source.
    WillAttachWebview { src: String },
}

impl NavigationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewWindow { .. } => "new-window",
            Self::WillNavigate { .. } => "will-navigate",
            Self::DidNavigate { .. } => "did-navigate",
            Self::DidNavigateInPage { .. } => "did-navigate-in-page",
            Self::WillPreventUnload => "will-prevent-unload",
            Self::WillAttachWebview { .. } => "will-attach-webview",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "class", content = "app", rename_all = "kebab-case")]
pub enum NavigationClass {
    InternalSameApp,
    /// Belongs to another configured application.
    InternalOtherApp(String),
    External,
    Blocked,
}

/// What the coordinator should do with an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum NavigationAction {
    /// Let the runtime handle it.
    Allow,
    /// Open `url` in a new window next to the requesting one.
    OpenAppWindow { app_name: String, url: String },
    /// Load `url` in the requesting window instead.
    LoadInPlace { app_name: String, url: String },
    /// Hand `url` to the system browser.
    OpenExternal { url: String },
    Block,
    /// Attach the webview with hardened preferences.
    AttachWebview,
    /// Ask the user whether to leave the page.
    ConfirmUnload,
    /// Nothing to decide; observers may refresh history state.
    Observe,
}

impl NavigationAction {
    /// Whether the runtime's own handling of the event must be suppressed.
    pub fn prevents_default(&self) -> bool {
        matches!(
            self,
            Self::OpenAppWindow { .. } | Self::LoadInPlace { .. } | Self::OpenExternal { .. } | Self::Block
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnloadChoice {
    Leave,
    Stay,
}

/// Asks whether to discard unsaved changes when a page blocks its unload.
pub trait UnloadPrompt {
    fn confirm_unload(&mut self, window: WindowId, icon: Option<PathBuf>) -> UnloadChoice;
}

pub fn unload_warning(icon: Option<PathBuf>) -> MessageBox {
    MessageBox::new(
        MessageKind::Info,
        "Warning!",
        "You have unsaved changes on this page. If you navigate away from this page, your changes will be lost.",
    )
    .with_buttons(&["Leave", "Stay"])
    .with_cancel_id(1)
    .with_icon(icon)
}

impl<H: WindowHost + ?Sized> UnloadPrompt for H {
    fn confirm_unload(&mut self, window: WindowId, icon: Option<PathBuf>) -> UnloadChoice {
        match self.show_message_box(window, &unload_warning(icon)).response {
            0 => UnloadChoice::Leave,
            _ => UnloadChoice::Stay,
        }
    }
}

/// Percent-decode `url` for pattern matching. Malformed input yields the raw
/// URL.
pub fn try_decode_url(url: &str) -> Cow<'_, str> {
    match urlencoding::decode(url) {
        Ok(decoded) => decoded,
        Err(error) => {
            log::warn!("navigation_policy: URL {url} contains invalid characters ({error}); using it undecoded");
            Cow::Borrowed(url)
        },
    }
}

/// Whether the URL names a page file rather than a bare application route.
fn names_page_file(url: &str) -> bool {
    let without_suffix = &url[..url.len() - url_suffix(url).len()];
    without_suffix.to_ascii_lowercase().contains(".htm")
}

#[derive(Clone, Debug)]
pub struct NavigationPolicy {
    resolver: AppResolver,
    internal_links: InternalLinks,
    base_path: PathBuf,
}

impl NavigationPolicy {
    pub fn new(resolver: AppResolver, internal_links: InternalLinks, base_path: impl Into<PathBuf>) -> Self {
        Self {
            resolver,
            internal_links,
            base_path: base_path.into(),
        }
    }

    pub fn resolver(&self) -> &AppResolver {
        &self.resolver
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Whether `url` is a `file://` URL under the application base path.
    pub fn is_local_to_base(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if parsed.scheme() != "file" {
            return false;
        }
        parsed
            .to_file_path()
            .is_ok_and(|path| path.starts_with(&self.base_path))
    }

    /// Classify `url` for a window currently showing `current_app`.
    ///
    /// `route_apps` enables the app-table lookup that sends navigations to
    /// another configured application.
    pub fn classify(&self, url: &str, current_app: Option<&str>, route_apps: bool) -> NavigationClass {
        if url.trim().is_empty() {
            return NavigationClass::Blocked;
        }

        let decoded = try_decode_url(url);
        if self.internal_links.is_internal(&decoded) {
            return NavigationClass::InternalSameApp;
        }

        if decoded.starts_with(ABOUT_BLANK) {
            return NavigationClass::InternalSameApp;
        }
        if !self.is_local_to_base(url) {
            return NavigationClass::External;
        }

        if route_apps
            && let Some(app_name) = self.resolver.match_app_for_url(url)
            && current_app != Some(app_name.as_str())
        {
            return NavigationClass::InternalOtherApp(app_name);
        }
        NavigationClass::InternalSameApp
    }

    /// URL of `app_name`'s index page carrying over `requested`'s query and
    /// fragment.
    pub fn app_url_for(&self, app_name: &str, requested: &str) -> String {
        let mut url = self.resolver.resolve_url(app_name, &self.base_path);
        url.push_str(url_suffix(requested));
        url
    }

    pub fn decide(&self, event: &NavigationEvent, current_app: Option<&str>) -> NavigationAction {
        let action = match event {
            NavigationEvent::NewWindow { url } => {
                match self.classify(url, current_app, !names_page_file(url)) {
                    NavigationClass::InternalSameApp => NavigationAction::Allow,
                    NavigationClass::InternalOtherApp(app_name) => NavigationAction::OpenAppWindow {
                        url: self.app_url_for(&app_name, url),
                        app_name,
                    },
                    NavigationClass::External => NavigationAction::OpenExternal { url: url.clone() },
                    NavigationClass::Blocked => NavigationAction::Block,
                }
            },
            NavigationEvent::WillNavigate { url } => match self.classify(url, current_app, true) {
                NavigationClass::InternalSameApp => NavigationAction::Allow,
                NavigationClass::InternalOtherApp(app_name) => NavigationAction::LoadInPlace {
                    url: self.app_url_for(&app_name, url),
                    app_name,
                },
                NavigationClass::External => NavigationAction::OpenExternal { url: url.clone() },
                NavigationClass::Blocked => NavigationAction::Block,
            },
            NavigationEvent::DidNavigate { .. } | NavigationEvent::DidNavigateInPage { .. } => {
                NavigationAction::Observe
            },
            NavigationEvent::WillPreventUnload => NavigationAction::ConfirmUnload,
            NavigationEvent::WillAttachWebview { src } => {
                if self.is_local_to_base(src) {
                    NavigationAction::AttachWebview
                } else {
                    NavigationAction::Block
                }
            },
        };
        log::debug!("navigation_policy: [{}] -> {action:?}", event.name());
        action
    }
}
