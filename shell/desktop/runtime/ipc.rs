/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Request/response boundary between the web application and the shell.
//!
//! Requests are JSON objects `{"id": 1, "channel": "add-settings", "args": {...}}`.
//! Every request gets exactly one reply carrying the same `id`:
//! `{"id": 1, "ok": true, "value": ...}` or `{"id": 1, "ok": false, "error": "..."}`.
//! The shell can also push unsolicited [`IpcEvent`]s (certificate prompts,
//! updater commands) on the same stream. [`serve`] speaks this protocol as
//! newline-delimited JSON over any async byte stream.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::services::cookies::{CookieJar, now_unix_secs};
use crate::services::memory;
use crate::services::settings::SettingsError;
use crate::services::settings::types::SettingsFileEntry;
use crate::services::settings::worker::SettingsHandle;
use crate::services::update::{UpdateCoordinator, UpdateError, Updater};
use crate::services::user_certs::{Certificate, CertificateBroker, CertificateError, CertificatePrompt};
use crate::shell::desktop::host::window::{ExternalOpener, WindowHost, WindowId};
use crate::shell::desktop::host::window_coordinator::WindowCoordinator;
use crate::shell::desktop::lifecycle::navigation_policy::NavigationEvent;

pub mod channel {
    pub const ADD_SETTINGS: &str = "add-settings";
    pub const REMOVE_SETTINGS: &str = "remove-settings";
    pub const UPDATE_SETTINGS: &str = "update-settings";
    pub const SET_SETTINGS: &str = "set-settings";
    pub const GET_SETTINGS_FILES: &str = "get-settings-files";
    pub const GET_BASE_SETTINGS_FILE: &str = "get-base-settings-file";
    pub const GET_USER_SETTINGS_DIR: &str = "get-user-settings-dir";
    pub const USER_SETTINGS_SUPPORTED: &str = "user-settings-supported";

    pub const SET_COOKIE: &str = "set-cookie";
    pub const UPDATE_COOKIES: &str = "update-cookies";

    pub const SELECT_CLIENT_CERTIFICATE: &str = "select-client-certificate";
    pub const CLIENT_CERTIFICATE_SELECTED: &str = "client-certificate-selected";
    pub const CLIENT_CERTIFICATE_HANDLER_REGISTERED: &str = "client-certificate-handler-registered";

    pub const CHECK_FOR_UPDATES: &str = "check-for-updates";
    pub const UPDATE_AVAILABLE: &str = "update-available";
    pub const UPDATE_NOT_AVAILABLE: &str = "update-not-available";
    pub const UPDATE_DOWNLOAD_PROGRESS: &str = "update-download-progress";
    pub const UPDATE_DOWNLOADED: &str = "update-downloaded";
    pub const UPDATE_ERROR: &str = "update-error";

    pub const GET_MAXIMUM_MEMORY: &str = "get-maximum-memory";
    pub const SET_MAXIMUM_MEMORY: &str = "set-maximum-memory";

    pub const CREATE_MAIN_WINDOW: &str = "create-main-window";
    pub const NAVIGATION_EVENT: &str = "navigation-event";
    pub const WINDOW_CLOSED: &str = "window-closed";
    pub const GO_HOME: &str = "go-home";
    pub const RELAUNCH: &str = "relaunch";
}

/// Events pushed to the runtime without a request.
pub mod event {
    pub const UPDATER_CHECK: &str = "updater-check";
    pub const UPDATER_DOWNLOAD: &str = "updater-download";
    pub const UPDATER_QUIT_AND_INSTALL: &str = "updater-quit-and-install";
}

#[derive(Debug)]
pub enum IpcError {
    Malformed(String),
    UnknownChannel(String),
    InvalidArgs { channel: String, reason: String },
    Settings(SettingsError),
    Certificate(CertificateError),
    Update(UpdateError),
    Serialize(String),
}

impl std::fmt::Display for IpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "malformed request: {e}"),
            Self::UnknownChannel(channel) => write!(f, "unknown channel '{channel}'"),
            Self::InvalidArgs { channel, reason } => write!(f, "invalid arguments for '{channel}': {reason}"),
            Self::Settings(e) => write!(f, "{e}"),
            Self::Certificate(e) => write!(f, "{e}"),
            Self::Update(e) => write!(f, "{e}"),
            Self::Serialize(e) => write!(f, "reply serialize error: {e}"),
        }
    }
}

impl std::error::Error for IpcError {}

impl From<SettingsError> for IpcError {
    fn from(error: SettingsError) -> Self {
        Self::Settings(error)
    }
}

impl From<CertificateError> for IpcError {
    fn from(error: CertificateError) -> Self {
        Self::Certificate(error)
    }
}

impl From<UpdateError> for IpcError {
    fn from(error: UpdateError) -> Self {
        Self::Update(error)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IpcRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub channel: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IpcReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IpcReply {
    fn from_result(id: Option<u64>, result: Result<Value, IpcError>) -> Self {
        match result {
            Ok(value) => Self {
                id,
                ok: true,
                value: Some(value),
                error: None,
            },
            Err(error) => Self {
                id,
                ok: false,
                value: None,
                error: Some(error.to_string()),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IpcEvent {
    pub event: String,
    #[serde(default)]
    pub args: Value,
}

impl IpcEvent {
    pub fn new(event: &str, args: Value) -> Self {
        Self {
            event: event.to_string(),
            args,
        }
    }
}

/// Certificate prompt forwarded to the runtime as an event.
#[derive(Clone, Debug)]
pub struct EventCertificatePrompt {
    events: mpsc::UnboundedSender<IpcEvent>,
}

impl EventCertificatePrompt {
    pub fn new(events: mpsc::UnboundedSender<IpcEvent>) -> Self {
        Self { events }
    }
}

impl CertificatePrompt for EventCertificatePrompt {
    fn request_selection(&self, url: &str, candidates: &[Certificate]) {
        let event = IpcEvent::new(
            channel::SELECT_CLIENT_CERTIFICATE,
            json!({ "url": url, "certificates": candidates }),
        );
        if self.events.send(event).is_err() {
            log::warn!("ipc: certificate prompt for {url} dropped; event stream closed");
        }
    }
}

/// Updater whose package work is done by the runtime on request.
#[derive(Clone, Debug)]
pub struct EventUpdater {
    events: mpsc::UnboundedSender<IpcEvent>,
}

impl EventUpdater {
    pub fn new(events: mpsc::UnboundedSender<IpcEvent>) -> Self {
        Self { events }
    }

    fn emit(&self, name: &str) {
        if self.events.send(IpcEvent::new(name, Value::Null)).is_err() {
            log::warn!("ipc: {name} dropped; event stream closed");
        }
    }
}

impl Updater for EventUpdater {
    fn check_for_updates(&mut self) {
        self.emit(event::UPDATER_CHECK);
    }

    fn download_update(&mut self) {
        self.emit(event::UPDATER_DOWNLOAD);
    }

    fn quit_and_install(&mut self) {
        self.emit(event::UPDATER_QUIT_AND_INSTALL);
    }
}

#[derive(Deserialize)]
struct EntryArgs {
    entry: SettingsFileEntry,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct EntriesArgs {
    entries: Vec<SettingsFileEntry>,
}

#[derive(Deserialize)]
struct CookieArgs {
    value: String,
}

#[derive(Deserialize)]
struct SelectCertificateArgs {
    url: String,
    certificates: Vec<Certificate>,
}

#[derive(Deserialize)]
struct CertificateSelectedArgs {
    url: String,
    certificate: Certificate,
}

#[derive(Deserialize)]
struct VersionArgs {
    version: String,
}

#[derive(Deserialize)]
struct ProgressArgs {
    percent: f64,
}

#[derive(Deserialize)]
struct ErrorArgs {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemoryArgs {
    max_memory: u64,
}

#[derive(Deserialize)]
struct WindowArgs {
    window: WindowId,
}

#[derive(Deserialize)]
struct NavigationArgs {
    window: WindowId,
    event: NavigationEvent,
}

fn parse_args<T: DeserializeOwned>(channel: &str, args: Value) -> Result<T, IpcError> {
    serde_json::from_value(args).map_err(|e| IpcError::InvalidArgs {
        channel: channel.to_string(),
        reason: e.to_string(),
    })
}

fn to_json<T: Serialize>(value: T) -> Result<Value, IpcError> {
    serde_json::to_value(value).map_err(|e| IpcError::Serialize(e.to_string()))
}

pub type SharedUpdates = Arc<Mutex<UpdateCoordinator<Box<dyn Updater>>>>;

/// Routes each channel to the service that owns it.
pub struct IpcRouter<H: WindowHost, O: ExternalOpener> {
    app_name: String,
    settings: Option<SettingsHandle>,
    cookies: Arc<CookieJar>,
    certificates: Arc<CertificateBroker>,
    updates: SharedUpdates,
    windows: Arc<Mutex<WindowCoordinator<H, O>>>,
}

impl<H: WindowHost, O: ExternalOpener> IpcRouter<H, O> {
    pub fn new(
        app_name: impl Into<String>,
        settings: Option<SettingsHandle>,
        certificates: Arc<CertificateBroker>,
        updates: SharedUpdates,
        windows: Arc<Mutex<WindowCoordinator<H, O>>>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            settings,
            cookies: Arc::new(CookieJar::new()),
            certificates,
            updates,
            windows,
        }
    }

    pub fn windows(&self) -> &Arc<Mutex<WindowCoordinator<H, O>>> {
        &self.windows
    }

    fn settings(&self) -> Result<&SettingsHandle, IpcError> {
        self.settings
            .as_ref()
            .ok_or(IpcError::Settings(SettingsError::Unsupported))
    }

    /// Handle one request line and return the serialized reply.
    pub async fn handle_line(&self, line: &str) -> String {
        let reply = match serde_json::from_str::<IpcRequest>(line) {
            Ok(request) => {
                let id = request.id;
                IpcReply::from_result(id, self.dispatch(&request.channel, request.args).await)
            },
            Err(error) => IpcReply::from_result(None, Err(IpcError::Malformed(error.to_string()))),
        };
        serde_json::to_string(&reply).unwrap_or_else(|e| {
            log::error!("ipc: failed to serialize reply: {e}");
            r#"{"ok":false,"error":"reply serialization failed"}"#.to_string()
        })
    }

    pub async fn dispatch(&self, channel: &str, args: Value) -> Result<Value, IpcError> {
        log::debug!("ipc: <- {channel}");
        let result = self.route(channel, args).await;
        if let Err(error) = &result {
            log::warn!("ipc: {channel} failed: {error}");
        }
        result
    }

    async fn route(&self, channel: &str, args: Value) -> Result<Value, IpcError> {
        match channel {
            channel::ADD_SETTINGS => {
                let EntryArgs { entry, content } = parse_args(channel, args)?;
                to_json(self.settings()?.add(entry, content).await?)
            },
            channel::REMOVE_SETTINGS => {
                let EntryArgs { entry, .. } = parse_args(channel, args)?;
                to_json(self.settings()?.remove(entry).await?)
            },
            channel::UPDATE_SETTINGS => {
                let EntryArgs { entry, .. } = parse_args(channel, args)?;
                to_json(self.settings()?.update(entry).await?)
            },
            channel::SET_SETTINGS => {
                let EntriesArgs { entries } = parse_args(channel, args)?;
                to_json(self.settings()?.replace_all(entries).await?)
            },
            channel::GET_SETTINGS_FILES => to_json(self.settings()?.entries().await?),
            channel::GET_BASE_SETTINGS_FILE => to_json(self.settings()?.base_settings_file()),
            channel::GET_USER_SETTINGS_DIR => to_json(self.settings()?.user_settings_dir()),
            channel::USER_SETTINGS_SUPPORTED => Ok(Value::Bool(self.settings.is_some())),

            channel::SET_COOKIE => {
                let CookieArgs { value } = parse_args(channel, args)?;
                let now = now_unix_secs();
                self.cookies.set_from_str(&value, now);
                Ok(Value::String(self.cookies.cookie_header(now)))
            },
            channel::UPDATE_COOKIES => Ok(Value::String(self.cookies.cookie_header(now_unix_secs()))),

            channel::SELECT_CLIENT_CERTIFICATE => {
                let SelectCertificateArgs { url, certificates } = parse_args(channel, args)?;
                let selected = self.certificates.select_certificate(&url, certificates).await?;
                to_json(selected)
            },
            channel::CLIENT_CERTIFICATE_SELECTED => {
                let CertificateSelectedArgs { url, certificate } = parse_args(channel, args)?;
                to_json(self.certificates.resolve(&url, certificate)?)
            },
            // Updates wait for the certificate handler so the user can be
            // prompted if the update server wants a client certificate.
            channel::CLIENT_CERTIFICATE_HANDLER_REGISTERED => {
                Ok(Value::Bool(self.updates.lock().check_for_updates(false)))
            },
            channel::CHECK_FOR_UPDATES => Ok(Value::Bool(self.updates.lock().check_for_updates(true))),
            channel::UPDATE_AVAILABLE => {
                let VersionArgs { version } = parse_args(channel, args)?;
                let mut updates = self.updates.lock();
                let mut windows = self.windows.lock();
                updates.on_update_available(&version, &mut windows.update_dialogs(&self.app_name))?;
                Ok(Value::Null)
            },
            channel::UPDATE_NOT_AVAILABLE => {
                let mut updates = self.updates.lock();
                let mut windows = self.windows.lock();
                updates.on_update_not_available(&mut windows.update_dialogs(&self.app_name));
                Ok(Value::Null)
            },
            channel::UPDATE_DOWNLOAD_PROGRESS => {
                let ProgressArgs { percent } = parse_args(channel, args)?;
                let mut updates = self.updates.lock();
                let mut windows = self.windows.lock();
                updates.on_download_progress(percent, &mut windows.update_dialogs(&self.app_name));
                Ok(Value::Null)
            },
            channel::UPDATE_DOWNLOADED => {
                let mut updates = self.updates.lock();
                let mut windows = self.windows.lock();
                updates.on_update_downloaded(&mut windows.update_dialogs(&self.app_name));
                Ok(Value::Null)
            },
            channel::UPDATE_ERROR => {
                let ErrorArgs { message } = parse_args(channel, args)?;
                let mut updates = self.updates.lock();
                let mut windows = self.windows.lock();
                updates.on_error(&message, &mut windows.update_dialogs(&self.app_name));
                Ok(Value::Null)
            },

            channel::GET_MAXIMUM_MEMORY => Ok(json!(memory::maximum_memory_mb())),
            channel::SET_MAXIMUM_MEMORY => {
                let MemoryArgs { max_memory } = parse_args(channel, args)?;
                memory::set_maximum_memory(max_memory);
                Ok(Value::Null)
            },

            channel::CREATE_MAIN_WINDOW => to_json(self.windows.lock().create_main_window()),
            channel::NAVIGATION_EVENT => {
                let NavigationArgs { window, event } = parse_args(channel, args)?;
                let outcome = self.windows.lock().handle_event(window, &event);
                to_json(outcome)
            },
            channel::WINDOW_CLOSED => {
                let WindowArgs { window } = parse_args(channel, args)?;
                self.windows.lock().window_closed(window);
                Ok(Value::Null)
            },
            channel::GO_HOME => {
                let WindowArgs { window } = parse_args(channel, args)?;
                self.windows.lock().go_home(window);
                Ok(Value::Null)
            },
            channel::RELAUNCH => {
                self.windows.lock().relaunch();
                Ok(Value::Null)
            },
            other => Err(IpcError::UnknownChannel(other.to_string())),
        }
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// Serve requests from `reader` until it closes, writing replies and pushed
/// events to `writer`.
///
/// Requests run concurrently, so a certificate prompt waiting on the user
/// does not hold up other channels. Requests still in flight when the reader
/// closes are dropped.
pub async fn serve<H, O, R, W>(
    router: Arc<IpcRouter<H, O>>,
    reader: R,
    mut writer: W,
    mut events: mpsc::UnboundedReceiver<IpcEvent>,
) -> std::io::Result<()>
where
    H: WindowHost + Send + 'static,
    O: ExternalOpener + Send + 'static,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut in_flight: JoinSet<String> = JoinSet::new();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => {},
                Some(line) => {
                    let router = router.clone();
                    in_flight.spawn(async move { router.handle_line(&line).await });
                },
                None => break,
            },
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => match joined {
                Ok(reply) => write_line(&mut writer, &reply).await?,
                Err(error) => log::error!("ipc: request task failed: {error}"),
            },
            Some(event) = events.recv() => match serde_json::to_string(&event) {
                Ok(line) => write_line(&mut writer, &line).await?,
                Err(error) => log::error!("ipc: failed to serialize event {}: {error}", event.event),
            },
        }
    }

    if !in_flight.is_empty() {
        log::info!("ipc: input closed with {} request(s) in flight", in_flight.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::ShellConfig;
    use crate::services::settings::types::DisabledEntryPolicy;
    use crate::services::settings::worker::SettingsWorker;
    use crate::services::settings::{SettingsPaths, SettingsStore};
    use crate::services::update::UpdateSettings;
    use crate::test_utils::{RecordingHost, RecordingOpener, coordinator, shell_config};
    use std::fs;
    use tempfile::TempDir;

    type TestRouter = IpcRouter<RecordingHost, RecordingOpener>;

    struct Fixture {
        router: Arc<TestRouter>,
        events: mpsc::UnboundedReceiver<IpcEvent>,
        _dir: TempDir,
    }

    fn fixture(with_settings: bool, config: &ShellConfig) -> Fixture {
        let dir = TempDir::new().unwrap();
        let settings = with_settings.then(|| {
            let shipped = dir.path().join("settings.json");
            fs::write(&shipped, "{}").unwrap();
            let paths = SettingsPaths::new(shipped, dir.path().join("userConfig"));
            let store = SettingsStore::initialize(paths, DisabledEntryPolicy::Omit).unwrap();
            SettingsWorker::spawn(store).0
        });

        let (events_tx, events) = mpsc::unbounded_channel();
        let certificates = Arc::new(CertificateBroker::new(Arc::new(EventCertificatePrompt::new(events_tx.clone()))));
        let update_settings = UpdateSettings::new("OpenSphere", false, dir.path(), dir.path());
        let updater: Box<dyn Updater> = Box::new(EventUpdater::new(events_tx));
        let updates: SharedUpdates = Arc::new(Mutex::new(UpdateCoordinator::new(updater, update_settings)));
        let (windows, _) = coordinator(config);
        let router = IpcRouter::new(
            "OpenSphere",
            settings,
            certificates,
            updates,
            Arc::new(Mutex::new(windows)),
        );
        Fixture {
            router: Arc::new(router),
            events,
            _dir: dir,
        }
    }

    async fn call(router: &TestRouter, request: Value) -> IpcReply {
        serde_json::from_str(&router.handle_line(&request.to_string()).await).unwrap()
    }

    #[tokio::test]
    async fn settings_channels_round_trip_entries() {
        let fixture = fixture(true, &shell_config(&[]));
        let reply = call(
            &fixture.router,
            json!({"id": 7, "channel": "add-settings", "args": {
                "entry": {"path": "https://example.com/s.json", "label": "Remote"}
            }}),
        )
        .await;
        assert_eq!(reply.id, Some(7));
        assert!(reply.ok, "{reply:?}");
        let entries: Vec<SettingsFileEntry> = serde_json::from_value(reply.value.unwrap()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].label, "Remote");

        let reply = call(&fixture.router, json!({"channel": "user-settings-supported"})).await;
        assert_eq!(reply.value, Some(Value::Bool(true)));
    }

    #[tokio::test]
    async fn settings_channels_fail_when_disabled() {
        let fixture = fixture(false, &shell_config(&[]));
        let reply = call(&fixture.router, json!({"channel": "get-settings-files"})).await;
        assert!(!reply.ok);

        let reply = call(&fixture.router, json!({"channel": "user-settings-supported"})).await;
        assert_eq!(reply.value, Some(Value::Bool(false)));
    }

    #[tokio::test]
    async fn bad_requests_get_error_replies() {
        let fixture = fixture(false, &shell_config(&[]));
        let reply: IpcReply = serde_json::from_str(&fixture.router.handle_line("not json").await).unwrap();
        assert!(!reply.ok);

        let reply = call(&fixture.router, json!({"id": 1, "channel": "nope"})).await;
        assert_eq!(reply.error.as_deref(), Some("unknown channel 'nope'"));

        let reply = call(&fixture.router, json!({"id": 2, "channel": "set-cookie", "args": {}})).await;
        assert!(reply.error.unwrap().starts_with("invalid arguments for 'set-cookie'"));
    }

    #[tokio::test]
    async fn cookies_are_bridged() {
        let fixture = fixture(false, &shell_config(&[]));
        let reply = call(
            &fixture.router,
            json!({"channel": "set-cookie", "args": {"value": "session=abc; secure"}}),
        )
        .await;
        assert_eq!(reply.value, Some(json!("session=abc")));
        let reply = call(&fixture.router, json!({"channel": "update-cookies"})).await;
        assert_eq!(reply.value, Some(json!("session=abc")));
    }

    #[tokio::test]
    async fn navigation_events_reach_the_coordinator() {
        let fixture = fixture(false, &shell_config(&["tools"]));
        let reply = call(&fixture.router, json!({"channel": "create-main-window"})).await;
        let window = reply.value.unwrap();

        let reply = call(
            &fixture.router,
            json!({"channel": "navigation-event", "args": {
                "window": window,
                "event": {"kind": "new-window", "url": "file:///base/tools"}
            }}),
        )
        .await;
        let outcome = reply.value.unwrap();
        assert_eq!(outcome["prevent_default"], json!(true));
        assert_eq!(outcome["action"]["action"], json!("open-app-window"));
        assert_eq!(outcome["action"]["app_name"], json!("tools"));
    }

    #[tokio::test]
    async fn update_check_asks_runtime_to_check() {
        let mut fixture = fixture(false, &shell_config(&[]));
        let reply = call(&fixture.router, json!({"channel": "check-for-updates"})).await;
        assert_eq!(reply.value, Some(Value::Bool(true)));
        assert_eq!(fixture.events.recv().await.unwrap().event, event::UPDATER_CHECK);
    }

    #[tokio::test]
    async fn serve_answers_each_line() {
        let fixture = fixture(false, &shell_config(&[]));
        let (client, server) = tokio::io::duplex(4096);
        let (server_read, server_write) = tokio::io::split(server);
        let task = tokio::spawn(serve(
            fixture.router.clone(),
            tokio::io::BufReader::new(server_read),
            server_write,
            fixture.events,
        ));

        let (client_read, mut client_write) = tokio::io::split(client);
        client_write
            .write_all(b"{\"id\":1,\"channel\":\"user-settings-supported\"}\n\n")
            .await
            .unwrap();
        let mut replies = tokio::io::BufReader::new(client_read).lines();
        let reply: IpcReply = serde_json::from_str(&replies.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(reply.id, Some(1));
        assert_eq!(reply.value, Some(Value::Bool(false)));

        client_write.shutdown().await.unwrap();
        task.await.unwrap().unwrap();
    }
}
