/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::sync::Arc;
use std::{env, panic};

use parking_lot::Mutex;
use tokio::io::BufReader;
use tokio::sync::mpsc;

use crate::prefs::{ArgumentParsingResult, ShellConfig, ShellOptions, parse_command_line_arguments};
use crate::services::app_path::AppResolver;
use crate::services::settings::worker::{SettingsHandle, SettingsWorker};
use crate::services::settings::{SettingsPaths, SettingsStore};
use crate::services::update::{UpdateCoordinator, UpdateSettings, Updater};
use crate::services::user_certs::CertificateBroker;
use crate::shell::desktop::host::app_env::AppEnv;
use crate::shell::desktop::host::headless::HeadlessHost;
use crate::shell::desktop::host::window::OsExternalOpener;
use crate::shell::desktop::host::window_coordinator::WindowCoordinator;
use crate::shell::desktop::runtime::ipc::{
    EventCertificatePrompt, EventUpdater, IpcRouter, SharedUpdates, serve,
};

pub fn main() {
    // Skip the first argument, which is the binary name.
    let args: Vec<String> = env::args().skip(1).collect();
    let options = match parse_command_line_arguments(&args) {
        ArgumentParsingResult::Run(options) => options,
        ArgumentParsingResult::Exit => std::process::exit(0),
        ArgumentParsingResult::ErrorParsing => std::process::exit(1),
    };

    crate::init_tracing(options.tracing_filter.as_deref());
    panic::set_hook(Box::new(|info| {
        log::error!("opensphere-shell panicked: {info}");
    }));

    if let Err(error) = run(options) {
        log::error!("{error}");
        std::process::exit(1);
    }
}

fn run(options: ShellOptions) -> Result<(), String> {
    let bootstrap_env = AppEnv::from_options(&options, crate::prefs::DEFAULT_APP_NAME);
    let config = ShellConfig::load_or_default(options.config.as_deref(), &bootstrap_env.config_candidates())
        .map_err(|e| e.to_string())?;
    // The data directory is named after the configured application.
    let app_env = AppEnv::from_options(&options, &config.app_name).with_icon_from(&config);
    log::info!(
        "cli: starting {} ({:?}) from {}",
        config.app_name,
        app_env.mode,
        app_env.base_path.display()
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to start async runtime: {e}"))?;
    runtime.block_on(serve_stdio(config, app_env))
}

fn start_settings(config: &ShellConfig, app_env: &AppEnv) -> Option<SettingsHandle> {
    if !config.enable_user_settings {
        log::info!("cli: user settings disabled");
        return None;
    }

    let resolver = AppResolver::new(config.apps.clone(), app_env.mode)
        .with_extra_resource_path(app_env.extra_resource_path.clone());
    let app_path = resolver.resolve_path(&config.base_app, &app_env.base_path);
    let paths = SettingsPaths::for_app(&app_path, app_env.mode, &app_env.user_data_dir);
    match SettingsStore::initialize(paths, config.disabled_entries) {
        Ok(store) => Some(SettingsWorker::spawn(store).0),
        Err(error) => {
            log::error!("cli: user settings unavailable: {error}");
            None
        },
    }
}

async fn serve_stdio(config: ShellConfig, app_env: AppEnv) -> Result<(), String> {
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let settings = start_settings(&config, &app_env);
    let certificates = Arc::new(CertificateBroker::new(Arc::new(EventCertificatePrompt::new(
        events_tx.clone(),
    ))));

    let working_dir = env::current_dir().unwrap_or_default();
    let mut update_settings = UpdateSettings::new(
        &config.app_name,
        app_env.mode.is_dev(),
        &working_dir,
        &app_env.user_data_dir,
    );
    update_settings.release_url = config.release_url.clone();
    update_settings.portable = app_env.portable;
    let updater: Box<dyn Updater> = Box::new(EventUpdater::new(events_tx));
    let updates: SharedUpdates = Arc::new(Mutex::new(UpdateCoordinator::new(updater, update_settings)));

    let mut windows = WindowCoordinator::new(HeadlessHost::default(), OsExternalOpener, &config, app_env);
    windows.create_main_window();

    let router = Arc::new(IpcRouter::new(
        config.app_name.clone(),
        settings,
        certificates,
        updates,
        Arc::new(Mutex::new(windows)),
    ));

    let stdin = BufReader::new(tokio::io::stdin());
    serve(router, stdin, tokio::io::stdout(), events_rx)
        .await
        .map_err(|e| format!("ipc stream failed: {e}"))?;
    log::info!("cli: input closed; shutting down");
    Ok(())
}
