/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Serialized mutation queue for the settings store.
//!
//! The worker owns the [`SettingsStore`]; every caller goes through a cloneable
//! [`SettingsHandle`]. Commands are applied one at a time, so "mutate, derive
//! the manifest, write both files" never interleaves with another mutation.
//! Disk work runs on the blocking pool and completes before the caller gets
//! its reply.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::types::SettingsFileEntry;
use super::{SettingsError, SettingsStore};

/// Capacity of the command channel. Senders wait when it is full.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

type Reply = oneshot::Sender<Result<Vec<SettingsFileEntry>, SettingsError>>;

/// Operations accepted by the worker.
#[derive(Debug, Clone)]
pub enum SettingsCommand {
    Add {
        entry: SettingsFileEntry,
        content: Option<String>,
    },
    Remove {
        entry: SettingsFileEntry,
    },
    Update {
        entry: SettingsFileEntry,
    },
    ReplaceAll {
        entries: Vec<SettingsFileEntry>,
    },
    /// Read the current list without mutating it.
    Snapshot,
}

impl SettingsCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Update { .. } => "update",
            Self::ReplaceAll { .. } => "replace-all",
            Self::Snapshot => "snapshot",
        }
    }

    fn apply(self, store: &mut SettingsStore) -> Result<Vec<SettingsFileEntry>, SettingsError> {
        let entries = match self {
            Self::Add { entry, content } => store.add(entry, content.as_deref())?,
            Self::Remove { entry } => store.remove(&entry)?,
            Self::Update { entry } => store.update(entry)?,
            Self::ReplaceAll { entries } => store.replace_all(entries)?,
            Self::Snapshot => store.entries(),
        };
        Ok(entries.to_vec())
    }
}

struct QueuedCommand {
    command: SettingsCommand,
    reply: Reply,
}

/// Cloneable front end to the settings worker.
#[derive(Clone, Debug)]
pub struct SettingsHandle {
    command_tx: mpsc::Sender<QueuedCommand>,
    manifest_file: Arc<PathBuf>,
    user_settings_dir: Arc<PathBuf>,
}

impl std::fmt::Debug for QueuedCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedCommand")
            .field("command", &self.command.name())
            .finish()
    }
}

impl SettingsHandle {
    pub async fn add(&self, entry: SettingsFileEntry, content: Option<String>) -> Result<Vec<SettingsFileEntry>, SettingsError> {
        self.submit(SettingsCommand::Add { entry, content }).await
    }

    pub async fn remove(&self, entry: SettingsFileEntry) -> Result<Vec<SettingsFileEntry>, SettingsError> {
        self.submit(SettingsCommand::Remove { entry }).await
    }

    pub async fn update(&self, entry: SettingsFileEntry) -> Result<Vec<SettingsFileEntry>, SettingsError> {
        self.submit(SettingsCommand::Update { entry }).await
    }

    pub async fn replace_all(&self, entries: Vec<SettingsFileEntry>) -> Result<Vec<SettingsFileEntry>, SettingsError> {
        self.submit(SettingsCommand::ReplaceAll { entries }).await
    }

    pub async fn entries(&self) -> Result<Vec<SettingsFileEntry>, SettingsError> {
        self.submit(SettingsCommand::Snapshot).await
    }

    /// Manifest file loaded by the web application.
    pub fn base_settings_file(&self) -> &Path {
        &self.manifest_file
    }

    pub fn user_settings_dir(&self) -> &Path {
        &self.user_settings_dir
    }

    /// Queue a command and wait for the worker to finish it.
    pub async fn submit(&self, command: SettingsCommand) -> Result<Vec<SettingsFileEntry>, SettingsError> {
        let (reply, reply_rx) = oneshot::channel();
        self.command_tx
            .send(QueuedCommand { command, reply })
            .await
            .map_err(|_| SettingsError::WorkerClosed)?;
        reply_rx.await.map_err(|_| SettingsError::WorkerClosed)?
    }
}

/// Owner of the settings store. Runs until every handle is dropped.
pub struct SettingsWorker {
    store: SettingsStore,
    command_rx: mpsc::Receiver<QueuedCommand>,
}

impl SettingsWorker {
    pub fn new(store: SettingsStore) -> (Self, SettingsHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let handle = SettingsHandle {
            command_tx,
            manifest_file: Arc::new(store.paths().manifest_file.clone()),
            user_settings_dir: Arc::new(store.paths().user_settings_dir.clone()),
        };
        (Self { store, command_rx }, handle)
    }

    /// Spawn the worker on the current tokio runtime.
    pub fn spawn(store: SettingsStore) -> (SettingsHandle, JoinHandle<()>) {
        let (worker, handle) = Self::new(store);
        let task = tokio::spawn(worker.run());
        log::debug!("settings_worker: spawned");
        (handle, task)
    }

    pub async fn run(self) {
        let Self {
            mut store,
            mut command_rx,
        } = self;

        while let Some(QueuedCommand { command, reply }) = command_rx.recv().await {
            let name = command.name();
            let outcome = tokio::task::spawn_blocking(move || {
                let result = command.apply(&mut store);
                (store, result)
            })
            .await;

            let result = match outcome {
                Ok((returned, result)) => {
                    store = returned;
                    result
                },
                Err(join_error) => {
                    log::error!("settings_worker: {name} task failed ({join_error}); stopping");
                    let _ = reply.send(Err(SettingsError::WorkerClosed));
                    return;
                },
            };

            if let Err(e) = &result {
                log::error!("settings_worker: {name} failed: {e}");
            }
            if reply.send(result).is_err() {
                log::debug!("settings_worker: {name} caller went away before the reply");
            }
        }
        log::debug!("settings_worker: all handles dropped; stopping");
    }
}
