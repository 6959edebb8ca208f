// Copyright (C) 2023 Huawei Device Co., Ltd.
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Public face of the download engine.
//!
//! A [`DownloadEngine`] owns the task manager and the subscriber registry.
//! Callers open [`DownloadClient`] sessions against it; every session command
//! is a message to the task manager answered on a oneshot channel, so a
//! session stays cheap to clone around and safe to drop.

pub(crate) mod client;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;

use self::client::manager::ClientManager;
use self::client::{ClientManagerEntry, EventStream, SubscribeScope};
use crate::error::DownloadError;
use crate::manage::events::TaskManagerEvent;
use crate::manage::store::TaskStore;
use crate::manage::task_manager::{EngineConfig, TaskManagerTx};
use crate::manage::TaskManager;
use crate::task::config::DownloadRequest;
use crate::task::info::DownloadInfo;
use crate::utils::Recv;

/// Whether a session can still reach its engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// The engine is running and accepts commands.
    Connected,
    /// The engine has shut down; commands fail with
    /// [`DownloadError::Disconnected`].
    Suspended,
}

/// Configures and starts a [`DownloadEngine`].
///
/// `build` spawns the engine's actors onto the current Tokio runtime.
pub struct EngineBuilder {
    store_path: Option<PathBuf>,
    max_concurrent_downloads: usize,
    retry_budget: u32,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl EngineBuilder {
    fn new() -> Self {
        Self {
            store_path: None,
            max_concurrent_downloads: 3,
            retry_budget: 5,
            connect_timeout: Duration::from_secs(8),
            read_timeout: Duration::from_secs(8),
        }
    }

    /// Backs the task catalogue with a database file, creating it if absent.
    /// Without this the catalogue lives in memory and dies with the engine.
    pub fn store_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.store_path = Some(path.into());
        self
    }

    /// Caps the number of tasks transferring at once. Default 3.
    pub fn max_concurrent_downloads(&mut self, max: usize) -> &mut Self {
        self.max_concurrent_downloads = max;
        self
    }

    /// Caps the transfer attempts per run of a task, first try included.
    /// Default 5.
    pub fn retry_budget(&mut self, budget: u32) -> &mut Self {
        self.retry_budget = budget;
        self
    }

    /// Time limit for establishing a connection. Default 8 s.
    pub fn connect_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.connect_timeout = timeout;
        self
    }

    /// Time limit for each read from the response body. Default 8 s.
    pub fn read_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.read_timeout = timeout;
        self
    }

    /// Opens the catalogue, restores unfinished work, and starts the engine.
    pub fn build(&mut self) -> Result<DownloadEngine, DownloadError> {
        if self.max_concurrent_downloads == 0 {
            return Err(DownloadError::InvalidRequest(
                "max_concurrent_downloads must be at least 1".to_string(),
            ));
        }
        if self.retry_budget == 0 {
            return Err(DownloadError::InvalidRequest(
                "retry_budget must allow at least one attempt".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() || self.read_timeout.is_zero() {
            return Err(DownloadError::InvalidRequest(
                "timeouts must be non-zero".to_string(),
            ));
        }

        let store = match self.store_path.take() {
            Some(path) => TaskStore::open(&path)?,
            None => TaskStore::open_in_memory()?,
        };
        let config = EngineConfig {
            max_concurrent_downloads: self.max_concurrent_downloads,
            retry_budget: self.retry_budget,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
        };
        let client_manager = ClientManager::init();
        let task_manager = TaskManager::init(store, config, client_manager.clone())?;
        let (connection, _) = watch::channel(ConnectionState::Connected);
        info!("engine started");
        Ok(DownloadEngine {
            task_manager,
            client_manager,
            connection,
            next_session: AtomicU64::new(1),
            suspended: AtomicBool::new(false),
        })
    }
}

/// A running download engine.
///
/// Dropping the engine shuts it down without waiting for workers to stop;
/// call [`shutdown`](DownloadEngine::shutdown) for an orderly stop.
pub struct DownloadEngine {
    task_manager: TaskManagerTx,
    client_manager: ClientManagerEntry,
    connection: watch::Sender<ConnectionState>,
    next_session: AtomicU64,
    suspended: AtomicBool,
}

impl DownloadEngine {
    /// Starts configuring a new engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Opens a session against this engine.
    pub fn connect(&self) -> DownloadClient {
        let session_id = self.next_session.fetch_add(1, Ordering::Relaxed);
        debug!("session {} connected", session_id);
        DownloadClient {
            session_id,
            task_manager: self.task_manager.clone(),
            client_manager: self.client_manager.clone(),
            connection: self.connection.subscribe(),
        }
    }

    /// Stops the engine: suspends every session, evicts running transfers
    /// back to queued, ends every subscription, and waits for the task
    /// manager to acknowledge. Later calls are no-ops.
    pub async fn shutdown(&self) {
        if self.suspended.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.connection.send(ConnectionState::Suspended);
        let (event, rx) = TaskManagerEvent::shutdown();
        if self.task_manager.send_event(event) {
            rx.get().await;
        }
        self.client_manager.terminate();
        info!("engine stopped");
    }
}

impl Drop for DownloadEngine {
    fn drop(&mut self) {
        if self.suspended.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.connection.send(ConnectionState::Suspended);
        let (event, _rx) = TaskManagerEvent::shutdown();
        self.task_manager.send_event(event);
        self.client_manager.terminate();
    }
}

/// One caller's session on a [`DownloadEngine`].
///
/// Every command takes a `foreground` hint describing the caller's current
/// visibility; foreground tasks win admission over background ones.
/// Dropping the session closes its subscriptions.
pub struct DownloadClient {
    session_id: u64,
    task_manager: TaskManagerTx,
    client_manager: ClientManagerEntry,
    connection: watch::Receiver<ConnectionState>,
}

impl DownloadClient {
    /// Creates a download task, or merges the request into the existing task
    /// carrying the same id. Answers the resulting record.
    pub async fn add_download(
        &self,
        request: DownloadRequest,
        foreground: bool,
    ) -> Result<DownloadInfo, DownloadError> {
        let (event, rx) = TaskManagerEvent::add(request, foreground);
        self.execute(event, rx).await?
    }

    /// Takes a task out of rotation, dropping it mid-transfer if running.
    /// Pausing an already paused task is a no-op.
    pub async fn pause_download(
        &self,
        task_id: &str,
        foreground: bool,
    ) -> Result<(), DownloadError> {
        let (event, rx) = TaskManagerEvent::pause(task_id, foreground);
        self.execute(event, rx).await?
    }

    /// Puts a paused, failed or completed task back in line. Staged bytes are
    /// kept except for completed tasks, which start over.
    pub async fn resume_download(
        &self,
        task_id: &str,
        foreground: bool,
    ) -> Result<(), DownloadError> {
        let (event, rx) = TaskManagerEvent::resume(task_id, foreground);
        self.execute(event, rx).await?
    }

    /// Holds a task paused under a caller-supplied non-zero code; code zero
    /// releases it exactly like [`resume_download`](Self::resume_download).
    pub async fn set_stop_reason(
        &self,
        task_id: &str,
        stop_reason: u32,
        foreground: bool,
    ) -> Result<(), DownloadError> {
        let (event, rx) = TaskManagerEvent::set_stop_reason(task_id, stop_reason, foreground);
        self.execute(event, rx).await?
    }

    /// Discards a task. The staging file always goes; the destination file
    /// goes when `delete_file` is set. Once cleanup finishes the record is
    /// purged and a removed event published.
    pub async fn remove_download(
        &self,
        task_id: &str,
        delete_file: bool,
        foreground: bool,
    ) -> Result<(), DownloadError> {
        let (event, rx) = TaskManagerEvent::remove(task_id, delete_file, foreground);
        self.execute(event, rx).await?
    }

    /// Pauses every queued or downloading task. Tasks in other states are
    /// left untouched.
    pub async fn pause_all(&self, foreground: bool) -> Result<(), DownloadError> {
        let (event, rx) = TaskManagerEvent::pause_all(foreground);
        self.execute(event, rx).await
    }

    /// Releases every paused task back to queued.
    pub async fn resume_all(&self, foreground: bool) -> Result<(), DownloadError> {
        let (event, rx) = TaskManagerEvent::resume_all(foreground);
        self.execute(event, rx).await
    }

    /// Discards every task, keeping downloaded files on disk.
    pub async fn remove_all(&self, foreground: bool) -> Result<(), DownloadError> {
        let (event, rx) = TaskManagerEvent::remove_all(foreground);
        self.execute(event, rx).await
    }

    /// Fetches one task record.
    pub async fn get(&self, task_id: &str) -> Result<DownloadInfo, DownloadError> {
        let (event, rx) = TaskManagerEvent::get(task_id);
        self.execute(event, rx).await?
    }

    /// Fetches every task record in creation order.
    pub async fn list(&self) -> Result<Vec<DownloadInfo>, DownloadError> {
        let (event, rx) = TaskManagerEvent::list();
        self.execute(event, rx).await?
    }

    /// Opens a stream of events covering every task.
    pub fn subscribe(&self) -> EventStream {
        client::subscribe_stream(&self.client_manager, self.session_id, SubscribeScope::All)
    }

    /// Opens a stream of events for one task id. A session keeps at most one
    /// such stream; opening another closes the previous one.
    pub fn subscribe_task(&self, task_id: &str) -> EventStream {
        client::subscribe_stream(
            &self.client_manager,
            self.session_id,
            SubscribeScope::Task(task_id.to_string()),
        )
    }

    /// Watches the engine's availability. Flips to
    /// [`ConnectionState::Suspended`] when the engine shuts down.
    pub fn connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.clone()
    }

    async fn execute<T>(
        &self,
        event: TaskManagerEvent,
        rx: Recv<T>,
    ) -> Result<T, DownloadError> {
        if *self.connection.borrow() == ConnectionState::Suspended {
            return Err(DownloadError::Disconnected);
        }
        if !self.task_manager.send_event(event) {
            return Err(DownloadError::Disconnected);
        }
        rx.get().await.ok_or(DownloadError::Disconnected)
    }
}

impl Drop for DownloadClient {
    fn drop(&mut self) {
        self.client_manager.session_closed(self.session_id);
    }
}
