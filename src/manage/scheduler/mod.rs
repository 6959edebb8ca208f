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

//! Transfer scheduling.
//!
//! The scheduler owns the task catalogue and the running queue. It admits
//! queued tasks into the queue up to the concurrency bound, foreground tasks
//! first and oldest runnable first within a priority class, and applies every
//! command by persisting the new state before publishing the matching event.

pub(crate) mod queue;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;

use self::queue::RunningQueue;
use crate::error::DownloadError;
use crate::manage::events::TaskManagerEvent;
use crate::manage::notifier::Notifier;
use crate::manage::store::TaskStore;
use crate::manage::task_manager::{EngineConfig, TaskManagerTx};
use crate::service::client::ClientManagerEntry;
use crate::task::config::DownloadRequest;
use crate::task::files;
use crate::task::info::{percent_of, DownloadInfo, State};
use crate::task::reason::Reason;
use crate::task::request_task::RequestTask;
use crate::utils::get_current_timestamp;

pub(crate) struct Scheduler {
    store: TaskStore,
    queue: RunningQueue,
    /// Admission order within a priority class: the moment each queued task
    /// last became runnable.
    runnable_since: HashMap<String, u64>,
    next_seq: u64,
    config: EngineConfig,
    client: Client,
    tx: TaskManagerTx,
    client_manager: ClientManagerEntry,
}

impl Scheduler {
    pub(crate) fn init(
        store: TaskStore,
        config: EngineConfig,
        tx: TaskManagerTx,
        client_manager: ClientManagerEntry,
    ) -> Result<Scheduler, DownloadError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| DownloadError::IoFailure(e.to_string()))?;
        Ok(Scheduler {
            store,
            queue: RunningQueue::new(tx.clone()),
            runnable_since: HashMap::new(),
            next_seq: 0,
            config,
            client,
            tx,
            client_manager,
        })
    }

    /// Brings the catalogue back to a runnable shape after a restart:
    /// interrupted transfers line up again and interrupted removals are
    /// driven to completion.
    pub(crate) fn restore(&mut self) -> Result<(), DownloadError> {
        self.store.recover()?;
        for info in self.store.list()? {
            match info.state {
                State::Queued => self.mark_runnable(info.id()),
                State::Removing => {
                    // The delete-file wish did not survive the crash; keep
                    // the destination and only drop staging leftovers.
                    self.spawn_cleanup(
                        info.id().to_string(),
                        info.request.destination.clone(),
                        false,
                    );
                }
                _ => {}
            }
        }
        self.reschedule();
        Ok(())
    }

    /// Creates a task, or merges the request into the existing task with the
    /// same id. Merging rewrites the display fields and gives finished tasks
    /// another run; staged progress is kept.
    pub(crate) fn add_task(
        &mut self,
        request: DownloadRequest,
        foreground: bool,
    ) -> Result<DownloadInfo, DownloadError> {
        let existing = self.store.get(&request.id)?;
        let info = match existing {
            None => {
                let info = DownloadInfo::new(request, foreground, get_current_timestamp());
                self.store.insert(&info)?;
                self.mark_runnable(info.id());
                info!("task {} added", info.id());
                info
            }
            Some(existing) if existing.state == State::Removing => {
                return Err(DownloadError::Conflict {
                    id: existing.request.id,
                    state: State::Removing,
                });
            }
            Some(existing) => {
                self.store
                    .update_display(&request.id, &request.display_name, foreground)?;
                match existing.state {
                    State::Failed => {
                        self.store.update_queued(&request.id)?;
                        self.mark_runnable(&request.id);
                    }
                    State::Completed => {
                        // The finished file was already surfaced; a fresh run
                        // starts from nothing.
                        self.store.update_queued(&request.id)?;
                        self.store.reset_progress(&request.id)?;
                        self.mark_runnable(&request.id);
                    }
                    _ => {}
                }
                info!("task {} merged", request.id);
                self.get_existing(&request.id)?
            }
        };
        Notifier::changed(&self.client_manager, info.clone());
        self.reschedule();
        Ok(info)
    }

    pub(crate) fn pause_task(&mut self, task_id: &str) -> Result<(), DownloadError> {
        self.pause_inner(task_id)?;
        self.reschedule();
        Ok(())
    }

    fn pause_inner(&mut self, task_id: &str) -> Result<(), DownloadError> {
        let info = self.get_existing(task_id)?;
        match info.state {
            State::Paused => Ok(()),
            State::Queued => {
                self.runnable_since.remove(task_id);
                self.store.update_state(task_id, State::Paused, Reason::Default)?;
                self.notify_changed(task_id);
                Ok(())
            }
            State::Downloading => {
                self.store.update_state(task_id, State::Paused, Reason::Default)?;
                self.queue.cancel_task(task_id);
                info!("task {} paused", task_id);
                self.notify_changed(task_id);
                Ok(())
            }
            state => Err(DownloadError::Conflict {
                id: task_id.to_string(),
                state,
            }),
        }
    }

    pub(crate) fn resume_task(
        &mut self,
        task_id: &str,
        foreground: bool,
    ) -> Result<(), DownloadError> {
        self.resume_inner(task_id, foreground)?;
        self.reschedule();
        Ok(())
    }

    fn resume_inner(&mut self, task_id: &str, foreground: bool) -> Result<(), DownloadError> {
        let info = self.get_existing(task_id)?;
        match info.state {
            State::Queued | State::Downloading => Ok(()),
            State::Paused | State::Failed | State::Completed => {
                if info.state == State::Completed {
                    // Another full run; the previous file already left
                    // staging.
                    self.store.reset_progress(task_id)?;
                }
                self.store.update_queued(task_id)?;
                self.store.update_foreground(task_id, foreground)?;
                self.mark_runnable(task_id);
                info!("task {} resumed", task_id);
                self.notify_changed(task_id);
                Ok(())
            }
            state => Err(DownloadError::Conflict {
                id: task_id.to_string(),
                state,
            }),
        }
    }

    /// A non-zero code holds the task paused under that code; zero releases
    /// it exactly like a resume.
    pub(crate) fn set_stop_reason(
        &mut self,
        task_id: &str,
        stop_reason: u32,
        foreground: bool,
    ) -> Result<(), DownloadError> {
        if stop_reason == 0 {
            return self.resume_task(task_id, foreground);
        }
        let info = self.get_existing(task_id)?;
        match info.state {
            State::Paused if info.stop_reason == stop_reason => Ok(()),
            State::Queued | State::Downloading | State::Paused => {
                self.runnable_since.remove(task_id);
                self.store.update_paused(task_id, stop_reason)?;
                let evicted = self.queue.cancel_task(task_id);
                info!("task {} stopped with reason {}", task_id, stop_reason);
                self.notify_changed(task_id);
                if evicted {
                    self.reschedule();
                }
                Ok(())
            }
            state => Err(DownloadError::Conflict {
                id: task_id.to_string(),
                state,
            }),
        }
    }

    pub(crate) fn remove_task(
        &mut self,
        task_id: &str,
        delete_file: bool,
    ) -> Result<(), DownloadError> {
        self.remove_inner(task_id, delete_file)?;
        self.reschedule();
        Ok(())
    }

    fn remove_inner(&mut self, task_id: &str, delete_file: bool) -> Result<(), DownloadError> {
        let info = self.get_existing(task_id)?;
        if info.state == State::Removing {
            return Ok(());
        }
        self.runnable_since.remove(task_id);
        self.store
            .update_state(task_id, State::Removing, info.failure_reason)?;
        self.queue.cancel_task(task_id);
        info!("task {} removing", task_id);
        self.notify_changed(task_id);
        self.spawn_cleanup(
            task_id.to_string(),
            info.request.destination.clone(),
            delete_file,
        );
        Ok(())
    }

    /// Purges the record once its cleanup has finished and publishes the
    /// final snapshot.
    pub(crate) fn finish_remove(&mut self, task_id: &str) {
        match self.store.remove(task_id) {
            Ok(Some(mut info)) => {
                info.state = State::Removed;
                info.mtime = get_current_timestamp();
                info!("task {} removed", task_id);
                Notifier::removed(&self.client_manager, info);
            }
            Ok(None) => {}
            Err(e) => error!("task {} purge failed: {}", task_id, e),
        }
    }

    /// Pauses every runnable task. Tasks in other states keep their state.
    pub(crate) fn pause_all(&mut self) {
        for info in self.list_snapshot() {
            if matches!(info.state, State::Queued | State::Downloading) {
                if let Err(e) = self.pause_inner(info.id()) {
                    error!("task {} skipped by pause all: {}", info.id(), e);
                }
            }
        }
        self.reschedule();
    }

    /// Releases every paused task. Finished and failed tasks are not
    /// restarted by the batch form.
    pub(crate) fn resume_all(&mut self, foreground: bool) {
        for info in self.list_snapshot() {
            if info.state == State::Paused {
                if let Err(e) = self.resume_inner(info.id(), foreground) {
                    error!("task {} skipped by resume all: {}", info.id(), e);
                }
            }
        }
        self.reschedule();
    }

    /// Discards every task. Downloaded files stay where they are.
    pub(crate) fn remove_all(&mut self) {
        for info in self.list_snapshot() {
            if info.state != State::Removing {
                if let Err(e) = self.remove_inner(info.id(), false) {
                    error!("task {} skipped by remove all: {}", info.id(), e);
                }
            }
        }
        self.reschedule();
    }

    pub(crate) fn get_task(&self, task_id: &str) -> Result<DownloadInfo, DownloadError> {
        self.get_existing(task_id)
    }

    pub(crate) fn list_tasks(&self) -> Result<Vec<DownloadInfo>, DownloadError> {
        self.store.list()
    }

    /// Applies a progress report. Reports from evicted workers arrive late
    /// and are dropped so nothing trails the pause event.
    pub(crate) fn task_progress(
        &mut self,
        task_id: &str,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
        speed: u64,
    ) {
        if !self.queue.contains(task_id) {
            debug!("task {} stale progress dropped", task_id);
            return;
        }
        if let Err(e) = self.store.update_progress(task_id, bytes_downloaded, total_bytes) {
            error!("task {} progress write failed: {}", task_id, e);
        }
        Notifier::progress(
            &self.client_manager,
            task_id,
            percent_of(bytes_downloaded, total_bytes),
            speed,
        );
    }

    /// Applies a worker's terminal report and refills the freed slot.
    pub(crate) fn task_finished(&mut self, task_id: &str, result: Option<Result<(), Reason>>) {
        if !self.queue.contains(task_id) {
            // Evicted earlier; the guard's report is already spent.
            return;
        }
        self.queue.task_finish(task_id);
        let (state, reason) = match result {
            Some(Ok(())) => {
                info!("task {} completed", task_id);
                (State::Completed, Reason::Default)
            }
            Some(Err(reason)) => {
                info!("task {} failed: {}", task_id, reason.to_str());
                (State::Failed, reason)
            }
            None => {
                // A worker only vanishes without an outcome if it panicked.
                error!("task {} worker vanished", task_id);
                (State::Failed, Reason::IoFailure)
            }
        };
        if let Err(e) = self.store.update_state(task_id, state, reason) {
            error!("task {} state write failed: {}", task_id, e);
        }
        self.notify_changed(task_id);
        self.reschedule();
    }

    /// Cancels all workers and lines their tasks up again for the next run.
    pub(crate) fn shutdown(&mut self) {
        let cancelled = self.queue.cancel_all();
        if !cancelled.is_empty() {
            info!("shutdown cancelled {} running tasks", cancelled.len());
        }
        if let Err(e) = self.store.requeue_running() {
            error!("shutdown requeue failed: {}", e);
        }
    }

    /// Fills free slots with runnable tasks, foreground first, then oldest
    /// runnable first.
    fn reschedule(&mut self) {
        while self.queue.len() < self.config.max_concurrent_downloads {
            let Some(info) = self.next_runnable() else {
                break;
            };
            if let Err(e) = self.admit(&info) {
                error!("task {} admission failed: {}", info.id(), e);
                break;
            }
        }
    }

    fn next_runnable(&self) -> Option<DownloadInfo> {
        self.list_snapshot()
            .into_iter()
            .filter(|info| info.state == State::Queued && !self.queue.contains(info.id()))
            .min_by_key(|info| {
                let seq = self
                    .runnable_since
                    .get(info.id())
                    .copied()
                    .unwrap_or(u64::MAX);
                (!info.foreground, seq)
            })
    }

    fn admit(&mut self, info: &DownloadInfo) -> Result<(), DownloadError> {
        // State first, worker second: an admission that was published is
        // never lost to a crash.
        self.store
            .update_state(info.id(), State::Downloading, Reason::Default)?;
        self.runnable_since.remove(info.id());
        self.notify_changed(info.id());
        let task = Arc::new(RequestTask::new(
            info.request.clone(),
            self.client.clone(),
            self.config.retry_budget,
            self.config.read_timeout,
            info.bytes_downloaded,
            info.total_bytes,
        ));
        info!("task {} admitted, {} running", info.id(), self.queue.len() + 1);
        self.queue.start_task(task);
        Ok(())
    }

    fn mark_runnable(&mut self, task_id: &str) {
        self.runnable_since.insert(task_id.to_string(), self.next_seq);
        self.next_seq += 1;
    }

    fn get_existing(&self, task_id: &str) -> Result<DownloadInfo, DownloadError> {
        self.store
            .get(task_id)?
            .ok_or_else(|| DownloadError::NotFound(task_id.to_string()))
    }

    fn list_snapshot(&self) -> Vec<DownloadInfo> {
        match self.store.list() {
            Ok(infos) => infos,
            Err(e) => {
                error!("catalogue scan failed: {}", e);
                Vec::new()
            }
        }
    }

    fn notify_changed(&self, task_id: &str) {
        match self.store.get(task_id) {
            Ok(Some(info)) => Notifier::changed(&self.client_manager, info),
            Ok(None) => {}
            Err(e) => error!("task {} snapshot failed: {}", task_id, e),
        }
    }

    fn spawn_cleanup(&self, task_id: String, destination: PathBuf, delete_file: bool) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if let Err(e) = files::remove_files(&destination, delete_file).await {
                // The record is purged regardless; an unremovable file is
                // logged, not kept as a zombie task.
                error!("task {} cleanup failed: {}", task_id, e);
            }
            tx.send_event(TaskManagerEvent::RemoveFinished(task_id));
        });
    }
}
