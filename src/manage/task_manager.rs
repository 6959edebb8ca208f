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

//! Core of the download engine.
//!
//! The `TaskManager` event loop is the single owner of the catalogue and the
//! scheduler. Sessions and transfer workers talk to it exclusively through
//! messages, so commands for one task apply in the order they arrive and
//! every event leaves here in production order.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::error::DownloadError;
use crate::manage::events::{ServiceEvent, TaskEvent, TaskManagerEvent};
use crate::manage::scheduler::Scheduler;
use crate::manage::store::TaskStore;
use crate::service::client::ClientManagerEntry;

/// Knobs fixed at engine construction.
#[derive(Debug, Clone)]
pub(crate) struct EngineConfig {
    pub(crate) max_concurrent_downloads: usize,
    pub(crate) retry_budget: u32,
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
}

pub(crate) struct TaskManager {
    pub(crate) scheduler: Scheduler,
    rx: TaskManagerRx,
}

impl TaskManager {
    /// Restores the catalogue, spawns the event loop, and returns the handle
    /// everything else uses to reach it.
    pub(crate) fn init(
        store: TaskStore,
        config: EngineConfig,
        client_manager: ClientManagerEntry,
    ) -> Result<TaskManagerTx, DownloadError> {
        let (tx, rx) = unbounded_channel();
        let tx = TaskManagerTx::new(tx);
        let rx = TaskManagerRx::new(rx);

        let mut scheduler = Scheduler::init(store, config, tx.clone(), client_manager)?;
        scheduler.restore()?;

        let task_manager = TaskManager { scheduler, rx };
        tokio::spawn(task_manager.run());
        Ok(tx)
    }

    async fn run(mut self) {
        loop {
            let event = match self.rx.recv().await {
                Some(event) => event,
                None => {
                    info!("TaskManager channel closed");
                    break;
                }
            };
            match event {
                TaskManagerEvent::Service(event) => self.handle_service_event(event),
                TaskManagerEvent::Task(event) => self.handle_task_event(event),
                TaskManagerEvent::RemoveFinished(task_id) => {
                    self.scheduler.finish_remove(&task_id)
                }
                TaskManagerEvent::Shutdown(tx) => {
                    info!("TaskManager shutting down");
                    self.scheduler.shutdown();
                    let _ = tx.send(());
                    break;
                }
            }
        }
    }

    fn handle_service_event(&mut self, event: ServiceEvent) {
        match event {
            ServiceEvent::Add(request, foreground, tx) => {
                let _ = tx.send(self.add(*request, foreground));
            }
            ServiceEvent::Pause(task_id, foreground, tx) => {
                let _ = tx.send(self.pause(&task_id, foreground));
            }
            ServiceEvent::Resume(task_id, foreground, tx) => {
                let _ = tx.send(self.resume(&task_id, foreground));
            }
            ServiceEvent::SetStopReason(task_id, stop_reason, foreground, tx) => {
                let _ = tx.send(self.set_stop_reason(&task_id, stop_reason, foreground));
            }
            ServiceEvent::Remove(task_id, delete_file, foreground, tx) => {
                let _ = tx.send(self.remove(&task_id, delete_file, foreground));
            }
            ServiceEvent::PauseAll(foreground, tx) => {
                self.pause_all(foreground);
                let _ = tx.send(());
            }
            ServiceEvent::ResumeAll(foreground, tx) => {
                self.resume_all(foreground);
                let _ = tx.send(());
            }
            ServiceEvent::RemoveAll(foreground, tx) => {
                self.remove_all(foreground);
                let _ = tx.send(());
            }
            ServiceEvent::Get(task_id, tx) => {
                let _ = tx.send(self.get(&task_id));
            }
            ServiceEvent::List(tx) => {
                let _ = tx.send(self.list());
            }
        }
    }

    fn handle_task_event(&mut self, event: TaskEvent) {
        match event {
            TaskEvent::Progress {
                task_id,
                bytes_downloaded,
                total_bytes,
                speed,
            } => {
                self.scheduler
                    .task_progress(&task_id, bytes_downloaded, total_bytes, speed)
            }
            TaskEvent::Finished { task_id, result } => {
                self.scheduler.task_finished(&task_id, result)
            }
        }
    }
}

/// Sending handle to the task manager.
#[derive(Clone)]
pub(crate) struct TaskManagerTx {
    tx: UnboundedSender<TaskManagerEvent>,
}

impl TaskManagerTx {
    pub(crate) fn new(tx: UnboundedSender<TaskManagerEvent>) -> Self {
        Self { tx }
    }

    /// Queues an event. False means the manager is gone and the event was
    /// dropped.
    pub(crate) fn send_event(&self, event: TaskManagerEvent) -> bool {
        if self.tx.send(event).is_err() {
            debug!("TaskManager is unloaded, event not sent");
            return false;
        }
        true
    }
}

pub(crate) struct TaskManagerRx {
    rx: UnboundedReceiver<TaskManagerEvent>,
}

impl TaskManagerRx {
    fn new(rx: UnboundedReceiver<TaskManagerEvent>) -> Self {
        Self { rx }
    }
}

impl Deref for TaskManagerRx {
    type Target = UnboundedReceiver<TaskManagerEvent>;

    fn deref(&self) -> &Self::Target {
        &self.rx
    }
}

impl DerefMut for TaskManagerRx {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.rx
    }
}
