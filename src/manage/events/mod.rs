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

//! Event system for the task manager.
//!
//! This module defines the messages handled by the `TaskManager` event loop:
//! commands arriving from sessions, reports coming back from transfer
//! workers, and engine lifecycle signals. Factory methods pair each command
//! with the receiver its caller awaits the outcome on.

use tokio::sync::oneshot::{channel, Sender};

use crate::error::DownloadError;
use crate::task::config::DownloadRequest;
use crate::task::info::DownloadInfo;
use crate::task::reason::Reason;
use crate::utils::Recv;

// Event handling implementations for specific operations
mod add;
mod batch;
mod pause;
mod query;
mod remove;
mod resume;
mod set_stop_reason;

/// The main event type for the task manager.
#[derive(Debug)]
pub(crate) enum TaskManagerEvent {
    /// Commands issued by sessions.
    Service(ServiceEvent),
    /// Reports from transfer workers.
    Task(TaskEvent),
    /// Cleanup for a removed task has finished; its record can be purged.
    RemoveFinished(String),
    /// Stop admitting work, cancel workers, and exit the event loop.
    Shutdown(Sender<()>),
}

/// Commands issued by sessions, each carrying the sender for its reply.
///
/// The `foreground` flag carried by every command is an advisory hint about
/// the caller's visibility; it feeds admission priority.
#[derive(Debug)]
pub(crate) enum ServiceEvent {
    /// Create a task, or merge into the existing one with the same id.
    Add(
        Box<DownloadRequest>,
        bool,
        Sender<Result<DownloadInfo, DownloadError>>,
    ),
    /// Take a task out of rotation, dropping it mid-transfer if needed.
    Pause(String, bool, Sender<Result<(), DownloadError>>),
    /// Put a paused, failed or completed task back in line.
    Resume(String, bool, Sender<Result<(), DownloadError>>),
    /// Hold a task paused under a caller-supplied code, or release it.
    SetStopReason(String, u32, bool, Sender<Result<(), DownloadError>>),
    /// Discard a task, optionally deleting its destination file.
    Remove(String, bool, bool, Sender<Result<(), DownloadError>>),
    /// Pause every runnable task.
    PauseAll(bool, Sender<()>),
    /// Release every paused task.
    ResumeAll(bool, Sender<()>),
    /// Discard every task, keeping downloaded files.
    RemoveAll(bool, Sender<()>),
    /// Fetch one task record.
    Get(String, Sender<Result<DownloadInfo, DownloadError>>),
    /// Fetch all task records in creation order.
    List(Sender<Result<Vec<DownloadInfo>, DownloadError>>),
}

/// Reports from transfer workers back to the task manager.
#[derive(Debug)]
pub(crate) enum TaskEvent {
    /// Byte counters observed by a running worker.
    Progress {
        /// Id of the reporting task.
        task_id: String,
        /// Bytes staged so far.
        bytes_downloaded: u64,
        /// Total content length, when the origin has declared one.
        total_bytes: Option<u64>,
        /// Recent transfer speed in bytes per second.
        speed: u64,
    },
    /// A worker wound down. `None` means it was cancelled rather than
    /// finished.
    Finished {
        /// Id of the finished task.
        task_id: String,
        /// Terminal outcome, absent on cancellation.
        result: Option<Result<(), Reason>>,
    },
}

impl TaskManagerEvent {
    /// Creates an add command and the receiver for the created record.
    pub(crate) fn add(
        request: DownloadRequest,
        foreground: bool,
    ) -> (Self, Recv<Result<DownloadInfo, DownloadError>>) {
        let (tx, rx) = channel();
        (
            Self::Service(ServiceEvent::Add(Box::new(request), foreground, tx)),
            Recv::new(rx),
        )
    }

    pub(crate) fn pause(
        task_id: &str,
        foreground: bool,
    ) -> (Self, Recv<Result<(), DownloadError>>) {
        let (tx, rx) = channel();
        (
            Self::Service(ServiceEvent::Pause(task_id.to_string(), foreground, tx)),
            Recv::new(rx),
        )
    }

    pub(crate) fn resume(
        task_id: &str,
        foreground: bool,
    ) -> (Self, Recv<Result<(), DownloadError>>) {
        let (tx, rx) = channel();
        (
            Self::Service(ServiceEvent::Resume(task_id.to_string(), foreground, tx)),
            Recv::new(rx),
        )
    }

    pub(crate) fn set_stop_reason(
        task_id: &str,
        stop_reason: u32,
        foreground: bool,
    ) -> (Self, Recv<Result<(), DownloadError>>) {
        let (tx, rx) = channel();
        (
            Self::Service(ServiceEvent::SetStopReason(
                task_id.to_string(),
                stop_reason,
                foreground,
                tx,
            )),
            Recv::new(rx),
        )
    }

    pub(crate) fn remove(
        task_id: &str,
        delete_file: bool,
        foreground: bool,
    ) -> (Self, Recv<Result<(), DownloadError>>) {
        let (tx, rx) = channel();
        (
            Self::Service(ServiceEvent::Remove(
                task_id.to_string(),
                delete_file,
                foreground,
                tx,
            )),
            Recv::new(rx),
        )
    }

    pub(crate) fn pause_all(foreground: bool) -> (Self, Recv<()>) {
        let (tx, rx) = channel();
        (
            Self::Service(ServiceEvent::PauseAll(foreground, tx)),
            Recv::new(rx),
        )
    }

    pub(crate) fn resume_all(foreground: bool) -> (Self, Recv<()>) {
        let (tx, rx) = channel();
        (
            Self::Service(ServiceEvent::ResumeAll(foreground, tx)),
            Recv::new(rx),
        )
    }

    pub(crate) fn remove_all(foreground: bool) -> (Self, Recv<()>) {
        let (tx, rx) = channel();
        (
            Self::Service(ServiceEvent::RemoveAll(foreground, tx)),
            Recv::new(rx),
        )
    }

    pub(crate) fn get(task_id: &str) -> (Self, Recv<Result<DownloadInfo, DownloadError>>) {
        let (tx, rx) = channel();
        (
            Self::Service(ServiceEvent::Get(task_id.to_string(), tx)),
            Recv::new(rx),
        )
    }

    pub(crate) fn list() -> (Self, Recv<Result<Vec<DownloadInfo>, DownloadError>>) {
        let (tx, rx) = channel();
        (Self::Service(ServiceEvent::List(tx)), Recv::new(rx))
    }

    pub(crate) fn shutdown() -> (Self, Recv<()>) {
        let (tx, rx) = channel();
        (Self::Shutdown(tx), Recv::new(rx))
    }
}
