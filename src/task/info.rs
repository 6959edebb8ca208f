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

//! Task state and the externally visible task record.

use std::fmt;

use crate::task::config::DownloadRequest;
use crate::task::reason::Reason;

/// Lifecycle state of a download task.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum State {
    /// Runnable and waiting for a transfer slot.
    Queued = 0,
    /// A transfer worker currently owns this task.
    Downloading = 1,
    /// Held by the user or by a stop reason; not runnable.
    Paused = 2,
    /// The destination file has been fully written and verified.
    Completed = 3,
    /// The retry budget ran out, or the record was quarantined.
    Failed = 4,
    /// Removal accepted; cleanup is still in flight.
    Removing = 5,
    /// The record has been purged from the catalogue.
    Removed = 6,
}

impl State {
    /// Whether `next` is a legal successor of `self`.
    pub(crate) fn allows(self, next: State) -> bool {
        match self {
            State::Queued => matches!(
                next,
                State::Downloading | State::Paused | State::Removing
            ),
            State::Downloading => matches!(
                next,
                State::Paused | State::Completed | State::Failed | State::Removing
            ),
            State::Paused | State::Completed | State::Failed => {
                matches!(next, State::Queued | State::Removing)
            }
            State::Removing => matches!(next, State::Removed),
            State::Removed => false,
        }
    }
}

impl TryFrom<u8> for State {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(State::Queued),
            1 => Ok(State::Downloading),
            2 => Ok(State::Paused),
            3 => Ok(State::Completed),
            4 => Ok(State::Failed),
            5 => Ok(State::Removing),
            6 => Ok(State::Removed),
            other => Err(other),
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Queued => "queued",
            State::Downloading => "downloading",
            State::Paused => "paused",
            State::Completed => "completed",
            State::Failed => "failed",
            State::Removing => "removing",
            State::Removed => "removed",
        };
        f.write_str(name)
    }
}

/// A snapshot of one download task as stored in the catalogue.
#[derive(Debug, Clone)]
pub struct DownloadInfo {
    /// The request this task was created from.
    pub request: DownloadRequest,
    /// Current lifecycle state.
    pub state: State,
    /// Non-zero while the task is held paused by a caller-supplied code.
    pub stop_reason: u32,
    /// Why the task last entered `Failed`.
    pub failure_reason: Reason,
    /// Bytes written to the staging file so far.
    pub bytes_downloaded: u64,
    /// Total content length, once the origin has revealed it.
    pub total_bytes: Option<u64>,
    /// Whether the most recent command on this task came from the foreground.
    pub foreground: bool,
    /// Creation time, milliseconds since the unix epoch.
    pub ctime: u64,
    /// Last modification time, milliseconds since the unix epoch.
    pub mtime: u64,
}

impl DownloadInfo {
    pub(crate) fn new(request: DownloadRequest, foreground: bool, now: u64) -> Self {
        Self {
            request,
            state: State::Queued,
            stop_reason: 0,
            failure_reason: Reason::Default,
            bytes_downloaded: 0,
            total_bytes: None,
            foreground,
            ctime: now,
            mtime: now,
        }
    }

    /// The task id.
    pub fn id(&self) -> &str {
        &self.request.id
    }

    /// Completed fraction in `0.0..=1.0`, or `None` while the total is
    /// unknown.
    pub fn percent(&self) -> Option<f64> {
        percent_of(self.bytes_downloaded, self.total_bytes)
    }
}

/// Completed fraction of `bytes` against an optional total.
pub(crate) fn percent_of(bytes: u64, total: Option<u64>) -> Option<f64> {
    match total {
        Some(0) => Some(1.0),
        Some(total) => Some(bytes as f64 / total as f64),
        None => None,
    }
}
