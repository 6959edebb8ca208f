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

//! Events published to subscribers.

use crate::task::info::DownloadInfo;

/// A notification delivered to event subscribers.
///
/// Events for one task id are delivered in the order they were produced.
/// Delivery is at least once for subscribers that keep up; stale progress
/// may be coalesced away for subscribers that fall behind.
#[derive(Debug, Clone)]
pub enum Event {
    /// Periodic transfer progress for a running task.
    Progress {
        /// Id of the task making progress.
        id: String,
        /// Completed fraction in `0.0..=1.0`, or `None` while the total
        /// content length is unknown.
        percent: Option<f64>,
        /// Recent transfer speed in bytes per second.
        speed: u64,
    },
    /// A task changed state or had its record rewritten.
    Changed(DownloadInfo),
    /// A task record has been purged; this snapshot is its last.
    Removed(DownloadInfo),
}

impl Event {
    /// Id of the task this event concerns.
    pub fn task_id(&self) -> &str {
        match self {
            Event::Progress { id, .. } => id,
            Event::Changed(info) | Event::Removed(info) => info.id(),
        }
    }

    pub(crate) fn is_progress(&self) -> bool {
        matches!(self, Event::Progress { .. })
    }
}
