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

//! Task pause implementation for the task manager.
//!
//! Pausing takes a task out of rotation without forgetting its staged bytes.
//! A running task is dropped mid-transfer; its slot frees immediately.

use crate::error::DownloadError;
use crate::manage::TaskManager;

impl TaskManager {
    /// Pauses a task. Pausing an already paused task is acknowledged without
    /// a new event.
    ///
    /// # Arguments
    ///
    /// * `task_id` - The id of the task to pause.
    /// * `foreground` - Whether the requesting caller is visible to the user.
    pub(crate) fn pause(&mut self, task_id: &str, foreground: bool) -> Result<(), DownloadError> {
        debug!("TaskManager pause, tid {} fg {}", task_id, foreground);

        self.scheduler.pause_task(task_id)
    }
}
