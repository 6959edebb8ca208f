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

//! Task resume implementation for the task manager.
//!
//! Resuming lines a held task up again. Paused and failed tasks continue
//! from their staged bytes; a completed task starts over from nothing.

use crate::error::DownloadError;
use crate::manage::TaskManager;

impl TaskManager {
    /// Resumes a task. Resuming a task that is already lined up or running
    /// is acknowledged without a new event.
    ///
    /// # Arguments
    ///
    /// * `task_id` - The id of the task to resume.
    /// * `foreground` - Whether the requesting caller is visible to the user.
    pub(crate) fn resume(&mut self, task_id: &str, foreground: bool) -> Result<(), DownloadError> {
        debug!("TaskManager resume, tid {} fg {}", task_id, foreground);

        self.scheduler.resume_task(task_id, foreground)
    }
}
