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

//! Task removal implementation for the task manager.
//!
//! Removal is acknowledged as soon as the task is marked `Removing`; file
//! cleanup runs off the event loop and the record is purged once it ends.

use crate::error::DownloadError;
use crate::manage::TaskManager;

impl TaskManager {
    /// Starts removing a task. Removing a task already on its way out is
    /// acknowledged without a new event.
    ///
    /// # Arguments
    ///
    /// * `task_id` - The id of the task to remove.
    /// * `delete_file` - Whether to delete the destination file as well.
    /// * `foreground` - Whether the requesting caller is visible to the user.
    pub(crate) fn remove(
        &mut self,
        task_id: &str,
        delete_file: bool,
        foreground: bool,
    ) -> Result<(), DownloadError> {
        debug!(
            "TaskManager remove, tid {} delete_file {} fg {}",
            task_id, delete_file, foreground
        );

        self.scheduler.remove_task(task_id, delete_file)
    }
}
