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

//! Stop reason handling for the task manager.
//!
//! A stop reason is a caller-defined code that holds a task paused until it
//! is cleared. Setting code zero clears it, which is the same operation as a
//! resume.

use crate::error::DownloadError;
use crate::manage::TaskManager;

impl TaskManager {
    /// Holds a task paused under `stop_reason`, or releases it when the code
    /// is zero.
    ///
    /// # Arguments
    ///
    /// * `task_id` - The id of the task to hold or release.
    /// * `stop_reason` - The caller-defined code; zero releases.
    /// * `foreground` - Whether the requesting caller is visible to the user.
    pub(crate) fn set_stop_reason(
        &mut self,
        task_id: &str,
        stop_reason: u32,
        foreground: bool,
    ) -> Result<(), DownloadError> {
        debug!(
            "TaskManager set_stop_reason, tid {} reason {}",
            task_id, stop_reason
        );

        self.scheduler.set_stop_reason(task_id, stop_reason, foreground)
    }
}
