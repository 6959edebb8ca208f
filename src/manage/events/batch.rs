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

//! Batch commands over the whole catalogue.
//!
//! Batch forms apply their single-task operation to every task it is legal
//! for and silently skip the rest, so they always succeed.

use crate::manage::TaskManager;

impl TaskManager {
    /// Pauses every queued or running task.
    pub(crate) fn pause_all(&mut self, foreground: bool) {
        debug!("TaskManager pause_all, fg {}", foreground);

        self.scheduler.pause_all();
    }

    /// Releases every paused task. Completed and failed tasks stay as they
    /// are; only the single-task resume restarts those.
    pub(crate) fn resume_all(&mut self, foreground: bool) {
        debug!("TaskManager resume_all, fg {}", foreground);

        self.scheduler.resume_all(foreground);
    }

    /// Discards every task while keeping already downloaded files.
    pub(crate) fn remove_all(&mut self, foreground: bool) {
        debug!("TaskManager remove_all, fg {}", foreground);

        self.scheduler.remove_all();
    }
}
