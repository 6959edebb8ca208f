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

//! Task creation within the task manager.
//!
//! Adding is idempotent per task id: a request whose id is already in the
//! catalogue merges into the existing task instead of creating a second one.

use crate::error::DownloadError;
use crate::manage::TaskManager;
use crate::task::config::DownloadRequest;
use crate::task::info::DownloadInfo;

impl TaskManager {
    /// Creates or merges a task and returns its fresh record.
    ///
    /// # Arguments
    ///
    /// * `request` - The validated download request.
    /// * `foreground` - Whether the requesting caller is visible to the user.
    pub(crate) fn add(
        &mut self,
        request: DownloadRequest,
        foreground: bool,
    ) -> Result<DownloadInfo, DownloadError> {
        debug!("TaskManager add, tid {}", request.id);

        self.scheduler.add_task(request, foreground)
    }
}
