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

//! Catalogue queries for the task manager.

use crate::error::DownloadError;
use crate::manage::TaskManager;
use crate::task::info::DownloadInfo;

impl TaskManager {
    /// Fetches one task record.
    pub(crate) fn get(&mut self, task_id: &str) -> Result<DownloadInfo, DownloadError> {
        self.scheduler.get_task(task_id)
    }

    /// Fetches all task records in creation order. Reconnecting sessions use
    /// this to rebuild their picture of the catalogue.
    pub(crate) fn list(&mut self) -> Result<Vec<DownloadInfo>, DownloadError> {
        self.scheduler.list_tasks()
    }
}
