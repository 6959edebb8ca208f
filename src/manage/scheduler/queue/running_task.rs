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

//! Running task execution and lifecycle reporting.

use std::ops::Deref;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::manage::events::{TaskEvent, TaskManagerEvent};
use crate::manage::task_manager::TaskManagerTx;
use crate::task::download::download;
use crate::task::request_task::RequestTask;

/// A task in the hands of a transfer worker.
///
/// Wraps the shared `RequestTask` and reports the worker's outcome back to
/// the task manager when it winds down. Reporting happens in `drop`, so the
/// manager hears about every worker exit, including cancellation by
/// `JoinHandle::abort`.
pub(crate) struct RunningTask {
    task: Arc<RequestTask>,
    tx: TaskManagerTx,
}

impl RunningTask {
    pub(crate) fn new(task: Arc<RequestTask>, tx: TaskManagerTx) -> Self {
        Self { task, tx }
    }

    /// Drives the transfer to an outcome. Consumes the guard; dropping it
    /// afterwards reports that outcome.
    pub(crate) async fn run(self, abort_flag: Arc<AtomicBool>) {
        download(self.task.clone(), abort_flag, self.tx.clone()).await;
    }
}

impl Deref for RunningTask {
    type Target = Arc<RequestTask>;

    fn deref(&self) -> &Self::Target {
        &self.task
    }
}

impl Drop for RunningTask {
    fn drop(&mut self) {
        let result = self.task.running_result.lock().unwrap().take();
        self.tx.send_event(TaskManagerEvent::Task(TaskEvent::Finished {
            task_id: self.task_id().to_string(),
            result,
        }));
    }
}
