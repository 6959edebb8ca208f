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

//! The set of tasks currently owned by transfer workers.

pub(crate) mod running_task;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

use self::running_task::RunningTask;
use crate::manage::task_manager::TaskManagerTx;
use crate::task::request_task::RequestTask;

/// Tasks with a live worker, keyed by task id.
///
/// Membership here is what "downloading" means to the scheduler: eviction
/// removes the entry synchronously, freeing the slot before the worker has
/// actually unwound.
pub(crate) struct RunningQueue {
    running: HashMap<String, Arc<RequestTask>>,
    abort_handles: HashMap<String, AbortHandle>,
    tx: TaskManagerTx,
}

impl RunningQueue {
    pub(crate) fn new(tx: TaskManagerTx) -> Self {
        Self {
            running: HashMap::new(),
            abort_handles: HashMap::new(),
            tx,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.running.len()
    }

    pub(crate) fn contains(&self, task_id: &str) -> bool {
        self.running.contains_key(task_id)
    }

    /// Hands the task to a new worker.
    pub(crate) fn start_task(&mut self, task: Arc<RequestTask>) {
        let task_id = task.task_id().to_string();
        let abort_flag = Arc::new(AtomicBool::new(false));
        let running_task = RunningTask::new(task.clone(), self.tx.clone());
        let join_handle = tokio::spawn(running_task.run(abort_flag.clone()));
        self.running.insert(task_id.clone(), task);
        self.abort_handles
            .insert(task_id, AbortHandle::new(abort_flag, join_handle));
    }

    /// Forgets a task whose worker reported a terminal outcome.
    pub(crate) fn task_finish(&mut self, task_id: &str) {
        self.running.remove(task_id);
        self.abort_handles.remove(task_id);
    }

    /// Cancels the worker and frees the slot. Returns false for tasks not
    /// running here.
    pub(crate) fn cancel_task(&mut self, task_id: &str) -> bool {
        if self.running.remove(task_id).is_none() {
            return false;
        }
        if let Some(handle) = self.abort_handles.remove(task_id) {
            handle.cancel();
        }
        true
    }

    /// Cancels every worker. Used on shutdown.
    pub(crate) fn cancel_all(&mut self) -> Vec<String> {
        let task_ids: Vec<String> = self.running.keys().cloned().collect();
        for task_id in &task_ids {
            self.cancel_task(task_id);
        }
        task_ids
    }
}

struct AbortHandle {
    abort_flag: Arc<AtomicBool>,
    join_handle: JoinHandle<()>,
}

impl AbortHandle {
    fn new(abort_flag: Arc<AtomicBool>, join_handle: JoinHandle<()>) -> Self {
        Self {
            abort_flag,
            join_handle,
        }
    }

    /// Raises the cooperative flag, then cancels the worker at its next
    /// await point.
    fn cancel(self) {
        self.abort_flag.store(true, Ordering::Release);
        self.join_handle.abort();
    }
}
