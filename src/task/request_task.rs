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

//! The in-flight representation of a download task.

use std::sync::atomic::AtomicU32;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::Client;

use crate::task::config::DownloadRequest;
use crate::task::reason::Reason;

/// Byte counters shared between a transfer worker and the task manager.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TransferProgress {
    pub(crate) bytes_downloaded: u64,
    pub(crate) total_bytes: Option<u64>,
}

/// One admitted download, owned by the running queue while a worker drives
/// its transfer.
pub(crate) struct RequestTask {
    pub(crate) request: DownloadRequest,
    pub(crate) client: Client,
    pub(crate) retry_budget: u32,
    pub(crate) read_timeout: Duration,
    pub(crate) tries: AtomicU32,
    progress: Mutex<TransferProgress>,
    /// Terminal outcome of the worker, taken by the drop guard when the
    /// worker winds down. `None` means the worker was cancelled.
    pub(crate) running_result: Mutex<Option<Result<(), Reason>>>,
}

impl RequestTask {
    pub(crate) fn new(
        request: DownloadRequest,
        client: Client,
        retry_budget: u32,
        read_timeout: Duration,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    ) -> Self {
        Self {
            request,
            client,
            retry_budget,
            read_timeout,
            tries: AtomicU32::new(0),
            progress: Mutex::new(TransferProgress {
                bytes_downloaded,
                total_bytes,
            }),
            running_result: Mutex::new(None),
        }
    }

    pub(crate) fn task_id(&self) -> &str {
        &self.request.id
    }

    /// Aligns the counter with what is actually staged on disk.
    pub(crate) fn set_bytes(&self, bytes: u64) {
        self.progress.lock().unwrap().bytes_downloaded = bytes;
    }

    /// Replaces the total with what the current response declared.
    pub(crate) fn set_total(&self, total: Option<u64>) {
        self.progress.lock().unwrap().total_bytes = total;
    }

    pub(crate) fn record_chunk(&self, len: u64) -> TransferProgress {
        let mut progress = self.progress.lock().unwrap();
        progress.bytes_downloaded += len;
        *progress
    }

    pub(crate) fn progress(&self) -> TransferProgress {
        *self.progress.lock().unwrap()
    }
}

/// Phases a transfer can wait in before turning into an outcome.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TaskPhase {
    /// The attempt failed with a retryable error; the worker backs off and
    /// tries again while budget remains.
    NeedRetry,
    /// Cancellation was requested; the worker stops without an outcome.
    UserAbort,
}

/// Why one transfer attempt ended early.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TaskError {
    /// Unrecoverable for this run; recorded as the task failure.
    Failed(Reason),
    /// Recoverable; see [`TaskPhase`].
    Waiting(TaskPhase),
}
