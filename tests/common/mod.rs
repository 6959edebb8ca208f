// Copyright (C) 2024 Huawei Device Co., Ltd.
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

#![allow(dead_code)]


use std::time::Duration;

use download_engine::{DownloadClient, DownloadError, DownloadInfo, State};

pub const WAIT_TICK: Duration = Duration::from_millis(20);
pub const WAIT_LIMIT: Duration = Duration::from_secs(30);

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
    let _ = std::fs::create_dir("test_files/");
}

pub fn dest(name: &str) -> String {
    format!("test_files/{}", name)
}

/// Polls the catalogue until the task reaches `state`.
pub async fn wait_state(client: &DownloadClient, task_id: &str, state: State) -> DownloadInfo {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    loop {
        if let Ok(info) = client.get(task_id).await {
            if info.state == state {
                return info;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("task {} never reached {}", task_id, state);
        }
        tokio::time::sleep(WAIT_TICK).await;
    }
}

/// Polls the catalogue until the task record has been purged.
pub async fn wait_purged(client: &DownloadClient, task_id: &str) {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    loop {
        match client.get(task_id).await {
            Err(DownloadError::NotFound(_)) => return,
            Err(e) => panic!("task {} query failed: {}", task_id, e),
            Ok(_) => {}
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("task {} never purged", task_id);
        }
        tokio::time::sleep(WAIT_TICK).await;
    }
}

/// Polls the catalogue until the task has persisted at least `bytes`.
pub async fn wait_bytes(client: &DownloadClient, task_id: &str, bytes: u64) -> DownloadInfo {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    loop {
        if let Ok(info) = client.get(task_id).await {
            if info.bytes_downloaded >= bytes {
                return info;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("task {} never staged {} bytes", task_id, bytes);
        }
        tokio::time::sleep(WAIT_TICK).await;
    }
}
