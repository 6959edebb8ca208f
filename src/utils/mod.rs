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

//! Small helpers shared across the engine.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::oneshot;

/// Receiving half of a one-shot reply channel.
///
/// Commands handed to the task manager carry the sending half; the caller
/// keeps a `Recv` and awaits the outcome on it.
pub(crate) struct Recv<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Recv<T> {
    pub(crate) fn new(rx: oneshot::Receiver<T>) -> Self {
        Self { rx }
    }

    /// Waits for the reply. Returns `None` if the task manager dropped the
    /// sending half without answering.
    pub(crate) async fn get(self) -> Option<T> {
        match self.rx.await {
            Ok(value) => Some(value),
            Err(e) => {
                error!("Recv error: {:?}", e);
                None
            }
        }
    }
}

/// Milliseconds since the unix epoch.
pub(crate) fn get_current_timestamp() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(time) => time.as_millis() as u64,
        Err(e) => {
            error!("Gets current timestamp failed: {:?}", e);
            0
        }
    }
}
