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

//! Error types surfaced by the download engine.

use std::fmt;

use crate::task::info::State;

/// Errors returned by engine commands and queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    /// The request is malformed and was rejected before a task was created.
    InvalidRequest(String),
    /// No task with the given id exists in the catalogue.
    NotFound(String),
    /// The command is illegal for the task in its current state.
    Conflict {
        /// The id of the task that rejected the command.
        id: String,
        /// The state the task was in when the command arrived.
        state: State,
    },
    /// A local I/O or storage operation failed on the command path.
    IoFailure(String),
    /// A persisted record could not be decoded.
    StoreCorruption(String),
    /// The session or engine has been shut down.
    Disconnected,
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest(msg) => write!(f, "invalid request: {}", msg),
            Self::NotFound(id) => write!(f, "task {} not found", id),
            Self::Conflict { id, state } => {
                write!(f, "command conflicts with task {} in state {}", id, state)
            }
            Self::IoFailure(msg) => write!(f, "io failure: {}", msg),
            Self::StoreCorruption(msg) => write!(f, "store corruption: {}", msg),
            Self::Disconnected => write!(f, "engine disconnected"),
        }
    }
}

impl std::error::Error for DownloadError {}

impl From<rusqlite::Error> for DownloadError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == rusqlite::ErrorCode::DatabaseCorrupt =>
            {
                Self::StoreCorruption(msg.unwrap_or_else(|| e.to_string()))
            }
            err => Self::IoFailure(err.to_string()),
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(err: std::io::Error) -> Self {
        Self::IoFailure(err.to_string())
    }
}
