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

//! Durable task catalogue backed by sqlite.
//!
//! The store is owned by the task manager and only touched from its event
//! loop, so every method here is synchronous. State is persisted before the
//! matching event is published; an acknowledged command is never lost to a
//! crash.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, Row};

use crate::error::DownloadError;
use crate::task::config::DownloadRequest;
use crate::task::info::{DownloadInfo, State};
use crate::task::reason::Reason;
use crate::utils::get_current_timestamp;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS download_task (
    task_id TEXT PRIMARY KEY,
    uri TEXT NOT NULL,
    destination TEXT NOT NULL,
    display_name TEXT NOT NULL,
    state INTEGER NOT NULL,
    stop_reason INTEGER NOT NULL,
    failure_reason INTEGER NOT NULL,
    bytes_downloaded INTEGER NOT NULL,
    total_bytes INTEGER NOT NULL,
    foreground INTEGER NOT NULL,
    ctime INTEGER NOT NULL,
    mtime INTEGER NOT NULL)";

const ALL_COLUMNS: &str = "task_id, uri, destination, display_name, state, stop_reason, \
     failure_reason, bytes_downloaded, total_bytes, foreground, ctime, mtime";

/// Unknown total length sentinel in the `total_bytes` column.
const TOTAL_UNKNOWN: i64 = -1;

pub(crate) struct TaskStore {
    conn: Connection,
}

impl TaskStore {
    /// Opens or creates the catalogue at `path`.
    pub(crate) fn open(path: &Path) -> Result<Self, DownloadError> {
        let conn = Connection::open(path)?;
        conn.execute(CREATE_TABLE, [])?;
        Ok(Self { conn })
    }

    /// An in-memory catalogue that lives as long as the engine.
    pub(crate) fn open_in_memory() -> Result<Self, DownloadError> {
        let conn = Connection::open_in_memory()?;
        conn.execute(CREATE_TABLE, [])?;
        Ok(Self { conn })
    }

    /// Puts interrupted transfers back in line after a restart and
    /// quarantines records that no longer decode.
    pub(crate) fn recover(&self) -> Result<(), DownloadError> {
        let requeued = self.requeue_running()?;
        if requeued > 0 {
            info!("recovered {} interrupted tasks", requeued);
        }
        // A full decode pass turns undecodable records into quarantined
        // failures instead of latent read errors.
        self.list()?;
        Ok(())
    }

    /// Moves every `Downloading` record back to `Queued`. Used on recovery
    /// and on shutdown; workers do not survive either.
    pub(crate) fn requeue_running(&self) -> Result<usize, DownloadError> {
        let changed = self.conn.execute(
            "UPDATE download_task SET state = ?1, mtime = ?2 WHERE state = ?3",
            params![
                State::Queued as u8 as i64,
                get_current_timestamp() as i64,
                State::Downloading as u8 as i64
            ],
        )?;
        Ok(changed)
    }

    pub(crate) fn insert(&self, info: &DownloadInfo) -> Result<(), DownloadError> {
        self.conn.execute(
            "INSERT INTO download_task (task_id, uri, destination, display_name, state, \
             stop_reason, failure_reason, bytes_downloaded, total_bytes, foreground, ctime, \
             mtime) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                info.request.id,
                info.request.uri,
                info.request.destination.to_string_lossy().into_owned(),
                info.request.display_name,
                info.state as u8 as i64,
                info.stop_reason as i64,
                info.failure_reason as u8 as i64,
                info.bytes_downloaded as i64,
                info.total_bytes.map(|t| t as i64).unwrap_or(TOTAL_UNKNOWN),
                info.foreground,
                info.ctime as i64,
                info.mtime as i64
            ],
        )?;
        Ok(())
    }

    /// Fetches one record. A record that fails to decode is quarantined and
    /// reported as corruption.
    pub(crate) fn get(&self, task_id: &str) -> Result<Option<DownloadInfo>, DownloadError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM download_task WHERE task_id = ?1",
            ALL_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![task_id], |row| Ok(decode_info(row)))?;
        match rows.next() {
            None => Ok(None),
            Some(Ok(Ok(info))) => Ok(Some(info)),
            Some(Ok(Err(msg))) => {
                self.quarantine(task_id);
                Err(DownloadError::StoreCorruption(format!(
                    "task {}: {}",
                    task_id, msg
                )))
            }
            Some(Err(e)) => Err(e.into()),
        }
    }

    /// Every decodable record in creation order. Records that fail to decode
    /// are quarantined and skipped.
    pub(crate) fn list(&self) -> Result<Vec<DownloadInfo>, DownloadError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM download_task ORDER BY rowid",
            ALL_COLUMNS
        ))?;
        let rows = stmt.query_map([], |row| {
            let task_id: String = row.get(0)?;
            Ok((task_id, decode_info(row)))
        })?;

        let mut infos = Vec::new();
        let mut corrupt = Vec::new();
        for row in rows {
            let (task_id, decoded) = row?;
            match decoded {
                Ok(info) => infos.push(info),
                Err(msg) => {
                    error!("task {} record corrupted: {}", task_id, msg);
                    corrupt.push(task_id);
                }
            }
        }
        for task_id in corrupt {
            self.quarantine(&task_id);
        }
        Ok(infos)
    }

    /// Marks a record failed with [`Reason::StoreCorruption`]. Best effort.
    fn quarantine(&self, task_id: &str) {
        let quarantined = self.conn.execute(
            "UPDATE download_task SET state = ?1, failure_reason = ?2, mtime = ?3 \
             WHERE task_id = ?4",
            params![
                State::Failed as u8 as i64,
                Reason::StoreCorruption as u8 as i64,
                get_current_timestamp() as i64,
                task_id
            ],
        );
        if let Err(e) = quarantined {
            error!("task {} quarantine failed: {}", task_id, e);
        }
    }

    /// Rewrites state and failure reason, leaving the stop reason alone.
    pub(crate) fn update_state(
        &self,
        task_id: &str,
        state: State,
        reason: Reason,
    ) -> Result<(), DownloadError> {
        self.conn.execute(
            "UPDATE download_task SET state = ?1, failure_reason = ?2, mtime = ?3 \
             WHERE task_id = ?4",
            params![
                state as u8 as i64,
                reason as u8 as i64,
                get_current_timestamp() as i64,
                task_id
            ],
        )?;
        Ok(())
    }

    /// Holds a task paused under a caller-supplied code, in one write so the
    /// pair is never observed half-applied.
    pub(crate) fn update_paused(&self, task_id: &str, stop_reason: u32) -> Result<(), DownloadError> {
        self.conn.execute(
            "UPDATE download_task SET state = ?1, stop_reason = ?2, mtime = ?3 \
             WHERE task_id = ?4",
            params![
                State::Paused as u8 as i64,
                stop_reason as i64,
                get_current_timestamp() as i64,
                task_id
            ],
        )?;
        Ok(())
    }

    /// Puts a task back in line, clearing the stop reason and any recorded
    /// failure.
    pub(crate) fn update_queued(&self, task_id: &str) -> Result<(), DownloadError> {
        self.conn.execute(
            "UPDATE download_task SET state = ?1, stop_reason = 0, failure_reason = ?2, \
             mtime = ?3 WHERE task_id = ?4",
            params![
                State::Queued as u8 as i64,
                Reason::Default as u8 as i64,
                get_current_timestamp() as i64,
                task_id
            ],
        )?;
        Ok(())
    }

    pub(crate) fn update_progress(
        &self,
        task_id: &str,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    ) -> Result<(), DownloadError> {
        self.conn.execute(
            "UPDATE download_task SET bytes_downloaded = ?1, total_bytes = ?2, mtime = ?3 \
             WHERE task_id = ?4",
            params![
                bytes_downloaded as i64,
                total_bytes.map(|t| t as i64).unwrap_or(TOTAL_UNKNOWN),
                get_current_timestamp() as i64,
                task_id
            ],
        )?;
        Ok(())
    }

    /// Forgets staged progress; used when a finished task is started over.
    pub(crate) fn reset_progress(&self, task_id: &str) -> Result<(), DownloadError> {
        self.update_progress(task_id, 0, None)
    }

    /// Rewrites the caller-editable fields when a request is re-added.
    pub(crate) fn update_display(
        &self,
        task_id: &str,
        display_name: &str,
        foreground: bool,
    ) -> Result<(), DownloadError> {
        self.conn.execute(
            "UPDATE download_task SET display_name = ?1, foreground = ?2, mtime = ?3 \
             WHERE task_id = ?4",
            params![
                display_name,
                foreground,
                get_current_timestamp() as i64,
                task_id
            ],
        )?;
        Ok(())
    }

    pub(crate) fn update_foreground(
        &self,
        task_id: &str,
        foreground: bool,
    ) -> Result<(), DownloadError> {
        self.conn.execute(
            "UPDATE download_task SET foreground = ?1, mtime = ?2 WHERE task_id = ?3",
            params![foreground, get_current_timestamp() as i64, task_id],
        )?;
        Ok(())
    }

    /// Purges a record, returning its last snapshot when it still decodes.
    pub(crate) fn remove(&self, task_id: &str) -> Result<Option<DownloadInfo>, DownloadError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM download_task WHERE task_id = ?1",
            ALL_COLUMNS
        ))?;
        let snapshot = stmt
            .query_map(params![task_id], |row| Ok(decode_info(row)))?
            .next()
            .transpose()?
            .and_then(|decoded| decoded.ok());
        self.conn.execute(
            "DELETE FROM download_task WHERE task_id = ?1",
            params![task_id],
        )?;
        Ok(snapshot)
    }
}

/// Decodes one row. Errors name the first field that does not fit.
fn decode_info(row: &Row) -> Result<DownloadInfo, String> {
    let id: String = row.get(0).map_err(|e| e.to_string())?;
    let uri: String = row.get(1).map_err(|e| e.to_string())?;
    let destination: String = row.get(2).map_err(|e| e.to_string())?;
    let display_name: String = row.get(3).map_err(|e| e.to_string())?;

    let state: i64 = row.get(4).map_err(|e| e.to_string())?;
    let state = u8::try_from(state)
        .ok()
        .and_then(|byte| State::try_from(byte).ok())
        .ok_or_else(|| format!("state byte {} out of range", state))?;

    let stop_reason: i64 = row.get(5).map_err(|e| e.to_string())?;
    let stop_reason =
        u32::try_from(stop_reason).map_err(|_| format!("stop reason {} out of range", stop_reason))?;

    let failure_reason: i64 = row.get(6).map_err(|e| e.to_string())?;
    let failure_reason = Reason::from(failure_reason as u8);

    let bytes_downloaded: i64 = row.get(7).map_err(|e| e.to_string())?;
    let bytes_downloaded = u64::try_from(bytes_downloaded)
        .map_err(|_| format!("byte count {} out of range", bytes_downloaded))?;

    let total_bytes: i64 = row.get(8).map_err(|e| e.to_string())?;
    let total_bytes = (total_bytes >= 0).then_some(total_bytes as u64);

    let foreground: bool = row.get(9).map_err(|e| e.to_string())?;
    let ctime: i64 = row.get(10).map_err(|e| e.to_string())?;
    let mtime: i64 = row.get(11).map_err(|e| e.to_string())?;

    Ok(DownloadInfo {
        request: DownloadRequest {
            id,
            uri,
            destination: PathBuf::from(destination),
            display_name,
        },
        state,
        stop_reason,
        failure_reason,
        bytes_downloaded,
        total_bytes,
        foreground,
        ctime: ctime.max(0) as u64,
        mtime: mtime.max(0) as u64,
    })
}
