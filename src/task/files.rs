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

//! Staging file management for transfers.
//!
//! Content is written to `<destination>.tmp` and renamed over the
//! destination only after the transfer has been verified, so a destination
//! path never holds partial content.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};

/// Suffix of staging files. Reserved; destinations may not end with it.
pub(crate) const TEMP_SUFFIX: &str = ".tmp";

/// The staging path for `destination`.
pub(crate) fn temp_path(destination: &Path) -> PathBuf {
    let mut path = destination.as_os_str().to_os_string();
    path.push(TEMP_SUFFIX);
    PathBuf::from(path)
}

/// Opens the staging file for appending, creating parent directories as
/// needed. Returns the handle and the bytes already staged.
pub(crate) async fn open_staging(destination: &Path) -> io::Result<(File, u64)> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(temp_path(destination))
        .await?;
    let staged = file.metadata().await?.len();
    Ok((file, staged))
}

/// Moves the finished staging file over the destination.
pub(crate) async fn finalize(destination: &Path) -> io::Result<()> {
    fs::rename(temp_path(destination), destination).await
}

/// Deletes the staging file, and the destination too when asked. Missing
/// files are fine.
pub(crate) async fn remove_files(destination: &Path, delete_destination: bool) -> io::Result<()> {
    remove_if_present(&temp_path(destination)).await?;
    if delete_destination {
        remove_if_present(destination).await?;
    }
    Ok(())
}

async fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
