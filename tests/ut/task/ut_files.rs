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

use tokio::io::AsyncWriteExt;

use super::*;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
    let _ = std::fs::create_dir("test_files/");
}

// @tc.name: ut_files_temp_path
// @tc.desc: Test staging path derivation
// @tc.precon: NA
// @tc.step: 1. Derive the staging path of a destination
// @tc.expect: The staging path is the destination plus the suffix
// @tc.type: FUNC
// @tc.require: issues#ICN42E
#[test]
fn ut_files_temp_path() {
    assert_eq!(
        temp_path(Path::new("downloads/movie.mp4")),
        PathBuf::from("downloads/movie.mp4.tmp")
    );
    assert!(!TEMP_SUFFIX.is_empty());
}

// @tc.name: ut_files_staging_append
// @tc.desc: Test that reopened staging files keep their content
// @tc.precon: NA
// @tc.step: 1. Open a staging file and write five bytes
//           2. Open it again
// @tc.expect: The second open reports five staged bytes
// @tc.type: FUNC
// @tc.require: issues#ICN42E
#[tokio::test]
async fn ut_files_staging_append() {
    init();
    let destination = Path::new("test_files/ut_files_append.bin");
    let _ = std::fs::remove_file(temp_path(destination));

    let (mut file, staged) = open_staging(destination).await.unwrap();
    assert_eq!(staged, 0);
    file.write_all(b"hello").await.unwrap();
    file.sync_all().await.unwrap();
    drop(file);

    let (_, staged) = open_staging(destination).await.unwrap();
    assert_eq!(staged, 5);
}

// @tc.name: ut_files_staging_parent
// @tc.desc: Test parent directory creation for staging files
// @tc.precon: NA
// @tc.step: 1. Open a staging file under a directory that does not exist
// @tc.expect: The directory chain is created and the open succeeds
// @tc.type: FUNC
// @tc.require: issues#ICN42E
#[tokio::test]
async fn ut_files_staging_parent() {
    init();
    let destination = Path::new("test_files/ut_files_nested/deep/file.bin");
    let _ = std::fs::remove_dir_all("test_files/ut_files_nested");

    let (_, staged) = open_staging(destination).await.unwrap();
    assert_eq!(staged, 0);
    assert!(temp_path(destination).exists());
}

// @tc.name: ut_files_finalize
// @tc.desc: Test moving finished content onto the destination
// @tc.precon: NA
// @tc.step: 1. Stage some content
//           2. Finalize the destination
// @tc.expect: The destination holds the content and the staging file is gone
// @tc.type: FUNC
// @tc.require: issues#ICN42E
#[tokio::test]
async fn ut_files_finalize() {
    init();
    let destination = Path::new("test_files/ut_files_finalize.bin");
    let _ = std::fs::remove_file(destination);
    let _ = std::fs::remove_file(temp_path(destination));

    let (mut file, _) = open_staging(destination).await.unwrap();
    file.write_all(b"content").await.unwrap();
    file.sync_all().await.unwrap();
    drop(file);

    finalize(destination).await.unwrap();
    assert_eq!(std::fs::read(destination).unwrap(), b"content");
    assert!(!temp_path(destination).exists());
}

// @tc.name: ut_files_remove
// @tc.desc: Test cleanup of staging and destination files
// @tc.precon: NA
// @tc.step: 1. Create both files and clean up keeping the destination
//           2. Clean up again deleting the destination
//           3. Clean up a third time with nothing left
// @tc.expect: The staging file always goes, the destination only on request,
// and missing files are not an error
// @tc.type: FUNC
// @tc.require: issues#ICN42E
#[tokio::test]
async fn ut_files_remove() {
    init();
    let destination = Path::new("test_files/ut_files_remove.bin");
    std::fs::write(destination, b"done").unwrap();
    std::fs::write(temp_path(destination), b"partial").unwrap();

    remove_files(destination, false).await.unwrap();
    assert!(!temp_path(destination).exists());
    assert!(destination.exists());

    remove_files(destination, true).await.unwrap();
    assert!(!destination.exists());

    remove_files(destination, true).await.unwrap();
}
