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

use once_cell::sync::Lazy;

use super::*;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
    let _ = std::fs::create_dir("test_files/");
}

fn sample(name: &str) -> DownloadInfo {
    let request = DownloadRequest::builder()
        .id(name)
        .uri(&format!("http://127.0.0.1/{}", name))
        .destination(format!("test_files/{}.bin", name))
        .build()
        .unwrap();
    DownloadInfo::new(request, true, get_current_timestamp())
}

// @tc.name: ut_store_insert_get
// @tc.desc: Test inserting and reading back one record
// @tc.precon: NA
// @tc.step: 1. Insert a fresh record into an in-memory store
//           2. Read it back and read a missing id
// @tc.expect: All fields round-trip, the missing id reads as None
// @tc.type: FUNC
// @tc.require: issues#ICN42F
#[test]
fn ut_store_insert_get() {
    let store = TaskStore::open_in_memory().unwrap();
    let info = sample("insert_get");
    store.insert(&info).unwrap();

    let read = store.get("insert_get").unwrap().unwrap();
    assert_eq!(read.request, info.request);
    assert_eq!(read.state, State::Queued);
    assert_eq!(read.stop_reason, 0);
    assert_eq!(read.failure_reason, Reason::Default);
    assert_eq!(read.bytes_downloaded, 0);
    assert_eq!(read.total_bytes, None);
    assert!(read.foreground);
    assert_eq!(read.ctime, info.ctime);

    assert!(store.get("missing").unwrap().is_none());
}

// @tc.name: ut_store_list_order
// @tc.desc: Test that listing preserves creation order
// @tc.precon: NA
// @tc.step: 1. Insert three records
//           2. Update the first one
//           3. List the store
// @tc.expect: Records come back in insertion order despite the update
// @tc.type: FUNC
// @tc.require: issues#ICN42F
#[test]
fn ut_store_list_order() {
    let store = TaskStore::open_in_memory().unwrap();
    for name in ["order_c", "order_a", "order_b"] {
        store.insert(&sample(name)).unwrap();
    }
    store.update_progress("order_c", 10, Some(100)).unwrap();

    let ids: Vec<String> = store
        .list()
        .unwrap()
        .into_iter()
        .map(|info| info.request.id)
        .collect();
    assert_eq!(ids, ["order_c", "order_a", "order_b"]);
}

// @tc.name: ut_store_state_and_stop_reason
// @tc.desc: Test the state update paths
// @tc.precon: NA
// @tc.step: 1. Hold a record paused under a code
//           2. Rewrite its state without touching the code
//           3. Put it back in line
// @tc.expect: update_state leaves the stop reason alone, update_queued
// clears it together with the failure reason
// @tc.type: FUNC
// @tc.require: issues#ICN42F
#[test]
fn ut_store_state_and_stop_reason() {
    let store = TaskStore::open_in_memory().unwrap();
    store.insert(&sample("stop")).unwrap();

    store.update_paused("stop", 7).unwrap();
    let read = store.get("stop").unwrap().unwrap();
    assert_eq!(read.state, State::Paused);
    assert_eq!(read.stop_reason, 7);

    store
        .update_state("stop", State::Failed, Reason::IoFailure)
        .unwrap();
    let read = store.get("stop").unwrap().unwrap();
    assert_eq!(read.state, State::Failed);
    assert_eq!(read.failure_reason, Reason::IoFailure);
    assert_eq!(read.stop_reason, 7);

    store.update_queued("stop").unwrap();
    let read = store.get("stop").unwrap().unwrap();
    assert_eq!(read.state, State::Queued);
    assert_eq!(read.stop_reason, 0);
    assert_eq!(read.failure_reason, Reason::Default);
}

// @tc.name: ut_store_progress
// @tc.desc: Test progress persistence
// @tc.precon: NA
// @tc.step: 1. Write progress with a known total
//           2. Write progress with an unknown total
//           3. Reset the progress
// @tc.expect: Byte counts and the optional total round-trip exactly
// @tc.type: FUNC
// @tc.require: issues#ICN42F
#[test]
fn ut_store_progress() {
    let store = TaskStore::open_in_memory().unwrap();
    store.insert(&sample("progress")).unwrap();

    store.update_progress("progress", 1024, Some(4096)).unwrap();
    let read = store.get("progress").unwrap().unwrap();
    assert_eq!(read.bytes_downloaded, 1024);
    assert_eq!(read.total_bytes, Some(4096));

    store.update_progress("progress", 2048, None).unwrap();
    let read = store.get("progress").unwrap().unwrap();
    assert_eq!(read.bytes_downloaded, 2048);
    assert_eq!(read.total_bytes, None);

    store.reset_progress("progress").unwrap();
    let read = store.get("progress").unwrap().unwrap();
    assert_eq!(read.bytes_downloaded, 0);
    assert_eq!(read.total_bytes, None);
}

// @tc.name: ut_store_display
// @tc.desc: Test the merge update of caller-editable fields
// @tc.precon: NA
// @tc.step: 1. Rewrite display name and foreground flag
// @tc.expect: Only those fields change
// @tc.type: FUNC
// @tc.require: issues#ICN42F
#[test]
fn ut_store_display() {
    let store = TaskStore::open_in_memory().unwrap();
    let info = sample("display");
    store.insert(&info).unwrap();

    store.update_display("display", "Renamed", false).unwrap();
    let read = store.get("display").unwrap().unwrap();
    assert_eq!(read.request.display_name, "Renamed");
    assert!(!read.foreground);
    assert_eq!(read.request.uri, info.request.uri);

    store.update_foreground("display", true).unwrap();
    assert!(store.get("display").unwrap().unwrap().foreground);
}

// @tc.name: ut_store_requeue_running
// @tc.desc: Test putting interrupted transfers back in line
// @tc.precon: NA
// @tc.step: 1. Mark two records downloading and one paused
//           2. Requeue running records
// @tc.expect: Both downloading records turn queued, the paused one stays
// @tc.type: FUNC
// @tc.require: issues#ICN42F
#[test]
fn ut_store_requeue_running() {
    let store = TaskStore::open_in_memory().unwrap();
    for name in ["requeue_a", "requeue_b", "requeue_c"] {
        store.insert(&sample(name)).unwrap();
    }
    store
        .update_state("requeue_a", State::Downloading, Reason::Default)
        .unwrap();
    store
        .update_state("requeue_c", State::Downloading, Reason::Default)
        .unwrap();
    store.update_paused("requeue_b", 3).unwrap();

    assert_eq!(store.requeue_running().unwrap(), 2);
    assert_eq!(store.get("requeue_a").unwrap().unwrap().state, State::Queued);
    assert_eq!(store.get("requeue_c").unwrap().unwrap().state, State::Queued);
    assert_eq!(store.get("requeue_b").unwrap().unwrap().state, State::Paused);
}

// @tc.name: ut_store_remove
// @tc.desc: Test purging a record
// @tc.precon: NA
// @tc.step: 1. Remove an existing record
//           2. Remove it again
// @tc.expect: The first remove returns the snapshot, the second None, and
// the record is gone in between
// @tc.type: FUNC
// @tc.require: issues#ICN42F
#[test]
fn ut_store_remove() {
    let store = TaskStore::open_in_memory().unwrap();
    store.insert(&sample("remove")).unwrap();

    let snapshot = store.remove("remove").unwrap().unwrap();
    assert_eq!(snapshot.request.id, "remove");
    assert!(store.get("remove").unwrap().is_none());
    assert!(store.remove("remove").unwrap().is_none());
}

// @tc.name: ut_store_quarantine_on_get
// @tc.desc: Test that an undecodable record is quarantined by get
// @tc.precon: NA
// @tc.step: 1. Corrupt the state byte behind the store's back
//           2. Read the record twice
// @tc.expect: The first read reports corruption, the second finds the record
// quarantined as failed
// @tc.type: FUNC
// @tc.require: issues#ICN42F
#[test]
fn ut_store_quarantine_on_get() {
    let store = TaskStore::open_in_memory().unwrap();
    store.insert(&sample("corrupt")).unwrap();
    store
        .conn
        .execute(
            "UPDATE download_task SET state = 99 WHERE task_id = ?1",
            params!["corrupt"],
        )
        .unwrap();

    let err = store.get("corrupt").unwrap_err();
    assert!(matches!(err, DownloadError::StoreCorruption(_)));

    let read = store.get("corrupt").unwrap().unwrap();
    assert_eq!(read.state, State::Failed);
    assert_eq!(read.failure_reason, Reason::StoreCorruption);
}

// @tc.name: ut_store_list_skips_corrupt
// @tc.desc: Test that one bad record does not poison the listing
// @tc.precon: NA
// @tc.step: 1. Insert two records and corrupt one
//           2. List the store
// @tc.expect: The listing returns the healthy record and quarantines the
// other
// @tc.type: FUNC
// @tc.require: issues#ICN42F
#[test]
fn ut_store_list_skips_corrupt() {
    let store = TaskStore::open_in_memory().unwrap();
    store.insert(&sample("healthy")).unwrap();
    store.insert(&sample("poisoned")).unwrap();
    store
        .conn
        .execute(
            "UPDATE download_task SET state = 99 WHERE task_id = ?1",
            params!["poisoned"],
        )
        .unwrap();

    let listed = store.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].request.id, "healthy");

    let read = store.get("poisoned").unwrap().unwrap();
    assert_eq!(read.state, State::Failed);
    assert_eq!(read.failure_reason, Reason::StoreCorruption);
}

// @tc.name: ut_store_recover
// @tc.desc: Test the full recovery pass
// @tc.precon: NA
// @tc.step: 1. Leave one record downloading and corrupt another
//           2. Run recovery
// @tc.expect: The interrupted record is queued again and the corrupt one is
// quarantined
// @tc.type: FUNC
// @tc.require: issues#ICN42F
#[test]
fn ut_store_recover() {
    let store = TaskStore::open_in_memory().unwrap();
    store.insert(&sample("interrupted")).unwrap();
    store.insert(&sample("broken")).unwrap();
    store
        .update_state("interrupted", State::Downloading, Reason::Default)
        .unwrap();
    store
        .conn
        .execute(
            "UPDATE download_task SET state = 99 WHERE task_id = ?1",
            params!["broken"],
        )
        .unwrap();

    store.recover().unwrap();

    assert_eq!(
        store.get("interrupted").unwrap().unwrap().state,
        State::Queued
    );
    let read = store.get("broken").unwrap().unwrap();
    assert_eq!(read.state, State::Failed);
    assert_eq!(read.failure_reason, Reason::StoreCorruption);
}

// @tc.name: ut_store_reopen
// @tc.desc: Test persistence across a close and reopen
// @tc.precon: NA
// @tc.step: 1. Open a file-backed store and write a record with progress
//           2. Drop the store and open the file again
// @tc.expect: The record comes back with its progress intact
// @tc.type: FUNC
// @tc.require: issues#ICN42F
#[test]
fn ut_store_reopen() {
    static DB_PATH: Lazy<PathBuf> =
        Lazy::new(|| PathBuf::from(format!("test_files/ut_store_reopen_{}.db", std::process::id())));
    init();
    let _ = std::fs::remove_file(&*DB_PATH);

    {
        let store = TaskStore::open(&DB_PATH).unwrap();
        store.insert(&sample("persisted")).unwrap();
        store.update_progress("persisted", 512, Some(2048)).unwrap();
    }

    let store = TaskStore::open(&DB_PATH).unwrap();
    let read = store.get("persisted").unwrap().unwrap();
    assert_eq!(read.bytes_downloaded, 512);
    assert_eq!(read.total_bytes, Some(2048));
    assert_eq!(read.state, State::Queued);
}
