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

use std::time::Duration;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::time::timeout;

use super::*;
use crate::service::client::manager::ClientManager;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
    let _ = std::fs::create_dir("test_files/");
}

// A scheduler whose event receiver stays in the test. Nothing applies worker
// reports unless the test does, so queue and store moves are deterministic.
// A bound of zero freezes admission entirely.
fn harness(max: usize) -> (Scheduler, UnboundedReceiver<TaskManagerEvent>) {
    harness_with(TaskStore::open_in_memory().unwrap(), max)
}

fn harness_with(
    store: TaskStore,
    max: usize,
) -> (Scheduler, UnboundedReceiver<TaskManagerEvent>) {
    init();
    let (tx, rx) = unbounded_channel();
    let tx = TaskManagerTx::new(tx);
    let config = EngineConfig {
        max_concurrent_downloads: max,
        retry_budget: 1,
        connect_timeout: Duration::from_millis(200),
        read_timeout: Duration::from_millis(200),
    };
    let mut scheduler = Scheduler::init(store, config, tx, ClientManager::init()).unwrap();
    scheduler.restore().unwrap();
    (scheduler, rx)
}

// Points at a closed local port; workers spawned by admission fail fast and
// their reports sit unapplied in the receiver.
fn request(name: &str) -> DownloadRequest {
    DownloadRequest::builder()
        .id(name)
        .uri("http://127.0.0.1:9/unreachable")
        .destination(format!("test_files/ut_sched_{}.bin", name))
        .build()
        .unwrap()
}

async fn next_remove_finished(rx: &mut UnboundedReceiver<TaskManagerEvent>) -> String {
    loop {
        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        if let TaskManagerEvent::RemoveFinished(task_id) = event {
            return task_id;
        }
    }
}

// @tc.name: ut_scheduler_admission_bound
// @tc.desc: Test that admission never exceeds the concurrency bound
// @tc.precon: NA
// @tc.step: 1. Add three tasks with a bound of two
// @tc.expect: The first two tasks download, the third stays queued
// @tc.type: FUNC
// @tc.require: issues#ICN43A
#[tokio::test]
async fn ut_scheduler_admission_bound() {
    let (mut scheduler, _rx) = harness(2);
    scheduler.add_task(request("bound_a"), false).unwrap();
    scheduler.add_task(request("bound_b"), false).unwrap();
    scheduler.add_task(request("bound_c"), false).unwrap();

    assert_eq!(scheduler.queue.len(), 2);
    assert!(scheduler.queue.contains("bound_a"));
    assert!(scheduler.queue.contains("bound_b"));
    assert_eq!(
        scheduler.get_task("bound_a").unwrap().state,
        State::Downloading
    );
    assert_eq!(scheduler.get_task("bound_c").unwrap().state, State::Queued);
}

// @tc.name: ut_scheduler_foreground_first
// @tc.desc: Test that foreground tasks win the next free slot
// @tc.precon: NA
// @tc.step: 1. Fill the single slot with a background task
//           2. Queue another background task, then a foreground one
//           3. Finish the running task
// @tc.expect: The foreground task is admitted before the older background
// task
// @tc.type: FUNC
// @tc.require: issues#ICN43A
#[tokio::test]
async fn ut_scheduler_foreground_first() {
    let (mut scheduler, _rx) = harness(1);
    scheduler.add_task(request("fg_a"), false).unwrap();
    scheduler.add_task(request("fg_b"), false).unwrap();
    scheduler.add_task(request("fg_c"), true).unwrap();
    assert!(scheduler.queue.contains("fg_a"));

    scheduler.task_finished("fg_a", Some(Ok(())));
    assert_eq!(
        scheduler.get_task("fg_a").unwrap().state,
        State::Completed
    );
    assert!(scheduler.queue.contains("fg_c"));
    assert_eq!(scheduler.get_task("fg_b").unwrap().state, State::Queued);

    scheduler.task_finished("fg_c", Some(Ok(())));
    assert!(scheduler.queue.contains("fg_b"));
}

// @tc.name: ut_scheduler_fifo
// @tc.desc: Test first-in-first-out admission within one priority class
// @tc.precon: NA
// @tc.step: 1. Queue two background tasks behind a running one
//           2. Finish the running tasks one by one
// @tc.expect: Tasks are admitted in the order they became runnable
// @tc.type: FUNC
// @tc.require: issues#ICN43A
#[tokio::test]
async fn ut_scheduler_fifo() {
    let (mut scheduler, _rx) = harness(1);
    scheduler.add_task(request("fifo_a"), false).unwrap();
    scheduler.add_task(request("fifo_b"), false).unwrap();
    scheduler.add_task(request("fifo_c"), false).unwrap();

    scheduler.task_finished("fifo_a", Some(Ok(())));
    assert!(scheduler.queue.contains("fifo_b"));
    assert_eq!(scheduler.get_task("fifo_c").unwrap().state, State::Queued);

    scheduler.task_finished("fifo_b", Some(Ok(())));
    assert!(scheduler.queue.contains("fifo_c"));
}

// @tc.name: ut_scheduler_pause_resume
// @tc.desc: Test pausing a running task and resuming it later
// @tc.precon: NA
// @tc.step: 1. Pause the running task
//           2. Verify the freed slot admits the queued task
//           3. Resume the paused task
// @tc.expect: Pausing evicts and frees the slot, resuming re-queues without
// jumping the line
// @tc.type: FUNC
// @tc.require: issues#ICN43A
#[tokio::test]
async fn ut_scheduler_pause_resume() {
    let (mut scheduler, _rx) = harness(1);
    scheduler.add_task(request("pr_a"), false).unwrap();
    scheduler.add_task(request("pr_b"), false).unwrap();

    scheduler.pause_task("pr_a").unwrap();
    assert_eq!(scheduler.get_task("pr_a").unwrap().state, State::Paused);
    assert!(!scheduler.queue.contains("pr_a"));
    assert!(scheduler.queue.contains("pr_b"));

    // Idempotent on an already paused task.
    scheduler.pause_task("pr_a").unwrap();

    scheduler.resume_task("pr_a", true).unwrap();
    assert_eq!(scheduler.get_task("pr_a").unwrap().state, State::Queued);

    scheduler.task_finished("pr_b", Some(Ok(())));
    assert!(scheduler.queue.contains("pr_a"));

    // Resume of a queued or downloading task is a no-op.
    scheduler.resume_task("pr_a", true).unwrap();
    assert!(matches!(
        scheduler.pause_task("missing"),
        Err(DownloadError::NotFound(_))
    ));
}

// @tc.name: ut_scheduler_merge
// @tc.desc: Test re-adding an id in every merge-relevant state
// @tc.precon: NA
// @tc.step: 1. Re-add a queued task with new display data
//           2. Re-add a failed task, a completed task and a removing task
// @tc.expect: Display data refreshes without duplicates, failed keeps its
// bytes, completed starts over, removing conflicts
// @tc.type: FUNC
// @tc.require: issues#ICN43B
#[tokio::test]
async fn ut_scheduler_merge() {
    let (mut scheduler, _rx) = harness(0);
    scheduler.add_task(request("merge"), false).unwrap();

    let mut renamed = request("merge");
    renamed.display_name = "Renamed".to_string();
    let merged = scheduler.add_task(renamed.clone(), true).unwrap();
    assert_eq!(merged.request.display_name, "Renamed");
    assert!(merged.foreground);
    assert_eq!(scheduler.list_tasks().unwrap().len(), 1);

    // A failed task gets another run and keeps its staged bytes.
    scheduler
        .store
        .update_state("merge", State::Failed, Reason::IoFailure)
        .unwrap();
    scheduler.store.update_progress("merge", 500, Some(1000)).unwrap();
    let merged = scheduler.add_task(renamed.clone(), false).unwrap();
    assert_eq!(merged.state, State::Queued);
    assert_eq!(merged.bytes_downloaded, 500);
    assert_eq!(merged.failure_reason, Reason::Default);

    // A completed task starts over from nothing.
    scheduler
        .store
        .update_state("merge", State::Completed, Reason::Default)
        .unwrap();
    scheduler
        .store
        .update_progress("merge", 1000, Some(1000))
        .unwrap();
    let merged = scheduler.add_task(renamed.clone(), false).unwrap();
    assert_eq!(merged.state, State::Queued);
    assert_eq!(merged.bytes_downloaded, 0);

    // A task on its way out cannot be re-added.
    scheduler
        .store
        .update_state("merge", State::Removing, Reason::Default)
        .unwrap();
    assert!(matches!(
        scheduler.add_task(renamed, false),
        Err(DownloadError::Conflict {
            state: State::Removing,
            ..
        })
    ));
}

// @tc.name: ut_scheduler_stop_reason
// @tc.desc: Test holding and releasing a task under a stop reason
// @tc.precon: NA
// @tc.step: 1. Hold a queued task under code 5, then re-code it
//           2. Release it with code zero
//           3. Try to hold a completed task
// @tc.expect: Codes persist, release behaves as resume, completed conflicts
// @tc.type: FUNC
// @tc.require: issues#ICN43B
#[tokio::test]
async fn ut_scheduler_stop_reason() {
    let (mut scheduler, _rx) = harness(0);
    scheduler.add_task(request("stop"), false).unwrap();

    scheduler.set_stop_reason("stop", 5, false).unwrap();
    let info = scheduler.get_task("stop").unwrap();
    assert_eq!(info.state, State::Paused);
    assert_eq!(info.stop_reason, 5);

    // Same code again is acknowledged without a change.
    scheduler.set_stop_reason("stop", 5, false).unwrap();
    scheduler.set_stop_reason("stop", 9, false).unwrap();
    assert_eq!(scheduler.get_task("stop").unwrap().stop_reason, 9);

    scheduler.set_stop_reason("stop", 0, false).unwrap();
    let info = scheduler.get_task("stop").unwrap();
    assert_eq!(info.state, State::Queued);
    assert_eq!(info.stop_reason, 0);

    scheduler
        .store
        .update_state("stop", State::Completed, Reason::Default)
        .unwrap();
    assert!(matches!(
        scheduler.set_stop_reason("stop", 4, false),
        Err(DownloadError::Conflict {
            state: State::Completed,
            ..
        })
    ));
    assert!(matches!(
        scheduler.set_stop_reason("missing", 4, false),
        Err(DownloadError::NotFound(_))
    ));
}

// @tc.name: ut_scheduler_remove
// @tc.desc: Test the two-phase removal of a task
// @tc.precon: NA
// @tc.step: 1. Remove a task with file deletion
//           2. Wait for the cleanup report and purge the record
// @tc.expect: The task is removing until cleanup lands, then gone together
// with its files
// @tc.type: FUNC
// @tc.require: issues#ICN43B
#[tokio::test]
async fn ut_scheduler_remove() {
    let (mut scheduler, mut rx) = harness(0);
    let request = request("remove");
    let destination = request.destination.clone();
    std::fs::write(&destination, b"payload").unwrap();
    scheduler.add_task(request, false).unwrap();

    scheduler.remove_task("remove", true).unwrap();
    assert_eq!(scheduler.get_task("remove").unwrap().state, State::Removing);
    // Idempotent while cleanup is in flight.
    scheduler.remove_task("remove", true).unwrap();

    let finished = next_remove_finished(&mut rx).await;
    assert_eq!(finished, "remove");
    scheduler.finish_remove("remove");

    assert!(matches!(
        scheduler.get_task("remove"),
        Err(DownloadError::NotFound(_))
    ));
    assert!(!destination.exists());
    assert!(matches!(
        scheduler.remove_task("remove", false),
        Err(DownloadError::NotFound(_))
    ));
}

// @tc.name: ut_scheduler_batches
// @tc.desc: Test the batch forms against a mixed catalogue
// @tc.precon: NA
// @tc.step: 1. Prepare queued, paused, completed and failed tasks
//           2. Pause all, resume all, then remove all
// @tc.expect: Pause all touches only runnable tasks, resume all only paused
// ones, remove all purges everything while keeping files
// @tc.type: FUNC
// @tc.require: issues#ICN43B
#[tokio::test]
async fn ut_scheduler_batches() {
    let (mut scheduler, mut rx) = harness(0);
    for name in ["batch_q", "batch_p", "batch_c", "batch_f"] {
        scheduler.add_task(request(name), false).unwrap();
    }
    scheduler.set_stop_reason("batch_p", 2, false).unwrap();
    scheduler
        .store
        .update_state("batch_c", State::Completed, Reason::Default)
        .unwrap();
    scheduler
        .store
        .update_state("batch_f", State::Failed, Reason::IoFailure)
        .unwrap();
    let destination = scheduler.get_task("batch_c").unwrap().request.destination;
    std::fs::write(&destination, b"kept").unwrap();

    scheduler.pause_all();
    assert_eq!(scheduler.get_task("batch_q").unwrap().state, State::Paused);
    assert_eq!(scheduler.get_task("batch_p").unwrap().state, State::Paused);
    assert_eq!(
        scheduler.get_task("batch_c").unwrap().state,
        State::Completed
    );
    assert_eq!(scheduler.get_task("batch_f").unwrap().state, State::Failed);

    scheduler.resume_all(false);
    assert_eq!(scheduler.get_task("batch_q").unwrap().state, State::Queued);
    let released = scheduler.get_task("batch_p").unwrap();
    assert_eq!(released.state, State::Queued);
    assert_eq!(released.stop_reason, 0);
    assert_eq!(
        scheduler.get_task("batch_c").unwrap().state,
        State::Completed
    );
    assert_eq!(scheduler.get_task("batch_f").unwrap().state, State::Failed);

    scheduler.remove_all();
    for _ in 0..4 {
        let task_id = next_remove_finished(&mut rx).await;
        scheduler.finish_remove(&task_id);
    }
    assert!(scheduler.list_tasks().unwrap().is_empty());
    // Batch removal never deletes downloaded files.
    assert!(destination.exists());
}

// @tc.name: ut_scheduler_task_events
// @tc.desc: Test progress application and terminal reports
// @tc.precon: NA
// @tc.step: 1. Apply progress for the running task and for a queued one
//           2. Apply a failure report
// @tc.expect: Only the running task's progress lands, failure records its
// reason, and the slot is refilled
// @tc.type: FUNC
// @tc.require: issues#ICN43A
#[tokio::test]
async fn ut_scheduler_task_events() {
    let (mut scheduler, _rx) = harness(1);
    scheduler.add_task(request("ev_a"), false).unwrap();
    scheduler.add_task(request("ev_b"), false).unwrap();

    scheduler.task_progress("ev_a", 100, Some(1000), 50);
    assert_eq!(scheduler.get_task("ev_a").unwrap().bytes_downloaded, 100);

    // Progress for a task without a live worker is stale and dropped.
    scheduler.task_progress("ev_b", 999, None, 0);
    assert_eq!(scheduler.get_task("ev_b").unwrap().bytes_downloaded, 0);

    scheduler.task_finished("ev_a", Some(Err(Reason::IoFailure)));
    let failed = scheduler.get_task("ev_a").unwrap();
    assert_eq!(failed.state, State::Failed);
    assert_eq!(failed.failure_reason, Reason::IoFailure);
    assert!(scheduler.queue.contains("ev_b"));

    // A worker lost without an outcome counts as an I/O failure.
    scheduler.task_finished("ev_b", None);
    assert_eq!(scheduler.get_task("ev_b").unwrap().state, State::Failed);
}

// @tc.name: ut_scheduler_restore
// @tc.desc: Test catalogue restoration on startup
// @tc.precon: NA
// @tc.step: 1. Seed a store with downloading, paused and removing records
//           2. Build a scheduler over it
// @tc.expect: Downloading returns to queued, paused stays, removing is
// cleaned up and purged
// @tc.type: FUNC
// @tc.require: issues#ICN43C
#[tokio::test]
async fn ut_scheduler_restore() {
    init();
    let store = TaskStore::open_in_memory().unwrap();
    for name in ["rest_d", "rest_p", "rest_r"] {
        let info = DownloadInfo::new(request(name), false, get_current_timestamp());
        store.insert(&info).unwrap();
    }
    store
        .update_state("rest_d", State::Downloading, Reason::Default)
        .unwrap();
    store.update_paused("rest_p", 4).unwrap();
    store
        .update_state("rest_r", State::Removing, Reason::Default)
        .unwrap();
    let destination = PathBuf::from("test_files/ut_sched_rest_r.bin");
    std::fs::write(&destination, b"kept").unwrap();

    let (mut scheduler, mut rx) = harness_with(store, 0);
    assert_eq!(scheduler.get_task("rest_d").unwrap().state, State::Queued);
    assert_eq!(scheduler.get_task("rest_p").unwrap().state, State::Paused);

    let task_id = next_remove_finished(&mut rx).await;
    assert_eq!(task_id, "rest_r");
    scheduler.finish_remove("rest_r");
    assert!(matches!(
        scheduler.get_task("rest_r"),
        Err(DownloadError::NotFound(_))
    ));
    // Restoration never deletes the destination; only staging leftovers go.
    assert!(destination.exists());
}

// @tc.name: ut_scheduler_shutdown
// @tc.desc: Test that shutdown lines running tasks up again
// @tc.precon: NA
// @tc.step: 1. Fill both slots and shut the scheduler down
// @tc.expect: The queue empties and every task is queued in the store
// @tc.type: FUNC
// @tc.require: issues#ICN43C
#[tokio::test]
async fn ut_scheduler_shutdown() {
    let (mut scheduler, _rx) = harness(2);
    for name in ["down_a", "down_b", "down_c"] {
        scheduler.add_task(request(name), false).unwrap();
    }
    assert_eq!(scheduler.queue.len(), 2);

    scheduler.shutdown();
    assert_eq!(scheduler.queue.len(), 0);
    for name in ["down_a", "down_b", "down_c"] {
        assert_eq!(scheduler.get_task(name).unwrap().state, State::Queued);
    }
}
