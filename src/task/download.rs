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

//! Transfer worker for download tasks.
//!
//! One worker owns one admitted task. It streams the response body into the
//! staging file, resumes from the staged length with a range request, retries
//! transient errors with a linear backoff, and reports progress back to the
//! task manager. Cancellation is cooperative through an abort flag checked at
//! every I/O boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::{Response, StatusCode};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::time::{sleep, timeout};

use crate::manage::events::{TaskEvent, TaskManagerEvent};
use crate::manage::task_manager::TaskManagerTx;
use crate::task::files;
use crate::task::reason::Reason;
use crate::task::request_task::{RequestTask, TaskError, TaskPhase};
use crate::task::speed::SpeedMeter;

/// How often progress is reported while the body streams in.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Cap on the linear backoff between attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Drives one task until it completes, fails, or is cancelled.
///
/// The outcome is left in the task's `running_result`; the drop guard wrapped
/// around this future reports it to the task manager.
pub(crate) async fn download(
    task: Arc<RequestTask>,
    abort_flag: Arc<AtomicBool>,
    tx: TaskManagerTx,
) {
    task.tries.store(0, Ordering::SeqCst);
    loop {
        match download_inner(&task, &abort_flag, &tx).await {
            Ok(()) => {
                *task.running_result.lock().unwrap() = Some(Ok(()));
            }
            Err(TaskError::Waiting(TaskPhase::UserAbort)) => {}
            Err(TaskError::Waiting(TaskPhase::NeedRetry)) => {
                let tries = task.tries.fetch_add(1, Ordering::SeqCst) + 1;
                if tries < task.retry_budget {
                    backoff(tries).await;
                    if !abort_flag.load(Ordering::Acquire) {
                        continue;
                    }
                } else {
                    error!("{} retry budget exhausted", task.task_id());
                    *task.running_result.lock().unwrap() = Some(Err(Reason::IoFailure));
                }
            }
            Err(TaskError::Failed(reason)) => {
                *task.running_result.lock().unwrap() = Some(Err(reason));
            }
        }
        break;
    }
}

/// Sleeps before attempt `tries + 1`. The delay grows linearly with the
/// number of failed attempts.
async fn backoff(tries: u32) {
    let delay = Duration::from_secs(u64::from(tries.saturating_sub(1))).min(MAX_BACKOFF);
    if !delay.is_zero() {
        sleep(delay).await;
    }
}

/// One transfer attempt.
async fn download_inner(
    task: &Arc<RequestTask>,
    abort_flag: &Arc<AtomicBool>,
    tx: &TaskManagerTx,
) -> Result<(), TaskError> {
    let (mut file, staged) = match files::open_staging(&task.request.destination).await {
        Ok(opened) => opened,
        Err(e) => {
            error!("{} open staging failed: {}", task.task_id(), e);
            return Err(TaskError::Failed(Reason::IoFailure));
        }
    };
    let mut downloaded = staged;
    // The staging file is the source of truth for resume points.
    task.set_bytes(downloaded);

    info!("{} downloading from byte {}", task.task_id(), downloaded);

    let mut request = task.client.get(task.request.uri.as_str());
    if downloaded > 0 {
        request = request.header(RANGE, format!("bytes={}-", downloaded));
    }
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            error!("{} request failed: {}", task.task_id(), e);
            return Err(TaskError::Waiting(TaskPhase::NeedRetry));
        }
    };

    let status = response.status();
    info!("{} response {}", task.task_id(), status);
    if status == StatusCode::RANGE_NOT_SATISFIABLE {
        // Staged content no longer matches the origin; start over.
        restart_fresh(task, &mut file).await?;
        return Err(TaskError::Waiting(TaskPhase::NeedRetry));
    }
    if !status.is_success() {
        return Err(TaskError::Waiting(TaskPhase::NeedRetry));
    }
    if downloaded > 0 && status == StatusCode::OK {
        // The origin ignored the range header and sends the full body.
        restart_fresh(task, &mut file).await?;
        downloaded = 0;
    }

    let total = total_bytes(&response, downloaded);
    task.set_total(total);
    if let Some(total) = total {
        if downloaded > total {
            error!(
                "{} staged {} bytes but origin reports {}",
                task.task_id(),
                downloaded,
                total
            );
            restart_fresh(task, &mut file).await?;
            return Err(TaskError::Waiting(TaskPhase::NeedRetry));
        }
    }

    publish_progress(tx, task, downloaded, total, 0);

    let mut meter = SpeedMeter::new();
    let mut last_publish = Instant::now();
    let mut body = response.bytes_stream();
    loop {
        if abort_flag.load(Ordering::Acquire) {
            return Err(TaskError::Waiting(TaskPhase::UserAbort));
        }
        let chunk = match timeout(task.read_timeout, body.next()).await {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(e))) => {
                error!("{} body error: {}", task.task_id(), e);
                return Err(TaskError::Waiting(TaskPhase::NeedRetry));
            }
            Ok(None) => break,
            Err(_) => {
                error!("{} read timed out", task.task_id());
                return Err(TaskError::Waiting(TaskPhase::NeedRetry));
            }
        };
        if let Err(e) = file.write_all(&chunk).await {
            error!("{} write failed: {}", task.task_id(), e);
            return Err(TaskError::Failed(Reason::IoFailure));
        }
        let progress = task.record_chunk(chunk.len() as u64);
        if last_publish.elapsed() >= PROGRESS_INTERVAL {
            let now = Instant::now();
            let speed = meter.record(now, progress.bytes_downloaded);
            publish_progress(
                tx,
                task,
                progress.bytes_downloaded,
                progress.total_bytes,
                speed,
            );
            last_publish = now;
        }
    }

    // Body exhausted; verify the length before surfacing the file.
    if let Err(e) = file.sync_all().await {
        error!("{} sync failed: {}", task.task_id(), e);
        return Err(TaskError::Failed(Reason::IoFailure));
    }
    let mut progress = task.progress();
    match progress.total_bytes {
        Some(total) if progress.bytes_downloaded != total => {
            error!(
                "{} body ended at {} of {}",
                task.task_id(),
                progress.bytes_downloaded,
                total
            );
            return Err(TaskError::Waiting(TaskPhase::NeedRetry));
        }
        Some(_) => {}
        None => {
            // No declared length; end of body defines the total.
            progress.total_bytes = Some(progress.bytes_downloaded);
            task.set_total(progress.total_bytes);
        }
    }
    drop(file);
    if let Err(e) = files::finalize(&task.request.destination).await {
        error!("{} finalize failed: {}", task.task_id(), e);
        return Err(TaskError::Failed(Reason::IoFailure));
    }

    let speed = meter.record(Instant::now(), progress.bytes_downloaded);
    publish_progress(
        tx,
        task,
        progress.bytes_downloaded,
        progress.total_bytes,
        speed,
    );
    info!("{} downloaded", task.task_id());
    Ok(())
}

/// Truncates the staging file and resets the counter so the next bytes land
/// at offset zero.
async fn restart_fresh(task: &RequestTask, file: &mut File) -> Result<(), TaskError> {
    if let Err(e) = file.set_len(0).await {
        error!("{} truncate failed: {}", task.task_id(), e);
        return Err(TaskError::Failed(Reason::IoFailure));
    }
    task.set_bytes(0);
    Ok(())
}

/// Total content length as declared by this response, if any.
///
/// Partial responses carry the full length behind the slash of
/// `Content-Range`; plain responses declare it in `Content-Length`.
fn total_bytes(response: &Response, downloaded: u64) -> Option<u64> {
    if response.status() == StatusCode::PARTIAL_CONTENT {
        let declared = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.rsplit('/').next())
            .and_then(|value| value.parse::<u64>().ok());
        if declared.is_some() {
            return declared;
        }
        return response.content_length().map(|rest| downloaded + rest);
    }
    response.content_length()
}

fn publish_progress(
    tx: &TaskManagerTx,
    task: &RequestTask,
    bytes_downloaded: u64,
    total_bytes: Option<u64>,
    speed: u64,
) {
    tx.send_event(TaskManagerEvent::Task(TaskEvent::Progress {
        task_id: task.task_id().to_string(),
        bytes_downloaded,
        total_bytes,
        speed,
    }));
}
