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

//! Transfer speed measurement.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

const SPEED_WINDOW: Duration = Duration::from_secs(3);

/// Sliding window speed meter fed by the cumulative byte counter.
pub(crate) struct SpeedMeter {
    samples: VecDeque<(Instant, u64)>,
}

impl SpeedMeter {
    pub(crate) fn new() -> Self {
        Self {
            samples: VecDeque::new(),
        }
    }

    /// Records the counter value at `now` and returns the speed in bytes per
    /// second averaged over the recent window.
    pub(crate) fn record(&mut self, now: Instant, bytes_downloaded: u64) -> u64 {
        self.samples.push_back((now, bytes_downloaded));
        while let Some(&(earliest, _)) = self.samples.front() {
            if now.duration_since(earliest) > SPEED_WINDOW && self.samples.len() > 2 {
                self.samples.pop_front();
            } else {
                break;
            }
        }

        let (earliest, start_bytes) = match self.samples.front() {
            Some(&sample) => sample,
            None => return 0,
        };
        let elapsed = now.duration_since(earliest).as_secs_f64();
        if elapsed <= 0.0 {
            return 0;
        }
        (bytes_downloaded.saturating_sub(start_bytes) as f64 / elapsed) as u64
    }
}
