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

//! Publication point for task events.
//!
//! Everything the engine tells subscribers funnels through here, on the task
//! manager's loop, which is what keeps events for one task id in production
//! order.

use crate::service::client::{ClientEvent, ClientManagerEntry};
use crate::task::info::DownloadInfo;
use crate::task::notify::Event;

pub(crate) struct Notifier;

impl Notifier {
    pub(crate) fn progress(
        client_manager: &ClientManagerEntry,
        task_id: &str,
        percent: Option<f64>,
        speed: u64,
    ) {
        let event = Event::Progress {
            id: task_id.to_string(),
            percent,
            speed,
        };
        client_manager.send_event(ClientEvent::Publish(event));
    }

    pub(crate) fn changed(client_manager: &ClientManagerEntry, info: DownloadInfo) {
        client_manager.send_event(ClientEvent::Publish(Event::Changed(info)));
    }

    pub(crate) fn removed(client_manager: &ClientManagerEntry, info: DownloadInfo) {
        client_manager.send_event(ClientEvent::Publish(Event::Removed(info)));
    }
}
