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

//! Subscriber plumbing.
//!
//! Each subscription gets its own pump task between the publication point
//! and the subscriber's stream. The pump batches what has piled up, keeps
//! only the freshest progress per task, and never lets one slow subscriber
//! hold up the rest of the engine.

pub(crate) mod manager;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::{channel, unbounded_channel, Receiver, Sender, UnboundedReceiver, UnboundedSender};
use tokio::time::timeout;

pub(crate) use self::manager::ClientManagerEntry;
use crate::task::notify::Event;

/// Buffered events per subscriber before the pump starts skipping.
const EVENT_BUFFER: usize = 64;

/// How long the pump waits on a full subscriber before skipping an event.
const FORWARD_TIMEOUT: Duration = Duration::from_millis(500);

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Events handled by the client manager.
pub(crate) enum ClientEvent {
    /// A new subscription with its delivery channel.
    Subscribe(u64, u64, SubscribeScope, Sender<Event>),
    /// A subscriber's stream was dropped.
    Unsubscribe(u64),
    /// A session closed; all of its subscriptions end.
    SessionClosed(u64),
    /// A task event to fan out.
    Publish(Event),
    /// Engine shutdown; every subscription ends.
    Terminate,
}

/// What a subscription wants to hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SubscribeScope {
    /// Every task.
    All,
    /// One task id.
    Task(String),
}

impl SubscribeScope {
    fn matches(&self, event: &Event) -> bool {
        match self {
            SubscribeScope::All => true,
            SubscribeScope::Task(id) => event.task_id() == id,
        }
    }
}

impl ClientManagerEntry {
    pub(crate) fn unsubscribe(&self, subscription_id: u64) {
        self.send_event(ClientEvent::Unsubscribe(subscription_id));
    }

    pub(crate) fn session_closed(&self, session_id: u64) {
        self.send_event(ClientEvent::SessionClosed(session_id));
    }

    pub(crate) fn terminate(&self) {
        self.send_event(ClientEvent::Terminate);
    }
}

/// Opens a stream of events for `scope`. The stream ends when the engine
/// shuts down, the session closes, or a narrowed subscription from the same
/// session replaces this one.
pub(crate) fn subscribe_stream(
    client_manager: &ClientManagerEntry,
    session_id: u64,
    scope: SubscribeScope,
) -> EventStream {
    let subscription_id = NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed);
    let (handoff, rx) = channel(EVENT_BUFFER);
    client_manager.send_event(ClientEvent::Subscribe(
        subscription_id,
        session_id,
        scope,
        handoff,
    ));
    EventStream {
        subscription_id,
        rx,
        client_manager: client_manager.clone(),
    }
}

/// A live subscription to task events.
///
/// Dropping the stream cancels the subscription.
pub struct EventStream {
    subscription_id: u64,
    rx: Receiver<Event>,
    client_manager: ClientManagerEntry,
}

impl EventStream {
    /// The next event, or `None` once the subscription has ended.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.client_manager.unsubscribe(self.subscription_id);
    }
}

/// The pump between the client manager and one subscriber.
pub(crate) struct Client {
    subscription_id: u64,
    rx: UnboundedReceiver<Event>,
    handoff: Sender<Event>,
}

impl Client {
    /// Spawns the pump and returns the sender the manager feeds it with.
    pub(crate) fn constructor(subscription_id: u64, handoff: Sender<Event>) -> UnboundedSender<Event> {
        let (tx, rx) = unbounded_channel();
        let client = Client {
            subscription_id,
            rx,
            handoff,
        };
        tokio::spawn(client.run());
        tx
    }

    async fn run(mut self) {
        loop {
            // For one task, only the last progress event is worth sending.
            let mut progress_index = HashMap::new();
            let mut batch = Vec::new();
            let mut len = self.rx.len();
            if len == 0 {
                len = 1;
            }
            for index in 0..len {
                let event = match self.rx.recv().await {
                    Some(event) => event,
                    None => {
                        debug!("client {} unsubscribed", self.subscription_id);
                        return;
                    }
                };
                if event.is_progress() {
                    progress_index.insert(event.task_id().to_string(), index);
                }
                batch.push(event);
            }

            // Forward the batch, skipping superseded progress events.
            for (index, event) in batch.into_iter().enumerate() {
                if event.is_progress() && progress_index.get(event.task_id()) != Some(&index) {
                    continue;
                }
                match timeout(FORWARD_TIMEOUT, self.handoff.send(event)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) => {
                        debug!("client {} stream dropped", self.subscription_id);
                        return;
                    }
                    Err(_) => {
                        debug!("client {} not keeping up, event skipped", self.subscription_id);
                    }
                }
            }
        }
    }
}
