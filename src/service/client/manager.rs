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

use std::collections::HashMap;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use super::{Client, ClientEvent, SubscribeScope};
use crate::task::notify::Event;

#[derive(Clone)]
pub(crate) struct ClientManagerEntry {
    tx: UnboundedSender<ClientEvent>,
}

impl ClientManagerEntry {
    fn new(tx: UnboundedSender<ClientEvent>) -> Self {
        Self { tx }
    }

    pub(crate) fn send_event(&self, event: ClientEvent) -> bool {
        if self.tx.send(event).is_err() {
            error!("Sends ClientEvent failed, client manager already shut down");
            return false;
        }
        true
    }
}

struct ClientHandle {
    session_id: u64,
    scope: SubscribeScope,
    tx: UnboundedSender<Event>,
}

/// Owns every subscription and fans published events out to their pumps.
pub(crate) struct ClientManager {
    clients: HashMap<u64, ClientHandle>,
    // One narrowed subscription per session; keyed by session id.
    narrowed: HashMap<u64, u64>,
    rx: UnboundedReceiver<ClientEvent>,
}

impl ClientManager {
    pub(crate) fn init() -> ClientManagerEntry {
        debug!("ClientManager init");
        let (tx, rx) = unbounded_channel();
        let client_manager = ClientManager {
            clients: HashMap::new(),
            narrowed: HashMap::new(),
            rx,
        };
        tokio::spawn(client_manager.run());
        ClientManagerEntry::new(tx)
    }

    async fn run(mut self) {
        loop {
            let recv = match self.rx.recv().await {
                Some(event) => event,
                None => {
                    error!("ClientManager channel closed unexpectedly");
                    return;
                }
            };

            match recv {
                ClientEvent::Subscribe(subscription_id, session_id, scope, handoff) => {
                    self.handle_subscribe(subscription_id, session_id, scope, handoff)
                }
                ClientEvent::Unsubscribe(subscription_id) => {
                    self.handle_unsubscribe(subscription_id)
                }
                ClientEvent::SessionClosed(session_id) => self.handle_session_closed(session_id),
                ClientEvent::Publish(event) => self.handle_publish(event),
                ClientEvent::Terminate => {
                    info!("ClientManager terminate");
                    self.clients.clear();
                    self.narrowed.clear();
                    return;
                }
            }

            debug!("ClientManager handles message done");
        }
    }

    fn handle_subscribe(
        &mut self,
        subscription_id: u64,
        session_id: u64,
        scope: SubscribeScope,
        handoff: tokio::sync::mpsc::Sender<Event>,
    ) {
        if let SubscribeScope::Task(_) = scope {
            // A session keeps at most one narrowed subscription; the new
            // one replaces whatever was there.
            if let Some(old) = self.narrowed.insert(session_id, subscription_id) {
                self.clients.remove(&old);
                debug!("subscription {} replaced by {}", old, subscription_id);
            }
        }
        let tx = Client::constructor(subscription_id, handoff);
        self.clients.insert(
            subscription_id,
            ClientHandle {
                session_id,
                scope,
                tx,
            },
        );
        debug!("session {} opens subscription {}", session_id, subscription_id);
    }

    fn handle_unsubscribe(&mut self, subscription_id: u64) {
        if self.clients.remove(&subscription_id).is_some() {
            debug!("subscription {} closed", subscription_id);
        }
        self.narrowed.retain(|_, sub| *sub != subscription_id);
    }

    fn handle_session_closed(&mut self, session_id: u64) {
        self.narrowed.remove(&session_id);
        self.clients.retain(|_, client| client.session_id != session_id);
        debug!("session {} closed", session_id);
    }

    fn handle_publish(&mut self, event: Event) {
        let mut dead = Vec::new();
        for (subscription_id, client) in self.clients.iter() {
            if !client.scope.matches(&event) {
                continue;
            }
            if client.tx.send(event.clone()).is_err() {
                dead.push(*subscription_id);
            }
        }
        for subscription_id in dead {
            self.handle_unsubscribe(subscription_id);
        }
    }
}
