// Copyright 2025 eraflo
//
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

use super::{Delivery, Message};
use crate::ids::UniverseId;
use crate::thread::{ThreadKind, ThreadMask};
use std::sync::{PoisonError, RwLock};

struct Subscriber {
    universe: UniverseId,
    kind: ThreadKind,
    sender: flume::Sender<Delivery>,
}

/// The central dispatcher that fans messages out to structure queues.
///
/// Every structure subscribes once per universe with its [`ThreadKind`] and
/// receives a private [`MessageQueue`]. [`dispatch`](Self::dispatch) hands one
/// [`Delivery`] to every queue whose kind is in the message's thread mask.
pub struct MessageBus {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl MessageBus {
    /// Creates a bus without subscribers.
    pub fn new() -> Self {
        log::info!("MessageBus initialized.");
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Registers a structure and returns its private queue.
    pub fn subscribe(&self, universe: UniverseId, kind: ThreadKind) -> MessageQueue {
        let (sender, receiver) = flume::unbounded();
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                universe,
                kind,
                sender,
            });
        log::debug!("MessageBus: {kind:?} subscribed in {universe}");
        MessageQueue {
            universe,
            kind,
            receiver,
        }
    }

    /// Fans `message` out and returns the set of threads that received it.
    ///
    /// A message nobody subscribed to is freed immediately.
    pub fn dispatch(&self, message: Message) -> ThreadMask {
        let targets: Vec<(ThreadKind, flume::Sender<Delivery>)> = {
            let mut subscribers = self
                .subscribers
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            subscribers.retain(|s| !s.sender.is_disconnected());
            subscribers
                .iter()
                .filter(|s| s.universe == message.universe() && message.threads().contains(s.kind.mask()))
                .map(|s| (s.kind, s.sender.clone()))
                .collect()
        };

        if targets.is_empty() {
            log::trace!(
                "MessageBus: {:?} for {:?} has no consumer in {}",
                message.kind(),
                message.threads(),
                message.universe()
            );
            return ThreadMask::EMPTY;
        }

        let kinds: Vec<ThreadKind> = targets.iter().map(|(kind, _)| *kind).collect();
        let mut reached = ThreadMask::EMPTY;
        for (delivery, (kind, sender)) in Delivery::fan_out(message, &kinds).into_iter().zip(targets) {
            // A failed send hands the delivery back inside the error; dropping
            // it counts the message down like a normal consumer would.
            if let Err(e) = sender.send(delivery) {
                log::warn!("MessageBus: {kind:?} queue closed, dropping {:?}", e.0.kind());
            } else {
                reached |= kind.mask();
            }
        }
        reached
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A structure's private message queue.
#[derive(Debug)]
pub struct MessageQueue {
    universe: UniverseId,
    kind: ThreadKind,
    receiver: flume::Receiver<Delivery>,
}

impl MessageQueue {
    /// Takes every delivery queued so far.
    ///
    /// Messages dispatched while the caller processes the returned batch are
    /// left for the next drain.
    pub fn drain(&self) -> Vec<Delivery> {
        self.receiver.drain().collect()
    }

    /// Number of deliveries waiting.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Returns `true` if nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// The thread kind this queue was registered for.
    pub fn kind(&self) -> ThreadKind {
        self.kind
    }

    /// The universe this queue was registered in.
    pub fn universe(&self) -> UniverseId {
        self.universe
    }
}
