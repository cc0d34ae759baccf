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

//! Messages and the per-consumer delivery handles that count them down.

use super::MessageType;
use crate::ids::{BehaviorId, ComponentId, UniverseId};
use crate::thread::{ThreadKind, ThreadMask};
use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// The number of argument slots a message carries.
pub const MAX_ARGS: usize = 6;

static EMPTY_ARG: MessageArg = MessageArg::Empty;

/// One opaque argument slot.
#[derive(Clone, Default)]
pub enum MessageArg {
    /// Unused slot.
    #[default]
    Empty,
    /// An integer value (post ids, intervals, enum ordinals).
    Int(i64),
    /// A floating point value.
    Float(f64),
    /// A boolean flag.
    Bool(bool),
    /// A change mask.
    Bits(u64),
    /// A component reference.
    Component(ComponentId),
    /// A behavior reference.
    Behavior(BehaviorId),
    /// Any shared value; consumers downcast to the type they expect.
    Value(Arc<dyn Any + Send + Sync>),
}

impl MessageArg {
    /// Wraps any shareable value.
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        MessageArg::Value(Arc::new(value))
    }

    /// Returns the integer payload, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            MessageArg::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the boolean payload, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MessageArg::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the change mask payload, if any.
    pub fn as_bits(&self) -> Option<u64> {
        match self {
            MessageArg::Bits(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the component reference, if any.
    pub fn as_component(&self) -> Option<ComponentId> {
        match self {
            MessageArg::Component(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the behavior reference, if any.
    pub fn as_behavior(&self) -> Option<BehaviorId> {
        match self {
            MessageArg::Behavior(id) => Some(*id),
            _ => None,
        }
    }

    /// Downcasts a [`MessageArg::Value`] payload.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            MessageArg::Value(value) => Arc::clone(value).downcast::<T>().ok(),
            _ => None,
        }
    }
}

impl fmt::Debug for MessageArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageArg::Empty => write!(f, "Empty"),
            MessageArg::Int(v) => write!(f, "Int({v})"),
            MessageArg::Float(v) => write!(f, "Float({v})"),
            MessageArg::Bool(v) => write!(f, "Bool({v})"),
            MessageArg::Bits(v) => write!(f, "Bits({v:#x})"),
            MessageArg::Component(id) => write!(f, "{id}"),
            MessageArg::Behavior(id) => write!(f, "{id}"),
            MessageArg::Value(_) => write!(f, "Value(..)"),
        }
    }
}

/// A typed record describing one live-graph mutation.
///
/// Built by the mutating thread, then handed to the bus which fans it out.
/// After dispatch it is immutable: consumers only ever see it through a
/// [`Delivery`].
#[derive(Debug, Clone)]
pub struct Message {
    kind: MessageType,
    threads: ThreadMask,
    universe: UniverseId,
    object: MessageArg,
    args: [MessageArg; MAX_ARGS],
}

impl Message {
    /// Starts a message of `kind` for the given target threads.
    pub fn new(kind: MessageType, threads: ThreadMask, universe: UniverseId) -> Self {
        Self {
            kind,
            threads,
            universe,
            object: MessageArg::Empty,
            args: Default::default(),
        }
    }

    /// Sets the object the message is about.
    #[must_use]
    pub fn with_object(mut self, object: MessageArg) -> Self {
        self.object = object;
        self
    }

    /// Fills one argument slot. Out-of-range slots are logged and ignored.
    #[must_use]
    pub fn with_arg(mut self, slot: usize, arg: MessageArg) -> Self {
        match self.args.get_mut(slot) {
            Some(target) => *target = arg,
            None => log::warn!(
                "Message {:?}: argument slot {} out of range, dropped",
                self.kind,
                slot
            ),
        }
        self
    }

    /// The message kind.
    pub fn kind(&self) -> MessageType {
        self.kind
    }

    /// The threads this message targets.
    pub fn threads(&self) -> ThreadMask {
        self.threads
    }

    /// The universe this message belongs to.
    pub fn universe(&self) -> UniverseId {
        self.universe
    }

    /// The object the message is about.
    pub fn object(&self) -> &MessageArg {
        &self.object
    }

    /// The argument in `slot`; empty for unused or out-of-range slots.
    pub fn arg(&self, slot: usize) -> &MessageArg {
        self.args.get(slot).unwrap_or(&EMPTY_ARG)
    }
}

struct Shared {
    message: Message,
    pending: AtomicUsize,
}

/// One consumer's claim on a dispatched message.
///
/// A message fanned out to N structures produces N deliveries sharing a
/// single count. Each delivery decrements the count exactly once, when it
/// is dropped (or explicitly [`release`](Self::release)d); the message and
/// its arguments are freed together with the last one. Deferring work is
/// done by keeping the delivery alive.
pub struct Delivery {
    shared: Arc<Shared>,
    consumer: ThreadKind,
}

impl Delivery {
    /// Wraps `message` for `consumers.len()` consumers, one delivery each.
    pub(crate) fn fan_out(message: Message, consumers: &[ThreadKind]) -> Vec<Delivery> {
        let shared = Arc::new(Shared {
            message,
            pending: AtomicUsize::new(consumers.len()),
        });
        consumers
            .iter()
            .map(|&consumer| Delivery {
                shared: Arc::clone(&shared),
                consumer,
            })
            .collect()
    }

    /// The structure this delivery was queued for.
    pub fn consumer(&self) -> ThreadKind {
        self.consumer
    }

    /// How many consumers (this one included) still hold the message.
    pub fn pending_consumers(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Consumes the delivery, counting the message down.
    pub fn release(self) {}
}

impl Deref for Delivery {
    type Target = Message;

    fn deref(&self) -> &Message {
        &self.shared.message
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        let previous = self.shared.pending.fetch_sub(1, Ordering::AcqRel);
        if previous == 1 {
            log::trace!(
                "{:?} released by every consumer (last: {:?})",
                self.shared.message.kind,
                self.consumer
            );
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("kind", &self.shared.message.kind)
            .field("consumer", &self.consumer)
            .field("pending", &self.pending_consumers())
            .finish()
    }
}
