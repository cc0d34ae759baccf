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

use super::attributes::{AttributeKind, AttributeValue};
use arbor_core::message::{Message, MessageArg, MessageType};
use arbor_core::{ComponentId, ThreadMask, TicketAllocator, UniverseId};

/// Threads that consume attribute changes.
pub const ATTRIBUTE_CONSUMERS: ThreadMask =
    ThreadMask::UPDATE_RENDERING_ATTRIBUTES.with(ThreadMask::UPDATE_RENDER);

/// Argument slot carrying the change mask.
pub const ARG_CHANGES: usize = 0;
/// Argument slot carrying the [`AttributeValue`] snapshot.
pub const ARG_SNAPSHOT: usize = 1;
/// Argument slot carrying the frequently-mutated flag.
pub const ARG_FREQUENT: usize = 2;

/// The application-side copy of an attribute component.
///
/// Setters never touch renderer state. While the component is live, every
/// effective change produces a message the caller hands to the coordinator;
/// the rendering-attributes structure applies it to the mirror.
#[derive(Debug)]
pub struct RetainedComponent {
    id: ComponentId,
    universe: UniverseId,
    value: AttributeValue,
    frequent: bool,
    live: bool,
}

impl RetainedComponent {
    /// Creates a detached component.
    pub fn new(ids: &TicketAllocator, universe: UniverseId, value: impl Into<AttributeValue>) -> Self {
        Self {
            id: ids.component(),
            universe,
            value: value.into(),
            frequent: false,
            live: false,
        }
    }

    /// This component's id.
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// The universe the component belongs to.
    pub fn universe(&self) -> UniverseId {
        self.universe
    }

    /// The kind of attributes held.
    pub fn kind(&self) -> AttributeKind {
        self.value.kind()
    }

    /// The current application-side value.
    pub fn value(&self) -> &AttributeValue {
        &self.value
    }

    /// Returns `true` while attached to a live graph.
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Flags the component as frequently mutated, letting the structure batch
    /// its mirror updates once per frame.
    pub fn set_frequent(&mut self, frequent: bool) {
        self.frequent = frequent;
    }

    /// Returns `true` if mirror updates may be batched.
    pub fn is_frequent(&self) -> bool {
        self.frequent
    }

    fn message(&self, kind: MessageType) -> Message {
        Message::new(kind, ATTRIBUTE_CONSUMERS, self.universe)
            .with_object(MessageArg::Component(self.id))
            .with_arg(ARG_SNAPSHOT, MessageArg::value(self.value.clone()))
            .with_arg(ARG_FREQUENT, MessageArg::Bool(self.frequent))
    }

    /// Marks the component live; the message creates its mirror.
    pub fn insert_message(&mut self) -> Message {
        self.live = true;
        self.message(MessageType::ComponentInserted)
    }

    /// Marks the component detached; the message drops its mirror.
    pub fn remove_message(&mut self) -> Message {
        self.live = false;
        Message::new(MessageType::ComponentRemoved, ATTRIBUTE_CONSUMERS, self.universe)
            .with_object(MessageArg::Component(self.id))
    }

    /// Applies `edit` to the value.
    ///
    /// Returns the change message when the component is live and something
    /// changed. An edit that switches the attribute kind is rejected.
    pub fn update(&mut self, edit: impl FnOnce(&mut AttributeValue)) -> Option<Message> {
        let previous = self.value.clone();
        edit(&mut self.value);
        let Some(changes) = self.value.changes(&previous) else {
            log::warn!(
                "RetainedComponent {}: edit changed kind {:?} to {:?}, rejected",
                self.id,
                previous.kind(),
                self.value.kind()
            );
            self.value = previous;
            return None;
        };
        if changes == 0 || !self.live {
            return None;
        }
        Some(
            self.message(self.kind().change_message())
                .with_arg(ARG_CHANGES, MessageArg::Bits(changes)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ColoringAttributes, LineAttributes};
    use arbor_core::math::Vec3;

    #[test]
    fn detached_edits_produce_no_message() {
        let ids = TicketAllocator::new();
        let mut line = RetainedComponent::new(&ids, UniverseId(1), LineAttributes::default());
        let message = line.update(|value| {
            if let AttributeValue::Line(line) = value {
                line.width = 3.0;
            }
        });
        assert!(message.is_none());
        assert_eq!(
            line.value(),
            &AttributeValue::Line(LineAttributes {
                width: 3.0,
                ..LineAttributes::default()
            })
        );
    }

    #[test]
    fn live_edits_carry_mask_and_snapshot() {
        let ids = TicketAllocator::new();
        let mut coloring =
            RetainedComponent::new(&ids, UniverseId(1), ColoringAttributes::default());
        coloring.insert_message();

        let message = coloring
            .update(|value| {
                if let AttributeValue::Coloring(c) = value {
                    c.color = Vec3::new(1.0, 0.0, 0.0);
                }
            })
            .expect("live change");

        assert_eq!(message.kind(), MessageType::ColoringAttributesChanged);
        assert_eq!(message.threads(), ATTRIBUTE_CONSUMERS);
        assert_eq!(message.arg(ARG_CHANGES).as_bits(), Some(0b1));
        let snapshot = message.arg(ARG_SNAPSHOT).downcast::<AttributeValue>().unwrap();
        assert_eq!(&*snapshot, coloring.value());

        assert!(coloring.update(|_| {}).is_none());
    }

    #[test]
    fn kind_switch_is_rejected() {
        let ids = TicketAllocator::new();
        let mut coloring =
            RetainedComponent::new(&ids, UniverseId(1), ColoringAttributes::default());
        coloring.insert_message();
        let message = coloring.update(|value| *value = LineAttributes::default().into());
        assert!(message.is_none());
        assert_eq!(coloring.kind(), AttributeKind::Coloring);
    }
}
