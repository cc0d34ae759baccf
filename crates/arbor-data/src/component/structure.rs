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

//! # Rendering-Attributes Structure
//!
//! Keeps the renderer-visible mirrors of every live attribute component in
//! a universe. Mirrors change only here, from bus messages, so the renderer
//! never observes a half-applied edit.

use super::attributes::{AttributeKind, AttributeValue};
use super::retained::{ARG_CHANGES, ARG_FREQUENT, ARG_SNAPSHOT};
use arbor_core::message::{Delivery, MessageBus, MessageQueue, MessageType};
use arbor_core::{ComponentId, ScheduledThread, ThreadKind, UniverseId};
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

/// The renderer-side shadow of one attribute component.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeMirror {
    value: AttributeValue,
    version: u64,
    changed: u64,
}

impl AttributeMirror {
    /// The mirrored value.
    pub fn value(&self) -> &AttributeValue {
        &self.value
    }

    /// The kind of the mirrored component.
    pub fn kind(&self) -> AttributeKind {
        self.value.kind()
    }

    /// Number of changes applied since creation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Fields changed since the pipeline last saw this mirror.
    pub fn changed(&self) -> u64 {
        self.changed
    }
}

/// The outbound boundary to a native rendering pipeline.
///
/// Only validated mirror state crosses it.
pub trait RenderPipeline {
    /// Uploads `mirror` for `component`. `changed` holds one bit per field
    /// changed since the previous upload, all bits for a new mirror.
    fn update(&mut self, component: ComponentId, mirror: &AttributeMirror, changed: u64) -> anyhow::Result<()>;

    /// Releases pipeline state of a removed component.
    fn release(&mut self, component: ComponentId) {
        let _ = component;
    }
}

/// The rendering-attributes structure of one universe.
pub struct RenderingAttributesStructure {
    universe: UniverseId,
    queue: MessageQueue,
    mirrors: HashMap<ComponentId, AttributeMirror>,
    deferred: Vec<Delivery>,
    dirty: BTreeSet<ComponentId>,
    released: Vec<ComponentId>,
}

impl RenderingAttributesStructure {
    /// Creates the structure and subscribes it to `bus`.
    pub fn new(universe: UniverseId, bus: &MessageBus) -> Self {
        log::info!("RenderingAttributesStructure created for {universe}");
        Self {
            universe,
            queue: bus.subscribe(universe, ThreadKind::UpdateRenderingAttributes),
            mirrors: HashMap::new(),
            deferred: Vec::new(),
            dirty: BTreeSet::new(),
            released: Vec::new(),
        }
    }

    /// The mirror of `component`.
    pub fn mirror(&self, component: ComponentId) -> Option<&AttributeMirror> {
        self.mirrors.get(&component)
    }

    /// Number of live mirrors.
    pub fn mirror_count(&self) -> usize {
        self.mirrors.len()
    }

    /// Number of changes waiting for [`update_object`](Self::update_object).
    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }

    /// Drains the queue.
    ///
    /// Changes to frequently mutated components are held until
    /// [`update_object`](Self::update_object); appearance changes and
    /// everything else apply at once. Unknown kinds are dropped.
    pub fn process_messages(&mut self) {
        for delivery in self.queue.drain() {
            match delivery.kind() {
                MessageType::ComponentInserted => self.create_mirror(&delivery),
                MessageType::ComponentRemoved => self.remove_mirror(&delivery),
                kind => match AttributeKind::from_change_message(kind) {
                    Some(attribute) => {
                        let frequent = delivery.arg(ARG_FREQUENT).as_bool().unwrap_or(false);
                        if frequent && !attribute.is_appearance() {
                            self.deferred.push(delivery);
                        } else {
                            self.apply_deferred_of(&delivery);
                            self.apply(&delivery);
                        }
                    }
                    None => log::trace!("RenderingAttributesStructure: ignoring {kind:?}"),
                },
            }
        }
    }

    /// Applies every deferred change, in arrival order. Run once per frame
    /// after [`process_messages`](Self::process_messages).
    pub fn update_object(&mut self) {
        for delivery in std::mem::take(&mut self.deferred) {
            self.apply(&delivery);
        }
    }

    /// Applies the changes still held for the component of `delivery`, so a
    /// newer immediate change is never overwritten by an older deferred one.
    fn apply_deferred_of(&mut self, delivery: &Delivery) {
        let Some(component) = delivery.object().as_component() else {
            return;
        };
        let (held, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.deferred)
            .into_iter()
            .partition(|d| d.object().as_component() == Some(component));
        self.deferred = rest;
        for delivery in held {
            self.apply(&delivery);
        }
    }

    fn create_mirror(&mut self, delivery: &Delivery) {
        let (Some(component), Some(value)) = (
            delivery.object().as_component(),
            delivery.arg(ARG_SNAPSHOT).downcast::<AttributeValue>(),
        ) else {
            log::warn!("RenderingAttributesStructure: malformed insert");
            return;
        };
        self.mirrors.insert(
            component,
            AttributeMirror {
                value: (*value).clone(),
                version: 0,
                changed: u64::MAX,
            },
        );
        self.dirty.insert(component);
        log::debug!("RenderingAttributesStructure: mirror created for {component}");
    }

    fn remove_mirror(&mut self, delivery: &Delivery) {
        let Some(component) = delivery.object().as_component() else {
            return;
        };
        if self.mirrors.remove(&component).is_some() {
            self.deferred
                .retain(|d| d.object().as_component() != Some(component));
            self.dirty.remove(&component);
            self.released.push(component);
        }
    }

    fn apply(&mut self, delivery: &Delivery) {
        let (Some(component), Some(value)) = (
            delivery.object().as_component(),
            delivery.arg(ARG_SNAPSHOT).downcast::<AttributeValue>(),
        ) else {
            log::warn!("RenderingAttributesStructure: malformed {:?}", delivery.kind());
            return;
        };
        let Some(mirror) = self.mirrors.get_mut(&component) else {
            log::debug!("RenderingAttributesStructure: {component} has no mirror");
            return;
        };
        if mirror.kind() != value.kind() {
            log::warn!(
                "RenderingAttributesStructure: {component} is {:?}, got {:?}",
                mirror.kind(),
                value.kind()
            );
            return;
        }
        let changes = delivery
            .arg(ARG_CHANGES)
            .as_bits()
            .or_else(|| value.changes(&mirror.value))
            .unwrap_or(u64::MAX);
        mirror.value = (*value).clone();
        mirror.version += 1;
        mirror.changed |= changes;
        self.dirty.insert(component);
    }

    /// Takes the ids of mirrors changed since the last call, in id order.
    pub fn take_dirty(&mut self) -> Vec<ComponentId> {
        std::mem::take(&mut self.dirty).into_iter().collect()
    }

    /// Hands every changed mirror to `pipeline` and releases removed ones.
    /// Returns the number of uploads that succeeded.
    pub fn push_to_pipeline(&mut self, pipeline: &mut dyn RenderPipeline) -> usize {
        for component in self.released.drain(..) {
            pipeline.release(component);
        }
        let mut uploaded = 0;
        for component in std::mem::take(&mut self.dirty) {
            let Some(mirror) = self.mirrors.get_mut(&component) else {
                continue;
            };
            let changed = std::mem::take(&mut mirror.changed);
            match pipeline.update(component, mirror, changed) {
                Ok(()) => uploaded += 1,
                Err(e) => {
                    log::warn!("RenderPipeline rejected {component}: {e:#}");
                    mirror.changed = changed;
                    self.dirty.insert(component);
                }
            }
        }
        uploaded
    }
}

impl ScheduledThread for RenderingAttributesStructure {
    fn kind(&self) -> ThreadKind {
        ThreadKind::UpdateRenderingAttributes
    }

    fn universe(&self) -> UniverseId {
        self.universe
    }

    fn do_work(&mut self, _reference_time: Instant) {
        self.process_messages();
        self.update_object();
    }
}

impl std::fmt::Debug for RenderingAttributesStructure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderingAttributesStructure")
            .field("universe", &self.universe)
            .field("mirrors", &self.mirrors.len())
            .field("deferred", &self.deferred.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Appearance, PointAttributes, RenderingAttributes, RetainedComponent};
    use arbor_core::message::{Message, MessageArg};
    use arbor_core::{ThreadMask, TicketAllocator};

    const U: UniverseId = UniverseId(7);

    fn rendering(visible: bool) -> impl FnOnce(&mut AttributeValue) {
        move |value| {
            if let AttributeValue::Rendering(r) = value {
                r.visible = visible;
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        updates: Vec<(ComponentId, u64)>,
        released: Vec<ComponentId>,
    }

    impl RenderPipeline for Recorder {
        fn update(&mut self, component: ComponentId, _: &AttributeMirror, changed: u64) -> anyhow::Result<()> {
            self.updates.push((component, changed));
            Ok(())
        }
        fn release(&mut self, component: ComponentId) {
            self.released.push(component);
        }
    }

    #[test]
    fn immediate_changes_reach_the_mirror_in_one_drain() {
        let bus = MessageBus::new();
        let mut structure = RenderingAttributesStructure::new(U, &bus);
        let ids = TicketAllocator::new();
        let mut attrs = RetainedComponent::new(&ids, U, RenderingAttributes::default());

        bus.dispatch(attrs.insert_message());
        bus.dispatch(attrs.update(rendering(false)).unwrap());
        structure.process_messages();

        let mirror = structure.mirror(attrs.id()).unwrap();
        assert_eq!(mirror.value(), attrs.value());
        assert_eq!(mirror.version(), 1);
        assert_eq!(structure.take_dirty(), vec![attrs.id()]);
    }

    #[test]
    fn frequent_changes_wait_for_update_object() {
        let bus = MessageBus::new();
        let mut structure = RenderingAttributesStructure::new(U, &bus);
        let ids = TicketAllocator::new();
        let mut attrs = RetainedComponent::new(&ids, U, RenderingAttributes::default());
        attrs.set_frequent(true);

        bus.dispatch(attrs.insert_message());
        bus.dispatch(attrs.update(rendering(false)).unwrap());
        structure.process_messages();

        let mirror = structure.mirror(attrs.id()).unwrap();
        assert_eq!(mirror.version(), 0);
        assert_eq!(structure.deferred_count(), 1);

        structure.update_object();
        assert_eq!(structure.mirror(attrs.id()).unwrap().value(), attrs.value());
        assert_eq!(structure.deferred_count(), 0);
    }

    #[test]
    fn immediate_change_after_a_deferred_one_wins() {
        let bus = MessageBus::new();
        let mut structure = RenderingAttributesStructure::new(U, &bus);
        let ids = TicketAllocator::new();
        let mut attrs = RetainedComponent::new(&ids, U, RenderingAttributes::default());
        bus.dispatch(attrs.insert_message());

        attrs.set_frequent(true);
        bus.dispatch(attrs.update(rendering(false)).unwrap());
        attrs.set_frequent(false);
        bus.dispatch(attrs.update(rendering(true)).unwrap());
        structure.process_messages();
        assert_eq!(structure.deferred_count(), 0);
        structure.update_object();

        let mirror = structure.mirror(attrs.id()).unwrap();
        assert_eq!(mirror.value(), attrs.value());
        assert_eq!(mirror.version(), 2);
    }

    #[test]
    fn appearance_is_never_deferred() {
        let bus = MessageBus::new();
        let mut structure = RenderingAttributesStructure::new(U, &bus);
        let ids = TicketAllocator::new();
        let mut appearance = RetainedComponent::new(&ids, U, Appearance::default());
        appearance.set_frequent(true);
        let material = ids.component();

        bus.dispatch(appearance.insert_message());
        bus.dispatch(
            appearance
                .update(|value| {
                    if let AttributeValue::Appearance(a) = value {
                        a.material = Some(material);
                    }
                })
                .unwrap(),
        );
        structure.process_messages();

        assert_eq!(structure.deferred_count(), 0);
        assert_eq!(structure.mirror(appearance.id()).unwrap().version(), 1);
    }

    #[test]
    fn deferred_delivery_keeps_the_message_alive() {
        let bus = MessageBus::new();
        let mut structure = RenderingAttributesStructure::new(U, &bus);
        let render_queue = bus.subscribe(U, ThreadKind::UpdateRender);
        let ids = TicketAllocator::new();
        let mut point = RetainedComponent::new(&ids, U, PointAttributes::default());
        point.set_frequent(true);

        bus.dispatch(point.insert_message());
        bus.dispatch(
            point
                .update(|value| {
                    if let AttributeValue::Point(p) = value {
                        p.size = 4.0;
                    }
                })
                .unwrap(),
        );
        structure.process_messages();
        let render_side = render_queue.drain();
        let change = &render_side[1];
        assert_eq!(change.pending_consumers(), 2);

        structure.update_object();
        assert_eq!(change.pending_consumers(), 1);
    }

    #[test]
    fn unknown_messages_are_dropped() {
        let bus = MessageBus::new();
        let mut structure = RenderingAttributesStructure::new(U, &bus);
        bus.dispatch(
            Message::new(MessageType::FogChanged, ThreadMask::UPDATE_RENDERING_ATTRIBUTES, U)
                .with_object(MessageArg::Int(3)),
        );
        structure.process_messages();
        assert_eq!(structure.mirror_count(), 0);
        assert!(structure.take_dirty().is_empty());
    }

    #[test]
    fn pipeline_sees_changed_bits_and_releases() {
        let bus = MessageBus::new();
        let mut structure = RenderingAttributesStructure::new(U, &bus);
        let ids = TicketAllocator::new();
        let mut attrs = RetainedComponent::new(&ids, U, RenderingAttributes::default());
        let mut pipeline = Recorder::default();

        bus.dispatch(attrs.insert_message());
        structure.process_messages();
        assert_eq!(structure.push_to_pipeline(&mut pipeline), 1);
        assert_eq!(pipeline.updates, vec![(attrs.id(), u64::MAX)]);

        bus.dispatch(attrs.update(rendering(false)).unwrap());
        structure.process_messages();
        structure.push_to_pipeline(&mut pipeline);
        assert_eq!(pipeline.updates[1], (attrs.id(), 0b10_0000));

        bus.dispatch(attrs.remove_message());
        structure.process_messages();
        assert_eq!(structure.push_to_pipeline(&mut pipeline), 0);
        assert_eq!(pipeline.released, vec![attrs.id()]);
        assert_eq!(structure.mirror_count(), 0);
    }
}
