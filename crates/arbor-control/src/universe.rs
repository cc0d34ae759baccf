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

//! Wiring of one virtual universe into a [`MasterControl`].

use crate::MasterControl;
use anyhow::Result;
use arbor_agents::{BehaviorScheduler, InputDeviceScheduler};
use arbor_core::{Coordinator, SharedThread, TicketAllocator, UniverseId};
use arbor_data::behavior::{Behavior, BehaviorNode, BehaviorStructure};
use arbor_data::component::{AttributeValue, RenderingAttributesStructure, RetainedComponent};
use arbor_data::input::{SensorBoard, SharedDevice};
use std::sync::{Arc, Mutex, PoisonError};

/// The structures and schedulers of one universe, registered with a control.
pub struct VirtualUniverse {
    id: UniverseId,
    ids: Arc<TicketAllocator>,
    coordinator: Arc<dyn Coordinator>,
    sensors: Arc<SensorBoard>,
    behaviors: Arc<Mutex<BehaviorStructure>>,
    attributes: Arc<Mutex<RenderingAttributesStructure>>,
    input: Arc<Mutex<InputDeviceScheduler>>,
}

impl VirtualUniverse {
    /// Creates a universe and registers its threads with `control`.
    pub fn attach(control: &MasterControl, ids: Arc<TicketAllocator>) -> Self {
        let id = ids.universe();
        let coordinator = control.coordinator();
        let sensors = Arc::new(SensorBoard::new());

        let behaviors = Arc::new(Mutex::new(
            BehaviorStructure::new(id, control.bus(), Arc::clone(&coordinator), Arc::clone(control.timers()))
                .with_sensors(Arc::clone(&sensors)),
        ));
        let scheduler = Arc::new(Mutex::new(BehaviorScheduler::new(id, Arc::clone(&behaviors))));
        let attributes = Arc::new(Mutex::new(RenderingAttributesStructure::new(id, control.bus())));
        let input = Arc::new(Mutex::new(
            InputDeviceScheduler::new(id, Arc::clone(control.timers()), Arc::clone(&sensors))
                .with_sample_time(control.config().device_sample_time()),
        ));

        control.register(behaviors.clone());
        control.register(scheduler);
        control.register(attributes.clone());
        coordinator.add_input_device_scheduler(input.clone());
        log::info!("{id} attached.");

        Self {
            id,
            ids,
            coordinator,
            sensors,
            behaviors,
            attributes,
            input,
        }
    }

    /// This universe's id.
    pub fn id(&self) -> UniverseId {
        self.id
    }

    /// The sensors input devices of this universe publish into.
    pub fn sensors(&self) -> &Arc<SensorBoard> {
        &self.sensors
    }

    /// The behavior structure.
    pub fn behaviors(&self) -> &Arc<Mutex<BehaviorStructure>> {
        &self.behaviors
    }

    /// The rendering-attributes structure.
    pub fn attributes(&self) -> &Arc<Mutex<RenderingAttributesStructure>> {
        &self.attributes
    }

    /// Makes `behavior` live. It is initialized on the next behavior pass.
    pub fn add_behavior(&self, behavior: impl Behavior + 'static) -> Arc<BehaviorNode> {
        let node = BehaviorNode::new(&self.ids, self.id, behavior);
        self.coordinator.process_message(node.insert_message());
        node
    }

    /// Takes `node` out of the live graph.
    pub fn remove_behavior(&self, node: &BehaviorNode) {
        self.coordinator.process_message(node.remove_message());
    }

    /// Creates a live attribute component.
    pub fn add_component(&self, value: impl Into<AttributeValue>) -> RetainedComponent {
        let mut component = RetainedComponent::new(&self.ids, self.id, value);
        self.coordinator.process_message(component.insert_message());
        component
    }

    /// Edits a live component and publishes the change.
    pub fn update_component(
        &self,
        component: &mut RetainedComponent,
        edit: impl FnOnce(&mut AttributeValue),
    ) -> bool {
        match component.update(edit) {
            Some(message) => {
                self.coordinator.process_message(message);
                true
            }
            None => false,
        }
    }

    /// Hands `device` to the input-device scheduler.
    pub fn add_device(&self, device: SharedDevice) -> Result<()> {
        self.input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add_device(device)
    }

    /// Removes `device`; returns `false` if unknown.
    pub fn remove_device(&self, device: &SharedDevice) -> bool {
        self.input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove_device(device)
    }

    /// Removes the input-device scheduler from the active set.
    pub fn detach_input(&self) {
        let input: SharedThread = self.input.clone();
        self.coordinator.remove_input_device_scheduler(&input);
    }
}

impl std::fmt::Debug for VirtualUniverse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualUniverse").field("id", &self.id).finish()
    }
}
