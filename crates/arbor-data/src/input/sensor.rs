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

use super::SharedDevice;
use arbor_core::math::Vec3;
use arbor_core::SensorId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// The latest value a sensor reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    /// Tracked position.
    pub position: Vec3,
    /// Pressed buttons, one bit each.
    pub buttons: u32,
    /// When the value was published.
    pub timestamp: Instant,
}

#[derive(Default)]
struct SensorSlot {
    reading: Option<SensorReading>,
    demand: Option<SharedDevice>,
}

/// Latest readings of every registered sensor.
///
/// Devices write through their [`SensorHandle`]s; the behavior structure
/// reads snapshots. Sensors of demand-driven devices poll their device when
/// read.
#[derive(Default)]
pub struct SensorBoard {
    sensors: RwLock<HashMap<SensorId, SensorSlot>>,
}

impl SensorBoard {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` and returns the handle a device publishes through.
    pub fn register(self: &Arc<Self>, id: SensorId) -> SensorHandle {
        self.sensors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_default();
        SensorHandle {
            id,
            board: Arc::clone(self),
        }
    }

    /// Forgets `id` and its last reading.
    pub fn unregister(&self, id: SensorId) {
        self.sensors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    /// Tags `id` as read on demand from `device`.
    pub fn attach_demand_source(&self, id: SensorId, device: SharedDevice) {
        let mut sensors = self.sensors.write().unwrap_or_else(PoisonError::into_inner);
        sensors.entry(id).or_default().demand = Some(device);
    }

    /// Removes every demand tag pointing at `device`.
    pub fn detach_demand_source(&self, device: &SharedDevice) {
        let mut sensors = self.sensors.write().unwrap_or_else(PoisonError::into_inner);
        for slot in sensors.values_mut() {
            if slot.demand.as_ref().is_some_and(|d| Arc::ptr_eq(d, device)) {
                slot.demand = None;
            }
        }
    }

    fn publish(&self, id: SensorId, reading: SensorReading) {
        let mut sensors = self.sensors.write().unwrap_or_else(PoisonError::into_inner);
        match sensors.get_mut(&id) {
            Some(slot) => slot.reading = Some(reading),
            None => log::trace!("SensorBoard: reading for unregistered {id} dropped"),
        }
    }

    /// Returns the latest reading of `id`, polling its device first if the
    /// sensor is demand-driven.
    pub fn read(&self, id: SensorId) -> Option<SensorReading> {
        let demand = self
            .sensors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .and_then(|slot| slot.demand.clone());
        if let Some(device) = demand {
            poll_on_demand(id, &device);
        }
        self.sensors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .and_then(|slot| slot.reading)
    }

    /// Snapshot of every sensor that has a reading, demand-driven ones polled.
    pub fn sensor_readings(&self) -> Vec<(SensorId, SensorReading)> {
        let demand: Vec<(SensorId, SharedDevice)> = self
            .sensors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|(id, slot)| slot.demand.clone().map(|d| (*id, d)))
            .collect();
        for (id, device) in &demand {
            poll_on_demand(*id, device);
        }
        let mut readings: Vec<_> = self
            .sensors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|(id, slot)| slot.reading.map(|r| (*id, r)))
            .collect();
        readings.sort_by_key(|(id, _)| *id);
        readings
    }

    /// Number of registered sensors.
    pub fn len(&self) -> usize {
        self.sensors.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if no sensor is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poll_on_demand(id: SensorId, device: &SharedDevice) {
    let mut device = device.lock().unwrap_or_else(PoisonError::into_inner);
    if let Err(e) = device.poll_and_process_input() {
        log::warn!("SensorBoard: on-demand read of {id} failed: {e:#}");
    }
}

/// A device's write access to one sensor.
#[derive(Clone)]
pub struct SensorHandle {
    id: SensorId,
    board: Arc<SensorBoard>,
}

impl SensorHandle {
    /// The sensor this handle writes.
    pub fn id(&self) -> SensorId {
        self.id
    }

    /// Publishes a new value, stamped now.
    pub fn publish(&self, position: Vec3, buttons: u32) {
        self.board.publish(
            self.id,
            SensorReading {
                position,
                buttons,
                timestamp: Instant::now(),
            },
        );
    }

    /// The last published value.
    pub fn last(&self) -> Option<SensorReading> {
        self.board
            .sensors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&self.id)
            .and_then(|slot| slot.reading)
    }
}

impl std::fmt::Debug for SensorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorHandle").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{InputDevice, ProcessingMode};
    use std::sync::Mutex;

    struct Dial {
        handle: SensorHandle,
        polls: u32,
    }

    impl InputDevice for Dial {
        fn initialize(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
        fn processing_mode(&self) -> ProcessingMode {
            ProcessingMode::DemandDriven
        }
        fn poll_and_process_input(&mut self) -> anyhow::Result<()> {
            self.polls += 1;
            self.handle.publish(Vec3::splat(self.polls as f32), 0);
            Ok(())
        }
        fn close(&mut self) {}
    }

    #[test]
    fn published_readings_are_visible() {
        let board = Arc::new(SensorBoard::new());
        let handle = board.register(SensorId(1));
        assert!(board.read(SensorId(1)).is_none());

        handle.publish(Vec3::new(1.0, 2.0, 3.0), 0b10);
        let reading = board.read(SensorId(1)).expect("reading published");
        assert_eq!(reading.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(reading.buttons, 0b10);
        assert_eq!(board.sensor_readings().len(), 1);
    }

    #[test]
    fn demand_driven_sensors_poll_on_read() {
        let board = Arc::new(SensorBoard::new());
        let dial = Arc::new(Mutex::new(Dial {
            handle: board.register(SensorId(4)),
            polls: 0,
        }));
        let shared: SharedDevice = dial.clone();
        board.attach_demand_source(SensorId(4), Arc::clone(&shared));

        assert_eq!(board.read(SensorId(4)).unwrap().position, Vec3::splat(1.0));
        assert_eq!(board.read(SensorId(4)).unwrap().position, Vec3::splat(2.0));

        board.detach_demand_source(&shared);
        assert_eq!(board.read(SensorId(4)).unwrap().position, Vec3::splat(2.0));
        assert_eq!(dial.lock().unwrap().polls, 2);
    }
}
