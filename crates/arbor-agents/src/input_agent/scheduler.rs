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

//! The scheduler that drives input devices of one universe.

use super::device_thread::BlockingDeviceThread;
use anyhow::Result;
use arbor_core::{ScheduledThread, ThreadKind, UniverseId};
use arbor_data::input::{ProcessingMode, SensorBoard, SharedDevice};
use arbor_data::timer::{TimerPayload, TimerQueue};
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};

/// Default polling period of non-blocking devices.
pub const DEFAULT_SAMPLE_TIME: Duration = Duration::from_millis(5);

/// Drives three disjoint device sets.
///
/// Blocking devices each own a polling thread, non-blocking devices are
/// polled here on every tick, and demand-driven devices are never polled
/// but read through their sensors. Ticks are paced by the recurring
/// input-poll timer while the scheduler is active.
pub struct InputDeviceScheduler {
    universe: UniverseId,
    timers: Arc<TimerQueue>,
    sensors: Arc<SensorBoard>,
    sample_time: Duration,
    blocking: Vec<BlockingDeviceThread>,
    non_blocking: Vec<SharedDevice>,
    demand_driven: Vec<SharedDevice>,
    active: bool,
}

impl InputDeviceScheduler {
    /// Creates an inactive scheduler.
    pub fn new(universe: UniverseId, timers: Arc<TimerQueue>, sensors: Arc<SensorBoard>) -> Self {
        Self {
            universe,
            timers,
            sensors,
            sample_time: DEFAULT_SAMPLE_TIME,
            blocking: Vec::new(),
            non_blocking: Vec::new(),
            demand_driven: Vec::new(),
            active: false,
        }
    }

    /// Sets the polling period of non-blocking devices.
    pub fn with_sample_time(mut self, sample_time: Duration) -> Self {
        self.sample_time = sample_time;
        self
    }

    /// Returns `true` while in the coordinator's active set.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Number of devices, all modes.
    pub fn device_count(&self) -> usize {
        self.blocking.len() + self.non_blocking.len() + self.demand_driven.len()
    }

    /// Number of blocking devices whose thread is currently running.
    pub fn running_device_threads(&self) -> usize {
        self.blocking.iter().filter(|t| t.is_running()).count()
    }

    fn poll_entry(&self) -> TimerPayload {
        TimerPayload::InputDevicePoll(self.universe)
    }

    fn arm_poll(&self) {
        if self.active && !self.non_blocking.is_empty() {
            self.timers
                .add(Instant::now() + self.sample_time, self.poll_entry());
        }
    }

    /// Initializes `device` and files it by processing mode.
    ///
    /// A device that fails to initialize is not added.
    pub fn add_device(&mut self, device: SharedDevice) -> Result<()> {
        let (mode, sensors) = {
            let mut guard = device.lock().unwrap_or_else(PoisonError::into_inner);
            guard.initialize()?;
            (guard.processing_mode(), guard.sensor_ids())
        };
        match mode {
            ProcessingMode::Blocking => {
                let thread = BlockingDeviceThread::spawn(Arc::clone(&device), self.active)?;
                self.blocking.push(thread);
            }
            ProcessingMode::NonBlocking => {
                self.non_blocking.push(device);
                self.arm_poll();
            }
            ProcessingMode::DemandDriven => {
                for sensor in sensors {
                    self.sensors.attach_demand_source(sensor, Arc::clone(&device));
                }
                self.demand_driven.push(device);
            }
        }
        log::info!("InputDeviceScheduler: {mode:?} device added in {}", self.universe);
        Ok(())
    }

    /// Stops driving `device` and closes it. Returns `false` if unknown.
    pub fn remove_device(&mut self, device: &SharedDevice) -> bool {
        if let Some(pos) = self.blocking.iter().position(|t| Arc::ptr_eq(t.device(), device)) {
            let mut thread = self.blocking.swap_remove(pos);
            thread.stop();
        } else if let Some(pos) = self.non_blocking.iter().position(|d| Arc::ptr_eq(d, device)) {
            self.non_blocking.swap_remove(pos);
            if self.non_blocking.is_empty() {
                self.timers.remove_recurring(self.poll_entry());
            }
        } else if let Some(pos) = self.demand_driven.iter().position(|d| Arc::ptr_eq(d, device)) {
            self.demand_driven.swap_remove(pos);
            self.sensors.detach_demand_source(device);
        } else {
            return false;
        }
        device.lock().unwrap_or_else(PoisonError::into_inner).close();
        true
    }

    /// Polls every non-blocking device once.
    pub fn poll_non_blocking(&mut self) {
        for device in &self.non_blocking {
            let mut device = device.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = device.poll_and_process_input() {
                log::warn!("InputDeviceScheduler: poll failed: {e:#}");
            }
            if let Err(e) = device.process_stream_input() {
                log::warn!("InputDeviceScheduler: stream input failed: {e:#}");
            }
        }
    }
}

impl ScheduledThread for InputDeviceScheduler {
    fn kind(&self) -> ThreadKind {
        ThreadKind::InputDeviceScheduler
    }

    fn universe(&self) -> UniverseId {
        self.universe
    }

    fn do_work(&mut self, _reference_time: Instant) {
        if !self.active {
            return;
        }
        self.poll_non_blocking();
        self.arm_poll();
    }

    fn activate(&mut self) {
        if self.active {
            return;
        }
        self.active = true;
        self.blocking.iter().for_each(BlockingDeviceThread::resume);
        self.arm_poll();
        log::debug!("InputDeviceScheduler activated in {}", self.universe);
    }

    fn deactivate(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.blocking.iter().for_each(BlockingDeviceThread::pause);
        self.timers.remove_recurring(self.poll_entry());
        log::debug!("InputDeviceScheduler deactivated in {}", self.universe);
    }

    fn shutdown(&mut self) {
        self.deactivate();
        for mut thread in self.blocking.drain(..) {
            thread.stop();
            thread.device().lock().unwrap_or_else(PoisonError::into_inner).close();
        }
        for device in self.non_blocking.drain(..).chain(self.demand_driven.drain(..)) {
            self.sensors.detach_demand_source(&device);
            device.lock().unwrap_or_else(PoisonError::into_inner).close();
        }
    }
}

impl std::fmt::Debug for InputDeviceScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputDeviceScheduler")
            .field("universe", &self.universe)
            .field("blocking", &self.blocking.len())
            .field("non_blocking", &self.non_blocking.len())
            .field("demand_driven", &self.demand_driven.len())
            .field("active", &self.active)
            .finish()
    }
}
