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

use arbor_agents::InputDeviceScheduler;
use arbor_core::math::Vec3;
use arbor_core::message::MessageBus;
use arbor_core::{Coordinator, RecordingCoordinator, ScheduledThread, SensorId, SharedThread, UniverseId};
use arbor_data::input::{InputDevice, ProcessingMode, SensorBoard, SensorHandle, SharedDevice};
use arbor_data::timer::{TimerPayload, TimerQueue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const U: UniverseId = UniverseId(3);

struct Tracker {
    mode: ProcessingMode,
    handle: SensorHandle,
    polls: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    fail_init: bool,
}

impl Tracker {
    fn new(mode: ProcessingMode, board: &Arc<SensorBoard>, sensor: u64) -> Self {
        Self {
            mode,
            handle: board.register(SensorId(sensor)),
            polls: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
            fail_init: false,
        }
    }
}

impl InputDevice for Tracker {
    fn initialize(&mut self) -> anyhow::Result<()> {
        if self.fail_init {
            anyhow::bail!("no such device");
        }
        Ok(())
    }

    fn processing_mode(&self) -> ProcessingMode {
        self.mode
    }

    fn poll_and_process_input(&mut self) -> anyhow::Result<()> {
        let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        self.handle.publish(Vec3::splat(n as f32), 0);
        if self.mode == ProcessingMode::Blocking {
            // Stands in for blocking device I/O.
            thread::sleep(Duration::from_millis(1));
        }
        Ok(())
    }

    fn sensor_ids(&self) -> Vec<SensorId> {
        vec![self.handle.id()]
    }

    fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn setup() -> (Arc<TimerQueue>, Arc<SensorBoard>, InputDeviceScheduler) {
    let timers = Arc::new(TimerQueue::new());
    let board = Arc::new(SensorBoard::new());
    let scheduler = InputDeviceScheduler::new(U, Arc::clone(&timers), Arc::clone(&board));
    (timers, board, scheduler)
}

fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn non_blocking_devices_are_polled_per_tick_and_paced_by_the_timer() {
    // --- 1. ARRANGE ---
    let (timers, board, mut scheduler) = setup();
    let tracker = Tracker::new(ProcessingMode::NonBlocking, &board, 1);
    let polls = Arc::clone(&tracker.polls);
    scheduler.add_device(Arc::new(Mutex::new(tracker))).unwrap();
    assert!(timers.is_empty(), "inactive schedulers do not arm the poll timer");

    // --- 2. ACT ---
    scheduler.activate();
    scheduler.do_work(Instant::now());
    scheduler.do_work(Instant::now());

    // --- 3. ASSERT ---
    assert_eq!(polls.load(Ordering::SeqCst), 2);
    assert!(timers.contains(TimerPayload::InputDevicePoll(U)));
    assert_eq!(timers.len(), 1, "the poll cadence is a singleton");
    assert_eq!(board.read(SensorId(1)).unwrap().position, Vec3::splat(2.0));

    scheduler.deactivate();
    assert!(timers.is_empty());
    scheduler.do_work(Instant::now());
    assert_eq!(polls.load(Ordering::SeqCst), 2);
}

#[test]
fn blocking_devices_pause_and_resume_with_activation() {
    // --- 1. ARRANGE ---
    let (_timers, board, mut scheduler) = setup();
    let tracker = Tracker::new(ProcessingMode::Blocking, &board, 2);
    let polls = Arc::clone(&tracker.polls);
    let closed = Arc::clone(&tracker.closed);
    let device: SharedDevice = Arc::new(Mutex::new(tracker));
    scheduler.add_device(Arc::clone(&device)).unwrap();

    // --- 2. ACT & ASSERT ---
    thread::sleep(Duration::from_millis(20));
    assert_eq!(polls.load(Ordering::SeqCst), 0, "parked until activated");

    scheduler.activate();
    scheduler.activate();
    assert_eq!(scheduler.running_device_threads(), 1);
    assert!(wait_until(|| polls.load(Ordering::SeqCst) > 0));

    scheduler.deactivate();
    scheduler.deactivate();
    assert_eq!(scheduler.running_device_threads(), 0);
    let paused_at = polls.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(20));
    assert!(polls.load(Ordering::SeqCst) <= paused_at + 1);

    assert!(scheduler.remove_device(&device));
    assert!(!scheduler.remove_device(&device));
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.device_count(), 0);
}

#[test]
fn demand_driven_devices_are_read_through_their_sensors() {
    let (_timers, board, mut scheduler) = setup();
    let tracker = Tracker::new(ProcessingMode::DemandDriven, &board, 3);
    let polls = Arc::clone(&tracker.polls);
    let device: SharedDevice = Arc::new(Mutex::new(tracker));
    scheduler.add_device(Arc::clone(&device)).unwrap();
    scheduler.activate();

    scheduler.do_work(Instant::now());
    assert_eq!(polls.load(Ordering::SeqCst), 0, "never polled by the scheduler");
    assert_eq!(board.read(SensorId(3)).unwrap().position, Vec3::splat(1.0));

    scheduler.remove_device(&device);
    board.read(SensorId(3));
    assert_eq!(polls.load(Ordering::SeqCst), 1);
}

#[test]
fn devices_failing_to_initialize_are_not_added() {
    let (_timers, board, mut scheduler) = setup();
    let mut tracker = Tracker::new(ProcessingMode::NonBlocking, &board, 4);
    tracker.fail_init = true;
    assert!(scheduler.add_device(Arc::new(Mutex::new(tracker))).is_err());
    assert_eq!(scheduler.device_count(), 0);
}

#[test]
fn coordinator_toggles_activation() {
    let (timers, board, mut scheduler) = setup();
    let tracker = Tracker::new(ProcessingMode::NonBlocking, &board, 5);
    scheduler.add_device(Arc::new(Mutex::new(tracker))).unwrap();
    let scheduler = Arc::new(Mutex::new(scheduler));
    let shared: SharedThread = scheduler.clone();
    let coordinator = RecordingCoordinator::new(Arc::new(MessageBus::new()));

    coordinator.add_input_device_scheduler(Arc::clone(&shared));
    assert!(scheduler.lock().unwrap().is_active());
    assert!(timers.contains(TimerPayload::InputDevicePoll(U)));

    coordinator.remove_input_device_scheduler(&shared);
    assert!(!scheduler.lock().unwrap().is_active());
    assert!(timers.is_empty());

    scheduler.lock().unwrap().shutdown();
    assert_eq!(scheduler.lock().unwrap().device_count(), 0);
}
