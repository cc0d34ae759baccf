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

//! The contract between the scheduling core and the master coordinator.
//!
//! Schedulers, structures, and the timer thread never sequence each other
//! directly. They ask the coordinator to run a set of threads on the next
//! tick and to route messages, through a handle passed in at construction.

use crate::ids::UniverseId;
use crate::message::{Message, MessageBus};
use crate::thread::{ScheduledThread, ThreadMask};
use std::sync::{Arc, Mutex, PoisonError};

/// A scheduled thread shared between its owner and the coordinator.
pub type SharedThread = Arc<Mutex<dyn ScheduledThread>>;

/// Black-box scheduling primitives provided by the master coordinator.
pub trait Coordinator: Send + Sync {
    /// Requests that `threads` of `universe` run on the next tick.
    fn send_run_message(&self, universe: UniverseId, threads: ThreadMask);

    /// Adds an input-device scheduler to the active set and activates it.
    fn add_input_device_scheduler(&self, scheduler: SharedThread);

    /// Deactivates an input-device scheduler and removes it from the active set.
    fn remove_input_device_scheduler(&self, scheduler: &SharedThread);

    /// Fans a message out to its structures and schedules them.
    fn process_message(&self, message: Message);
}

/// A coordinator that only records what it was asked to do.
///
/// Messages are still dispatched to the wrapped bus so structures can be
/// driven by hand. Useful for headless tools and tests that step the
/// structures themselves.
pub struct RecordingCoordinator {
    bus: Arc<MessageBus>,
    run_requests: Mutex<Vec<(UniverseId, ThreadMask)>>,
    input_schedulers: Mutex<Vec<SharedThread>>,
}

impl RecordingCoordinator {
    /// Creates a recorder dispatching into `bus`.
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self {
            bus,
            run_requests: Mutex::new(Vec::new()),
            input_schedulers: Mutex::new(Vec::new()),
        }
    }

    /// Returns and clears the recorded run requests.
    pub fn take_run_requests(&self) -> Vec<(UniverseId, ThreadMask)> {
        std::mem::take(
            &mut *self
                .run_requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// The union of every thread mask requested for `universe` so far, without clearing.
    pub fn requested_threads(&self, universe: UniverseId) -> ThreadMask {
        self.run_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(u, _)| *u == universe)
            .fold(ThreadMask::EMPTY, |acc, (_, mask)| acc | *mask)
    }

    /// Number of input-device schedulers currently added.
    pub fn input_scheduler_count(&self) -> usize {
        self.input_schedulers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// The wrapped bus.
    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }
}

impl Coordinator for RecordingCoordinator {
    fn send_run_message(&self, universe: UniverseId, threads: ThreadMask) {
        self.run_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((universe, threads));
    }

    fn add_input_device_scheduler(&self, scheduler: SharedThread) {
        scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .activate();
        self.input_schedulers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(scheduler);
    }

    fn remove_input_device_scheduler(&self, scheduler: &SharedThread) {
        let mut schedulers = self
            .input_schedulers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = schedulers.iter().position(|s| Arc::ptr_eq(s, scheduler)) {
            let removed = schedulers.swap_remove(pos);
            drop(schedulers);
            removed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .deactivate();
        }
    }

    fn process_message(&self, message: Message) {
        let universe = message.universe();
        let reached = self.bus.dispatch(message);
        if !reached.is_empty() {
            self.send_run_message(universe, reached);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageArg, MessageType};
    use crate::thread::ThreadKind;
    use std::time::Instant;

    struct Probe {
        active: bool,
    }

    impl ScheduledThread for Probe {
        fn kind(&self) -> ThreadKind {
            ThreadKind::InputDeviceScheduler
        }
        fn universe(&self) -> UniverseId {
            UniverseId(1)
        }
        fn do_work(&mut self, _: Instant) {}
        fn activate(&mut self) {
            self.active = true;
        }
        fn deactivate(&mut self) {
            self.active = false;
        }
    }

    #[test]
    fn process_message_schedules_reached_structures() {
        let bus = Arc::new(MessageBus::new());
        let _queue = bus.subscribe(UniverseId(1), ThreadKind::UpdateBehavior);
        let coordinator = RecordingCoordinator::new(Arc::clone(&bus));

        coordinator.process_message(
            Message::new(
                MessageType::BehaviorPost,
                ThreadMask::UPDATE_BEHAVIOR | ThreadMask::UPDATE_SOUND,
                UniverseId(1),
            )
            .with_arg(0, MessageArg::Int(3)),
        );

        assert_eq!(
            coordinator.take_run_requests(),
            vec![(UniverseId(1), ThreadMask::UPDATE_BEHAVIOR)]
        );
    }

    #[test]
    fn input_schedulers_are_activated_symmetrically() {
        let coordinator = RecordingCoordinator::new(Arc::new(MessageBus::new()));
        let probe = Arc::new(Mutex::new(Probe { active: false }));
        let shared: SharedThread = probe.clone();

        coordinator.add_input_device_scheduler(Arc::clone(&shared));
        assert!(probe.lock().unwrap().active);
        assert_eq!(coordinator.input_scheduler_count(), 1);

        coordinator.remove_input_device_scheduler(&shared);
        assert!(!probe.lock().unwrap().active);
        assert_eq!(coordinator.input_scheduler_count(), 0);
    }
}
