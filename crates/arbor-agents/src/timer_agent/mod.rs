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

//! The timer thread: sleeps until the earliest armed timer and turns
//! expirations into run requests.

use anyhow::{Context, Result};
use arbor_core::{Coordinator, ThreadMask};
use arbor_data::timer::{TimerPayload, TimerQueue, TimerWait};
use std::sync::Arc;
use std::thread;

/// Routes one expired entry.
///
/// The two recurring cadences wake their scheduler. One-shot criteria are
/// marked fired for their universe's behavior structure, which is asked to
/// run.
pub fn dispatch_expired(queue: &TimerQueue, coordinator: &dyn Coordinator, payload: TimerPayload) {
    match payload {
        TimerPayload::InputDevicePoll(universe) => {
            coordinator.send_run_message(universe, ThreadMask::INPUT_DEVICE_SCHEDULER);
        }
        TimerPayload::SoundPoll(universe) => {
            coordinator.send_run_message(universe, ThreadMask::SOUND_SCHEDULER);
        }
        TimerPayload::Criterion(criterion) => {
            queue.mark_fired(criterion);
            coordinator.send_run_message(criterion.universe, ThreadMask::UPDATE_BEHAVIOR);
        }
    }
}

/// The dedicated thread servicing a [`TimerQueue`].
pub struct TimerThread {
    queue: Arc<TimerQueue>,
    handle: Option<thread::JoinHandle<()>>,
}

impl TimerThread {
    /// Starts the thread.
    pub fn spawn(queue: Arc<TimerQueue>, coordinator: Arc<dyn Coordinator>) -> Result<Self> {
        let thread_queue = Arc::clone(&queue);
        let handle = thread::Builder::new()
            .name("arbor-timer".into())
            .spawn(move || {
                log::info!("Timer thread started.");
                while let TimerWait::Expired(expired) = thread_queue.wait_expired() {
                    for payload in expired {
                        dispatch_expired(&thread_queue, coordinator.as_ref(), payload);
                    }
                }
                log::info!("Timer thread stopped.");
            })
            .context("failed to spawn the timer thread")?;
        Ok(Self {
            queue,
            handle: Some(handle),
        })
    }

    /// The queue this thread services.
    pub fn queue(&self) -> &Arc<TimerQueue> {
        &self.queue
    }

    /// Returns `true` until [`shutdown`](Self::shutdown).
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stops the thread and waits for it.
    pub fn shutdown(&mut self) {
        self.queue.shutdown();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Timer thread panicked.");
            }
        }
    }
}

impl Drop for TimerThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::message::MessageBus;
    use arbor_core::{BehaviorId, RecordingCoordinator, UniverseId};
    use arbor_data::timer::CriterionRef;
    use std::time::{Duration, Instant};

    const U: UniverseId = UniverseId(2);

    #[test]
    fn expired_criteria_are_marked_and_scheduled() {
        let queue = Arc::new(TimerQueue::new());
        let coordinator = Arc::new(RecordingCoordinator::new(Arc::new(MessageBus::new())));
        let mut timer = TimerThread::spawn(Arc::clone(&queue), coordinator.clone()).unwrap();

        let criterion = CriterionRef {
            universe: U,
            behavior: BehaviorId(4),
            generation: 1,
            node: 0,
        };
        queue.add(Instant::now() + Duration::from_millis(5), TimerPayload::Criterion(criterion));
        queue.add(Instant::now(), TimerPayload::InputDevicePoll(U));

        let deadline = Instant::now() + Duration::from_secs(2);
        while queue.take_fired(U).is_empty() {
            assert!(Instant::now() < deadline, "timer never fired");
            thread::sleep(Duration::from_millis(2));
        }
        timer.shutdown();

        let requested = coordinator.requested_threads(U);
        assert!(requested.contains(ThreadMask::UPDATE_BEHAVIOR));
        assert!(requested.contains(ThreadMask::INPUT_DEVICE_SCHEDULER));
        assert!(!timer.is_running());
    }

    #[test]
    fn shutdown_is_prompt_with_far_timers() {
        let queue = Arc::new(TimerQueue::new());
        let coordinator = Arc::new(RecordingCoordinator::new(Arc::new(MessageBus::new())));
        queue.add(Instant::now() + Duration::from_secs(3600), TimerPayload::SoundPoll(U));
        let mut timer = TimerThread::spawn(Arc::clone(&queue), coordinator).unwrap();

        let started = Instant::now();
        timer.shutdown();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(queue.len(), 1);
    }
}
