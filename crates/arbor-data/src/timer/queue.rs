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

use super::TimerHeap;
use crate::wakeup::CondId;
use arbor_core::{BehaviorId, UniverseId};
use std::collections::HashMap;
use crossbeam_channel::{Receiver, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Identifies one armed elapsed-time criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CriterionRef {
    /// The universe of the owning behavior.
    pub universe: UniverseId,
    /// The owning behavior.
    pub behavior: BehaviorId,
    /// The arming generation the criterion belongs to.
    pub generation: u64,
    /// The criterion node inside the behavior's condition tree.
    pub node: CondId,
}

/// What a timer entry does when it expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPayload {
    /// The recurring input-device polling cadence.
    InputDevicePoll(UniverseId),
    /// The recurring sound-scheduler polling cadence.
    SoundPoll(UniverseId),
    /// A one-shot application timer.
    Criterion(CriterionRef),
}

impl TimerPayload {
    /// Returns `true` for the pre-registered recurring entries.
    pub fn is_recurring(&self) -> bool {
        !matches!(self, TimerPayload::Criterion(_))
    }
}

/// The outcome of one [`TimerQueue::wait_expired`] call.
#[derive(Debug)]
pub enum TimerWait {
    /// Entries that expired, earliest first.
    Expired(Vec<TimerPayload>),
    /// The queue was shut down.
    Shutdown,
}

#[derive(Debug, Default)]
struct State {
    heap: TimerHeap<TimerPayload>,
    shutdown: bool,
    fired: HashMap<UniverseId, Vec<CriterionRef>>,
}

/// The timer heap shared between the threads that arm timers and the timer
/// thread that services them.
///
/// Adding an entry raises a level-triggered `ready` signal, a single slot
/// wake channel: any number of adds before the timer thread wakes up result
/// in a single wake.
#[derive(Debug)]
pub struct TimerQueue {
    state: Mutex<State>,
    ready_tx: Sender<()>,
    ready_rx: Receiver<()>,
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        Self {
            state: Mutex::new(State::default()),
            ready_tx,
            ready_rx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn raise_ready(&self) {
        // A full slot already holds a pending wake.
        let _ = self.ready_tx.try_send(());
    }

    /// Schedules `payload` at `at` and wakes the timer thread.
    ///
    /// Recurring entries are singletons: adding one that is already pending
    /// is a no-op and returns `false`.
    pub fn add(&self, at: Instant, payload: TimerPayload) -> bool {
        {
            let mut state = self.lock();
            if payload.is_recurring() && state.heap.contains_where(|p| *p == payload) {
                return false;
            }
            state.heap.insert(at, payload);
        }
        self.raise_ready();
        true
    }

    /// Removes every pending entry owned by `behavior`. Linear in the heap size.
    pub fn remove_behavior(&self, behavior: BehaviorId) -> usize {
        let mut state = self.lock();
        let removed = state
            .heap
            .remove_where(|p| matches!(p, TimerPayload::Criterion(c) if c.behavior == behavior));
        for fired in state.fired.values_mut() {
            fired.retain(|c| c.behavior != behavior);
        }
        removed
    }

    /// Drops every one-shot entry and fired criterion of `universe`, once
    /// its behavior structure is gone.
    pub fn discard_universe(&self, universe: UniverseId) -> usize {
        let mut state = self.lock();
        state.fired.remove(&universe);
        state
            .heap
            .remove_where(|p| matches!(p, TimerPayload::Criterion(c) if c.universe == universe))
    }

    /// Removes a pending recurring entry.
    pub fn remove_recurring(&self, payload: TimerPayload) -> bool {
        self.lock().heap.remove_where(|p| *p == payload) > 0
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `payload` is pending.
    pub fn contains(&self, payload: TimerPayload) -> bool {
        self.lock().heap.contains_where(|p| *p == payload)
    }

    /// Blocks until at least one entry expires or the queue shuts down.
    ///
    /// Every entry due at wake-up time is returned, not just the first one.
    /// The wait is bounded by the earliest trigger time and cut short by
    /// [`add`](Self::add).
    pub fn wait_expired(&self) -> TimerWait {
        loop {
            let wait_time = {
                let mut state = self.lock();
                if state.shutdown {
                    // Pass the wake on to any other waiter.
                    self.raise_ready();
                    return TimerWait::Shutdown;
                }
                let now = Instant::now();
                let expired = state.heap.extract_expired(now);
                if !expired.is_empty() {
                    return TimerWait::Expired(expired.into_iter().map(|(_, p)| p).collect());
                }
                state.heap.peek_time().map(|at| at.saturating_duration_since(now))
            };
            // An add racing this wait leaves its wake in the slot.
            match wait_time {
                Some(wait_time) => {
                    let _ = self.ready_rx.recv_timeout(wait_time);
                }
                None => {
                    let _ = self.ready_rx.recv();
                }
            }
        }
    }

    /// Waits at most `timeout` for expired entries. Used by tests and
    /// single-threaded drivers.
    pub fn poll_expired(&self, timeout: Duration) -> Vec<TimerPayload> {
        let deadline = Instant::now() + timeout;
        loop {
            let until = {
                let mut state = self.lock();
                let now = Instant::now();
                let expired = state.heap.extract_expired(now);
                if !expired.is_empty() || now >= deadline || state.shutdown {
                    return expired.into_iter().map(|(_, p)| p).collect();
                }
                state
                    .heap
                    .peek_time()
                    .map_or(deadline, |at| at.min(deadline))
            };
            let _ = self.ready_rx.recv_deadline(until);
        }
    }

    /// Records a one-shot criterion as fired for its universe's behavior structure.
    pub fn mark_fired(&self, criterion: CriterionRef) {
        self.lock()
            .fired
            .entry(criterion.universe)
            .or_default()
            .push(criterion);
    }

    /// Takes the criteria fired for `universe` since the last call.
    pub fn take_fired(&self, universe: UniverseId) -> Vec<CriterionRef> {
        self.lock().fired.remove(&universe).unwrap_or_default()
    }

    /// Wakes the timer thread and makes every later wait return [`TimerWait::Shutdown`].
    pub fn shutdown(&self) {
        self.lock().shutdown = true;
        self.raise_ready();
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) was called.
    pub fn is_shutdown(&self) -> bool {
        self.lock().shutdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn criterion(behavior: u64) -> TimerPayload {
        TimerPayload::Criterion(CriterionRef {
            universe: UniverseId(1),
            behavior: BehaviorId(behavior),
            generation: 0,
            node: 0,
        })
    }

    #[test]
    fn recurring_entries_are_singletons() {
        let queue = TimerQueue::new();
        let poll = TimerPayload::InputDevicePoll(UniverseId(1));
        let later = Instant::now() + Duration::from_secs(60);

        assert!(queue.add(later, poll));
        assert!(!queue.add(later, poll));
        assert!(queue.add(later, criterion(1)));
        assert!(queue.add(later, criterion(1)));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn remove_behavior_scans_every_entry() {
        let queue = TimerQueue::new();
        let later = Instant::now() + Duration::from_secs(60);
        queue.add(later, criterion(1));
        queue.add(later, criterion(2));
        queue.add(later, criterion(1));
        queue.add(later, TimerPayload::SoundPoll(UniverseId(1)));

        assert_eq!(queue.remove_behavior(BehaviorId(1)), 2);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn waiter_drains_all_expired_entries_at_once() {
        let queue = Arc::new(TimerQueue::new());
        let soon = Instant::now() + Duration::from_millis(20);
        queue.add(soon, criterion(1));
        queue.add(soon, criterion(2));
        queue.add(soon + Duration::from_secs(60), criterion(3));

        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.wait_expired())
        };
        match waiter.join().expect("timer waiter panicked") {
            TimerWait::Expired(expired) => assert_eq!(expired, vec![criterion(1), criterion(2)]),
            TimerWait::Shutdown => panic!("unexpected shutdown"),
        }
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn add_wakes_an_idle_waiter() {
        let queue = Arc::new(TimerQueue::new());
        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.wait_expired())
        };
        thread::sleep(Duration::from_millis(20));
        queue.add(Instant::now(), criterion(5));

        match waiter.join().expect("timer waiter panicked") {
            TimerWait::Expired(expired) => assert_eq!(expired, vec![criterion(5)]),
            TimerWait::Shutdown => panic!("unexpected shutdown"),
        }
    }

    #[test]
    fn shutdown_releases_the_waiter() {
        let queue = Arc::new(TimerQueue::new());
        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.wait_expired())
        };
        queue.shutdown();
        assert!(matches!(
            waiter.join().expect("timer waiter panicked"),
            TimerWait::Shutdown
        ));
    }

    #[test]
    fn adds_before_a_wake_coalesce() {
        let queue = TimerQueue::new();
        let later = Instant::now() + Duration::from_secs(60);
        for behavior in 0..5 {
            queue.add(later, criterion(behavior));
        }
        assert_eq!(queue.ready_rx.len(), 1);
        assert_eq!(queue.len(), 5);
    }

    #[test]
    fn discarding_a_universe_empties_its_inbox() {
        let queue = TimerQueue::new();
        let TimerPayload::Criterion(first) = criterion(1) else {
            unreachable!()
        };
        let later = Instant::now() + Duration::from_secs(60);
        queue.add(later, criterion(2));
        queue.add(later, TimerPayload::InputDevicePoll(UniverseId(1)));
        queue.mark_fired(first);
        queue.mark_fired(CriterionRef {
            universe: UniverseId(2),
            ..first
        });

        assert_eq!(queue.discard_universe(UniverseId(1)), 1);
        assert!(queue.take_fired(UniverseId(1)).is_empty());
        assert_eq!(queue.take_fired(UniverseId(2)).len(), 1);
        assert!(queue.contains(TimerPayload::InputDevicePoll(UniverseId(1))));
    }

    #[test]
    fn fired_criteria_are_grouped_per_universe() {
        let queue = TimerQueue::new();
        let TimerPayload::Criterion(first) = criterion(1) else {
            unreachable!()
        };
        queue.mark_fired(first);
        queue.mark_fired(CriterionRef {
            universe: UniverseId(2),
            ..first
        });

        assert_eq!(queue.take_fired(UniverseId(1)), vec![first]);
        assert!(queue.take_fired(UniverseId(1)).is_empty());
        assert_eq!(queue.take_fired(UniverseId(2)).len(), 1);
    }
}
