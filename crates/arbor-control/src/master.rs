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

//! The master control: sequences structure updates and schedulers tick by tick.

use crate::config::ArborConfig;
use crate::worker::{dedicated_thread_name, SchedulerWorker};
use anyhow::Result;
use arbor_agents::TimerThread;
use arbor_core::message::{Message, MessageBus};
use arbor_core::{Coordinator, SharedThread, ThreadKind, ThreadMask, UniverseId};
use arbor_data::timer::{TimerPayload, TimerQueue};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Longest idle wait between two checks of the running flag.
const IDLE_WAIT: Duration = Duration::from_millis(100);

struct Registered {
    universe: UniverseId,
    kind: ThreadKind,
    thread: SharedThread,
    worker: Option<Arc<SchedulerWorker>>,
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the control, its tick thread, and every holder of
/// the coordinator handle.
struct ControlState {
    config: ArborConfig,
    bus: Arc<MessageBus>,
    timers: Arc<TimerQueue>,
    threads: Mutex<Vec<Registered>>,
    pending: Mutex<HashMap<UniverseId, ThreadMask>>,
    frame: AtomicU64,
    wake_tx: Sender<()>,
}

impl ControlState {
    fn register(&self, thread: SharedThread) {
        let (universe, kind) = {
            let guard = lock(&thread);
            (guard.universe(), guard.kind())
        };
        let mut threads = lock(&self.threads);
        if threads.iter().any(|r| Arc::ptr_eq(&r.thread, &thread)) {
            return;
        }
        let worker = dedicated_thread_name(kind).and_then(|name| {
            match SchedulerWorker::spawn(Arc::clone(&thread), kind, name) {
                Ok(worker) => Some(Arc::new(worker)),
                Err(e) => {
                    log::error!("MasterControl: {e:#}; {kind:?} runs on the tick thread");
                    None
                }
            }
        });
        threads.push(Registered {
            universe,
            kind,
            thread,
            worker,
        });
        log::debug!("MasterControl: {kind:?} registered in {universe}");
    }

    fn unregister(&self, thread: &SharedThread) -> bool {
        // Workers are joined after the registry lock is released.
        let removed: Vec<Registered> = {
            let mut threads = lock(&self.threads);
            let (removed, kept) = std::mem::take(&mut *threads)
                .into_iter()
                .partition(|r| Arc::ptr_eq(&r.thread, thread));
            *threads = kept;
            removed
        };
        !removed.is_empty()
    }

    /// Takes the pending bit of `kind` from every universe.
    fn take_pending(&self, kind: ThreadKind) -> HashSet<UniverseId> {
        let mut pending = lock(&self.pending);
        let mut taken = HashSet::new();
        for (universe, mask) in pending.iter_mut() {
            if mask.contains(kind.mask()) {
                mask.remove(kind.mask());
                taken.insert(*universe);
            }
        }
        pending.retain(|_, mask| !mask.is_empty());
        taken
    }

    fn has_work(&self) -> bool {
        if !lock(&self.pending).is_empty() {
            return true;
        }
        let threads: Vec<SharedThread> = lock(&self.threads)
            .iter()
            .map(|r| Arc::clone(&r.thread))
            .collect();
        threads.iter().any(|t| lock(t).runs_every_tick())
    }

    fn run_tick(&self) -> usize {
        let now = Instant::now();
        let frame = self.frame.fetch_add(1, Ordering::AcqRel) + 1;
        let threads: Vec<(UniverseId, ThreadKind, SharedThread, Option<Arc<SchedulerWorker>>)> =
            lock(&self.threads)
                .iter()
                .map(|r| (r.universe, r.kind, Arc::clone(&r.thread), r.worker.clone()))
                .collect();

        let mut ran = 0;
        for kind in ThreadKind::TICK_ORDER {
            // Requests made by earlier kinds in this tick are picked up here.
            let requested = self.take_pending(kind);
            if kind == ThreadKind::SoundScheduler && self.config.start_sound_polling {
                for universe in &requested {
                    self.timers.add(
                        now + self.config.sound_sample_time(),
                        TimerPayload::SoundPoll(*universe),
                    );
                }
            }
            for (universe, _, thread, worker) in threads.iter().filter(|(_, k, ..)| *k == kind) {
                if !requested.contains(universe) && !lock(thread).runs_every_tick() {
                    continue;
                }
                let done = match worker {
                    Some(worker) => worker.run(now),
                    None => {
                        lock(thread).do_work(now);
                        true
                    }
                };
                if done {
                    ran += 1;
                }
            }
        }
        log::trace!("MasterControl: frame {frame} ran {ran} threads");
        ran
    }

    fn universes(&self) -> HashSet<UniverseId> {
        lock(&self.threads).iter().map(|r| r.universe).collect()
    }
}

impl Coordinator for ControlState {
    fn send_run_message(&self, universe: UniverseId, threads: ThreadMask) {
        lock(&self.pending)
            .entry(universe)
            .or_insert(ThreadMask::EMPTY)
            .insert(threads);
        match self.wake_tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                log::trace!("MasterControl: run request after shutdown");
            }
        }
    }

    fn add_input_device_scheduler(&self, scheduler: SharedThread) {
        lock(&scheduler).activate();
        self.register(scheduler);
    }

    fn remove_input_device_scheduler(&self, scheduler: &SharedThread) {
        if self.unregister(scheduler) {
            lock(scheduler).deactivate();
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

/// The reference coordinator.
///
/// Threads register once; run requests accumulate in a per-universe pending
/// mask and each tick runs the requested threads (plus those that run every
/// tick) in [`ThreadKind::TICK_ORDER`]. Ticks are driven either by
/// [`run_tick`](Self::run_tick) or by the background thread started with
/// [`start`](Self::start).
///
/// The behavior and input-device schedulers each get a dedicated thread that
/// waits for the tick to reach them; the tick resumes once their work is done.
pub struct MasterControl {
    state: Arc<ControlState>,
    wake_rx: Receiver<()>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    timer: Option<TimerThread>,
    shut_down: bool,
}

impl MasterControl {
    /// Creates a stopped control with its own bus and timer queue.
    pub fn new(config: ArborConfig) -> Self {
        let (wake_tx, wake_rx) = crossbeam_channel::bounded(1);
        log::info!("MasterControl created ({} Hz).", config.tick_rate);
        Self {
            state: Arc::new(ControlState {
                config,
                bus: Arc::new(MessageBus::new()),
                timers: Arc::new(TimerQueue::new()),
                threads: Mutex::new(Vec::new()),
                pending: Mutex::new(HashMap::new()),
                frame: AtomicU64::new(0),
                wake_tx,
            }),
            wake_rx,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            timer: None,
            shut_down: false,
        }
    }

    /// The handle structures and schedulers are built with.
    pub fn coordinator(&self) -> Arc<dyn Coordinator> {
        self.state.clone()
    }

    /// The bus structures subscribe to.
    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.state.bus
    }

    /// The timer queue serviced by the timer thread.
    pub fn timers(&self) -> &Arc<TimerQueue> {
        &self.state.timers
    }

    /// The configuration in use.
    pub fn config(&self) -> &ArborConfig {
        &self.state.config
    }

    /// Ticks run so far.
    pub fn frame(&self) -> u64 {
        self.state.frame.load(Ordering::Acquire)
    }

    /// Adds a structure or scheduler. Registering twice is a no-op.
    pub fn register(&self, thread: SharedThread) {
        self.state.register(thread);
    }

    /// Removes a thread. Returns `false` if it was not registered.
    pub fn unregister(&self, thread: &SharedThread) -> bool {
        self.state.unregister(thread)
    }

    /// Number of registered threads.
    pub fn thread_count(&self) -> usize {
        lock(&self.state.threads).len()
    }

    /// Threads of `universe` requested for the next tick.
    pub fn pending(&self, universe: UniverseId) -> ThreadMask {
        lock(&self.state.pending)
            .get(&universe)
            .copied()
            .unwrap_or(ThreadMask::EMPTY)
    }

    /// Runs one tick on the calling thread; returns how many threads ran.
    pub fn run_tick(&self) -> usize {
        self.state.run_tick()
    }

    /// Returns `true` while the background threads run.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the timer thread and the tick thread.
    pub fn start(&mut self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.timer = Some(TimerThread::spawn(
            Arc::clone(&self.state.timers),
            self.coordinator(),
        )?);
        if self.state.config.start_sound_polling {
            let at = Instant::now() + self.state.config.sound_sample_time();
            for universe in self.state.universes() {
                self.state.timers.add(at, TimerPayload::SoundPoll(universe));
            }
        }

        let state = Arc::clone(&self.state);
        let running = Arc::clone(&self.running);
        let wake_rx = self.wake_rx.clone();
        let period = state.config.tick_period();
        let spawned = thread::Builder::new()
            .name("arbor-master".into())
            .spawn(move || {
                log::info!("MasterControl thread started.");
                while running.load(Ordering::Relaxed) {
                    let tick_start = Instant::now();
                    state.run_tick();

                    let elapsed = tick_start.elapsed();
                    if elapsed < period {
                        thread::sleep(period - elapsed);
                    }
                    if !state.has_work() {
                        let _ = wake_rx.recv_timeout(IDLE_WAIT);
                    }
                }
                log::info!("MasterControl thread stopped.");
            });
        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                if let Some(mut timer) = self.timer.take() {
                    timer.shutdown();
                }
                Err(anyhow::Error::new(e).context("failed to spawn the master control thread"))
            }
        }
    }

    /// Stops the tick thread and the timer thread, keeping registrations.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.state.wake_tx.try_send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("MasterControl thread panicked.");
            }
        }
        if let Some(mut timer) = self.timer.take() {
            timer.shutdown();
        }
    }

    /// Stops everything and shuts every registered thread down.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.stop();
        let registered: Vec<Registered> = lock(&self.state.threads).drain(..).collect();
        for Registered { thread, worker, .. } in registered {
            // Join the dedicated thread before tearing its scheduler down.
            drop(worker);
            lock(&thread).shutdown();
        }
        log::info!("MasterControl shut down after {} frames.", self.frame());
    }
}

impl Drop for MasterControl {
    fn drop(&mut self) {
        self.shutdown();
    }
}
