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

//! The thread that dispatches stimuli to behaviors whose condition is met.

use arbor_core::{ScheduledThread, Stopwatch, ThreadKind, UniverseId};
use arbor_data::behavior::{BehaviorContext, BehaviorNode, BehaviorStructure, CallbackPhase};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Counters of one scheduler, cumulative since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Ticks run.
    pub ticks: u64,
    /// Callbacks invoked.
    pub dispatched: u64,
    /// Snapshotted behaviors skipped because they were no longer ready.
    pub skipped: u64,
    /// Callbacks that failed or panicked.
    pub faults: u64,
}

/// Runs the `process_stimulus` callback of every scheduled behavior once
/// per tick.
///
/// The scheduling buckets are snapshotted and emptied at the start of the
/// tick, so anything armed or met while callbacks run waits for the next
/// tick. The structure lock is never held across a callback.
pub struct BehaviorScheduler {
    universe: UniverseId,
    structure: Arc<Mutex<BehaviorStructure>>,
    stats: SchedulerStats,
}

impl BehaviorScheduler {
    /// Creates a scheduler over `structure`.
    pub fn new(universe: UniverseId, structure: Arc<Mutex<BehaviorStructure>>) -> Self {
        Self {
            universe,
            structure,
            stats: SchedulerStats::default(),
        }
    }

    /// Counters since creation.
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    fn structure(&self) -> MutexGuard<'_, BehaviorStructure> {
        self.structure.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs one scheduling tick and returns the number of callbacks invoked.
    pub fn tick(&mut self) -> usize {
        let stopwatch = Stopwatch::new();
        let (batch, frame) = {
            let mut structure = self.structure();
            (structure.take_scheduled(), structure.frame())
        };
        self.stats.ticks += 1;

        let mut dispatched = 0;
        for node in &batch {
            // Removal or disabling may have raced the snapshot.
            if !node.is_ready() {
                log::debug!("BehaviorScheduler: {} no longer ready, skipped", node.id());
                self.stats.skipped += 1;
                continue;
            }
            self.dispatch(node, frame);
            dispatched += 1;
        }
        self.stats.dispatched += dispatched as u64;

        if dispatched > 0 {
            log::trace!(
                "BehaviorScheduler: {dispatched} behaviors in {}us",
                stopwatch.elapsed_us()
            );
        }
        dispatched
    }

    fn dispatch(&mut self, node: &Arc<BehaviorNode>, frame: u64) {
        let mut ctx = BehaviorContext::new(node, frame);
        let outcome = node.run_callback(CallbackPhase::ProcessStimulus, &mut ctx);

        let mut structure = self.structure.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(fault) = outcome {
            log::error!("Behavior {} process_stimulus: {fault}", node.id());
            self.stats.faults += 1;
            structure.clean_tree(node);
            return;
        }
        match ctx.take_wakeup() {
            Some(wakeup) => {
                if let Err(e) = structure.arm(node, &wakeup) {
                    log::debug!("BehaviorScheduler: {} not re-armed: {e}", node.id());
                    structure.clean_tree(node);
                }
            }
            None => structure.clean_tree(node),
        }
        for post_id in ctx.take_posts() {
            structure.post(node.id(), post_id);
        }
    }
}

impl ScheduledThread for BehaviorScheduler {
    fn kind(&self) -> ThreadKind {
        ThreadKind::BehaviorScheduler
    }

    fn universe(&self) -> UniverseId {
        self.universe
    }

    fn do_work(&mut self, _reference_time: Instant) {
        self.tick();
    }
}

impl std::fmt::Debug for BehaviorScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorScheduler")
            .field("universe", &self.universe)
            .field("stats", &self.stats)
            .finish()
    }
}
