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

//! # Behavior Structure
//!
//! The structure-update pass that owns every live behavior of a universe.
//! It applies behavior lifecycle messages, keeps armed criteria filed by
//! kind, evaluates them (posts, frames, fired timers, activation, sensors),
//! and moves behaviors whose condition is met into per-interval buckets for
//! the behavior scheduler.

use super::node::{
    BehaviorContext, BehaviorNode, CallbackPhase, LIST_SCHEDULED, NUM_SCHEDULING_INTERVALS,
};
use crate::input::SensorBoard;
use crate::timer::{CriterionRef, TimerPayload, TimerQueue};
use crate::wakeup::{CondId, ConditionTree, Criterion, Wakeup};
use arbor_core::indexed::IndexedUnorderedSet;
use arbor_core::math::Aabb;
use arbor_core::message::{Delivery, MessageBus, MessageQueue, MessageType};
use arbor_core::{
    ArborError, BehaviorId, Coordinator, ScheduledThread, SensorId, ThreadKind, ThreadMask,
    UniverseId,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// One armed criterion, as filed in a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Armed {
    behavior: BehaviorId,
    generation: u64,
    node: CondId,
}

#[derive(Debug)]
struct SensorWatch {
    armed: Armed,
    region: Aabb,
    entry: bool,
    inside: HashSet<SensorId>,
}

/// Armed criteria filed by kind. Elapsed-time criteria live in the timer queue.
#[derive(Debug, Default)]
struct Registries {
    posts: Vec<(Armed, Criterion)>,
    frames: Vec<(Armed, u32)>,
    activation: Vec<Armed>,
    deactivation: Vec<Armed>,
    sensors: Vec<SensorWatch>,
}

impl Registries {
    fn detach(&mut self, behavior: BehaviorId) {
        self.posts.retain(|(a, _)| a.behavior != behavior);
        self.frames.retain(|(a, _)| a.behavior != behavior);
        self.activation.retain(|a| a.behavior != behavior);
        self.deactivation.retain(|a| a.behavior != behavior);
        self.sensors.retain(|w| w.armed.behavior != behavior);
    }
}

/// What made a criterion fire.
#[derive(Debug, Clone, Copy, Default)]
struct Cause {
    sensor: Option<SensorId>,
    post: Option<(BehaviorId, i64)>,
}

/// The behavior structure of one universe.
pub struct BehaviorStructure {
    universe: UniverseId,
    queue: MessageQueue,
    coordinator: Arc<dyn Coordinator>,
    timers: Arc<TimerQueue>,
    sensors: Option<Arc<SensorBoard>>,
    behaviors: HashMap<BehaviorId, Arc<BehaviorNode>>,
    scheduled: Vec<IndexedUnorderedSet<BehaviorNode>>,
    registries: Registries,
    activation_volume: Option<Aabb>,
    frame: u64,
}

impl BehaviorStructure {
    /// Creates the structure and subscribes it to `bus`.
    pub fn new(
        universe: UniverseId,
        bus: &MessageBus,
        coordinator: Arc<dyn Coordinator>,
        timers: Arc<TimerQueue>,
    ) -> Self {
        log::info!("BehaviorStructure created for {universe}");
        Self {
            universe,
            queue: bus.subscribe(universe, ThreadKind::UpdateBehavior),
            coordinator,
            timers,
            sensors: None,
            behaviors: HashMap::new(),
            scheduled: (0..NUM_SCHEDULING_INTERVALS)
                .map(|_| IndexedUnorderedSet::new(universe, LIST_SCHEDULED))
                .collect(),
            registries: Registries::default(),
            activation_volume: None,
            frame: 0,
        }
    }

    /// Reads sensor criteria from `board`.
    pub fn with_sensors(mut self, board: Arc<SensorBoard>) -> Self {
        self.sensors = Some(board);
        self
    }

    /// The frames counted so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// The live behavior with `id`.
    pub fn behavior(&self, id: BehaviorId) -> Option<&Arc<BehaviorNode>> {
        self.behaviors.get(&id)
    }

    /// Number of live behaviors.
    pub fn live_count(&self) -> usize {
        self.behaviors.len()
    }

    /// Number of behaviors waiting in the scheduling buckets.
    pub fn scheduled_count(&self) -> usize {
        self.scheduled.iter().map(IndexedUnorderedSet::len).sum()
    }

    /// Sets the volume scheduling bounds are tested against. `None` makes
    /// every behavior active.
    pub fn set_activation_volume(&mut self, volume: Option<Aabb>) {
        self.activation_volume = volume;
        self.coordinator
            .send_run_message(self.universe, ThreadMask::UPDATE_BEHAVIOR);
    }

    // --- Message processing ---

    /// Applies every queued lifecycle message. Messages queued meanwhile
    /// wait for the next pass.
    pub fn process_messages(&mut self) {
        for delivery in self.queue.drain() {
            self.process_message(&delivery);
        }
    }

    fn process_message(&mut self, delivery: &Delivery) {
        match delivery.kind() {
            MessageType::InsertBehavior => match delivery.object().downcast::<BehaviorNode>() {
                Some(node) => self.insert_behavior(node),
                None => log::warn!("BehaviorStructure: insert without a behavior payload"),
            },
            MessageType::RemoveBehavior => {
                if let Some(node) = self.lookup(delivery) {
                    self.remove_behavior(&node);
                }
            }
            MessageType::BehaviorEnable | MessageType::BehaviorDisable => {
                if let Some(node) = self.lookup(delivery) {
                    let enabled = delivery.kind() == MessageType::BehaviorEnable;
                    node.state().enabled = enabled;
                    if enabled {
                        self.schedule(&node);
                    } else {
                        self.scheduled.iter_mut().for_each(|b| {
                            b.remove(&node);
                        });
                    }
                }
            }
            MessageType::SchedulingIntervalUpdate => {
                let interval = delivery.arg(0).as_int().and_then(|i| usize::try_from(i).ok());
                match (self.lookup(delivery), interval) {
                    (Some(node), Some(interval)) if interval < NUM_SCHEDULING_INTERVALS => {
                        self.move_to_interval(&node, interval);
                    }
                    (Some(node), _) => log::warn!(
                        "BehaviorStructure: {} got an invalid scheduling interval {:?}",
                        node.id(),
                        delivery.arg(0)
                    ),
                    (None, _) => {}
                }
            }
            MessageType::BehaviorPost => {
                match (delivery.object().as_behavior(), delivery.arg(0).as_int()) {
                    (Some(source), Some(post_id)) => self.behavior_post(source, post_id),
                    _ => log::warn!("BehaviorStructure: malformed behavior post"),
                }
            }
            other => log::trace!("BehaviorStructure: ignoring {other:?}"),
        }
    }

    fn lookup(&self, delivery: &Delivery) -> Option<Arc<BehaviorNode>> {
        let id = delivery.object().as_behavior()?;
        let node = self.behaviors.get(&id).cloned();
        if node.is_none() {
            log::debug!("BehaviorStructure: {:?} for unknown {id}", delivery.kind());
        }
        node
    }

    fn insert_behavior(&mut self, node: Arc<BehaviorNode>) {
        if node.universe() != self.universe {
            log::warn!(
                "BehaviorStructure: {} belongs to {}, not {}",
                node.id(),
                node.universe(),
                self.universe
            );
            return;
        }
        if self.behaviors.contains_key(&node.id()) {
            return;
        }
        node.state().live = true;
        self.behaviors.insert(node.id(), Arc::clone(&node));
        self.refresh_activation(&node);
        log::debug!("BehaviorStructure: {} is live", node.id());

        let mut ctx = BehaviorContext::new(&node, self.frame);
        match node.run_callback(CallbackPhase::Initialize, &mut ctx) {
            Ok(()) => {
                if let Some(wakeup) = ctx.take_wakeup() {
                    if let Err(e) = self.arm(&node, &wakeup) {
                        log::warn!("BehaviorStructure: arming {} failed: {e}", node.id());
                    }
                }
                for post_id in ctx.take_posts() {
                    self.post(node.id(), post_id);
                }
            }
            Err(fault) => log::error!("Behavior {} initialize: {fault}", node.id()),
        }
    }

    fn remove_behavior(&mut self, node: &Arc<BehaviorNode>) {
        self.clean_tree(node);
        node.state().live = false;
        self.behaviors.remove(&node.id());
        log::debug!("BehaviorStructure: {} left the live graph", node.id());
    }

    fn move_to_interval(&mut self, node: &Arc<BehaviorNode>, interval: usize) {
        let previous = std::mem::replace(&mut node.state().interval, interval);
        if previous != interval && self.scheduled[previous].remove(node) {
            self.scheduled[interval].add(Arc::clone(node));
        }
    }

    // --- Arming ---

    /// Arms `wakeup` for `node`, replacing any previous condition.
    pub fn arm(&mut self, node: &Arc<BehaviorNode>, wakeup: &Wakeup) -> arbor_core::Result<()> {
        if !self.behaviors.contains_key(&node.id()) {
            return Err(ArborError::UnknownBehavior(node.id()));
        }
        self.detach(node);
        let watches_sensors = wakeup.criteria().any(|c| {
            matches!(c, Criterion::SensorEntry(_) | Criterion::SensorExit(_))
        });
        let readings = if watches_sensors {
            self.sensor_positions()
        } else {
            Vec::new()
        };

        let mut state = node.state();
        if let Some(old) = state.condition.as_mut() {
            old.clean_tree();
        }
        state.generation += 1;
        state.triggering_sensor = None;
        state.triggering_post = None;
        let tree = ConditionTree::build(wakeup);
        let now = Instant::now();
        for (cond, criterion) in tree.criteria() {
            let armed = Armed {
                behavior: node.id(),
                generation: state.generation,
                node: cond,
            };
            match criterion {
                Criterion::ElapsedTime(after) => {
                    self.timers.add(
                        now + *after,
                        TimerPayload::Criterion(CriterionRef {
                            universe: self.universe,
                            behavior: armed.behavior,
                            generation: armed.generation,
                            node: armed.node,
                        }),
                    );
                }
                Criterion::ElapsedFrames(frames) => {
                    self.registries.frames.push((armed, (*frames).max(1)));
                }
                Criterion::BehaviorPost { .. } => {
                    self.registries.posts.push((armed, criterion.clone()));
                }
                Criterion::Activation => self.registries.activation.push(armed),
                Criterion::Deactivation => self.registries.deactivation.push(armed),
                Criterion::SensorEntry(region) | Criterion::SensorExit(region) => {
                    let inside = readings
                        .iter()
                        .filter(|(_, position)| region.contains_point(*position))
                        .map(|(id, _)| *id)
                        .collect();
                    self.registries.sensors.push(SensorWatch {
                        armed,
                        region: *region,
                        entry: matches!(criterion, Criterion::SensorEntry(_)),
                        inside,
                    });
                }
            }
        }
        state.condition = Some(tree);
        state.condition_set = true;
        log::trace!("BehaviorStructure: {} armed (generation {})", node.id(), state.generation);
        Ok(())
    }

    /// Disarms `node`: resets its condition, detaches its criteria from
    /// every registry and the timer queue, and drops it from the buckets.
    ///
    /// Works from ids only, so it is safe for a behavior that has since moved
    /// to another universe, and safe to repeat.
    pub fn clean_tree(&mut self, node: &Arc<BehaviorNode>) {
        self.detach(node);
        let mut state = node.state();
        if let Some(tree) = state.condition.as_mut() {
            tree.clean_tree();
        }
        state.condition_set = false;
    }

    fn detach(&mut self, node: &Arc<BehaviorNode>) {
        self.registries.detach(node.id());
        self.timers.remove_behavior(node.id());
        for bucket in &mut self.scheduled {
            bucket.remove(node);
        }
    }

    // --- Evaluation ---

    fn fire(&mut self, armed: Armed, cause: Cause) {
        let Some(node) = self.behaviors.get(&armed.behavior).cloned() else {
            return;
        };
        let met = {
            let mut state = node.state();
            if state.generation != armed.generation || !state.condition_set {
                return;
            }
            let met = state
                .condition
                .as_mut()
                .is_some_and(|tree| tree.trigger(armed.node));
            if cause.sensor.is_some() {
                state.triggering_sensor = cause.sensor;
            }
            if cause.post.is_some() {
                state.triggering_post = cause.post;
            }
            met
        };
        if met {
            self.schedule(&node);
        }
    }

    /// Queues `node` for the scheduler if its condition is met and it may run.
    fn schedule(&mut self, node: &Arc<BehaviorNode>) {
        let interval = {
            let state = node.state();
            let Some(tree) = state.condition.as_ref() else {
                return;
            };
            let woken_by_deactivation = tree
                .triggered_criteria()
                .any(|c| *c == Criterion::Deactivation);
            if !(state.live && state.enabled && state.condition_set && tree.is_met()) {
                return;
            }
            if !state.active && !woken_by_deactivation {
                return;
            }
            state.interval
        };
        if self.scheduled[interval].add(Arc::clone(node)) {
            self.coordinator
                .send_run_message(self.universe, ThreadMask::BEHAVIOR_SCHEDULER);
        }
    }

    /// Empties every bucket, lowest interval first.
    ///
    /// Everything scheduled after this call waits for the next snapshot.
    pub fn take_scheduled(&mut self) -> Vec<Arc<BehaviorNode>> {
        self.scheduled
            .iter_mut()
            .flat_map(IndexedUnorderedSet::take_all)
            .collect()
    }

    fn behavior_post(&mut self, source: BehaviorId, post_id: i64) {
        let matching: Vec<Armed> = self
            .registries
            .posts
            .iter()
            .filter(|(_, criterion)| criterion.matches_post(source, post_id))
            .map(|(armed, _)| *armed)
            .collect();
        for armed in matching {
            self.fire(
                armed,
                Cause {
                    post: Some((source, post_id)),
                    ..Cause::default()
                },
            );
        }
    }

    /// Posts `post_id` on behalf of `source`. Delivered on a later pass.
    pub fn post(&self, source: BehaviorId, post_id: i64) {
        self.coordinator
            .process_message(BehaviorNode::post_message(self.universe, source, post_id));
    }

    fn fired_timers(&mut self) {
        for fired in self.timers.take_fired(self.universe) {
            self.fire(
                Armed {
                    behavior: fired.behavior,
                    generation: fired.generation,
                    node: fired.node,
                },
                Cause::default(),
            );
        }
    }

    fn frame_elapsed(&mut self) {
        let mut due = Vec::new();
        self.registries.frames.retain_mut(|(armed, remaining)| {
            *remaining -= 1;
            if *remaining == 0 {
                due.push(*armed);
                false
            } else {
                true
            }
        });
        for armed in due {
            self.fire(armed, Cause::default());
        }
    }

    fn is_active_in(volume: Option<Aabb>, bounds: Option<Aabb>) -> bool {
        match (volume, bounds) {
            (None, _) | (_, None) => true,
            (Some(volume), Some(bounds)) => volume.intersects_aabb(&bounds),
        }
    }

    /// Recomputes `node`'s activation; returns the transition, if any.
    fn refresh_activation(&self, node: &BehaviorNode) -> Option<bool> {
        let mut state = node.state();
        let active = Self::is_active_in(self.activation_volume, state.scheduling_bounds);
        if active == state.active {
            return None;
        }
        state.active = active;
        Some(active)
    }

    fn update_activation(&mut self) {
        let nodes: Vec<Arc<BehaviorNode>> = self.behaviors.values().cloned().collect();
        for node in nodes {
            let Some(active) = self.refresh_activation(&node) else {
                continue;
            };
            let registry = if active {
                &self.registries.activation
            } else {
                &self.registries.deactivation
            };
            let due: Vec<Armed> = registry
                .iter()
                .filter(|a| a.behavior == node.id())
                .copied()
                .collect();
            for armed in due {
                self.fire(armed, Cause::default());
            }
            if active {
                // Met while inactive: runs now that it is active again.
                self.schedule(&node);
            }
        }
    }

    fn sensor_positions(&self) -> Vec<(SensorId, arbor_core::math::Vec3)> {
        self.sensors
            .as_ref()
            .map(|board| {
                board
                    .sensor_readings()
                    .into_iter()
                    .map(|(id, reading)| (id, reading.position))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn update_sensors(&mut self) {
        if self.registries.sensors.is_empty() {
            return;
        }
        let readings = self.sensor_positions();
        let mut due = Vec::new();
        for watch in &mut self.registries.sensors {
            for (id, position) in &readings {
                let inside = watch.region.contains_point(*position);
                let was_inside = if inside {
                    !watch.inside.insert(*id)
                } else {
                    watch.inside.remove(id)
                };
                let crossed = inside != was_inside;
                if crossed && inside == watch.entry {
                    due.push((watch.armed, *id));
                }
            }
        }
        for (armed, sensor) in due {
            self.fire(
                armed,
                Cause {
                    sensor: Some(sensor),
                    ..Cause::default()
                },
            );
        }
    }
}

impl ScheduledThread for BehaviorStructure {
    fn kind(&self) -> ThreadKind {
        ThreadKind::UpdateBehavior
    }

    fn universe(&self) -> UniverseId {
        self.universe
    }

    fn do_work(&mut self, _reference_time: Instant) {
        // Frame criteria armed during this pass count from the next one.
        self.frame += 1;
        self.frame_elapsed();
        self.process_messages();
        self.fired_timers();
        self.update_activation();
        self.update_sensors();
    }

    fn runs_every_tick(&self) -> bool {
        !self.registries.frames.is_empty() || !self.registries.sensors.is_empty()
    }

    fn shutdown(&mut self) {
        let nodes: Vec<_> = self.behaviors.values().cloned().collect();
        for node in &nodes {
            self.remove_behavior(node);
        }
        self.timers.discard_universe(self.universe);
    }
}

impl std::fmt::Debug for BehaviorStructure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorStructure")
            .field("universe", &self.universe)
            .field("live", &self.behaviors.len())
            .field("scheduled", &self.scheduled_count())
            .field("frame", &self.frame)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::Behavior;
    use arbor_core::math::Vec3;
    use arbor_core::{RecordingCoordinator, TicketAllocator};
    use std::time::Duration;

    const U: UniverseId = UniverseId(1);

    struct Arms(Option<Wakeup>);

    impl Behavior for Arms {
        fn initialize(&mut self, ctx: &mut BehaviorContext) -> anyhow::Result<()> {
            if let Some(wakeup) = self.0.clone() {
                ctx.wakeup_on(wakeup);
            }
            Ok(())
        }
        fn process_stimulus(&mut self, _ctx: &mut BehaviorContext) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct Fixture {
        ids: TicketAllocator,
        coordinator: Arc<RecordingCoordinator>,
        timers: Arc<TimerQueue>,
        structure: BehaviorStructure,
    }

    impl Fixture {
        fn new() -> Self {
            let bus = Arc::new(MessageBus::new());
            let coordinator = Arc::new(RecordingCoordinator::new(Arc::clone(&bus)));
            let timers = Arc::new(TimerQueue::new());
            let structure =
                BehaviorStructure::new(U, &bus, coordinator.clone(), Arc::clone(&timers));
            Self {
                ids: TicketAllocator::new(),
                coordinator,
                timers,
                structure,
            }
        }

        fn insert(&mut self, wakeup: Option<Wakeup>) -> Arc<BehaviorNode> {
            let node = BehaviorNode::new(&self.ids, U, Arms(wakeup));
            self.coordinator.process_message(node.insert_message());
            self.tick();
            node
        }

        fn tick(&mut self) {
            self.structure.do_work(Instant::now());
        }
    }

    #[test]
    fn insert_runs_initialize_and_arms() {
        let mut fx = Fixture::new();
        let node = fx.insert(Some(Wakeup::on(Criterion::ElapsedFrames(2))));

        assert!(node.is_live());
        assert!(node.condition_set());
        assert_eq!(fx.structure.live_count(), 1);
        assert!(fx.structure.runs_every_tick());
    }

    #[test]
    fn elapsed_frames_count_structure_passes() {
        let mut fx = Fixture::new();
        let node = fx.insert(Some(Wakeup::on(Criterion::ElapsedFrames(2))));
        fx.coordinator.take_run_requests();

        fx.tick();
        assert_eq!(fx.structure.scheduled_count(), 0);
        fx.tick();
        assert_eq!(fx.structure.scheduled_count(), 1);
        assert!(fx
            .coordinator
            .requested_threads(U)
            .contains(ThreadMask::BEHAVIOR_SCHEDULER));

        let taken = fx.structure.take_scheduled();
        assert!(Arc::ptr_eq(&taken[0], &node));
        assert_eq!(fx.structure.scheduled_count(), 0);
    }

    #[test]
    fn posts_reach_matching_behaviors_on_the_next_pass() {
        let mut fx = Fixture::new();
        let listener = fx.insert(Some(Wakeup::on(Criterion::BehaviorPost {
            source: None,
            post_id: Some(9),
        })));
        let other = fx.insert(Some(Wakeup::on(Criterion::BehaviorPost {
            source: None,
            post_id: Some(1),
        })));

        fx.structure.post(other.id(), 9);
        assert_eq!(fx.structure.scheduled_count(), 0);
        fx.tick();

        let taken = fx.structure.take_scheduled();
        assert_eq!(taken.len(), 1);
        assert!(Arc::ptr_eq(&taken[0], &listener));
        assert_eq!(listener.state().triggering_post, Some((other.id(), 9)));
    }

    #[test]
    fn fired_timers_trigger_their_criterion() {
        let mut fx = Fixture::new();
        let node = fx.insert(Some(Wakeup::on(Criterion::ElapsedTime(Duration::from_millis(1)))));
        assert_eq!(fx.timers.len(), 1);

        let expired = fx.timers.poll_expired(Duration::from_millis(200));
        for payload in expired {
            if let TimerPayload::Criterion(criterion) = payload {
                fx.timers.mark_fired(criterion);
            }
        }
        fx.tick();

        assert!(node.is_ready());
        assert_eq!(fx.structure.scheduled_count(), 1);
    }

    #[test]
    fn clean_tree_detaches_every_registry() {
        let mut fx = Fixture::new();
        let wakeup = Wakeup::or([
            Criterion::ElapsedTime(Duration::from_secs(60)),
            Criterion::ElapsedFrames(3),
            Criterion::Activation,
        ])
        .unwrap();
        let node = fx.insert(Some(wakeup));
        assert_eq!(fx.timers.len(), 1);

        fx.structure.clean_tree(&node);
        fx.structure.clean_tree(&node);

        assert!(!node.condition_set());
        assert!(fx.timers.is_empty());
        assert!(!fx.structure.runs_every_tick());
    }

    #[test]
    fn shutdown_empties_the_fired_inbox() {
        let mut fx = Fixture::new();
        let node = fx.insert(Some(Wakeup::on(Criterion::ElapsedTime(Duration::from_secs(60)))));
        // Fired for a behavior that already left the structure.
        fx.timers.mark_fired(CriterionRef {
            universe: U,
            behavior: BehaviorId(999),
            generation: 1,
            node: 0,
        });

        fx.structure.shutdown();

        assert!(fx.timers.is_empty());
        assert!(fx.timers.take_fired(U).is_empty());
        assert!(!node.is_live());
    }

    #[test]
    fn stale_generation_is_ignored() {
        let mut fx = Fixture::new();
        let node = fx.insert(Some(Wakeup::on(Criterion::ElapsedFrames(1))));
        let stale = Armed {
            behavior: node.id(),
            generation: 0,
            node: 0,
        };
        fx.structure.fire(stale, Cause::default());
        assert!(!node.is_ready());
    }

    #[test]
    fn removal_disarms_and_forgets() {
        let mut fx = Fixture::new();
        let node = fx.insert(Some(Wakeup::on(Criterion::ElapsedTime(Duration::from_secs(60)))));

        fx.coordinator.process_message(node.remove_message());
        fx.tick();

        assert!(!node.is_live());
        assert!(!node.condition_set());
        assert_eq!(fx.structure.live_count(), 0);
        assert!(fx.timers.is_empty());
    }

    #[test]
    fn disabled_behaviors_wait_until_enabled() {
        let mut fx = Fixture::new();
        let node = fx.insert(Some(Wakeup::on(Criterion::ElapsedFrames(1))));
        fx.coordinator.process_message(node.enable_message(false));
        fx.tick();
        assert!(node.state().condition.as_ref().unwrap().is_met());
        assert_eq!(fx.structure.scheduled_count(), 0);

        fx.coordinator.process_message(node.enable_message(true));
        fx.tick();
        assert_eq!(fx.structure.scheduled_count(), 1);
    }

    #[test]
    fn interval_update_moves_scheduled_behaviors() {
        let mut fx = Fixture::new();
        let node = fx.insert(Some(Wakeup::on(Criterion::ElapsedFrames(1))));
        fx.tick();
        assert_eq!(fx.structure.scheduled[5].len(), 1);

        fx.coordinator
            .process_message(node.interval_message(0).unwrap());
        fx.tick();
        assert_eq!(fx.structure.scheduled[0].len(), 1);
        assert_eq!(fx.structure.scheduled[5].len(), 0);
        assert_eq!(node.scheduling_interval(), 0);
    }

    #[test]
    fn activation_transitions_fire_criteria() {
        let mut fx = Fixture::new();
        let node = fx.insert(Some(Wakeup::on(Criterion::Activation)));
        node.set_scheduling_bounds(Some(Aabb::from_center_half_extents(
            Vec3::new(50.0, 0.0, 0.0),
            Vec3::ONE,
        )));

        fx.structure
            .set_activation_volume(Some(Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(5.0))));
        fx.tick();
        assert!(!node.is_active());
        assert_eq!(fx.structure.scheduled_count(), 0);

        fx.structure
            .set_activation_volume(Some(Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(100.0))));
        fx.tick();
        assert!(node.is_active());
        assert_eq!(fx.structure.scheduled_count(), 1);
    }

    #[test]
    fn sensor_entry_fires_on_crossing_only() {
        let bus = Arc::new(MessageBus::new());
        let coordinator = Arc::new(RecordingCoordinator::new(Arc::clone(&bus)));
        let board = Arc::new(SensorBoard::new());
        let handle = board.register(SensorId(3));
        handle.publish(Vec3::new(10.0, 0.0, 0.0), 0);
        let mut structure = BehaviorStructure::new(
            U,
            &bus,
            coordinator.clone(),
            Arc::new(TimerQueue::new()),
        )
        .with_sensors(Arc::clone(&board));

        let ids = TicketAllocator::new();
        let region = Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ONE);
        let node = BehaviorNode::new(&ids, U, Arms(Some(Wakeup::on(Criterion::SensorEntry(region)))));
        coordinator.process_message(node.insert_message());
        structure.do_work(Instant::now());
        assert_eq!(structure.scheduled_count(), 0);

        handle.publish(Vec3::ZERO, 0);
        structure.do_work(Instant::now());

        assert_eq!(structure.scheduled_count(), 1);
        assert_eq!(node.state().triggering_sensor, Some(SensorId(3)));
    }
}
