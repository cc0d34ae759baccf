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

//! Behavior nodes, the application callback contract, and the context a
//! callback runs with.

use crate::wakeup::{ConditionTree, Criterion, Wakeup};
use arbor_core::indexed::{IndexedObject, ListIndices};
use arbor_core::math::Aabb;
use arbor_core::message::{Message, MessageArg, MessageType};
use arbor_core::{ArborError, BehaviorId, SensorId, ThreadMask, TicketAllocator, UniverseId};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Number of scheduling-interval buckets.
pub const NUM_SCHEDULING_INTERVALS: usize = 10;

/// The interval a behavior starts in.
pub const DEFAULT_SCHEDULING_INTERVAL: usize = 5;

/// List type of the scheduling buckets in a behavior's [`ListIndices`].
pub(crate) const LIST_SCHEDULED: usize = 0;
const LIST_TYPES: usize = 1;

/// Application logic attached to a behavior node.
///
/// Both hooks run on scheduler threads. Returning an error or panicking is
/// contained: the failure is logged and the behavior is left unarmed.
pub trait Behavior: Send {
    /// Called once when the behavior goes live. Usually arms the first
    /// wakeup condition through [`BehaviorContext::wakeup_on`].
    fn initialize(&mut self, ctx: &mut BehaviorContext) -> anyhow::Result<()>;

    /// Called when the armed condition is met. The behavior stays scheduled
    /// only if it re-arms through [`BehaviorContext::wakeup_on`].
    fn process_stimulus(&mut self, ctx: &mut BehaviorContext) -> anyhow::Result<()>;
}

/// Which hook [`BehaviorNode::run_callback`] invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackPhase {
    /// [`Behavior::initialize`]
    Initialize,
    /// [`Behavior::process_stimulus`]
    ProcessStimulus,
}

/// A callback that did not complete normally.
#[derive(Debug, Error)]
pub enum CallbackFault {
    /// The callback returned an error.
    #[error("callback failed: {0:#}")]
    Failed(anyhow::Error),
    /// The callback panicked.
    #[error("callback panicked: {0}")]
    Panicked(String),
}

/// What a callback sees and how it answers.
#[derive(Debug)]
pub struct BehaviorContext {
    behavior: BehaviorId,
    universe: UniverseId,
    frame: u64,
    triggered: Vec<Criterion>,
    triggering_sensor: Option<SensorId>,
    triggering_post: Option<(BehaviorId, i64)>,
    wakeup: Option<Wakeup>,
    posts: Vec<i64>,
}

impl BehaviorContext {
    /// Builds the context for `node`, capturing what fired its condition.
    pub fn new(node: &BehaviorNode, frame: u64) -> Self {
        let state = node.state();
        Self {
            behavior: node.id,
            universe: node.universe(),
            frame,
            triggered: state
                .condition
                .as_ref()
                .map(|tree| tree.triggered_criteria().cloned().collect())
                .unwrap_or_default(),
            triggering_sensor: state.triggering_sensor,
            triggering_post: state.triggering_post,
            wakeup: None,
            posts: Vec::new(),
        }
    }

    /// The behavior being run.
    pub fn behavior(&self) -> BehaviorId {
        self.behavior
    }

    /// The behavior's universe.
    pub fn universe(&self) -> UniverseId {
        self.universe
    }

    /// The frame the callback runs in.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// The criteria that fired, in firing order.
    pub fn triggered_criteria(&self) -> &[Criterion] {
        &self.triggered
    }

    /// The sensor behind the last sensor criterion that fired.
    pub fn triggering_sensor(&self) -> Option<SensorId> {
        self.triggering_sensor
    }

    /// The post behind the last post criterion that fired.
    pub fn triggering_post(&self) -> Option<(BehaviorId, i64)> {
        self.triggering_post
    }

    /// Arms `wakeup` once the callback returns. The last call wins.
    pub fn wakeup_on(&mut self, wakeup: impl Into<Wakeup>) {
        self.wakeup = Some(wakeup.into());
    }

    /// Posts `post_id` to other behaviors. Delivered on a later tick.
    pub fn post_id(&mut self, post_id: i64) {
        self.posts.push(post_id);
    }

    /// Takes the condition the callback armed, if any.
    pub fn take_wakeup(&mut self) -> Option<Wakeup> {
        self.wakeup.take()
    }

    /// Takes the ids the callback posted.
    pub fn take_posts(&mut self) -> Vec<i64> {
        std::mem::take(&mut self.posts)
    }
}

/// Scheduling state of a behavior, owned by its behavior structure.
#[derive(Debug)]
pub(crate) struct BehaviorState {
    pub(crate) live: bool,
    pub(crate) enabled: bool,
    pub(crate) active: bool,
    pub(crate) interval: usize,
    pub(crate) scheduling_bounds: Option<Aabb>,
    pub(crate) condition: Option<ConditionTree>,
    pub(crate) condition_set: bool,
    pub(crate) generation: u64,
    pub(crate) triggering_sensor: Option<SensorId>,
    pub(crate) triggering_post: Option<(BehaviorId, i64)>,
}

/// A behavior in the scene graph.
pub struct BehaviorNode {
    id: BehaviorId,
    indices: ListIndices,
    in_callback: AtomicBool,
    state: Mutex<BehaviorState>,
    callback: Mutex<Box<dyn Behavior>>,
}

impl BehaviorNode {
    /// Creates a behavior in `universe` running `behavior`.
    pub fn new(
        ids: &TicketAllocator,
        universe: UniverseId,
        behavior: impl Behavior + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: ids.behavior(),
            indices: ListIndices::new(universe, LIST_TYPES),
            in_callback: AtomicBool::new(false),
            state: Mutex::new(BehaviorState {
                live: false,
                enabled: true,
                active: true,
                interval: DEFAULT_SCHEDULING_INTERVAL,
                scheduling_bounds: None,
                condition: None,
                condition_set: false,
                generation: 0,
                triggering_sensor: None,
                triggering_post: None,
            }),
            callback: Mutex::new(Box::new(behavior)),
        })
    }

    /// The behavior id.
    pub fn id(&self) -> BehaviorId {
        self.id
    }

    /// The universe currently owning the behavior.
    pub fn universe(&self) -> UniverseId {
        self.indices.universe()
    }

    /// Hands the behavior to another universe.
    ///
    /// The old universe's structure can still find and drop it.
    pub fn migrate(&self, universe: UniverseId) {
        self.indices.inc_idx_used(universe);
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, BehaviorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` while the behavior is in a live graph.
    pub fn is_live(&self) -> bool {
        self.state().live
    }

    /// Returns `true` unless the behavior was disabled.
    pub fn is_enabled(&self) -> bool {
        self.state().enabled
    }

    /// Returns `true` while the scheduling bounds meet the activation volume.
    pub fn is_active(&self) -> bool {
        self.state().active
    }

    /// Returns `true` while a wakeup condition is armed.
    pub fn condition_set(&self) -> bool {
        self.state().condition_set
    }

    /// Returns `true` if the armed condition is met and the behavior may run.
    pub fn is_ready(&self) -> bool {
        let state = self.state();
        state.live
            && state.enabled
            && state.condition_set
            && state.condition.as_ref().is_some_and(ConditionTree::is_met)
    }

    /// The scheduling interval bucket.
    pub fn scheduling_interval(&self) -> usize {
        self.state().interval
    }

    /// Sets the region that must meet the activation volume for the
    /// behavior to be scheduled. `None` means always active.
    pub fn set_scheduling_bounds(&self, bounds: Option<Aabb>) {
        self.state().scheduling_bounds = bounds;
    }

    /// Returns `true` while a callback of this behavior is running.
    pub fn in_callback(&self) -> bool {
        self.in_callback.load(Ordering::Acquire)
    }

    /// The sensor that fired the current stimulus.
    ///
    /// Only meaningful while the behavior's callback is running.
    pub fn triggering_sensor(&self) -> arbor_core::Result<Option<SensorId>> {
        if !self.in_callback() {
            return Err(ArborError::NotInCallback("triggering_sensor"));
        }
        Ok(self.state().triggering_sensor)
    }

    /// Runs one hook with panics and errors contained.
    pub fn run_callback(
        &self,
        phase: CallbackPhase,
        ctx: &mut BehaviorContext,
    ) -> Result<(), CallbackFault> {
        self.in_callback.store(true, Ordering::Release);
        let outcome = {
            let mut callback = self.callback.lock().unwrap_or_else(PoisonError::into_inner);
            panic::catch_unwind(AssertUnwindSafe(|| match phase {
                CallbackPhase::Initialize => callback.initialize(ctx),
                CallbackPhase::ProcessStimulus => callback.process_stimulus(ctx),
            }))
        };
        self.in_callback.store(false, Ordering::Release);
        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(CallbackFault::Failed(e)),
            Err(payload) => Err(CallbackFault::Panicked(panic_message(payload.as_ref()))),
        }
    }

    // --- Messages ---

    fn message(&self, kind: MessageType) -> Message {
        Message::new(kind, ThreadMask::UPDATE_BEHAVIOR, self.universe())
            .with_object(MessageArg::Behavior(self.id))
    }

    /// The message that makes this behavior live.
    pub fn insert_message(self: &Arc<Self>) -> Message {
        let node: Arc<dyn Any + Send + Sync> = Arc::clone(self) as Arc<dyn Any + Send + Sync>;
        Message::new(MessageType::InsertBehavior, ThreadMask::UPDATE_BEHAVIOR, self.universe())
            .with_object(MessageArg::Value(node))
    }

    /// The message that takes this behavior out of the live graph.
    pub fn remove_message(&self) -> Message {
        self.message(MessageType::RemoveBehavior)
    }

    /// The message that enables or disables this behavior.
    pub fn enable_message(&self, enabled: bool) -> Message {
        self.message(if enabled {
            MessageType::BehaviorEnable
        } else {
            MessageType::BehaviorDisable
        })
    }

    /// The message that moves this behavior to another scheduling interval.
    pub fn interval_message(&self, interval: usize) -> arbor_core::Result<Message> {
        if interval >= NUM_SCHEDULING_INTERVALS {
            return Err(ArborError::InvalidSchedulingInterval {
                interval,
                max: NUM_SCHEDULING_INTERVALS,
            });
        }
        Ok(self
            .message(MessageType::SchedulingIntervalUpdate)
            .with_arg(0, MessageArg::Int(interval as i64)))
    }

    /// The message announcing that `source` posted `post_id`.
    pub fn post_message(universe: UniverseId, source: BehaviorId, post_id: i64) -> Message {
        Message::new(MessageType::BehaviorPost, ThreadMask::UPDATE_BEHAVIOR, universe)
            .with_object(MessageArg::Behavior(source))
            .with_arg(0, MessageArg::Int(post_id))
    }
}

impl IndexedObject for BehaviorNode {
    fn list_indices(&self) -> &ListIndices {
        &self.indices
    }
}

impl std::fmt::Debug for BehaviorNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorNode")
            .field("id", &self.id)
            .field("universe", &self.universe())
            .field("in_callback", &self.in_callback())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("non-string panic payload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    struct Probe {
        panic: bool,
        fail: bool,
    }

    impl Behavior for Probe {
        fn initialize(&mut self, ctx: &mut BehaviorContext) -> anyhow::Result<()> {
            ctx.wakeup_on(Criterion::Activation);
            ctx.wakeup_on(Criterion::Deactivation);
            ctx.post_id(4);
            Ok(())
        }

        fn process_stimulus(&mut self, _ctx: &mut BehaviorContext) -> anyhow::Result<()> {
            if self.panic {
                panic!("stimulus exploded");
            }
            if self.fail {
                bail!("stimulus refused");
            }
            Ok(())
        }
    }

    fn probe(panic: bool, fail: bool) -> Probe {
        Probe { panic, fail }
    }

    #[test]
    fn last_wakeup_wins() {
        let ids = TicketAllocator::new();
        let node = BehaviorNode::new(&ids, UniverseId(1), probe(false, false));
        let mut ctx = BehaviorContext::new(&node, 0);

        node.run_callback(CallbackPhase::Initialize, &mut ctx).unwrap();

        assert_eq!(ctx.take_wakeup(), Some(Wakeup::on(Criterion::Deactivation)));
        assert_eq!(ctx.take_posts(), vec![4]);
    }

    #[test]
    fn panics_and_errors_are_contained() {
        let ids = TicketAllocator::new();
        let panicking = BehaviorNode::new(&ids, UniverseId(1), probe(true, false));
        let failing = BehaviorNode::new(&ids, UniverseId(1), probe(false, true));

        let mut ctx = BehaviorContext::new(&panicking, 0);
        let fault = panicking
            .run_callback(CallbackPhase::ProcessStimulus, &mut ctx)
            .unwrap_err();
        assert!(matches!(fault, CallbackFault::Panicked(ref m) if m == "stimulus exploded"));
        assert!(!panicking.in_callback());
        // The callback lock is still usable after the panic.
        let mut ctx = BehaviorContext::new(&panicking, 1);
        assert!(panicking
            .run_callback(CallbackPhase::Initialize, &mut ctx)
            .is_ok());

        let mut ctx = BehaviorContext::new(&failing, 0);
        let fault = failing
            .run_callback(CallbackPhase::ProcessStimulus, &mut ctx)
            .unwrap_err();
        assert_eq!(fault.to_string(), "callback failed: stimulus refused");
    }

    #[test]
    fn triggering_sensor_requires_a_callback() {
        let ids = TicketAllocator::new();
        let node = BehaviorNode::new(&ids, UniverseId(1), probe(false, false));
        assert!(matches!(
            node.triggering_sensor(),
            Err(ArborError::NotInCallback("triggering_sensor"))
        ));
    }

    #[test]
    fn interval_messages_are_validated() {
        let ids = TicketAllocator::new();
        let node = BehaviorNode::new(&ids, UniverseId(1), probe(false, false));

        let message = node.interval_message(2).unwrap();
        assert_eq!(message.kind(), MessageType::SchedulingIntervalUpdate);
        assert_eq!(message.arg(0).as_int(), Some(2));
        assert!(node.interval_message(NUM_SCHEDULING_INTERVALS).is_err());
    }

    #[test]
    fn insert_message_carries_the_node() {
        let ids = TicketAllocator::new();
        let node = BehaviorNode::new(&ids, UniverseId(3), probe(false, false));
        let message = node.insert_message();

        let carried = message.object().downcast::<BehaviorNode>().expect("node payload");
        assert!(Arc::ptr_eq(&carried, &node));
        assert_eq!(message.universe(), UniverseId(3));
    }
}
