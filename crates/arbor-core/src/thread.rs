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

//! Thread kinds, thread masks, and the contract every scheduled thread implements.

use crate::arbor_bitflags;
use crate::ids::UniverseId;
use std::time::Instant;

arbor_bitflags! {
    /// A set of threads (schedulers and structure-update passes) a message
    /// or run request targets.
    pub struct ThreadMask: u32 {
        const BEHAVIOR_SCHEDULER = 1 << 0;
        const SOUND_SCHEDULER = 1 << 1;
        const INPUT_DEVICE_SCHEDULER = 1 << 2;
        const RENDER_THREAD = 1 << 3;
        const UPDATE_GEOMETRY = 1 << 4;
        const UPDATE_RENDER = 1 << 5;
        const UPDATE_BEHAVIOR = 1 << 6;
        const UPDATE_SOUND = 1 << 7;
        const UPDATE_RENDERING_ATTRIBUTES = 1 << 8;
        const UPDATE_RENDERING_ENVIRONMENT = 1 << 9;
        const UPDATE_TRANSFORM = 1 << 10;
    }
}

/// A single thread kind. Each maps to exactly one bit of [`ThreadMask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ThreadKind {
    /// Dispatches behavior stimuli.
    BehaviorScheduler,
    /// Drives spatialized sound.
    SoundScheduler,
    /// Polls non-blocking input devices.
    InputDeviceScheduler,
    /// Renders and swaps.
    RenderThread,
    /// Geometry structure update pass.
    UpdateGeometry,
    /// Render-bin update pass.
    UpdateRender,
    /// Behavior structure update pass.
    UpdateBehavior,
    /// Sound structure update pass.
    UpdateSound,
    /// Rendering-attributes structure update pass.
    UpdateRenderingAttributes,
    /// Rendering-environment (fog, lights, clip) structure update pass.
    UpdateRenderingEnvironment,
    /// Transform structure update pass.
    UpdateTransform,
}

impl ThreadKind {
    /// Every thread kind, in the order the coordinator runs them within a tick.
    ///
    /// Structure updates run before the schedulers that consume them, the
    /// renderer runs last.
    pub const TICK_ORDER: [ThreadKind; 11] = [
        ThreadKind::UpdateTransform,
        ThreadKind::UpdateGeometry,
        ThreadKind::UpdateRenderingAttributes,
        ThreadKind::UpdateRenderingEnvironment,
        ThreadKind::UpdateBehavior,
        ThreadKind::UpdateSound,
        ThreadKind::InputDeviceScheduler,
        ThreadKind::BehaviorScheduler,
        ThreadKind::SoundScheduler,
        ThreadKind::UpdateRender,
        ThreadKind::RenderThread,
    ];

    /// The mask bit for this kind.
    pub const fn mask(self) -> ThreadMask {
        match self {
            ThreadKind::BehaviorScheduler => ThreadMask::BEHAVIOR_SCHEDULER,
            ThreadKind::SoundScheduler => ThreadMask::SOUND_SCHEDULER,
            ThreadKind::InputDeviceScheduler => ThreadMask::INPUT_DEVICE_SCHEDULER,
            ThreadKind::RenderThread => ThreadMask::RENDER_THREAD,
            ThreadKind::UpdateGeometry => ThreadMask::UPDATE_GEOMETRY,
            ThreadKind::UpdateRender => ThreadMask::UPDATE_RENDER,
            ThreadKind::UpdateBehavior => ThreadMask::UPDATE_BEHAVIOR,
            ThreadKind::UpdateSound => ThreadMask::UPDATE_SOUND,
            ThreadKind::UpdateRenderingAttributes => ThreadMask::UPDATE_RENDERING_ATTRIBUTES,
            ThreadKind::UpdateRenderingEnvironment => ThreadMask::UPDATE_RENDERING_ENVIRONMENT,
            ThreadKind::UpdateTransform => ThreadMask::UPDATE_TRANSFORM,
        }
    }
}

impl ThreadMask {
    /// Iterates the kinds present in this mask, in tick order.
    pub fn kinds(self) -> impl Iterator<Item = ThreadKind> {
        ThreadKind::TICK_ORDER
            .into_iter()
            .filter(move |kind| self.contains(kind.mask()))
    }
}

impl From<ThreadKind> for ThreadMask {
    fn from(kind: ThreadKind) -> Self {
        kind.mask()
    }
}

/// A unit of per-tick work owned by one thread kind in one universe.
///
/// The coordinator invokes [`do_work`](Self::do_work) at most once per tick,
/// and only for threads that received a run request (or that run every tick).
pub trait ScheduledThread: Send {
    /// The kind of thread this is.
    fn kind(&self) -> ThreadKind;

    /// The universe this thread serves.
    fn universe(&self) -> UniverseId;

    /// Performs one tick worth of work.
    fn do_work(&mut self, reference_time: Instant);

    /// Returns `true` if the thread must run on every tick, requested or not.
    fn runs_every_tick(&self) -> bool {
        false
    }

    /// Called when the thread joins the coordinator's active set.
    fn activate(&mut self) {}

    /// Called when the thread leaves the coordinator's active set.
    fn deactivate(&mut self) {}

    /// Releases owned OS threads. Called once, when the coordinator shuts down.
    fn shutdown(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_tick_order() {
        let mask = ThreadMask::BEHAVIOR_SCHEDULER
            | ThreadMask::UPDATE_BEHAVIOR
            | ThreadMask::RENDER_THREAD;
        let kinds: Vec<_> = mask.kinds().collect();
        assert_eq!(
            kinds,
            vec![
                ThreadKind::UpdateBehavior,
                ThreadKind::BehaviorScheduler,
                ThreadKind::RenderThread
            ]
        );
    }

    #[test]
    fn every_kind_has_a_distinct_bit() {
        let mut all = ThreadMask::EMPTY;
        for kind in ThreadKind::TICK_ORDER {
            assert!(!all.intersects(kind.mask()), "{kind:?} shares a bit");
            all |= kind.mask();
        }
        assert_eq!(all.bits().count_ones(), 11);
    }
}
