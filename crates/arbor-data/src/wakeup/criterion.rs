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

use arbor_core::math::Aabb;
use arbor_core::BehaviorId;
use std::time::Duration;

/// A single trigger predicate; the leaves of a wakeup condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// Fires once the given wall-clock time has passed since arming.
    ElapsedTime(Duration),
    /// Fires after the given number of frames. Zero behaves like one.
    ElapsedFrames(u32),
    /// Fires when a behavior posts an id. `None` matches any source or id.
    BehaviorPost {
        /// The posting behavior, or any.
        source: Option<BehaviorId>,
        /// The posted id, or any.
        post_id: Option<i64>,
    },
    /// Fires when the behavior's scheduling bounds enter the activation volume.
    Activation,
    /// Fires when the behavior's scheduling bounds leave the activation volume.
    Deactivation,
    /// Fires when a sensor moves into the region.
    SensorEntry(Aabb),
    /// Fires when a sensor moves out of the region.
    SensorExit(Aabb),
}

/// The registry a criterion is filed under while armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CriterionKind {
    /// [`Criterion::ElapsedTime`]
    ElapsedTime,
    /// [`Criterion::ElapsedFrames`]
    ElapsedFrames,
    /// [`Criterion::BehaviorPost`]
    BehaviorPost,
    /// [`Criterion::Activation`]
    Activation,
    /// [`Criterion::Deactivation`]
    Deactivation,
    /// [`Criterion::SensorEntry`]
    SensorEntry,
    /// [`Criterion::SensorExit`]
    SensorExit,
}

impl Criterion {
    /// The registry this criterion belongs to.
    pub fn kind(&self) -> CriterionKind {
        match self {
            Criterion::ElapsedTime(_) => CriterionKind::ElapsedTime,
            Criterion::ElapsedFrames(_) => CriterionKind::ElapsedFrames,
            Criterion::BehaviorPost { .. } => CriterionKind::BehaviorPost,
            Criterion::Activation => CriterionKind::Activation,
            Criterion::Deactivation => CriterionKind::Deactivation,
            Criterion::SensorEntry(_) => CriterionKind::SensorEntry,
            Criterion::SensorExit(_) => CriterionKind::SensorExit,
        }
    }

    /// Returns `true` if a post of `post_id` by `source` satisfies this criterion.
    pub fn matches_post(&self, source: BehaviorId, post_id: i64) -> bool {
        match self {
            Criterion::BehaviorPost {
                source: wanted_source,
                post_id: wanted_id,
            } => {
                wanted_source.map_or(true, |s| s == source)
                    && wanted_id.map_or(true, |id| id == post_id)
            }
            _ => false,
        }
    }
}
