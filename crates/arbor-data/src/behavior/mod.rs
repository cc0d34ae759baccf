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

//! Behaviors: nodes, callbacks, and the structure that wakes them.

mod node;
mod structure;

pub use self::node::{
    Behavior, BehaviorContext, BehaviorNode, CallbackFault, CallbackPhase,
    DEFAULT_SCHEDULING_INTERVAL, NUM_SCHEDULING_INTERVALS,
};
pub use self::structure::BehaviorStructure;
