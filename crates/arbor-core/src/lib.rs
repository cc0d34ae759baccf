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

//! # Arbor Core
//!
//! Foundational crate containing the types and contracts shared by every
//! layer of the scene-graph execution engine: identifiers, thread kinds,
//! the message bus, the coordinator interface, and indexed collections.

#![warn(missing_docs)]

pub mod coordinator;
pub mod error;
pub mod ids;
pub mod indexed;
pub mod math;
pub mod message;
pub mod thread;
pub mod utils;

pub use coordinator::{Coordinator, RecordingCoordinator, SharedThread};
pub use error::{ArborError, Result};
pub use ids::{BehaviorId, ComponentId, LocaleId, SensorId, TicketAllocator, UniverseId};
pub use thread::{ScheduledThread, ThreadKind, ThreadMask};
pub use utils::timer::Stopwatch;
