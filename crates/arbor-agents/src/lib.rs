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

//! # Arbor Agents
//!
//! The scheduler threads of the engine core. Each agent implements
//! [`ScheduledThread`](arbor_core::ScheduledThread) and is driven by the
//! coordinator: the behavior scheduler, the input-device scheduler, and the
//! timer thread that paces both.

#![warn(missing_docs)]

pub mod behavior_agent;
pub mod input_agent;
pub mod timer_agent;

pub use behavior_agent::{BehaviorScheduler, SchedulerStats};
pub use input_agent::InputDeviceScheduler;
pub use timer_agent::TimerThread;
