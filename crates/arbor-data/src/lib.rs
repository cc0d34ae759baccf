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

//! # Arbor Data
//!
//! The retained structures the schedulers operate on: the bounding-hull
//! tree, wakeup conditions and their arena trees, the timer heap, behavior
//! nodes with their per-universe structure, input sensors, and the
//! attribute mirrors handed to the renderer.

pub mod behavior;
pub mod component;
pub mod input;
pub mod spatial;
pub mod timer;
pub mod wakeup;
