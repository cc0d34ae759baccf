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

//! # Arbor Control
//!
//! The reference master control of the engine core. It registers the
//! structures and schedulers of each universe, collects their run requests,
//! and runs one tick per period. Also hosts the configuration and the
//! logging bootstrap used by binaries.

#![warn(missing_docs)]

pub mod config;
pub mod logging;
mod master;
mod universe;
mod worker;

pub use config::ArborConfig;
pub use master::MasterControl;
pub use universe::VirtualUniverse;
