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

use anyhow::Result;
use arbor_core::SensorId;
use std::sync::{Arc, Mutex};

/// How the input-device scheduler drives a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingMode {
    /// `poll_and_process_input` blocks on device I/O; the device gets a
    /// dedicated polling thread.
    Blocking,
    /// `poll_and_process_input` returns immediately; polled once per
    /// scheduler tick.
    NonBlocking,
    /// Never polled by the scheduler; read on demand through its sensors.
    DemandDriven,
}

/// The abstract contract for a six-degree-of-freedom input device backend.
///
/// A device publishes what it reads through the [`SensorHandle`](super::SensorHandle)s
/// it was built with. Errors returned from any method are logged by the
/// scheduler and never stop it.
pub trait InputDevice: Send {
    /// Opens the device. A device that fails to initialize is not scheduled.
    fn initialize(&mut self) -> Result<()>;

    /// How this device wants to be driven.
    fn processing_mode(&self) -> ProcessingMode;

    /// Reads the device and publishes new sensor values.
    fn poll_and_process_input(&mut self) -> Result<()>;

    /// Processes buffered stream input, if the device has any.
    fn process_stream_input(&mut self) -> Result<()> {
        Ok(())
    }

    /// The sensors this device publishes. Demand-driven devices are polled
    /// when one of these is read.
    fn sensor_ids(&self) -> Vec<SensorId> {
        Vec::new()
    }

    /// Releases the device.
    fn close(&mut self);
}

/// A device shared between the scheduler, its polling thread, and the
/// sensors that read it on demand.
pub type SharedDevice = Arc<Mutex<dyn InputDevice>>;
