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

use anyhow::{Context, Result};
use arbor_data::input::SharedDevice;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::thread;
use std::time::Duration;

/// Back-off after a failed blocking read, so a broken device does not spin.
const ERROR_BACKOFF: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Resume,
    Pause,
    Stop,
}

enum Step {
    Read,
    Apply(Command),
    Closed,
}

/// A running loop only peeks at its commands so it can keep reading; a
/// paused one parks on the channel.
fn next_step(commands: &Receiver<Command>, running: bool) -> Step {
    if running {
        match commands.try_recv() {
            Ok(command) => Step::Apply(command),
            Err(TryRecvError::Empty) => Step::Read,
            Err(TryRecvError::Disconnected) => Step::Closed,
        }
    } else {
        commands.recv().map_or(Step::Closed, Step::Apply)
    }
}

fn device_loop(device: SharedDevice, commands: Receiver<Command>, mut running: bool) {
    loop {
        match next_step(&commands, running) {
            Step::Apply(Command::Resume) => running = true,
            Step::Apply(Command::Pause) => running = false,
            Step::Apply(Command::Stop) | Step::Closed => break,
            Step::Read => {
                let result = device
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .poll_and_process_input();
                if let Err(e) = result {
                    log::warn!("Blocking input device read failed: {e:#}");
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }
    }
    log::debug!("Blocking input device thread stopped.");
}

/// The dedicated polling thread of one blocking device.
///
/// Pausing parks the thread on its command channel instead of ending it, so
/// reactivation is cheap.
pub(crate) struct BlockingDeviceThread {
    device: SharedDevice,
    commands: Sender<Command>,
    running: AtomicBool,
    handle: Option<thread::JoinHandle<()>>,
}

impl BlockingDeviceThread {
    /// Starts the thread, running or parked.
    pub(crate) fn spawn(device: SharedDevice, running: bool) -> Result<Self> {
        let (commands, receiver) = crossbeam_channel::unbounded();
        let thread_device = Arc::clone(&device);
        let handle = thread::Builder::new()
            .name("arbor-input-device".into())
            .spawn(move || device_loop(thread_device, receiver, running))
            .context("failed to spawn a blocking input device thread")?;
        Ok(Self {
            device,
            commands,
            running: AtomicBool::new(running),
            handle: Some(handle),
        })
    }

    pub(crate) fn device(&self) -> &SharedDevice {
        &self.device
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            log::debug!("Blocking input device thread already gone, {command:?} dropped.");
        }
    }

    pub(crate) fn resume(&self) {
        if !self.running.swap(true, Ordering::SeqCst) {
            self.send(Command::Resume);
        }
    }

    pub(crate) fn pause(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.send(Command::Pause);
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ends the thread and waits for its current read to finish.
    pub(crate) fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.running.store(false, Ordering::SeqCst);
        self.send(Command::Stop);
        if handle.join().is_err() {
            log::error!("Blocking input device thread panicked.");
        }
    }
}

impl Drop for BlockingDeviceThread {
    fn drop(&mut self) {
        self.stop();
    }
}
