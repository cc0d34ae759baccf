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

//! Dedicated threads for the scheduler kinds.
//!
//! A worker parks on its run channel until the control signals a tick, runs
//! one `do_work`, and reports back before the tick moves on, so tick order
//! is the same as on the tick thread.

use anyhow::{Context, Result};
use arbor_core::{SharedThread, ThreadKind};
use crossbeam_channel::{Receiver, Sender};
use std::sync::PoisonError;
use std::thread;
use std::time::Instant;

type RunRequest = (Instant, Sender<()>);

/// Name of the dedicated thread of `kind`, if it has one.
pub(crate) fn dedicated_thread_name(kind: ThreadKind) -> Option<&'static str> {
    match kind {
        ThreadKind::BehaviorScheduler => Some("arbor-behavior-scheduler"),
        ThreadKind::InputDeviceScheduler => Some("arbor-input-scheduler"),
        _ => None,
    }
}

pub(crate) struct SchedulerWorker {
    kind: ThreadKind,
    runs: Option<Sender<RunRequest>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SchedulerWorker {
    pub(crate) fn spawn(thread: SharedThread, kind: ThreadKind, name: &str) -> Result<Self> {
        let (runs, requests) = crossbeam_channel::unbounded();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || work(thread, requests))
            .with_context(|| format!("failed to spawn the {kind:?} thread"))?;
        log::debug!("MasterControl: {kind:?} runs on {name}");
        Ok(Self {
            kind,
            runs: Some(runs),
            handle: Some(handle),
        })
    }

    /// Signals one tick and blocks until it is done. Returns `false` if the
    /// thread is gone.
    pub(crate) fn run(&self, now: Instant) -> bool {
        let Some(runs) = &self.runs else {
            return false;
        };
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        if runs.send((now, done_tx)).is_err() {
            log::error!("MasterControl: {:?} thread is gone", self.kind);
            return false;
        }
        match done_rx.recv() {
            Ok(()) => true,
            Err(_) => {
                log::error!("MasterControl: {:?} thread died during a tick", self.kind);
                false
            }
        }
    }

    /// Closes the run channel and joins the thread.
    pub(crate) fn stop(&mut self) {
        self.runs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("MasterControl: {:?} thread panicked.", self.kind);
            }
        }
    }
}

impl Drop for SchedulerWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn work(thread: SharedThread, requests: Receiver<RunRequest>) {
    for (now, done) in requests.iter() {
        thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .do_work(now);
        let _ = done.send(());
    }
}
