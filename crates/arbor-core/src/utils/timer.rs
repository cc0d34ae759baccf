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

//! A monotonic stopwatch used to measure scheduler work per tick.

use std::time::{Duration, Instant};

/// A started stopwatch.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start_time: Instant,
}

impl Stopwatch {
    /// Creates a new stopwatch that starts immediately.
    #[inline]
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// Returns the instant at which the stopwatch was started.
    #[inline]
    pub fn started_at(&self) -> Instant {
        self.start_time
    }

    /// Returns the elapsed time since the stopwatch was started.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns the elapsed time in microseconds.
    #[inline]
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed().as_micros() as u64
    }

    /// Restarts the stopwatch and returns the time elapsed before the restart.
    pub fn lap(&mut self) -> Duration {
        let elapsed = self.elapsed();
        self.start_time = Instant::now();
        elapsed
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}
