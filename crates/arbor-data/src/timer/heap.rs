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

use std::time::Instant;

#[derive(Debug, Clone)]
struct Entry<T> {
    at: Instant,
    seq: u64,
    payload: T,
}

impl<T> Entry<T> {
    fn before(&self, other: &Self) -> bool {
        (self.at, self.seq) < (other.at, other.seq)
    }
}

/// A binary min-heap of pending timed entries keyed by absolute trigger time.
///
/// Positions are 1-indexed: the parent of `i` is `i / 2` and its children are
/// `2i` and `2i + 1`. Entries with equal trigger times come out in insertion
/// order.
#[derive(Debug, Clone)]
pub struct TimerHeap<T> {
    entries: Vec<Entry<T>>,
    next_seq: u64,
}

impl<T> TimerHeap<T> {
    /// Creates an empty heap.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
        }
    }

    /// Adds `payload` to fire at `at`. O(log n).
    pub fn insert(&mut self, at: Instant, payload: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Entry { at, seq, payload });
        self.sift_up(self.entries.len());
    }

    /// The earliest trigger time.
    pub fn peek_time(&self) -> Option<Instant> {
        self.entries.first().map(|e| e.at)
    }

    /// Removes and returns the earliest entry. O(log n).
    pub fn extract_min(&mut self) -> Option<(Instant, T)> {
        if self.entries.is_empty() {
            return None;
        }
        let entry = self.entries.swap_remove(0);
        if !self.entries.is_empty() {
            self.sift_down(1);
        }
        Some((entry.at, entry.payload))
    }

    /// Removes and returns every entry due at or before `now`, earliest first.
    pub fn extract_expired(&mut self, now: Instant) -> Vec<(Instant, T)> {
        let mut expired = Vec::new();
        while self.peek_time().is_some_and(|at| at <= now) {
            if let Some(entry) = self.extract_min() {
                expired.push(entry);
            }
        }
        expired
    }

    /// Removes every entry whose payload matches `predicate`. Linear scan.
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !predicate(&e.payload));
        let removed = before - self.entries.len();
        if removed > 0 {
            for i in (1..=self.entries.len() / 2).rev() {
                self.sift_down(i);
            }
        }
        removed
    }

    /// Returns `true` if any entry's payload matches `predicate`.
    pub fn contains_where(&self, mut predicate: impl FnMut(&T) -> bool) -> bool {
        self.entries.iter().any(|e| predicate(&e.payload))
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Positions below are 1-based.

    fn less(&self, a: usize, b: usize) -> bool {
        self.entries[a - 1].before(&self.entries[b - 1])
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 1 && self.less(i, i / 2) {
            self.entries.swap(i - 1, i / 2 - 1);
            i /= 2;
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let len = self.entries.len();
        loop {
            let (left, right) = (2 * i, 2 * i + 1);
            let mut smallest = i;
            if left <= len && self.less(left, smallest) {
                smallest = left;
            }
            if right <= len && self.less(right, smallest) {
                smallest = right;
            }
            if smallest == i {
                return;
            }
            self.entries.swap(i - 1, smallest - 1);
            i = smallest;
        }
    }
}

impl<T> Default for TimerHeap<T> {
    fn default() -> Self {
        Self::new()
    }
}
