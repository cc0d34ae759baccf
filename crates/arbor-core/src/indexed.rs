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

//! Unordered collections with O(1) removal through per-object index bookkeeping.
//!
//! Every [`IndexedObject`] remembers, per list type, where it sits inside the
//! collections that hold it. The positions live in two independent slots so an
//! object migrating from one universe to another never needs a lock shared by
//! both universes' structures: the new universe claims the spare slot, and the
//! old universe keeps reading its own slot until it lets go of the object. A
//! structure that looks up a slot owned by another universe sees a position
//! that does not point back at the object and ignores it.

use crate::ids::UniverseId;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

const NO_INDEX: usize = usize::MAX;
const NO_UNIVERSE: u64 = 0;

struct Slot {
    universe: AtomicU64,
    positions: Box<[AtomicUsize]>,
}

impl Slot {
    fn new(list_types: usize) -> Self {
        Self {
            universe: AtomicU64::new(NO_UNIVERSE),
            positions: (0..list_types).map(|_| AtomicUsize::new(NO_INDEX)).collect(),
        }
    }

    fn reset(&self, universe: UniverseId) {
        for position in self.positions.iter() {
            position.store(NO_INDEX, Ordering::Release);
        }
        self.universe.store(universe.0, Ordering::Release);
    }
}

/// Dual-slot list positions of one object.
pub struct ListIndices {
    slots: [Slot; 2],
    used: AtomicUsize,
}

impl ListIndices {
    /// Creates indices for an object that may sit in `list_types` kinds of
    /// list, owned by `universe`.
    pub fn new(universe: UniverseId, list_types: usize) -> Self {
        let indices = Self {
            slots: [Slot::new(list_types), Slot::new(list_types)],
            used: AtomicUsize::new(0),
        };
        indices.slots[0].universe.store(universe.0, Ordering::Release);
        indices
    }

    /// The slot `universe` should read.
    ///
    /// This is the used slot when it belongs to `universe`, otherwise the
    /// other one. A universe that owns neither slot ends up with positions
    /// that never point back at the object.
    pub fn idx_used(&self, universe: UniverseId) -> usize {
        let used = self.used.load(Ordering::Acquire);
        if self.slots[used].universe.load(Ordering::Acquire) == universe.0 {
            used
        } else {
            used ^ 1
        }
    }

    /// Flips the used slot and hands it to `universe` with cleared positions.
    ///
    /// The previously used slot is left untouched so the old universe can
    /// still find and remove the object.
    pub fn inc_idx_used(&self, universe: UniverseId) {
        let next = self.used.load(Ordering::Acquire) ^ 1;
        self.slots[next].reset(universe);
        self.used.store(next, Ordering::Release);
        log::trace!("ListIndices: slot {next} now owned by {universe}");
    }

    /// The universe owning the used slot.
    pub fn universe(&self) -> UniverseId {
        let used = self.used.load(Ordering::Acquire);
        UniverseId(self.slots[used].universe.load(Ordering::Acquire))
    }

    /// The recorded position for `list_type` as seen by `universe`.
    pub fn position(&self, universe: UniverseId, list_type: usize) -> Option<usize> {
        let slot = &self.slots[self.idx_used(universe)];
        if slot.universe.load(Ordering::Acquire) != universe.0 {
            return None;
        }
        slot.positions
            .get(list_type)
            .map(|p| p.load(Ordering::Acquire))
            .filter(|&p| p != NO_INDEX)
    }

    fn set_position(&self, universe: UniverseId, list_type: usize, position: Option<usize>) -> bool {
        let slot = &self.slots[self.idx_used(universe)];
        if slot.universe.load(Ordering::Acquire) != universe.0 {
            return false;
        }
        match slot.positions.get(list_type) {
            Some(p) => {
                p.store(position.unwrap_or(NO_INDEX), Ordering::Release);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for ListIndices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListIndices")
            .field("used", &self.used.load(Ordering::Relaxed))
            .field("universe", &self.universe())
            .finish()
    }
}

/// An object that can live in [`IndexedUnorderedSet`]s.
pub trait IndexedObject {
    /// The object's list positions.
    fn list_indices(&self) -> &ListIndices;
}

/// An unordered set of shared objects with O(1) add, remove and contains.
///
/// Each set is scoped to one universe and one list type; the object's
/// position for that pair is stored in its [`ListIndices`].
pub struct IndexedUnorderedSet<T: IndexedObject> {
    universe: UniverseId,
    list_type: usize,
    items: Vec<Arc<T>>,
}

impl<T: IndexedObject> IndexedUnorderedSet<T> {
    /// Creates an empty set.
    pub fn new(universe: UniverseId, list_type: usize) -> Self {
        Self {
            universe,
            list_type,
            items: Vec::new(),
        }
    }

    /// Adds `item`. Returns `false` if it was already present, or if the
    /// item belongs to neither of this set's universe slots.
    pub fn add(&mut self, item: Arc<T>) -> bool {
        if self.contains(&item) {
            return false;
        }
        if !item
            .list_indices()
            .set_position(self.universe, self.list_type, Some(self.items.len()))
        {
            log::warn!(
                "IndexedUnorderedSet: object owned by {} rejected by set of {}",
                item.list_indices().universe(),
                self.universe
            );
            return false;
        }
        self.items.push(item);
        true
    }

    /// Removes `item` in O(1). Stale or foreign positions are ignored and
    /// return `false`.
    pub fn remove(&mut self, item: &T) -> bool {
        let Some(position) = self.live_position(item) else {
            return false;
        };
        self.items.swap_remove(position);
        if let Some(moved) = self.items.get(position) {
            moved
                .list_indices()
                .set_position(self.universe, self.list_type, Some(position));
        }
        item.list_indices()
            .set_position(self.universe, self.list_type, None);
        true
    }

    /// Returns `true` if `item` is in this set.
    pub fn contains(&self, item: &T) -> bool {
        self.live_position(item).is_some()
    }

    /// Removes every item and returns them, in set order.
    pub fn take_all(&mut self) -> Vec<Arc<T>> {
        for item in &self.items {
            item.list_indices()
                .set_position(self.universe, self.list_type, None);
        }
        std::mem::take(&mut self.items)
    }

    /// Removes every item.
    pub fn clear(&mut self) {
        self.take_all();
    }

    /// Iterates the items in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.items.iter()
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The universe this set serves.
    pub fn universe(&self) -> UniverseId {
        self.universe
    }

    fn live_position(&self, item: &T) -> Option<usize> {
        let position = item
            .list_indices()
            .position(self.universe, self.list_type)?;
        self.items
            .get(position)
            .filter(|candidate| std::ptr::eq(Arc::as_ptr(candidate), item))
            .map(|_| position)
    }
}

impl<T: IndexedObject> std::fmt::Debug for IndexedUnorderedSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedUnorderedSet")
            .field("universe", &self.universe)
            .field("list_type", &self.list_type)
            .field("len", &self.items.len())
            .finish()
    }
}
