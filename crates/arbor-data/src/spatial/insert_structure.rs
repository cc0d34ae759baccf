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

/// Insertions the tree could not place without growing hull overlap.
///
/// Each entry records the node where the descent stopped and the leaves
/// waiting below it. [`BhTree::apply_insert_structure`](super::BhTree::apply_insert_structure)
/// rebuilds those subtrees in one batch.
#[derive(Debug, Default)]
pub struct BhInsertStructure {
    pending: Vec<(i32, Vec<i32>)>,
}

impl BhInsertStructure {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `leaf` for a rebuild of the subtree at `target`.
    pub fn lookup_and_insert(&mut self, target: i32, leaf: i32) {
        match self.pending.iter_mut().find(|(t, _)| *t == target) {
            Some((_, leaves)) => leaves.push(leaf),
            None => self.pending.push((target, vec![leaf])),
        }
        log::trace!("BhInsertStructure: leaf {leaf} deferred at node {target}");
    }

    /// The leaves waiting below `target`.
    pub fn pending_for(&self, target: i32) -> &[i32] {
        self.pending
            .iter()
            .find(|(t, _)| *t == target)
            .map_or(&[], |(_, leaves)| leaves.as_slice())
    }

    /// Number of subtrees awaiting a rebuild.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if nothing is deferred.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drops every deferred insertion.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub(super) fn take(&mut self) -> Vec<(i32, Vec<i32>)> {
        std::mem::take(&mut self.pending)
    }
}
