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

//! # Bounding-Hull Tree
//!
//! A binary tree of axis-aligned hulls over the renderable leaves of one
//! locale. Internal hulls are cached unions of their children and are only
//! refreshed along marked paths, so re-validation costs scale with the number
//! of dirty leaves rather than the size of the tree.
//!
//! Nodes live in an arena and refer to each other by index. Leaves are
//! created detached, then attached either in bulk ([`BhTree::build`]) or one
//! at a time ([`BhTree::insert`]).

use super::insert_structure::BhInsertStructure;
use arbor_core::math::Aabb;
use arbor_core::LocaleId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Arc;

/// Index value meaning "no node".
pub const NULL_NODE: i32 = -1;

/// What a leaf needs from the scene entity that owns it.
pub trait BoundsSource {
    /// The entity's current world bounds.
    fn bounds(&self) -> Aabb;

    /// Disabled leaves stay in the tree but are skipped by queries.
    fn is_enabled(&self) -> bool {
        true
    }

    /// The locale the entity lives in.
    fn locale(&self) -> LocaleId;
}

impl<S: BoundsSource + ?Sized> BoundsSource for Arc<S> {
    fn bounds(&self) -> Aabb {
        (**self).bounds()
    }

    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }

    fn locale(&self) -> LocaleId {
        (**self).locale()
    }
}

/// The variant part of a node.
#[derive(Debug, Clone)]
pub enum BhNodeKind<T> {
    /// A leaf owned by one scene entity.
    Leaf(T),
    /// An internal node; either child may be [`NULL_NODE`].
    Internal([i32; 2]),
    /// A slot on the free list.
    Free,
}

/// A node of the tree.
#[derive(Debug, Clone)]
pub struct BhNode<T> {
    parent: i32,
    hull: Option<Aabb>,
    mark: bool,
    kind: BhNodeKind<T>,
}

impl<T> BhNode<T> {
    /// The parent index, or [`NULL_NODE`] for a root or detached leaf.
    pub fn parent(&self) -> i32 {
        self.parent
    }

    /// The cached hull; `None` for an internal node with no children.
    pub fn hull(&self) -> Option<Aabb> {
        self.hull
    }

    /// Returns `true` if the hull must be refreshed.
    pub fn is_marked(&self) -> bool {
        self.mark
    }

    /// Returns `true` for leaves.
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, BhNodeKind::Leaf(_))
    }

    /// Returns `true` for internal nodes.
    pub fn is_internal(&self) -> bool {
        matches!(self.kind, BhNodeKind::Internal(_))
    }

    /// The children of an internal node.
    pub fn children(&self) -> Option<[i32; 2]> {
        match self.kind {
            BhNodeKind::Internal(children) => Some(children),
            _ => None,
        }
    }

    /// The entity behind a leaf.
    pub fn item(&self) -> Option<&T> {
        match &self.kind {
            BhNodeKind::Leaf(item) => Some(item),
            _ => None,
        }
    }
}

/// A bounding-hull tree over the leaves of one locale.
#[derive(Debug)]
pub struct BhTree<T: BoundsSource> {
    locale: LocaleId,
    root: i32,
    nodes: Vec<BhNode<T>>,
    free_list: i32,
    node_count: usize,
    rng: StdRng,
}

impl<T: BoundsSource> BhTree<T> {
    /// Creates an empty tree with an entropy-seeded tie-break generator.
    pub fn new(locale: LocaleId) -> Self {
        Self::with_rng(locale, StdRng::from_entropy())
    }

    /// Creates an empty tree whose insertion tie-breaks are reproducible.
    pub fn with_seed(locale: LocaleId, seed: u64) -> Self {
        Self::with_rng(locale, StdRng::seed_from_u64(seed))
    }

    fn with_rng(locale: LocaleId, rng: StdRng) -> Self {
        Self {
            locale,
            root: NULL_NODE,
            nodes: Vec::new(),
            free_list: NULL_NODE,
            node_count: 0,
            rng,
        }
    }

    /// The locale this tree serves.
    pub fn locale(&self) -> LocaleId {
        self.locale
    }

    /// The root index, or [`NULL_NODE`] if the tree is empty.
    pub fn root(&self) -> i32 {
        self.root
    }

    /// Number of allocated nodes, detached leaves included.
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Returns the node at `index`, if allocated.
    pub fn node(&self, index: i32) -> Option<&BhNode<T>> {
        self.get(index).filter(|n| !matches!(n.kind, BhNodeKind::Free))
    }

    /// Creates a detached leaf for `item` and returns its index.
    pub fn create_leaf(&mut self, item: T) -> i32 {
        let hull = item.bounds();
        let leaf = self.allocate_node(BhNodeKind::Leaf(item));
        self.nodes[leaf as usize].hull = Some(hull);
        leaf
    }

    // --- Bulk construction ---

    /// Rebuilds the whole tree from its current leaves plus `leaves`.
    ///
    /// Leaves are split at the median of their centers along the longest
    /// axis of the center bounds. Leaves that are already attached, are not
    /// leaves, or belong to another locale are logged and skipped.
    pub fn build(&mut self, leaves: &[i32]) {
        let mut all = Vec::with_capacity(leaves.len());
        if self.root != NULL_NODE {
            let root = self.root;
            self.flatten(root, &mut |leaf| all.push(leaf));
        }
        let mut seen: HashSet<i32> = all.iter().copied().collect();
        for &leaf in leaves {
            if seen.contains(&leaf) {
                continue;
            }
            if !self.accepts(leaf) {
                continue;
            }
            seen.insert(leaf);
            all.push(leaf);
        }
        for &leaf in &all {
            self.compute_bounding_hull(leaf);
            self.nodes[leaf as usize].mark = false;
        }
        self.root = self.build_subtree(&mut all);
        log::debug!(
            "BhTree: built {} leaves in {}, {} nodes",
            all.len(),
            self.locale,
            self.node_count
        );
    }

    /// Rebuilds the tree from the leaves it already holds.
    pub fn rebuild(&mut self) {
        self.build(&[]);
    }

    fn build_subtree(&mut self, leaves: &mut [i32]) -> i32 {
        match leaves.len() {
            0 => return NULL_NODE,
            1 => {
                self.nodes[leaves[0] as usize].parent = NULL_NODE;
                return leaves[0];
            }
            _ => {}
        }

        let centers = leaves.iter().fold(Aabb::INVALID, |acc, &leaf| {
            let center = self.hull_of(leaf).unwrap_or(Aabb::INVALID).center();
            acc.merge(&Aabb::from_min_max(center, center))
        });
        let axis = centers.longest_axis();
        leaves.sort_by(|&a, &b| {
            let ca = self.hull_of(a).map_or(0.0, |h| h.center()[axis]);
            let cb = self.hull_of(b).map_or(0.0, |h| h.center()[axis]);
            ca.total_cmp(&cb)
        });

        let mid = leaves.len() / 2;
        let (lo, hi) = leaves.split_at_mut(mid);
        let left = self.build_subtree(lo);
        let right = self.build_subtree(hi);

        let internal = self.allocate_node(BhNodeKind::Internal([left, right]));
        self.nodes[left as usize].parent = internal;
        self.nodes[right as usize].parent = internal;
        self.compute_bounding_hull(internal);
        internal
    }

    /// Flattens the subtree under `node` into `out`, starting at `*cursor`.
    ///
    /// Internal nodes are freed and leaves are detached. Once `out` is full,
    /// further leaves are detached without being recorded; sizing `out` is
    /// the caller's responsibility.
    pub fn destroy_tree(&mut self, node: i32, out: &mut [i32], cursor: &mut usize) {
        if self.node(node).is_none() {
            return;
        }
        let parent = self.nodes[node as usize].parent;
        if node == self.root {
            self.root = NULL_NODE;
        } else if parent != NULL_NODE {
            self.replace_child(parent, node, NULL_NODE);
            self.mark_path(parent);
        }
        self.flatten(node, &mut |leaf| {
            if let Some(slot) = out.get_mut(*cursor) {
                *slot = leaf;
                *cursor += 1;
            }
        });
    }

    fn flatten(&mut self, node: i32, sink: &mut dyn FnMut(i32)) {
        if node == self.root {
            self.root = NULL_NODE;
        }
        let mut stack = vec![node];
        while let Some(index) = stack.pop() {
            let children = match &self.nodes[index as usize].kind {
                BhNodeKind::Leaf(_) => None,
                BhNodeKind::Internal(children) => Some(*children),
                BhNodeKind::Free => continue,
            };
            match children {
                Some(children) => {
                    stack.extend(children.into_iter().filter(|&c| c != NULL_NODE));
                    self.free_node(index);
                }
                None => {
                    let leaf = &mut self.nodes[index as usize];
                    leaf.parent = NULL_NODE;
                    leaf.mark = false;
                    sink(index);
                }
            }
        }
    }

    // --- Hull maintenance ---

    /// Recomputes the hull of `node` from its children, or from the owning
    /// entity for a leaf.
    ///
    /// A single present child's hull is copied; no children gives no hull.
    pub fn compute_bounding_hull(&mut self, node: i32) {
        let hull = match self.get(node).map(|n| &n.kind) {
            Some(BhNodeKind::Leaf(item)) => Some(item.bounds()),
            Some(BhNodeKind::Internal([left, right])) => {
                match (self.hull_of(*left), self.hull_of(*right)) {
                    (Some(l), Some(r)) => Some(l.merge(&r)),
                    (Some(h), None) | (None, Some(h)) => Some(h),
                    (None, None) => None,
                }
            }
            Some(BhNodeKind::Free) | None => return,
        };
        self.nodes[node as usize].hull = hull;
    }

    /// Refreshes every marked hull under `node` and clears the marks.
    ///
    /// Unmarked subtrees are not visited.
    pub fn update_marked_bounding_hull(&mut self, node: i32) {
        let Some(n) = self.node(node) else {
            return;
        };
        if !n.mark {
            return;
        }
        if let BhNodeKind::Internal([left, right]) = n.kind {
            self.update_marked_bounding_hull(left);
            self.update_marked_bounding_hull(right);
        }
        self.compute_bounding_hull(node);
        self.nodes[node as usize].mark = false;
    }

    /// Refreshes every marked hull in the tree.
    pub fn update_marked(&mut self) {
        let root = self.root;
        self.update_marked_bounding_hull(root);
    }

    /// Records that the entity behind `leaf` moved or resized.
    ///
    /// Marks the leaf and its ancestors; the hulls are refreshed on the next
    /// [`update_marked`](Self::update_marked).
    pub fn bounds_changed(&mut self, leaf: i32) {
        if !self.node(leaf).is_some_and(BhNode::is_leaf) {
            log::warn!("BhTree: bounds_changed on non-leaf node {leaf}");
            return;
        }
        self.mark_path(leaf);
    }

    fn mark_path(&mut self, from: i32) {
        let mut index = from;
        while index != NULL_NODE {
            let node = &mut self.nodes[index as usize];
            node.mark = true;
            index = node.parent;
        }
    }

    fn refresh_ancestors(&mut self, from: i32) {
        let mut index = from;
        while index != NULL_NODE {
            self.compute_bounding_hull(index);
            index = self.nodes[index as usize].parent;
        }
    }

    // --- Incremental insertion ---

    /// Inserts a detached leaf, starting the descent at the root.
    ///
    /// An empty tree takes the leaf as its root. If the root is a leaf or
    /// does not enclose the new hull, the insertion is deferred to
    /// `insert_structure` against the root.
    pub fn insert(&mut self, leaf: i32, insert_structure: &mut BhInsertStructure) {
        if !self.accepts(leaf) {
            return;
        }
        self.compute_bounding_hull(leaf);
        if self.root == NULL_NODE {
            self.root = leaf;
            return;
        }
        let root = self.root;
        if self.encloses_internal(root, leaf) {
            self.descend(root, leaf, insert_structure);
        } else {
            insert_structure.lookup_and_insert(root, leaf);
        }
    }

    /// Inserts a detached leaf below the internal node `target`.
    ///
    /// The descent only enters internal children whose hull already
    /// contains the leaf; leaves are never split. When both children
    /// qualify, a fair coin picks one. The tie-break keeps the tree from
    /// drifting to one side on average, but there is no rebalancing pass and
    /// no worst-case depth bound. When no child qualifies the leaf takes a
    /// free child slot if there is one, otherwise it is deferred to
    /// `insert_structure` for a later bulk rebuild of `target`'s subtree.
    ///
    /// A `target` that is not an internal node enclosing the leaf is a
    /// caller error: it is logged and the tree is left unchanged.
    pub fn insert_at(&mut self, target: i32, leaf: i32, insert_structure: &mut BhInsertStructure) {
        if !self.accepts(leaf) {
            return;
        }
        self.compute_bounding_hull(leaf);
        if !self.encloses_internal(target, leaf) {
            log::warn!("BhTree: insert target {target} does not enclose leaf {leaf}, ignored");
            return;
        }
        self.descend(target, leaf, insert_structure);
    }

    fn descend(&mut self, target: i32, leaf: i32, insert_structure: &mut BhInsertStructure) {
        let mut current = target;
        loop {
            let Some([left, right]) = self.nodes[current as usize].children() else {
                return;
            };
            let fits_left = self.encloses_internal(left, leaf);
            let fits_right = self.encloses_internal(right, leaf);
            current = match (fits_left, fits_right) {
                (true, true) => {
                    if self.rng.gen::<bool>() {
                        left
                    } else {
                        right
                    }
                }
                (true, false) => left,
                (false, true) => right,
                (false, false) => {
                    if left == NULL_NODE || right == NULL_NODE {
                        let slot = usize::from(left != NULL_NODE);
                        self.set_child(current, slot, leaf);
                        self.refresh_ancestors(current);
                    } else {
                        insert_structure.lookup_and_insert(current, leaf);
                    }
                    return;
                }
            };
        }
    }

    /// Applies every deferred insertion by rebuilding the affected subtrees.
    ///
    /// A deferred target nested below another deferred target is folded
    /// into the outer one. Targets freed since the deferral fall back to a
    /// whole-tree rebuild.
    pub fn apply_insert_structure(&mut self, insert_structure: &mut BhInsertStructure) {
        let mut batches = insert_structure.take();
        if batches.is_empty() {
            return;
        }

        for batch in &mut batches {
            if self.node(batch.0).is_none() || self.root == NULL_NODE {
                batch.0 = NULL_NODE;
            }
        }
        let targets: HashSet<i32> = batches.iter().map(|(t, _)| *t).collect();
        for batch in &mut batches {
            let mut ancestor = match batch.0 {
                NULL_NODE => NULL_NODE,
                t => self.nodes[t as usize].parent,
            };
            while ancestor != NULL_NODE {
                if targets.contains(&ancestor) {
                    batch.0 = ancestor;
                }
                ancestor = self.nodes[ancestor as usize].parent;
            }
        }

        let mut merged: Vec<(i32, Vec<i32>)> = Vec::new();
        for (target, leaves) in batches {
            match merged.iter_mut().find(|(t, _)| *t == target) {
                Some((_, pending)) => pending.extend(leaves),
                None => merged.push((target, leaves)),
            }
        }

        if merged.iter().any(|(t, _)| *t == NULL_NODE) {
            let leaves: Vec<i32> = merged.into_iter().flat_map(|(_, l)| l).collect();
            self.build(&leaves);
            return;
        }

        for (target, pending) in merged {
            let parent = self.nodes[target as usize].parent;
            let mut leaves = Vec::new();
            self.flatten(target, &mut |leaf| leaves.push(leaf));
            for leaf in pending {
                if self.is_detached_leaf(leaf) && !leaves.contains(&leaf) {
                    self.compute_bounding_hull(leaf);
                    leaves.push(leaf);
                }
            }
            let subtree = self.build_subtree(&mut leaves);
            if parent == NULL_NODE {
                self.root = subtree;
            } else {
                self.replace_child(parent, target, subtree);
                self.refresh_ancestors(parent);
            }
            log::debug!("BhTree: rebuilt subtree at {target} with {} leaves", leaves.len());
        }
    }

    // --- Removal and queries ---

    /// Detaches and frees `leaf`, returning its entity.
    ///
    /// An internal node left with a single child is collapsed into it.
    pub fn remove(&mut self, leaf: i32) -> Option<T> {
        if !self.node(leaf).is_some_and(BhNode::is_leaf) {
            log::warn!("BhTree: remove on non-leaf node {leaf}");
            return None;
        }
        let parent = self.nodes[leaf as usize].parent;
        if leaf == self.root {
            self.root = NULL_NODE;
        } else if parent != NULL_NODE {
            self.replace_child(parent, leaf, NULL_NODE);
            self.collapse(parent);
        }
        let kind = std::mem::replace(&mut self.nodes[leaf as usize].kind, BhNodeKind::Free);
        self.free_node(leaf);
        match kind {
            BhNodeKind::Leaf(item) => Some(item),
            _ => None,
        }
    }

    fn collapse(&mut self, node: i32) {
        let mut index = node;
        while let Some([left, right]) = self.node(index).and_then(BhNode::children) {
            let grand = self.nodes[index as usize].parent;
            let survivor = match (left, right) {
                (NULL_NODE, NULL_NODE) => NULL_NODE,
                (NULL_NODE, only) | (only, NULL_NODE) => only,
                _ => {
                    self.refresh_ancestors(index);
                    return;
                }
            };
            if grand == NULL_NODE {
                self.root = survivor;
            } else {
                self.replace_child(grand, index, survivor);
            }
            if survivor != NULL_NODE {
                self.nodes[survivor as usize].parent = grand;
            }
            self.free_node(index);
            if survivor != NULL_NODE {
                self.refresh_ancestors(grand);
                return;
            }
            index = grand;
        }
    }

    /// Calls `callback` for every enabled leaf whose hull intersects
    /// `region`, until it returns `false`.
    pub fn query<F>(&self, region: &Aabb, mut callback: F)
    where
        F: FnMut(i32, &T) -> bool,
    {
        if self.root == NULL_NODE {
            return;
        }
        let mut stack = Vec::with_capacity(64);
        stack.push(self.root);
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            if !node.hull.is_some_and(|h| h.intersects_aabb(region)) {
                continue;
            }
            match &node.kind {
                BhNodeKind::Leaf(item) => {
                    if item.is_enabled() && !callback(index, item) {
                        return;
                    }
                }
                BhNodeKind::Internal(children) => {
                    stack.extend(children.iter().copied().filter(|&c| c != NULL_NODE));
                }
                BhNodeKind::Free => {}
            }
        }
    }

    /// Returns the enabled leaves intersecting `region`.
    pub fn select(&self, region: &Aabb) -> Vec<i32> {
        let mut hits = Vec::new();
        self.query(region, |leaf, _| {
            hits.push(leaf);
            true
        });
        hits
    }

    // --- Arena plumbing ---

    fn get(&self, index: i32) -> Option<&BhNode<T>> {
        usize::try_from(index).ok().and_then(|i| self.nodes.get(i))
    }

    fn hull_of(&self, index: i32) -> Option<Aabb> {
        self.get(index).and_then(|n| n.hull)
    }

    fn encloses_internal(&self, target: i32, leaf: i32) -> bool {
        match (self.node(target), self.hull_of(leaf)) {
            (Some(node), Some(hull)) => {
                node.is_internal() && node.hull.is_some_and(|h| h.contains_aabb(&hull))
            }
            _ => false,
        }
    }

    fn is_detached_leaf(&self, leaf: i32) -> bool {
        self.node(leaf)
            .is_some_and(|n| n.is_leaf() && n.parent == NULL_NODE)
            && leaf != self.root
    }

    fn accepts(&self, leaf: i32) -> bool {
        if !self.is_detached_leaf(leaf) {
            log::warn!("BhTree: node {leaf} is not a detached leaf, rejected");
            return false;
        }
        let locale = self.nodes[leaf as usize]
            .item()
            .map(|item| item.locale());
        if locale != Some(self.locale) {
            log::warn!("BhTree: leaf {leaf} is not in {}, rejected", self.locale);
            return false;
        }
        true
    }

    fn set_child(&mut self, parent: i32, slot: usize, child: i32) {
        if let BhNodeKind::Internal(children) = &mut self.nodes[parent as usize].kind {
            children[slot] = child;
        }
        if child != NULL_NODE {
            self.nodes[child as usize].parent = parent;
        }
    }

    fn replace_child(&mut self, parent: i32, old: i32, new: i32) {
        if let Some(children) = self.nodes[parent as usize].children() {
            if let Some(slot) = children.iter().position(|&c| c == old) {
                self.set_child(parent, slot, new);
            }
        }
    }

    fn allocate_node(&mut self, kind: BhNodeKind<T>) -> i32 {
        self.node_count += 1;
        let node = BhNode {
            parent: NULL_NODE,
            hull: None,
            mark: false,
            kind,
        };
        if self.free_list != NULL_NODE {
            let index = self.free_list;
            self.free_list = self.nodes[index as usize].parent;
            self.nodes[index as usize] = node;
            index
        } else {
            self.nodes.push(node);
            (self.nodes.len() - 1) as i32
        }
    }

    fn free_node(&mut self, index: i32) {
        let node = &mut self.nodes[index as usize];
        node.kind = BhNodeKind::Free;
        node.hull = None;
        node.mark = false;
        node.parent = self.free_list;
        self.free_list = index;
        self.node_count -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::math::Vec3;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    const LOCALE: LocaleId = LocaleId(1);

    struct Shape {
        bounds: Mutex<Aabb>,
        enabled: AtomicBool,
    }

    impl Shape {
        fn at(center: Vec3, half: f32) -> Arc<Self> {
            Arc::new(Self {
                bounds: Mutex::new(Aabb::from_center_half_extents(center, Vec3::splat(half))),
                enabled: AtomicBool::new(true),
            })
        }
    }

    impl BoundsSource for Shape {
        fn bounds(&self) -> Aabb {
            *self.bounds.lock().unwrap()
        }
        fn is_enabled(&self) -> bool {
            self.enabled.load(Ordering::Relaxed)
        }
        fn locale(&self) -> LocaleId {
            LOCALE
        }
    }

    fn union_of_leaves(tree: &BhTree<Arc<Shape>>, node: i32) -> Option<Aabb> {
        let n = tree.node(node)?;
        match n.children() {
            None => n.item().map(|s| s.bounds()),
            Some([l, r]) => match (union_of_leaves(tree, l), union_of_leaves(tree, r)) {
                (Some(a), Some(b)) => Some(a.merge(&b)),
                (a, b) => a.or(b),
            },
        }
    }

    fn assert_hulls_consistent(tree: &BhTree<Arc<Shape>>, node: i32) {
        let Some(n) = tree.node(node) else { return };
        assert_eq!(n.hull(), union_of_leaves(tree, node), "hull of node {node}");
        if let Some([l, r]) = n.children() {
            for child in [l, r].into_iter().filter(|&c| c != NULL_NODE) {
                assert_eq!(tree.node(child).unwrap().parent(), node);
                assert_hulls_consistent(tree, child);
            }
        }
    }

    fn grid(tree: &mut BhTree<Arc<Shape>>, n: usize) -> (Vec<Arc<Shape>>, Vec<i32>) {
        let shapes: Vec<_> = (0..n)
            .map(|i| Shape::at(Vec3::new((i % 10) as f32 * 3.0, (i / 10) as f32 * 3.0, 0.0), 1.0))
            .collect();
        let leaves = shapes.iter().map(|s| tree.create_leaf(Arc::clone(s))).collect();
        (shapes, leaves)
    }

    #[test]
    fn build_produces_consistent_hulls() {
        let mut tree = BhTree::with_seed(LOCALE, 1);
        let (_, leaves) = grid(&mut tree, 37);
        tree.build(&leaves);

        assert_hulls_consistent(&tree, tree.root());
        // 37 leaves in a full binary tree means 36 internal nodes.
        assert_eq!(tree.node_count(), 73);
    }

    #[test]
    fn marked_update_only_refreshes_dirty_paths() {
        let mut tree = BhTree::with_seed(LOCALE, 1);
        let (shapes, leaves) = grid(&mut tree, 16);
        tree.build(&leaves);

        *shapes[3].bounds.lock().unwrap() =
            Aabb::from_center_half_extents(Vec3::new(100.0, 0.0, 0.0), Vec3::ONE);
        tree.bounds_changed(leaves[3]);
        assert!(tree.node(tree.root()).unwrap().is_marked());
        assert!(!tree.node(leaves[4]).unwrap().is_marked());

        tree.update_marked();
        assert!(!tree.node(tree.root()).unwrap().is_marked());
        assert_hulls_consistent(&tree, tree.root());
        assert_eq!(tree.node(tree.root()).unwrap().hull().unwrap().max.x, 101.0);
    }

    #[test]
    fn insert_sequences_keep_hulls_consistent() {
        let mut tree = BhTree::with_seed(LOCALE, 7);
        let (_, leaves) = grid(&mut tree, 20);
        tree.build(&leaves);

        let mut pending = BhInsertStructure::new();
        let mut shapes = Vec::new();
        for i in 0..30 {
            let inside = i % 3 != 0;
            let center = if inside {
                Vec3::new((i % 9) as f32 * 3.0, 1.5, 0.0)
            } else {
                Vec3::new(60.0 + i as f32, -20.0, 5.0)
            };
            let shape = Shape::at(center, 0.25);
            let leaf = tree.create_leaf(Arc::clone(&shape));
            shapes.push(shape);
            tree.insert(leaf, &mut pending);
        }
        assert!(!pending.is_empty());

        tree.apply_insert_structure(&mut pending);
        tree.update_marked();
        assert!(pending.is_empty());
        assert_hulls_consistent(&tree, tree.root());
        // Every leaf is reachable from the root.
        let everything = Aabb::from_min_max(Vec3::splat(-1000.0), Vec3::splat(1000.0));
        assert_eq!(tree.select(&everything).len(), 50);
    }

    #[test]
    fn tie_break_is_unbiased() {
        let mut tree = BhTree::with_seed(LOCALE, 42);
        let big: Vec<i32> = (0..4)
            .map(|_| tree.create_leaf(Shape::at(Vec3::ZERO, 10.0)))
            .collect();
        tree.build(&big);
        let [left, right] = tree.node(tree.root()).unwrap().children().unwrap();
        assert!(tree.node(left).unwrap().is_internal());
        assert!(tree.node(right).unwrap().is_internal());

        let mut pending = BhInsertStructure::new();
        for _ in 0..1000 {
            let leaf = tree.create_leaf(Shape::at(Vec3::ZERO, 1.0));
            tree.insert_at(tree.root(), leaf, &mut pending);
        }

        let went_left = pending.pending_for(left).len();
        let went_right = pending.pending_for(right).len();
        assert_eq!(went_left + went_right, 1000);
        // Binomial(1000, 0.5): sigma is about 16, so this band is > 6 sigma wide.
        assert!((400..=600).contains(&went_left), "left got {went_left}");
    }

    #[test]
    fn insert_into_non_enclosing_target_is_ignored() {
        let mut tree = BhTree::with_seed(LOCALE, 3);
        let (_, leaves) = grid(&mut tree, 8);
        tree.build(&leaves);
        let far = tree.create_leaf(Shape::at(Vec3::splat(500.0), 1.0));

        let mut pending = BhInsertStructure::new();
        tree.insert_at(tree.root(), far, &mut pending);

        assert!(pending.is_empty());
        assert_eq!(tree.node(far).unwrap().parent(), NULL_NODE);
        assert_hulls_consistent(&tree, tree.root());
    }

    #[test]
    fn destroy_tree_truncates_silently() {
        let mut tree = BhTree::with_seed(LOCALE, 3);
        let (_, leaves) = grid(&mut tree, 12);
        tree.build(&leaves);

        let mut out = [NULL_NODE; 5];
        let mut cursor = 0;
        tree.destroy_tree(tree.root(), &mut out, &mut cursor);

        assert_eq!(cursor, 5);
        assert!(out.iter().all(|&leaf| tree.node(leaf).unwrap().is_leaf()));
        assert_eq!(tree.root(), NULL_NODE);
        // Only the detached leaves are left allocated.
        assert_eq!(tree.node_count(), 12);
        assert!(leaves.iter().all(|&l| tree.node(l).unwrap().parent() == NULL_NODE));
    }

    #[test]
    fn remove_collapses_parents() {
        let mut tree = BhTree::with_seed(LOCALE, 3);
        let (_, leaves) = grid(&mut tree, 9);
        tree.build(&leaves);

        for &leaf in &leaves[..8] {
            assert!(tree.remove(leaf).is_some());
            assert_hulls_consistent(&tree, tree.root());
        }
        assert_eq!(tree.root(), leaves[8]);
        assert_eq!(tree.node_count(), 1);
        assert!(tree.remove(leaves[8]).is_some());
        assert_eq!(tree.root(), NULL_NODE);
    }

    #[test]
    fn select_skips_disabled_leaves() {
        let mut tree = BhTree::with_seed(LOCALE, 3);
        let (shapes, leaves) = grid(&mut tree, 10);
        tree.build(&leaves);

        let row = Aabb::from_min_max(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(7.0, 1.0, 1.0));
        assert_eq!(tree.select(&row).len(), 3);
        shapes[1].enabled.store(false, Ordering::Relaxed);
        let mut hits = tree.select(&row);
        hits.sort_unstable();
        assert_eq!(hits, vec![leaves[0], leaves[2]]);
    }
}
