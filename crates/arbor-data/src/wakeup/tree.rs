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

//! The armed form of a wakeup condition.
//!
//! A [`Wakeup`] is flattened into an arena of nodes when a behavior arms it.
//! Every node knows its parent and its position among the parent's children.
//! Criteria fire bottom-up; combinators record which child slots are met and
//! flip to met at most once, so the whole tree reports success exactly once
//! per arming.

use super::condition::Shape;
use super::{Criterion, Wakeup};

/// Position of a node in a [`ConditionTree`].
pub type CondId = usize;

#[derive(Debug, Clone)]
enum CondKind {
    Criterion(Criterion),
    And { children: Vec<CondId>, met: Vec<bool> },
    Or { children: Vec<CondId> },
}

#[derive(Debug, Clone)]
struct CondNode {
    parent: Option<CondId>,
    position: usize,
    condition_met: bool,
    kind: CondKind,
}

/// An armed wakeup condition.
#[derive(Debug, Clone)]
pub struct ConditionTree {
    nodes: Vec<CondNode>,
    triggered: Vec<CondId>,
    armed: bool,
}

impl ConditionTree {
    /// Flattens `wakeup` into an armed tree. The root is node 0.
    pub fn build(wakeup: &Wakeup) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            triggered: Vec::new(),
            armed: true,
        };
        match &wakeup.0 {
            Shape::Criterion(c) => {
                tree.push(None, 0, CondKind::Criterion(c.clone()));
            }
            Shape::And(criteria) => {
                let root = tree.push_and(None, 0, criteria.len());
                tree.push_criteria(root, criteria);
            }
            Shape::Or(criteria) => {
                let root = tree.push(None, 0, CondKind::Or { children: Vec::new() });
                tree.push_criteria(root, criteria);
            }
            Shape::AndOfOrs(groups) => {
                let root = tree.push_and(None, 0, groups.len());
                for (position, group) in groups.iter().enumerate() {
                    let or = tree.push(Some(root), position, CondKind::Or { children: Vec::new() });
                    tree.push_criteria(or, group);
                }
            }
            Shape::OrOfAnds(groups) => {
                let root = tree.push(None, 0, CondKind::Or { children: Vec::new() });
                for (position, group) in groups.iter().enumerate() {
                    let and = tree.push_and(Some(root), position, group.len());
                    tree.push_criteria(and, group);
                }
            }
        }
        tree
    }

    fn push(&mut self, parent: Option<CondId>, position: usize, kind: CondKind) -> CondId {
        let id = self.nodes.len();
        self.nodes.push(CondNode {
            parent,
            position,
            condition_met: false,
            kind,
        });
        if let Some(parent) = parent {
            match &mut self.nodes[parent].kind {
                CondKind::And { children, .. } | CondKind::Or { children } => children.push(id),
                CondKind::Criterion(_) => {}
            }
        }
        id
    }

    fn push_and(&mut self, parent: Option<CondId>, position: usize, width: usize) -> CondId {
        self.push(
            parent,
            position,
            CondKind::And {
                children: Vec::with_capacity(width),
                met: vec![false; width],
            },
        )
    }

    fn push_criteria(&mut self, parent: CondId, criteria: &[Criterion]) {
        for (position, criterion) in criteria.iter().enumerate() {
            self.push(Some(parent), position, CondKind::Criterion(criterion.clone()));
        }
    }

    /// Iterates the criteria with their node ids.
    pub fn criteria(&self) -> impl Iterator<Item = (CondId, &Criterion)> {
        self.nodes.iter().enumerate().filter_map(|(id, node)| match &node.kind {
            CondKind::Criterion(c) => Some((id, c)),
            _ => None,
        })
    }

    /// Marks the criterion `node` as fired and propagates upwards.
    ///
    /// Returns `true` only for the call that makes the whole condition met.
    /// Re-firing a met criterion, firing below an already met combinator, or
    /// firing after [`clean_tree`](Self::clean_tree) changes nothing.
    pub fn trigger(&mut self, node: CondId) -> bool {
        if !self.armed || self.is_met() {
            return false;
        }
        let Some(criterion) = self.nodes.get_mut(node) else {
            log::warn!("ConditionTree: trigger on unknown node {node}");
            return false;
        };
        if !matches!(criterion.kind, CondKind::Criterion(_)) || criterion.condition_met {
            return false;
        }
        criterion.condition_met = true;
        self.triggered.push(node);

        let mut child = node;
        while let Some(parent) = self.nodes[child].parent {
            let position = self.nodes[child].position;
            let parent_node = &mut self.nodes[parent];
            if parent_node.condition_met {
                return false;
            }
            match &mut parent_node.kind {
                CondKind::And { met, .. } => {
                    met[position] = true;
                    if !met.iter().all(|&m| m) {
                        return false;
                    }
                }
                CondKind::Or { .. } => {}
                CondKind::Criterion(_) => return false,
            }
            parent_node.condition_met = true;
            child = parent;
        }
        true
    }

    /// Returns `true` once the root is met.
    pub fn is_met(&self) -> bool {
        self.nodes.first().is_some_and(|root| root.condition_met)
    }

    /// Returns `true` until [`clean_tree`](Self::clean_tree) is called.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// The criteria that fired, in firing order.
    pub fn triggered_criteria(&self) -> impl Iterator<Item = &Criterion> {
        self.triggered.iter().filter_map(|&id| match &self.nodes[id].kind {
            CondKind::Criterion(c) => Some(c),
            _ => None,
        })
    }

    /// Disarms the tree and resets every met flag. Safe to call repeatedly.
    pub fn clean_tree(&mut self) {
        for node in &mut self.nodes {
            node.condition_met = false;
            if let CondKind::And { met, .. } = &mut node.kind {
                met.iter_mut().for_each(|m| *m = false);
            }
        }
        self.triggered.clear();
        self.armed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ids_of(tree: &ConditionTree) -> Vec<CondId> {
        tree.criteria().map(|(id, _)| id).collect()
    }

    #[test]
    fn and_fires_once_after_every_child() {
        let wakeup = Wakeup::and([
            Criterion::ElapsedFrames(1),
            Criterion::Activation,
            Criterion::ElapsedTime(Duration::from_millis(5)),
        ])
        .unwrap();
        let mut tree = ConditionTree::build(&wakeup);
        let ids = ids_of(&tree);

        assert!(!tree.trigger(ids[0]));
        assert!(!tree.trigger(ids[0]));
        assert!(!tree.trigger(ids[2]));
        assert!(!tree.is_met());
        assert!(tree.trigger(ids[1]));
        assert!(tree.is_met());
        // Every later event is absorbed.
        assert!(!tree.trigger(ids[1]));
        assert!(!tree.trigger(ids[0]));
        assert_eq!(tree.triggered_criteria().count(), 3);
    }

    #[test]
    fn or_of_ands_needs_a_complete_group() {
        let wakeup = Wakeup::or_of_ands([
            vec![Criterion::Activation, Criterion::Deactivation],
            vec![Criterion::ElapsedFrames(3), Criterion::ElapsedFrames(4)],
        ])
        .unwrap();
        let mut tree = ConditionTree::build(&wakeup);
        let ids = ids_of(&tree);

        assert!(!tree.trigger(ids[0]));
        assert!(!tree.trigger(ids[2]));
        assert!(tree.trigger(ids[3]));
        assert!(!tree.trigger(ids[1]));
        let fired: Vec<_> = tree.triggered_criteria().cloned().collect();
        assert_eq!(
            fired,
            vec![
                Criterion::Activation,
                Criterion::ElapsedFrames(3),
                Criterion::ElapsedFrames(4)
            ]
        );
    }

    #[test]
    fn and_of_ors_needs_every_group() {
        let wakeup = Wakeup::and_of_ors([
            vec![Criterion::Activation, Criterion::Deactivation],
            vec![Criterion::ElapsedFrames(1)],
        ])
        .unwrap();
        let mut tree = ConditionTree::build(&wakeup);
        let ids = ids_of(&tree);

        assert!(!tree.trigger(ids[0]));
        assert!(!tree.trigger(ids[1]));
        assert!(tree.trigger(ids[2]));
    }

    #[test]
    fn single_criterion_and_or() {
        let mut single = ConditionTree::build(&Wakeup::on(Criterion::Activation));
        assert!(single.trigger(0));
        assert!(!single.trigger(0));

        let mut or = ConditionTree::build(
            &Wakeup::or([Criterion::Activation, Criterion::Deactivation]).unwrap(),
        );
        let ids = ids_of(&or);
        assert!(or.trigger(ids[1]));
        assert!(!or.trigger(ids[0]));
    }

    #[test]
    fn clean_tree_is_idempotent_and_disarms() {
        let wakeup = Wakeup::and([Criterion::Activation, Criterion::Deactivation]).unwrap();
        let mut tree = ConditionTree::build(&wakeup);
        let ids = ids_of(&tree);
        tree.trigger(ids[0]);

        tree.clean_tree();
        tree.clean_tree();
        assert!(!tree.is_armed());
        assert!(!tree.is_met());
        assert_eq!(tree.triggered_criteria().count(), 0);
        assert!(!tree.trigger(ids[1]));
        assert!(!tree.trigger(99));
    }
}
