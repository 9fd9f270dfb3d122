// Copyright 2025 the QuickZone Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The Linear Bounding Volume Hierarchy itself: build, refit, and stabbing query.

use core::cell::RefCell;

use glam::Vec3;
use hashbrown::HashMap;

use quickzone_geometry::Aabb3;

use crate::morton::{MortonBounds, morton_of};
use crate::radix::RadixScratch;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum NodeRef {
    Leaf(u32),
    Internal(u32),
}

#[derive(Copy, Clone, Debug)]
struct InternalNode {
    left: NodeRef,
    right: NodeRef,
    aabb: Aabb3,
}

/// Which action [`Lbvh::commit`] took, per the rebuild-vs-refit rule.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BuildAction {
    /// No pending changes; the tree was left untouched.
    None,
    /// Topology was unchanged; only the AABBs on the paths above changed leaves
    /// were recomputed.
    Refit,
    /// Topology was rebuilt from scratch (new Morton codes, new radix sort).
    Rebuild,
}

/// A Linear Bounding Volume Hierarchy over zone AABBs.
///
/// Leaves are keyed by an opaque `u32` id (a zone id, owned by a higher layer); this
/// crate knows nothing about zones, shapes, or observers. Mutations are staged via
/// [`insert`](Lbvh::insert)/[`update`](Lbvh::update)/[`remove`](Lbvh::remove) and take
/// effect only on [`commit`](Lbvh::commit), matching the "exactly one build per tree
/// per tick" contract.
#[derive(Debug, Default)]
pub struct Lbvh {
    leaf_aabbs: Vec<Aabb3>,
    leaf_ids: Vec<u32>,
    id_to_leaf: HashMap<u32, usize>,

    internal: Vec<InternalNode>,
    leaf_parent: Vec<u32>,
    internal_parent: Vec<Option<u32>>,
    root: Option<NodeRef>,

    pending_insert: HashMap<u32, Aabb3>,
    pending_update: HashMap<u32, Aabb3>,
    pending_remove: Vec<u32>,

    morton_scratch: Vec<u32>,
    order_scratch: Vec<u32>,
    radix: RadixScratch,
    stack_scratch: RefCell<Vec<NodeRefOrNone>>,
}

/// Stack entry type alias; kept distinct from [`NodeRef`] only so the scratch field's
/// type doesn't need `unsafe` tricks to stay `Sync`-agnostic. They're identical in shape.
type NodeRefOrNone = NodeRef;

impl Lbvh {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of zones currently committed into the tree (ignores pending staged changes).
    pub fn len(&self) -> usize {
        self.leaf_aabbs.len()
    }

    /// Whether the tree has no committed leaves.
    pub fn is_empty(&self) -> bool {
        self.leaf_aabbs.is_empty()
    }

    /// Whether any insert/update/remove is staged but not yet committed.
    pub fn has_pending(&self) -> bool {
        !self.pending_insert.is_empty() || !self.pending_update.is_empty() || !self.pending_remove.is_empty()
    }

    /// Stages insertion of a new zone id. No-op on the tree until [`commit`](Self::commit).
    pub fn insert(&mut self, id: u32, aabb: Aabb3) {
        self.pending_update.remove(&id);
        self.pending_insert.insert(id, aabb);
    }

    /// Stages an AABB update for an id already committed into the tree (or still only
    /// staged as an insert — in that case the staged insert AABB is simply replaced).
    pub fn update(&mut self, id: u32, aabb: Aabb3) {
        if let Some(existing) = self.pending_insert.get_mut(&id) {
            *existing = aabb;
        } else {
            self.pending_update.insert(id, aabb);
        }
    }

    /// Stages removal of a committed id.
    pub fn remove(&mut self, id: u32) {
        self.pending_insert.remove(&id);
        self.pending_update.remove(&id);
        self.pending_remove.push(id);
    }

    /// The current AABB of a committed id, if present.
    pub fn aabb_of_id(&self, id: u32) -> Option<Aabb3> {
        self.id_to_leaf.get(&id).map(|&idx| self.leaf_aabbs[idx])
    }

    /// Applies every staged change, deciding between a refit and a full rebuild per
    /// A refit is only valid when no id was inserted or removed and the number
    /// of updated leaves is at most `ceil(n / 16)`.
    pub fn commit(&mut self) -> BuildAction {
        if !self.has_pending() {
            return BuildAction::None;
        }
        let structural_change = !self.pending_insert.is_empty() || !self.pending_remove.is_empty();
        let n = self.leaf_aabbs.len();
        let threshold = n.div_ceil(16).max(1);

        if !structural_change && self.pending_update.len() <= threshold {
            self.apply_refit();
            log::debug!(
                "lbvh refit: {} leaves touched (threshold {})",
                self.pending_update.len(),
                threshold
            );
            self.pending_update.clear();
            BuildAction::Refit
        } else {
            let touched = self.pending_insert.len() + self.pending_update.len() + self.pending_remove.len();
            log::debug!("lbvh rebuild: {touched} staged changes");
            self.apply_all_and_rebuild();
            BuildAction::Rebuild
        }
    }

    fn apply_refit(&mut self) {
        for (&id, &aabb) in self.pending_update.iter() {
            let Some(&idx) = self.id_to_leaf.get(&id) else {
                continue;
            };
            self.leaf_aabbs[idx] = aabb;
            self.refit_from_leaf(idx);
        }
    }

    fn refit_from_leaf(&mut self, leaf_idx: usize) {
        if self.internal.is_empty() {
            return;
        }
        let mut current = self.leaf_parent[leaf_idx];
        loop {
            let node = self.internal[current as usize];
            let left_aabb = self.child_aabb(node.left);
            let right_aabb = self.child_aabb(node.right);
            self.internal[current as usize].aabb = left_aabb.union(&right_aabb);
            match self.internal_parent[current as usize] {
                Some(parent) => current = parent,
                None => break,
            }
        }
    }

    fn child_aabb(&self, node: NodeRef) -> Aabb3 {
        match node {
            NodeRef::Leaf(idx) => self.leaf_aabbs[idx as usize],
            NodeRef::Internal(idx) => self.internal[idx as usize].aabb,
        }
    }

    fn apply_all_and_rebuild(&mut self) {
        for id in self.pending_remove.drain(..) {
            if let Some(idx) = self.id_to_leaf.remove(&id) {
                let last = self.leaf_aabbs.len() - 1;
                self.leaf_aabbs.swap_remove(idx);
                self.leaf_ids.swap_remove(idx);
                if idx != last {
                    let moved_id = self.leaf_ids[idx];
                    self.id_to_leaf.insert(moved_id, idx);
                }
            }
        }
        for (id, aabb) in self.pending_update.drain() {
            if let Some(&idx) = self.id_to_leaf.get(&id) {
                self.leaf_aabbs[idx] = aabb;
            }
        }
        for (id, aabb) in self.pending_insert.drain() {
            let idx = self.leaf_aabbs.len();
            self.leaf_aabbs.push(aabb);
            self.leaf_ids.push(id);
            self.id_to_leaf.insert(id, idx);
        }

        self.rebuild_topology();
    }

    fn rebuild_topology(&mut self) {
        let n = self.leaf_aabbs.len();
        self.internal.clear();
        self.leaf_parent.clear();
        self.internal_parent.clear();

        if n == 0 {
            self.root = None;
            return;
        }
        if n == 1 {
            self.root = Some(NodeRef::Leaf(0));
            return;
        }

        let centroids: Vec<Vec3> = self.leaf_aabbs.iter().map(Aabb3::center).collect();
        let bounds = MortonBounds::from_centroids(&centroids);

        self.morton_scratch.clear();
        self.morton_scratch
            .extend(centroids.iter().map(|&c| morton_of(&bounds, c)));
        self.order_scratch.clear();
        self.order_scratch.extend(0..n as u32);

        self.radix.sort_pairs(&mut self.morton_scratch, &mut self.order_scratch);

        let sorted_aabbs: Vec<Aabb3> = self
            .order_scratch
            .iter()
            .map(|&i| self.leaf_aabbs[i as usize])
            .collect();
        let sorted_ids: Vec<u32> = self.order_scratch.iter().map(|&i| self.leaf_ids[i as usize]).collect();
        self.leaf_aabbs = sorted_aabbs;
        self.leaf_ids = sorted_ids;
        self.id_to_leaf.clear();
        for (idx, &id) in self.leaf_ids.iter().enumerate() {
            self.id_to_leaf.insert(id, idx);
        }

        let codes = &self.morton_scratch;
        self.internal.resize(
            n - 1,
            InternalNode {
                left: NodeRef::Leaf(0),
                right: NodeRef::Leaf(0),
                aabb: Aabb3::empty(),
            },
        );
        self.leaf_parent.resize(n, 0);
        self.internal_parent.resize(n - 1, None);

        for i in 0..n - 1 {
            let (first, last) = determine_range(codes, i);
            let split = find_split(codes, first, last);
            let left = if split == first {
                NodeRef::Leaf(split as u32)
            } else {
                NodeRef::Internal(split as u32)
            };
            let right = if split + 1 == last {
                NodeRef::Leaf((split + 1) as u32)
            } else {
                NodeRef::Internal((split + 1) as u32)
            };
            match left {
                NodeRef::Leaf(idx) => self.leaf_parent[idx as usize] = i as u32,
                NodeRef::Internal(idx) => self.internal_parent[idx as usize] = Some(i as u32),
            }
            match right {
                NodeRef::Leaf(idx) => self.leaf_parent[idx as usize] = i as u32,
                NodeRef::Internal(idx) => self.internal_parent[idx as usize] = Some(i as u32),
            }
            self.internal[i] = InternalNode {
                left,
                right,
                aabb: Aabb3::empty(),
            };
        }

        self.root = Some(NodeRef::Internal(0));
        self.compute_aabb(NodeRef::Internal(0));
    }

    fn compute_aabb(&mut self, node: NodeRef) -> Aabb3 {
        match node {
            NodeRef::Leaf(idx) => self.leaf_aabbs[idx as usize],
            NodeRef::Internal(idx) => {
                let (left, right) = (self.internal[idx as usize].left, self.internal[idx as usize].right);
                let left_aabb = self.compute_aabb(left);
                let right_aabb = self.compute_aabb(right);
                let aabb = left_aabb.union(&right_aabb);
                self.internal[idx as usize].aabb = aabb;
                aabb
            }
        }
    }

    /// Appends every committed zone id whose AABB contains `point` to `out`.
    /// `out` is cleared first; reuse the same buffer across calls to avoid allocation.
    pub fn stab(&self, point: Vec3, out: &mut Vec<u32>) {
        out.clear();
        let Some(root) = self.root else {
            return;
        };
        let mut stack = self.stack_scratch.borrow_mut();
        stack.clear();
        stack.push(root);
        while let Some(node) = stack.pop() {
            match node {
                NodeRef::Leaf(idx) => {
                    if self.leaf_aabbs[idx as usize].contains_point(point) {
                        out.push(self.leaf_ids[idx as usize]);
                    }
                }
                NodeRef::Internal(idx) => {
                    let inode = &self.internal[idx as usize];
                    if inode.aabb.contains_point(point) {
                        stack.push(inode.left);
                        stack.push(inode.right);
                    }
                }
            }
        }
    }
}

/// `delta(i, j)`: length of the common binary prefix of `codes[i]` and `codes[j]`,
/// using the index as an extra (infinite-resolution) tie-break so equal codes still
/// produce a well-ordered tree. Out-of-range `j` returns `-1`, lower than any real delta.
fn delta(codes: &[u32], i: i64, j: i64) -> i64 {
    if j < 0 || j >= codes.len() as i64 {
        return -1;
    }
    let (i, j) = (i as usize, j as usize);
    if codes[i] == codes[j] {
        32 + (i as u32 ^ j as u32).leading_zeros() as i64
    } else {
        (codes[i] ^ codes[j]).leading_zeros() as i64
    }
}

fn determine_range(codes: &[u32], i: usize) -> (usize, usize) {
    let i = i as i64;
    let d = if delta(codes, i, i + 1) > delta(codes, i, i - 1) { 1 } else { -1 };
    let delta_min = delta(codes, i, i - d);

    let mut l_max = 2i64;
    while delta(codes, i, i + l_max * d) > delta_min {
        l_max *= 2;
    }

    let mut l = 0i64;
    let mut t = l_max / 2;
    while t >= 1 {
        if delta(codes, i, i + (l + t) * d) > delta_min {
            l += t;
        }
        t /= 2;
    }
    let j = i + l * d;
    if d > 0 { (i as usize, j as usize) } else { (j as usize, i as usize) }
}

fn find_split(codes: &[u32], first: usize, last: usize) -> usize {
    let first_code = codes[first];
    let last_code = codes[last];
    if first_code == last_code {
        return (first + last) / 2;
    }
    let common_prefix = (first_code ^ last_code).leading_zeros();
    let mut split = first;
    let mut step = last - first;
    loop {
        step = step.div_ceil(2);
        let new_split = split + step;
        if new_split < last {
            let split_prefix = (first_code ^ codes[new_split]).leading_zeros();
            if split_prefix > common_prefix {
                split = new_split;
            }
        }
        if step <= 1 {
            break;
        }
    }
    split
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: f32, y: f32, z: f32) -> Vec3 {
        Vec3::new(x, y, z)
    }

    fn box_aabb(center: Vec3, half: f32) -> Aabb3 {
        Aabb3::new(center - Vec3::splat(half), center + Vec3::splat(half))
    }

    #[test]
    fn empty_tree_stabs_nothing() {
        let tree = Lbvh::new();
        let mut out = Vec::new();
        tree.stab(pt(0.0, 0.0, 0.0), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn single_leaf_rebuild_and_stab() {
        let mut tree = Lbvh::new();
        tree.insert(1, box_aabb(pt(0.0, 0.0, 0.0), 1.0));
        assert_eq!(tree.commit(), BuildAction::Rebuild);
        assert_eq!(tree.len(), 1);

        let mut out = Vec::new();
        tree.stab(pt(0.5, 0.5, 0.5), &mut out);
        assert_eq!(out, vec![1]);

        out.clear();
        tree.stab(pt(5.0, 5.0, 5.0), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn many_leaves_stabbing_is_sound_and_complete() {
        let mut tree = Lbvh::new();
        let mut expected_boxes = Vec::new();
        for i in 0..200u32 {
            let center = pt((i as f32) * 3.0, 0.0, 0.0);
            let aabb = box_aabb(center, 1.0);
            tree.insert(i, aabb);
            expected_boxes.push((i, aabb));
        }
        assert_eq!(tree.commit(), BuildAction::Rebuild);

        for &(id, aabb) in &expected_boxes {
            let p = aabb.center();
            let mut out = Vec::new();
            tree.stab(p, &mut out);
            assert!(out.contains(&id), "expected leaf {id} to contain its own centroid");
            let expected: Vec<u32> = expected_boxes
                .iter()
                .filter(|(_, a)| a.contains_point(p))
                .map(|(i, _)| *i)
                .collect();
            let mut got = out.clone();
            got.sort_unstable();
            let mut exp = expected.clone();
            exp.sort_unstable();
            assert_eq!(got, exp);
        }
    }

    #[test]
    fn refit_is_chosen_for_small_change_count_no_structural_change() {
        let mut tree = Lbvh::new();
        for i in 0..32u32 {
            tree.insert(i, box_aabb(pt(i as f32 * 2.0, 0.0, 0.0), 0.5));
        }
        tree.commit();
        assert_eq!(tree.len(), 32);

        // ceil(32/16) == 2, so updating 2 leaves should refit, not rebuild.
        tree.update(0, box_aabb(pt(0.5, 0.0, 0.0), 0.5));
        tree.update(1, box_aabb(pt(2.5, 0.0, 0.0), 0.5));
        assert_eq!(tree.commit(), BuildAction::Refit);

        let mut out = Vec::new();
        tree.stab(pt(0.5, 0.0, 0.0), &mut out);
        assert!(out.contains(&0));
    }

    #[test]
    fn large_change_count_triggers_rebuild_not_refit() {
        let mut tree = Lbvh::new();
        for i in 0..32u32 {
            tree.insert(i, box_aabb(pt(i as f32 * 2.0, 0.0, 0.0), 0.5));
        }
        tree.commit();

        for i in 0..10u32 {
            tree.update(i, box_aabb(pt(i as f32 * 2.0 + 0.1, 0.0, 0.0), 0.5));
        }
        assert_eq!(tree.commit(), BuildAction::Rebuild);
    }

    #[test]
    fn insert_alongside_update_forces_rebuild() {
        let mut tree = Lbvh::new();
        tree.insert(1, box_aabb(pt(0.0, 0.0, 0.0), 1.0));
        tree.commit();
        tree.update(1, box_aabb(pt(1.0, 0.0, 0.0), 1.0));
        tree.insert(2, box_aabb(pt(5.0, 0.0, 0.0), 1.0));
        assert_eq!(tree.commit(), BuildAction::Rebuild);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn remove_drops_leaf_from_future_queries() {
        let mut tree = Lbvh::new();
        tree.insert(1, box_aabb(pt(0.0, 0.0, 0.0), 1.0));
        tree.insert(2, box_aabb(pt(10.0, 0.0, 0.0), 1.0));
        tree.commit();

        tree.remove(1);
        assert_eq!(tree.commit(), BuildAction::Rebuild);
        assert_eq!(tree.len(), 1);

        let mut out = Vec::new();
        tree.stab(pt(0.0, 0.0, 0.0), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn no_pending_changes_is_a_no_op() {
        let mut tree = Lbvh::new();
        tree.insert(1, box_aabb(pt(0.0, 0.0, 0.0), 1.0));
        tree.commit();
        assert_eq!(tree.commit(), BuildAction::None);
    }
}
