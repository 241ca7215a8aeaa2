// alpenglow/renderer/src/intersect.rs
//
// Copyright © 2024 The Alpenglow Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Three interchangeable strategies for finding every intersecting pair
//! of `IntegerEdge`s (spec.md §4.1): all three must report the identical
//! set of intersections (invariant #2) and differ only in how many
//! candidate pairs they bother testing before reaching that answer.

use crate::integer_edge::{intersect_segments, Intersection, IntegerEdge};
use alpenglow_geometry::vector::Vector2I;
use crate::options::{EdgeIntersectionMethod, EdgeIntersectionSortMethod};

#[derive(Clone, Copy, Debug)]
struct EdgeBounds {
    min: Vector2I,
    max: Vector2I,
}

impl EdgeBounds {
    fn of(edge: &IntegerEdge) -> EdgeBounds {
        EdgeBounds { min: edge.from.min(edge.to), max: edge.from.max(edge.to) }
    }

    fn union(self, other: EdgeBounds) -> EdgeBounds {
        EdgeBounds { min: self.min.min(other.min), max: self.max.max(other.max) }
    }

    fn overlaps(self, other: EdgeBounds) -> bool {
        self.min.x() <= other.max.x()
            && other.min.x() <= self.max.x()
            && self.min.y() <= other.max.y()
            && other.min.y() <= self.max.y()
    }

    fn center_key(self, axis: usize) -> i64 {
        if axis == 0 {
            self.min.x() as i64 + self.max.x() as i64
        } else {
            self.min.y() as i64 + self.max.y() as i64
        }
    }
}

fn order(i: usize, j: usize) -> (usize, usize) {
    if i < j { (i, j) } else { (j, i) }
}

/// Advisory reordering of edges before intersection (spec.md §4.1):
/// affects only performance / intersection-tree balance, never the
/// output set, since every strategy still tests every pair its bounding
/// structure reports as overlapping.
pub fn sort_indices(edges: &[IntegerEdge], method: EdgeIntersectionSortMethod) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..edges.len()).collect();
    let bounds: Vec<EdgeBounds> = edges.iter().map(EdgeBounds::of).collect();
    match method {
        EdgeIntersectionSortMethod::None => {}
        EdgeIntersectionSortMethod::CenterSize => {
            indices.sort_by_key(|&i| (bounds[i].center_key(0), bounds[i].center_key(1)));
        }
        EdgeIntersectionSortMethod::MinMax => {
            indices.sort_by_key(|&i| (bounds[i].min.x(), bounds[i].min.y(), bounds[i].max.x(), bounds[i].max.y()));
        }
        EdgeIntersectionSortMethod::MinMaxSize => {
            indices.sort_by_key(|&i| {
                let b = bounds[i];
                let size = (b.max.x() - b.min.x()) as i64 * (b.max.y() - b.min.y()) as i64;
                (b.min.x(), b.min.y(), size)
            });
        }
        EdgeIntersectionSortMethod::CenterMinMax => {
            indices.sort_by_key(|&i| (bounds[i].center_key(0), bounds[i].min.x(), bounds[i].min.y()));
        }
        EdgeIntersectionSortMethod::Random => {
            // A fixed, deterministic pseudo-shuffle (no external RNG
            // dependency is warranted for an advisory ordering pass):
            // a multiplicative hash of the index scatters the order
            // without needing a seedable generator.
            indices.sort_by_key(|&i| i.wrapping_mul(2_654_435_761));
        }
    }
    indices
}

fn test_pair(edges: &[IntegerEdge], i: usize, j: usize, out: &mut Vec<(usize, usize, Intersection)>) {
    if let Some(hit) = intersect_segments(edges[i].from, edges[i].to, edges[j].from, edges[j].to) {
        out.push((i, j, hit));
    }
}

/// O(n^2): tests every pair. The reference strategy every other one must
/// agree with.
pub fn quadratic(edges: &[IntegerEdge]) -> Vec<(usize, usize, Intersection)> {
    let mut out = Vec::new();
    for i in 0..edges.len() {
        for j in (i + 1)..edges.len() {
            test_pair(edges, i, j, &mut out);
        }
    }
    out
}

const LEAF_CAPACITY: usize = 8;

enum BvhNode {
    Leaf(Vec<usize>),
    Internal { bounds: EdgeBounds, left: Box<BvhNode>, right: Box<BvhNode> },
}

impl BvhNode {
    fn bounds(&self, item_bounds: &[EdgeBounds]) -> EdgeBounds {
        match self {
            BvhNode::Leaf(items) => items.iter().map(|&i| item_bounds[i]).reduce(EdgeBounds::union).expect("non-empty leaf"),
            BvhNode::Internal { bounds, .. } => *bounds,
        }
    }

    fn build(mut items: Vec<usize>, item_bounds: &[EdgeBounds], depth: u32) -> BvhNode {
        if items.len() <= LEAF_CAPACITY || depth > 32 {
            return BvhNode::Leaf(items);
        }
        let union = items.iter().map(|&i| item_bounds[i]).reduce(EdgeBounds::union).expect("non-empty node");
        let width = union.max.x() as i64 - union.min.x() as i64;
        let height = union.max.y() as i64 - union.min.y() as i64;
        let axis = if width >= height { 0 } else { 1 };
        items.sort_by_key(|&i| item_bounds[i].center_key(axis));
        let mid = items.len() / 2;
        let right_items = items.split_off(mid);
        let left = BvhNode::build(items, item_bounds, depth + 1);
        let right = BvhNode::build(right_items, item_bounds, depth + 1);
        let bounds = left.bounds(item_bounds).union(right.bounds(item_bounds));
        BvhNode::Internal { bounds, left: Box::new(left), right: Box::new(right) }
    }

    fn self_pairs(&self, item_bounds: &[EdgeBounds], out: &mut Vec<(usize, usize)>) {
        match self {
            BvhNode::Leaf(items) => {
                for a in 0..items.len() {
                    for b in (a + 1)..items.len() {
                        if item_bounds[items[a]].overlaps(item_bounds[items[b]]) {
                            out.push(order(items[a], items[b]));
                        }
                    }
                }
            }
            BvhNode::Internal { left, right, .. } => {
                left.self_pairs(item_bounds, out);
                right.self_pairs(item_bounds, out);
                left.cross_pairs(right, item_bounds, out);
            }
        }
    }

    fn cross_pairs(&self, other: &BvhNode, item_bounds: &[EdgeBounds], out: &mut Vec<(usize, usize)>) {
        if !self.bounds(item_bounds).overlaps(other.bounds(item_bounds)) {
            return;
        }
        match (self, other) {
            (BvhNode::Leaf(a), BvhNode::Leaf(b)) => {
                for &i in a {
                    for &j in b {
                        if item_bounds[i].overlaps(item_bounds[j]) {
                            out.push(order(i, j));
                        }
                    }
                }
            }
            (BvhNode::Internal { left, right, .. }, _) => {
                left.cross_pairs(other, item_bounds, out);
                right.cross_pairs(other, item_bounds, out);
            }
            (_, BvhNode::Internal { left, right, .. }) => {
                self.cross_pairs(left, item_bounds, out);
                self.cross_pairs(right, item_bounds, out);
            }
        }
    }
}

/// Descends an axis-aligned bounding-volume hierarchy, only testing
/// pairs whose bounds overlap.
pub fn bounds_tree(edges: &[IntegerEdge]) -> Vec<(usize, usize, Intersection)> {
    if edges.is_empty() {
        return Vec::new();
    }
    let item_bounds: Vec<EdgeBounds> = edges.iter().map(EdgeBounds::of).collect();
    let root = BvhNode::build((0..edges.len()).collect(), &item_bounds, 0);
    let mut candidate_pairs = Vec::new();
    root.self_pairs(&item_bounds, &mut candidate_pairs);
    candidate_pairs.sort_unstable();
    candidate_pairs.dedup();
    let mut out = Vec::new();
    for (i, j) in candidate_pairs {
        test_pair(edges, i, j, &mut out);
    }
    out
}

/// A flat-array layout of the same bounding-volume hierarchy `bounds_tree`
/// builds: nodes for one level sit contiguously, improving cache
/// locality during the descent without changing which pairs get tested.
struct ArrayBvh {
    /// `bounds[k]` covers the subtree rooted at node `k`; children of `k`
    /// are `2k+1` and `2k+2` (implicit complete-binary-tree layout).
    bounds: Vec<Option<EdgeBounds>>,
    /// `items[k]` is non-empty only for leaf nodes.
    items: Vec<Vec<usize>>,
}

impl ArrayBvh {
    fn build(edges: &[IntegerEdge]) -> ArrayBvh {
        let item_bounds: Vec<EdgeBounds> = edges.iter().map(EdgeBounds::of).collect();
        let capacity = (edges.len().max(1) * 4).next_power_of_two();
        let mut bounds = vec![None; capacity];
        let mut items = vec![Vec::new(); capacity];
        if !edges.is_empty() {
            Self::build_node(0, (0..edges.len()).collect(), &item_bounds, &mut bounds, &mut items, 0);
        }
        ArrayBvh { bounds, items }
    }

    fn build_node(
        node: usize,
        mut members: Vec<usize>,
        item_bounds: &[EdgeBounds],
        bounds: &mut Vec<Option<EdgeBounds>>,
        items: &mut Vec<Vec<usize>>,
        depth: u32,
    ) {
        if node >= bounds.len() {
            bounds.resize(node + 1, None);
            items.resize(node + 1, Vec::new());
        }
        let union = members.iter().map(|&i| item_bounds[i]).reduce(EdgeBounds::union).expect("non-empty node");
        bounds[node] = Some(union);
        if members.len() <= LEAF_CAPACITY || depth > 32 {
            items[node] = members;
            return;
        }
        let width = union.max.x() as i64 - union.min.x() as i64;
        let height = union.max.y() as i64 - union.min.y() as i64;
        let axis = if width >= height { 0 } else { 1 };
        members.sort_by_key(|&i| item_bounds[i].center_key(axis));
        let mid = members.len() / 2;
        let right_members = members.split_off(mid);
        Self::build_node(2 * node + 1, members, item_bounds, bounds, items, depth + 1);
        Self::build_node(2 * node + 2, right_members, item_bounds, bounds, items, depth + 1);
    }

    fn bounds_at(&self, node: usize) -> Option<EdgeBounds> {
        self.bounds.get(node).copied().flatten()
    }

    fn is_leaf(&self, node: usize) -> bool {
        self.bounds_at(node).is_some() && self.items.get(node).map_or(true, |v| !v.is_empty() || self.bounds_at(2 * node + 1).is_none())
    }

    fn self_pairs(&self, node: usize, out: &mut Vec<(usize, usize)>) {
        if self.bounds_at(node).is_none() {
            return;
        }
        if self.is_leaf(node) {
            let members = &self.items[node];
            for a in 0..members.len() {
                for b in (a + 1)..members.len() {
                    out.push(order(members[a], members[b]));
                }
            }
            return;
        }
        let left = 2 * node + 1;
        let right = 2 * node + 2;
        self.self_pairs(left, out);
        self.self_pairs(right, out);
        self.cross_pairs(left, right, out);
    }

    fn cross_pairs(&self, a: usize, b: usize, out: &mut Vec<(usize, usize)>) {
        let (Some(ba), Some(bb)) = (self.bounds_at(a), self.bounds_at(b)) else { return };
        if !ba.overlaps(bb) {
            return;
        }
        match (self.is_leaf(a), self.is_leaf(b)) {
            (true, true) => {
                for &i in &self.items[a] {
                    for &j in &self.items[b] {
                        out.push(order(i, j));
                    }
                }
            }
            (false, _) => {
                self.cross_pairs(2 * a + 1, b, out);
                self.cross_pairs(2 * a + 2, b, out);
            }
            (_, false) => {
                self.cross_pairs(a, 2 * b + 1, out);
                self.cross_pairs(a, 2 * b + 2, out);
            }
        }
    }
}

/// Same hierarchy as `bounds_tree`, laid out as a flat array instead of
/// boxed tree nodes.
pub fn array_bounds_tree(edges: &[IntegerEdge]) -> Vec<(usize, usize, Intersection)> {
    if edges.is_empty() {
        return Vec::new();
    }
    let tree = ArrayBvh::build(edges);
    let mut candidate_pairs = Vec::new();
    tree.self_pairs(0, &mut candidate_pairs);
    candidate_pairs.sort_unstable();
    candidate_pairs.dedup();
    let mut out = Vec::new();
    for (i, j) in candidate_pairs {
        test_pair(edges, i, j, &mut out);
    }
    out
}

/// Runs the strategy `method` selects and applies every resulting
/// intersection back into the originating edges' hit sets.
pub fn find_and_apply_intersections(edges: &mut [IntegerEdge], method: EdgeIntersectionMethod) {
    let results = match method {
        EdgeIntersectionMethod::Quadratic => quadratic(edges),
        EdgeIntersectionMethod::BoundsTree => bounds_tree(edges),
        EdgeIntersectionMethod::ArrayBoundsTree => array_bounds_tree(edges),
    };
    for (i, j, hit) in results {
        match hit {
            Intersection::Point { t_a, t_b, .. } => {
                edges[i].add_hit(t_a);
                edges[j].add_hit(t_b);
            }
            Intersection::Overlap { first, second } => {
                edges[i].add_hit(first.0);
                edges[i].add_hit(second.0);
                edges[j].add_hit(first.1);
                edges[j].add_hit(second.1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alpenglow_content::path::{FillRule, RenderPath};
    use alpenglow_geometry::vector::vec2i;

    fn edge(from: Vector2I, to: Vector2I) -> IntegerEdge {
        let path = RenderPath::new(vec![], FillRule::Nonzero);
        IntegerEdge::new(path.id(), from, to)
    }

    fn sample_edges() -> Vec<IntegerEdge> {
        vec![
            edge(vec2i(0, 0), vec2i(100, 100)),
            edge(vec2i(0, 100), vec2i(100, 0)),
            edge(vec2i(200, 200), vec2i(300, 300)),
            edge(vec2i(200, 300), vec2i(300, 200)),
            edge(vec2i(50, 50), vec2i(60, 200)),
        ]
    }

    fn result_set(results: &[(usize, usize, Intersection)]) -> Vec<(usize, usize)> {
        let mut pairs: Vec<(usize, usize)> = results.iter().map(|(i, j, _)| (*i, *j)).collect();
        pairs.sort_unstable();
        pairs
    }

    #[test]
    fn invariant_2_all_strategies_agree() {
        let edges = sample_edges();
        let q = result_set(&quadratic(&edges));
        let b = result_set(&bounds_tree(&edges));
        let a = result_set(&array_bounds_tree(&edges));
        assert_eq!(q, b);
        assert_eq!(q, a);
        assert!(!q.is_empty());
    }

    #[test]
    fn strategies_agree_on_a_larger_random_like_set() {
        let mut edges = Vec::new();
        for k in 0..40i32 {
            edges.push(edge(vec2i(k * 7 % 101, 0), vec2i(100 - (k * 11 % 101), 500)));
        }
        let q = result_set(&quadratic(&edges));
        let b = result_set(&bounds_tree(&edges));
        let a = result_set(&array_bounds_tree(&edges));
        assert_eq!(q, b);
        assert_eq!(q, a);
    }

    #[test]
    fn sort_methods_do_not_change_the_edge_set_only_its_order() {
        let edges = sample_edges();
        for method in [
            EdgeIntersectionSortMethod::None,
            EdgeIntersectionSortMethod::CenterSize,
            EdgeIntersectionSortMethod::MinMax,
            EdgeIntersectionSortMethod::MinMaxSize,
            EdgeIntersectionSortMethod::CenterMinMax,
            EdgeIntersectionSortMethod::Random,
        ] {
            let mut indices = sort_indices(&edges, method);
            indices.sort_unstable();
            assert_eq!(indices, (0..edges.len()).collect::<Vec<_>>());
        }
    }

    #[test]
    fn find_and_apply_records_hits_on_both_edges() {
        let mut edges = sample_edges();
        find_and_apply_intersections(&mut edges, EdgeIntersectionMethod::Quadratic);
        assert!(edges[0].sorted_hits().len() > 2);
        assert!(edges[1].sorted_hits().len() > 2);
    }
}
