// alpenglow/content/src/path.rs
//
// Copyright © 2024 The Alpenglow Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `RenderPath`: an immutable polygonal region, plus the `BoundedSubpath`
//! slices the tile loop culls against tile bounds.

use alpenglow_geometry::rect::RectF;
use alpenglow_geometry::vector::Vector2F;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Which winding numbers count as "inside" a path.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum FillRule {
    Nonzero,
    EvenOdd,
}

impl FillRule {
    /// The `inside(windingNumber)` predicate used by both the winding map
    /// and RenderProgram path specialization.
    #[inline]
    pub fn is_inside(self, winding: i32) -> bool {
        match self {
            FillRule::Nonzero => winding != 0,
            FillRule::EvenOdd => winding.rem_euclid(2) == 1,
        }
    }
}

/// Identifies a `RenderPath` stably across cloning, so it can key a
/// winding map. Two clones of the same path compare equal; two
/// independently constructed paths never do, even with identical
/// geometry.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct PathId(u64);

static NEXT_PATH_ID: AtomicU64 = AtomicU64::new(1);

impl PathId {
    fn fresh() -> PathId {
        PathId(NEXT_PATH_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

/// An immutable polygonal region: an ordered sequence of closed point
/// loops plus a fill rule. Loops are not required to be simple or
/// non-self-intersecting; that is resolved downstream by Constructive
/// Area Geometry.
#[derive(Clone, Debug)]
pub struct RenderPath {
    id: PathId,
    loops: Vec<Vec<Vector2F>>,
    fill_rule: FillRule,
}

impl RenderPath {
    pub fn new(loops: Vec<Vec<Vector2F>>, fill_rule: FillRule) -> RenderPath {
        RenderPath { id: PathId::fresh(), loops, fill_rule }
    }

    #[inline]
    pub fn id(&self) -> PathId {
        self.id
    }

    #[inline]
    pub fn loops(&self) -> &[Vec<Vector2F>] {
        &self.loops
    }

    #[inline]
    pub fn fill_rule(&self) -> FillRule {
        self.fill_rule
    }

    #[inline]
    pub fn is_inside(&self, winding: i32) -> bool {
        self.fill_rule.is_inside(winding)
    }

    pub fn bounds(&self) -> RectF {
        let mut min = Vector2F::splat(f32::INFINITY);
        let mut max = Vector2F::splat(f32::NEG_INFINITY);
        for point in self.loops.iter().flatten() {
            min = min.min(*point);
            max = max.max(*point);
        }
        if !min.is_finite() || !max.is_finite() {
            return RectF::default();
        }
        RectF::from_points(min, max)
    }

    /// Splits every loop into its constituent edges as `BoundedSubpath`s,
    /// the granularity the tile loop culls against tile bounds.
    pub fn bounded_subpaths(&self) -> Vec<BoundedSubpath> {
        let mut subpaths = Vec::new();
        for (loop_index, points) in self.loops.iter().enumerate() {
            if points.len() < 2 {
                continue;
            }
            for edge_index in 0..points.len() {
                let from = points[edge_index];
                let to = points[(edge_index + 1) % points.len()];
                if from == to {
                    continue;
                }
                subpaths.push(BoundedSubpath {
                    path_id: self.id,
                    loop_index,
                    from,
                    to,
                    bounds: RectF::from_points(from, to),
                });
            }
        }
        subpaths
    }
}

impl PartialEq for RenderPath {
    #[inline]
    fn eq(&self, other: &RenderPath) -> bool {
        self.id == other.id
    }
}

impl Eq for RenderPath {}

/// A single edge of a `RenderPath` loop, bundled with its axis-aligned
/// bounding box so the tile loop can cull it against tile bounds before
/// promoting it to an `IntegerEdge`.
#[derive(Clone, Copy, Debug)]
pub struct BoundedSubpath {
    pub path_id: PathId,
    pub loop_index: usize,
    pub from: Vector2F,
    pub to: Vector2F,
    pub bounds: RectF,
}

impl BoundedSubpath {
    #[inline]
    pub fn intersects_tile(&self, tile_bounds: RectF) -> bool {
        self.bounds.intersection(tile_bounds).is_some() || tile_bounds.contains_rect(self.bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alpenglow_geometry::vector::vec2f;

    fn unit_square() -> RenderPath {
        RenderPath::new(
            vec![vec![vec2f(0.0, 0.0), vec2f(1.0, 0.0), vec2f(1.0, 1.0), vec2f(0.0, 1.0)]],
            FillRule::Nonzero,
        )
    }

    #[test]
    fn distinct_paths_have_distinct_ids() {
        let a = unit_square();
        let b = unit_square();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn bounded_subpaths_close_the_loop() {
        let square = unit_square();
        let subpaths = square.bounded_subpaths();
        assert_eq!(subpaths.len(), 4);
        assert_eq!(subpaths.last().unwrap().to, subpaths.first().unwrap().from);
    }

    #[test]
    fn fill_rule_predicates_match_spec() {
        assert!(FillRule::Nonzero.is_inside(-2));
        assert!(!FillRule::Nonzero.is_inside(0));
        assert!(FillRule::EvenOdd.is_inside(1));
        assert!(FillRule::EvenOdd.is_inside(-3));
        assert!(!FillRule::EvenOdd.is_inside(2));
    }

    #[test]
    fn bounds_of_empty_path_is_default() {
        let empty = RenderPath::new(vec![], FillRule::Nonzero);
        assert_eq!(empty.bounds(), RectF::default());
    }
}
