// alpenglow/renderer/src/integer_edge.rs
//
// Copyright © 2024 The Alpenglow Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `IntegerEdge` construction (spec.md §4.1): Cohen-Sutherland clipping of
//! `BoundedSubpath`s against the tile, rounding into the tile's integer
//! grid, and the exact rational segment-segment intersection test that
//! `intersect.rs`'s three traversal strategies all bottom out in.

use crate::tile::TileIntegerFrame;
use alpenglow_content::path::{BoundedSubpath, PathId};
use alpenglow_geometry::rational::{Rational, Rational2};
use alpenglow_geometry::rect::RectF;
use alpenglow_geometry::vector::{Vector2F, Vector2I};

const INSIDE: u8 = 0;
const LEFT: u8 = 1;
const RIGHT: u8 = 2;
const BOTTOM: u8 = 4;
const TOP: u8 = 8;

fn outcode(p: Vector2F, bounds: RectF) -> u8 {
    let mut code = INSIDE;
    if p.x() < bounds.min_x() {
        code |= LEFT;
    } else if p.x() > bounds.max_x() {
        code |= RIGHT;
    }
    if p.y() < bounds.min_y() {
        code |= BOTTOM;
    } else if p.y() > bounds.max_y() {
        code |= TOP;
    }
    code
}

/// Cohen-Sutherland clip of the segment `(p0, p1)` against `bounds`.
/// Returns `None` when the segment lies entirely outside.
fn clip_segment_to_rect(mut p0: Vector2F, mut p1: Vector2F, bounds: RectF) -> Option<(Vector2F, Vector2F)> {
    let mut code0 = outcode(p0, bounds);
    let mut code1 = outcode(p1, bounds);
    loop {
        if code0 | code1 == 0 {
            return Some((p0, p1));
        }
        if code0 & code1 != 0 {
            return None;
        }
        let out = if code0 != 0 { code0 } else { code1 };
        let d = p1 - p0;
        let clipped = if out & TOP != 0 {
            Vector2F::new(p0.x() + d.x() * (bounds.max_y() - p0.y()) / d.y(), bounds.max_y())
        } else if out & BOTTOM != 0 {
            Vector2F::new(p0.x() + d.x() * (bounds.min_y() - p0.y()) / d.y(), bounds.min_y())
        } else if out & RIGHT != 0 {
            Vector2F::new(bounds.max_x(), p0.y() + d.y() * (bounds.max_x() - p0.x()) / d.x())
        } else {
            Vector2F::new(bounds.min_x(), p0.y() + d.y() * (bounds.min_x() - p0.x()) / d.x())
        };
        if out == code0 {
            p0 = clipped;
            code0 = outcode(p0, bounds);
        } else {
            p1 = clipped;
            code1 = outcode(p1, bounds);
        }
    }
}

/// A line segment with 32-bit signed integer endpoints in a tile's
/// rounded coordinate frame, carrying an ownership token back to the
/// `RenderPath` it was clipped from and the set of rational t-values
/// where intersections with other edges occur.
#[derive(Clone, Debug)]
pub struct IntegerEdge {
    pub path_id: PathId,
    pub from: Vector2I,
    pub to: Vector2I,
    hits: Vec<Rational>,
}

impl IntegerEdge {
    pub fn new(path_id: PathId, from: Vector2I, to: Vector2I) -> IntegerEdge {
        debug_assert_ne!(from, to, "IntegerEdge endpoints must be distinct");
        IntegerEdge { path_id, from, to, hits: vec![Rational::zero(), Rational::one()] }
    }

    /// Records an intersection t-value on this edge, keeping `hits`
    /// sorted and deduplicated (exact equality, so a touching endpoint
    /// recorded twice collapses to one entry per spec.md §4.1's tie-break
    /// rule: "the endpoint already present takes precedence").
    pub fn add_hit(&mut self, t: Rational) {
        if self.hits.iter().any(|&existing| existing == t) {
            return;
        }
        let index = self.hits.partition_point(|&existing| existing < t);
        self.hits.insert(index, t);
    }

    /// The sorted, deduplicated t-values `{0, t1 < t2 < ... , 1}` this
    /// edge will be split at.
    pub fn sorted_hits(&self) -> &[Rational] {
        &self.hits
    }

    #[inline]
    pub fn point_at(&self, t: Rational) -> Rational2 {
        let from = Rational2::new(Rational::from_i64(self.from.x() as i64), Rational::from_i64(self.from.y() as i64));
        let direction = (self.to.x() as i64 - self.from.x() as i64, self.to.y() as i64 - self.from.y() as i64);
        Rational2::new(
            from.x + t * Rational::from_i64(direction.0),
            from.y + t * Rational::from_i64(direction.1),
        )
    }
}

/// Clips every `BoundedSubpath` overlapping `tile_bounds` to the tile,
/// transforms its endpoints into the tile's integer grid (`frame`), and
/// rounds to the nearest integer. Edges that degenerate to a point after
/// rounding are dropped.
pub fn build_integer_edges(subpaths: &[BoundedSubpath], tile_bounds: RectF, frame: &TileIntegerFrame) -> Vec<IntegerEdge> {
    let mut edges = Vec::new();
    for subpath in subpaths {
        if !subpath.intersects_tile(tile_bounds) {
            continue;
        }
        if let Some((clipped_from, clipped_to)) = clip_segment_to_rect(subpath.from, subpath.to, tile_bounds) {
            let integer_from = frame.to_integer.transform_point(clipped_from).to_i32();
            let integer_to = frame.to_integer.transform_point(clipped_to).to_i32();
            if integer_from == integer_to {
                continue;
            }
            edges.push(IntegerEdge::new(subpath.path_id, integer_from, integer_to));
        }
    }
    edges
}

/// The result of testing two `IntegerEdge`s for intersection (spec.md
/// §4.1): a single crossing/touching point, or — for collinear overlaps —
/// the two endpoints of the shared sub-segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Intersection {
    Point { t_a: Rational, t_b: Rational, point: Rational2 },
    Overlap { first: (Rational, Rational, Rational2), second: (Rational, Rational, Rational2) },
}

/// Exact rational intersection of two integer-endpoint segments. `None`
/// when they don't meet within `[0, 1] x [0, 1]`. All three traversal
/// strategies in `intersect.rs` call this for every candidate pair; the
/// strategy only decides *which* pairs get tested, never the geometric
/// answer, so spec.md invariant #2 (intersection exhaustiveness) holds by
/// construction.
pub fn intersect_segments(a_from: Vector2I, a_to: Vector2I, b_from: Vector2I, b_to: Vector2I) -> Option<Intersection> {
    let (ax0, ay0) = (a_from.x() as i64, a_from.y() as i64);
    let (ax1, ay1) = (a_to.x() as i64, a_to.y() as i64);
    let (bx0, by0) = (b_from.x() as i64, b_from.y() as i64);
    let (bx1, by1) = (b_to.x() as i64, b_to.y() as i64);

    let d1x = ax1 - ax0;
    let d1y = ay1 - ay0;
    let d2x = bx1 - bx0;
    let d2y = by1 - by0;
    let ex = bx0 - ax0;
    let ey = by0 - ay0;

    let denom = d1x * d2y - d1y * d2x;

    if denom != 0 {
        let t_a_num = ex * d2y - ey * d2x;
        let t_b_num = ex * d1y - ey * d1x;
        let t_a = Rational::new(t_a_num, denom);
        let t_b = Rational::new(t_b_num, denom);
        if t_a.is_negative() || t_a.gt_one() || t_b.is_negative() || t_b.gt_one() {
            return None;
        }
        let point = Rational2::new(
            Rational::from_i64(ax0) + t_a * Rational::from_i64(d1x),
            Rational::from_i64(ay0) + t_a * Rational::from_i64(d1y),
        );
        return Some(Intersection::Point { t_a, t_b, point });
    }

    // Parallel. Collinear only if b0 - a0 is also parallel to d1.
    let cross_e = ex * d1y - ey * d1x;
    if cross_e != 0 {
        return None;
    }

    let len2 = d1x * d1x + d1y * d1y;
    if len2 == 0 {
        return None;
    }
    // a-parametrization (t=0 at a_from, t=1 at a_to) of b's endpoints.
    let t_b0 = Rational::new(ex * d1x + ey * d1y, len2);
    let fx = bx1 - ax0;
    let fy = by1 - ay0;
    let t_b1 = Rational::new(fx * d1x + fy * d1y, len2);

    let (lo, hi) = if t_b0 <= t_b1 { (t_b0, t_b1) } else { (t_b1, t_b0) };
    let overlap_lo = if lo.is_negative() { Rational::zero() } else { lo };
    let overlap_hi = if hi.gt_one() { Rational::one() } else { hi };
    if overlap_lo > overlap_hi {
        return None;
    }

    let span = t_b1 - t_b0;
    if span.is_zero() {
        return None;
    }
    let s_at = |t_a: Rational| -> Rational { (t_a - t_b0) / span };

    let point_at = |t_a: Rational| -> Rational2 {
        Rational2::new(
            Rational::from_i64(ax0) + t_a * Rational::from_i64(d1x),
            Rational::from_i64(ay0) + t_a * Rational::from_i64(d1y),
        )
    };

    if overlap_lo == overlap_hi {
        return Some(Intersection::Point { t_a: overlap_lo, t_b: s_at(overlap_lo), point: point_at(overlap_lo) });
    }

    Some(Intersection::Overlap {
        first: (overlap_lo, s_at(overlap_lo), point_at(overlap_lo)),
        second: (overlap_hi, s_at(overlap_hi), point_at(overlap_hi)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alpenglow_geometry::vector::vec2i;

    #[test]
    fn s2_diagonal_crossing() {
        let result = intersect_segments(vec2i(0, 0), vec2i(100, 100), vec2i(0, 100), vec2i(100, 0)).unwrap();
        match result {
            Intersection::Point { t_a, t_b, point } => {
                assert_eq!(t_a, Rational::new(1, 2));
                assert_eq!(t_b, Rational::new(1, 2));
                assert_eq!(point, Rational2::new(Rational::from_i64(50), Rational::from_i64(50)));
            }
            _ => panic!("expected a point intersection"),
        }
    }

    #[test]
    fn s3_collinear_overlap() {
        let result = intersect_segments(vec2i(0, 0), vec2i(100, 200), vec2i(50, 100), vec2i(150, 300)).unwrap();
        match result {
            Intersection::Overlap { first, second } => {
                assert_eq!(first.0, Rational::new(1, 2));
                assert_eq!(first.1, Rational::zero());
                assert_eq!(first.2, Rational2::new(Rational::from_i64(50), Rational::from_i64(100)));
                assert_eq!(second.0, Rational::one());
                assert_eq!(second.1, Rational::new(1, 2));
                assert_eq!(second.2, Rational2::new(Rational::from_i64(100), Rational::from_i64(200)));
            }
            _ => panic!("expected a collinear overlap"),
        }
    }

    #[test]
    fn parallel_non_collinear_segments_do_not_intersect() {
        assert!(intersect_segments(vec2i(0, 0), vec2i(10, 0), vec2i(0, 5), vec2i(10, 5)).is_none());
    }

    #[test]
    fn disjoint_segments_do_not_intersect() {
        assert!(intersect_segments(vec2i(0, 0), vec2i(1, 1), vec2i(10, 10), vec2i(20, 20)).is_none());
    }

    #[test]
    fn endpoint_touch_is_a_t_intersection() {
        let result = intersect_segments(vec2i(0, 0), vec2i(10, 0), vec2i(10, 0), vec2i(10, 10)).unwrap();
        match result {
            Intersection::Point { t_a, t_b, .. } => {
                assert_eq!(t_a, Rational::one());
                assert_eq!(t_b, Rational::zero());
            }
            _ => panic!("expected a point intersection"),
        }
    }

    #[test]
    fn edge_hits_stay_sorted_and_deduplicated() {
        use alpenglow_content::path::RenderPath;
        let path = RenderPath::new(vec![], alpenglow_content::path::FillRule::Nonzero);
        let mut edge = IntegerEdge::new(path.id(), vec2i(0, 0), vec2i(100, 0));
        edge.add_hit(Rational::new(3, 4));
        edge.add_hit(Rational::new(1, 4));
        edge.add_hit(Rational::new(1, 4));
        assert_eq!(edge.sorted_hits(), &[Rational::zero(), Rational::new(1, 4), Rational::new(3, 4), Rational::one()]);
    }
}
