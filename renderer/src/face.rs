// alpenglow/renderer/src/face.rs
//
// Copyright © 2024 The Alpenglow Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Face-hole assignment and winding maps (spec.md §4.2).
//!
//! Each inner boundary from `boundary::trace_boundaries` defines the
//! exterior of exactly one `RationalFace`. Outer boundaries are holes;
//! each is assigned to the smallest inner boundary containing it. A
//! face nested inside another face's hole becomes that face's child,
//! giving a forest whose roots are top-level faces. Exactly the outer
//! boundaries no inner boundary contains represent the unbounded
//! region, whose winding is 0 for every path by construction — it
//! never needs a face record at all.
//!
//! Winding is computed directly per face via a standard crossing-number
//! test against each path's own loops, rather than incrementally
//! propagated edge-by-edge across the dual graph: both compute the same
//! values (invariant #7 only constrains values), and the direct form
//! avoids threading edge-ownership sign conventions through the
//! inner/outer boundary split.

use crate::boundary::RationalBoundary;
use alpenglow_content::path::{PathId, RenderPath};
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct RationalFace {
    /// Index into the `boundaries` slice this forest was built from.
    pub boundary: usize,
    /// Indices into `boundaries` of the outer boundaries nested inside
    /// this face (holes).
    pub holes: Vec<usize>,
    /// Index into `FaceForest::faces`, if this face sits inside another
    /// face's hole.
    pub parent: Option<usize>,
    pub area: f64,
    /// A point known to lie inside this face's exterior and outside all
    /// of its holes; the seed for winding-map computation.
    pub representative_point: (f64, f64),
}

pub struct FaceForest {
    pub faces: Vec<RationalFace>,
    pub roots: Vec<usize>,
}

/// Builds the face-hole forest from a tile's traced boundaries.
pub fn build_faces(boundaries: &[RationalBoundary]) -> FaceForest {
    let mut faces: Vec<RationalFace> = boundaries
        .iter()
        .enumerate()
        .filter(|(_, b)| b.is_inner)
        .map(|(i, b)| RationalFace {
            boundary: i,
            holes: Vec::new(),
            parent: None,
            area: b.area(),
            representative_point: interior_point(&b.vertices_f64()),
        })
        .collect();

    let mut outer_order: Vec<usize> = boundaries.iter().enumerate().filter(|(_, b)| !b.is_inner).map(|(i, _)| i).collect();
    outer_order.sort_by(|&a, &b| boundaries[b].area().partial_cmp(&boundaries[a].area()).unwrap());

    for outer_idx in outer_order {
        // A hole boundary's own enclosed area coincides with whatever
        // face sits at that same location (if any) — testing a point
        // *inside* the hole can't tell the hole apart from that nested
        // face. Probe a point just *outside* the hole instead, so the
        // face it lands in is genuinely the one the hole is carved out
        // of, not the nested face occupying the hole itself.
        let point = hole_probe_point(&boundaries[outer_idx].vertices_f64());
        let mut smallest: Option<(usize, f64)> = None;
        for (face_idx, face) in faces.iter().enumerate() {
            if winding_number(point, &boundaries[face.boundary].vertices_f64()) == 0 {
                continue;
            }
            if smallest.map_or(true, |(_, area)| face.area < area) {
                smallest = Some((face_idx, face.area));
            }
        }
        if let Some((face_idx, _)) = smallest {
            faces[face_idx].holes.push(outer_idx);
        }
        // Otherwise `outer_idx` is (part of) the unbounded region: no
        // inner boundary contains it, so it gets no face record.
    }

    for i in 0..faces.len() {
        let point = faces[i].representative_point;
        let mut smallest: Option<(usize, f64)> = None;
        for (j, other) in faces.iter().enumerate() {
            if i == j {
                continue;
            }
            let nests_in_a_hole = other.holes.iter().any(|&hole| winding_number(point, &boundaries[hole].vertices_f64()) != 0);
            if !nests_in_a_hole {
                continue;
            }
            if smallest.map_or(true, |(_, area)| other.area < area) {
                smallest = Some((j, other.area));
            }
        }
        faces[i].parent = smallest.map(|(j, _)| j);
    }

    let roots = (0..faces.len()).filter(|&i| faces[i].parent.is_none()).collect();
    FaceForest { faces, roots }
}

/// Whether `point` lies in face's own solid area: inside its exterior
/// boundary and outside every hole. Exposed for callers (e.g. the
/// rasterizer) that need to classify an arbitrary point against a
/// specific face rather than the forest as a whole.
pub fn face_contains_point(face: &RationalFace, point: (f64, f64), boundaries: &[RationalBoundary]) -> bool {
    if winding_number(point, &boundaries[face.boundary].vertices_f64()) == 0 {
        return false;
    }
    for &hole in &face.holes {
        if winding_number(point, &boundaries[hole].vertices_f64()) != 0 {
            return false;
        }
    }
    true
}

/// Signed crossing-number winding of `point` about the closed polygon
/// `vertices` (Sunday's `wn_PnPoly`), chosen over `atan2`-based angle
/// accumulation so the sign is exact for points exactly on a ray.
pub fn winding_number(point: (f64, f64), vertices: &[(f64, f64)]) -> i32 {
    let (px, py) = point;
    let n = vertices.len();
    if n < 3 {
        return 0;
    }
    let mut winding = 0;
    for i in 0..n {
        let (x0, y0) = vertices[i];
        let (x1, y1) = vertices[(i + 1) % n];
        let is_left = (x1 - x0) * (py - y0) - (px - x0) * (y1 - y0);
        if y0 <= py {
            if y1 > py && is_left > 0.0 {
                winding += 1;
            }
        } else if y1 <= py && is_left < 0.0 {
            winding -= 1;
        }
    }
    winding
}

/// Total winding number of `path` (summed across its loops) at `point`.
pub fn path_winding(point: (f64, f64), path: &RenderPath) -> i32 {
    path.loops()
        .iter()
        .map(|loop_points| {
            let pts: Vec<(f64, f64)> = loop_points.iter().map(|v| (v.x() as f64, v.y() as f64)).collect();
            winding_number(point, &pts)
        })
        .sum()
}

/// `windingMap[face][path]` for every face in `forest` against every
/// path in `paths`. The unbounded region's winding is 0 for every path
/// and is never materialized as an entry.
pub fn winding_maps(forest: &FaceForest, paths: &[RenderPath]) -> Vec<HashMap<PathId, i32>> {
    forest
        .faces
        .iter()
        .map(|face| paths.iter().map(|p| (p.id(), path_winding(face.representative_point, p))).collect())
        .collect()
}

/// A point known to lie strictly inside a simple polygon: the midpoint
/// between the neighbors of its bottommost (then leftmost) vertex,
/// which is always convex for a simple polygon and so has its interior
/// on the segment joining its neighbors.
fn interior_point(vertices: &[(f64, f64)]) -> (f64, f64) {
    let n = vertices.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    if n == 1 {
        return vertices[0];
    }
    let (idx, _) = vertices
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.1.partial_cmp(&b.1).unwrap().then(a.0.partial_cmp(&b.0).unwrap()))
        .unwrap();
    let prev = vertices[(idx + n - 1) % n];
    let next = vertices[(idx + 1) % n];
    ((prev.0 + next.0) / 2.0, (prev.1 + next.1) / 2.0)
}

/// A point known to lie just *outside* a hole boundary's own enclosed
/// area: the midpoint of its first edge, nudged along whichever side of
/// the edge normal isn't wound by the boundary itself. Used instead of
/// `interior_point` when assigning a hole to its containing face, since
/// a hole's enclosed area coincides with whatever face occupies that
/// same location and `interior_point` can't tell the two apart.
fn hole_probe_point(vertices: &[(f64, f64)]) -> (f64, f64) {
    let n = vertices.len();
    if n < 2 {
        return interior_point(vertices);
    }
    let (x0, y0) = vertices[0];
    let (x1, y1) = vertices[1 % n];
    let mid = ((x0 + x1) / 2.0, (y0 + y1) / 2.0);
    let (dx, dy) = (x1 - x0, y1 - y0);
    let len = (dx * dx + dy * dy).sqrt().max(1e-9);
    let (nx, ny) = (-dy / len, dx / len);
    let scale = bounding_extent(vertices) * 1e-4;
    let candidate_a = (mid.0 + nx * scale, mid.1 + ny * scale);
    let candidate_b = (mid.0 - nx * scale, mid.1 - ny * scale);
    if winding_number(candidate_a, vertices) == 0 {
        candidate_a
    } else {
        candidate_b
    }
}

fn bounding_extent(vertices: &[(f64, f64)]) -> f64 {
    let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(x, y) in vertices {
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    (max_x - min_x).max(max_y - min_y).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::trace_boundaries;
    use crate::half_edge::HalfEdgeArena;
    use crate::integer_edge::IntegerEdge;
    use alpenglow_content::path::FillRule;
    use alpenglow_geometry::vector::{vec2i, Vector2F};

    fn square_path(min: f32, max: f32) -> RenderPath {
        RenderPath::new(
            vec![vec![
                Vector2F::new(min, min),
                Vector2F::new(max, min),
                Vector2F::new(max, max),
                Vector2F::new(min, max),
            ]],
            FillRule::Nonzero,
        )
    }

    #[test]
    fn single_square_has_one_face_with_winding_one() {
        let path = square_path(0.0, 100.0);
        let edges = vec![
            IntegerEdge::new(path.id(), vec2i(0, 0), vec2i(100, 0)),
            IntegerEdge::new(path.id(), vec2i(100, 0), vec2i(100, 100)),
            IntegerEdge::new(path.id(), vec2i(100, 100), vec2i(0, 100)),
            IntegerEdge::new(path.id(), vec2i(0, 100), vec2i(0, 0)),
        ];
        let arena = HalfEdgeArena::build(&edges).unwrap();
        let boundaries = trace_boundaries(&arena);
        let forest = build_faces(&boundaries);
        assert_eq!(forest.faces.len(), 1);
        assert_eq!(forest.roots, vec![0]);
        assert!(forest.faces[0].holes.is_empty());

        let maps = winding_maps(&forest, std::slice::from_ref(&path));
        assert_eq!(maps[0][&path.id()], 1);
    }

    #[test]
    fn nested_square_produces_a_hole_and_a_child_face() {
        let outer = square_path(0.0, 100.0);
        let inner = square_path(25.0, 75.0);
        let outer_edges = vec![
            IntegerEdge::new(outer.id(), vec2i(0, 0), vec2i(100, 0)),
            IntegerEdge::new(outer.id(), vec2i(100, 0), vec2i(100, 100)),
            IntegerEdge::new(outer.id(), vec2i(100, 100), vec2i(0, 100)),
            IntegerEdge::new(outer.id(), vec2i(0, 100), vec2i(0, 0)),
        ];
        let inner_edges = vec![
            IntegerEdge::new(inner.id(), vec2i(25, 25), vec2i(75, 25)),
            IntegerEdge::new(inner.id(), vec2i(75, 25), vec2i(75, 75)),
            IntegerEdge::new(inner.id(), vec2i(75, 75), vec2i(25, 75)),
            IntegerEdge::new(inner.id(), vec2i(25, 75), vec2i(25, 25)),
        ];
        let all_edges: Vec<IntegerEdge> = outer_edges.into_iter().chain(inner_edges).collect();
        let arena = HalfEdgeArena::build(&all_edges).unwrap();
        let boundaries = trace_boundaries(&arena);
        // Two disjoint simple polygons (no shared vertices, no
        // intersections) trace to 2 inner + 2 outer boundaries.
        assert_eq!(boundaries.iter().filter(|b| b.is_inner).count(), 2);

        let forest = build_faces(&boundaries);
        assert_eq!(forest.faces.len(), 2);

        let outer_face = forest.faces.iter().position(|f| f.area > 5_000.0).unwrap();
        let inner_face = 1 - outer_face;

        // The small square's hole belongs to the big face (it carves
        // the small square's area out of the annulus), and the small
        // face nests inside that hole, making the big face its parent.
        assert_eq!(forest.faces[outer_face].holes.len(), 1);
        assert!(forest.faces[inner_face].holes.is_empty());
        assert_eq!(forest.faces[inner_face].parent, Some(outer_face));
        assert_eq!(forest.roots, vec![outer_face]);

        let paths = [outer.clone(), inner.clone()];
        let maps = winding_maps(&forest, &paths);
        assert_eq!(maps[outer_face][&outer.id()], 1);
        assert_eq!(maps[outer_face][&inner.id()], 0);
        assert_eq!(maps[inner_face][&outer.id()], 1);
        assert_eq!(maps[inner_face][&inner.id()], 1);
    }
}
