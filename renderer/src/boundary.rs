// alpenglow/renderer/src/boundary.rs
//
// Copyright © 2024 The Alpenglow Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Boundary tracing (spec.md §4.2): walk each unvisited half-edge's
//! `next` chain to materialize a closed loop, then classify it inner
//! (positive signed area — a face's exterior) or outer (negative — a
//! hole, or the unbounded region's frame).

use crate::half_edge::{HalfEdgeArena, HalfEdgeId};
use alpenglow_geometry::rational::Rational2;

#[derive(Clone, Debug)]
pub struct RationalBoundary {
    pub half_edges: Vec<HalfEdgeId>,
    pub vertices: Vec<Rational2>,
    pub signed_area: f64,
    pub is_inner: bool,
}

impl RationalBoundary {
    pub fn area(&self) -> f64 {
        self.signed_area.abs()
    }

    pub fn vertices_f64(&self) -> Vec<(f64, f64)> {
        self.vertices.iter().map(|v| v.to_f64()).collect()
    }
}

/// Traces every half-edge into exactly one boundary loop. A dropped
/// (cancelled-duplicate) half-edge has no twin and is skipped.
pub fn trace_boundaries(arena: &HalfEdgeArena) -> Vec<RationalBoundary> {
    let mut visited = vec![false; arena.len()];
    let mut boundaries = Vec::new();

    for raw in 0..arena.len() {
        if visited[raw] {
            continue;
        }
        let start = HalfEdgeId::from_raw(raw as u32);
        if arena.get(start).twin.is_none() {
            visited[raw] = true;
            continue;
        }

        let mut half_edges = Vec::new();
        let mut cursor = start;
        loop {
            visited[cursor.raw() as usize] = true;
            half_edges.push(cursor);
            let next = arena.get(cursor).next;
            if next.is_none() || next == start {
                break;
            }
            cursor = next;
        }

        let vertices: Vec<Rational2> = half_edges.iter().map(|&id| arena.get(id).origin).collect();
        let signed_area = shoelace(&vertices);
        boundaries.push(RationalBoundary { half_edges, vertices, signed_area, is_inner: signed_area > 0.0 });
    }

    boundaries
}

fn shoelace(vertices: &[Rational2]) -> f64 {
    let points: Vec<(f64, f64)> = vertices.iter().map(|v| v.to_f64()).collect();
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let (x0, y0) = points[i];
        let (x1, y1) = points[(i + 1) % n];
        sum += x0 * y1 - x1 * y0;
    }
    sum * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::half_edge::HalfEdgeArena;
    use crate::integer_edge::IntegerEdge;
    use alpenglow_content::path::{FillRule, RenderPath};
    use alpenglow_geometry::vector::vec2i;

    fn unit_square_edges() -> (Vec<IntegerEdge>, alpenglow_content::path::PathId) {
        let path_id = RenderPath::new(vec![], FillRule::Nonzero).id();
        (
            vec![
                IntegerEdge::new(path_id, vec2i(0, 0), vec2i(100, 0)),
                IntegerEdge::new(path_id, vec2i(100, 0), vec2i(100, 100)),
                IntegerEdge::new(path_id, vec2i(100, 100), vec2i(0, 100)),
                IntegerEdge::new(path_id, vec2i(0, 100), vec2i(0, 0)),
            ],
            path_id,
        )
    }

    #[test]
    fn unit_square_traces_to_one_inner_and_one_outer_boundary() {
        let (edges, _) = unit_square_edges();
        let arena = HalfEdgeArena::build(&edges).unwrap();
        let boundaries = trace_boundaries(&arena);
        assert_eq!(boundaries.len(), 2);
        let inner_count = boundaries.iter().filter(|b| b.is_inner).count();
        let outer_count = boundaries.iter().filter(|b| !b.is_inner).count();
        assert_eq!(inner_count, 1);
        assert_eq!(outer_count, 1);
        let inner = boundaries.iter().find(|b| b.is_inner).unwrap();
        assert!((inner.area() - 10_000.0).abs() < 1e-6);
    }
}
