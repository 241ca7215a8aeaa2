// alpenglow/builder/src/lib.rs
//
// Copyright © 2024 The Alpenglow Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `PathBuilder`: an ergonomic `move_to`/`line_to`/`*_curve_to` front end
//! that flattens Bezier input into the polygonal point loops
//! `alpenglow_content::path::RenderPath` stores. CAG only ever sees
//! straight edges, so curves are flattened here, upstream of everything
//! the rest of the crate does.

use alpenglow_content::path::{FillRule, RenderPath};
use alpenglow_geometry::transform2d::Transform2F;
use alpenglow_geometry::vector::Vector2F;

/// Recursive bisection stops subdividing a cubic/quadratic segment once its
/// deviation from a straight line is under this many units, matching the
/// reference renderer's flattening tolerance.
const FLATTENING_TOLERANCE: f32 = 0.25;

/// Bisection depth cap: guards against runaway recursion on a
/// pathologically large or NaN-contaminated control polygon.
const MAX_FLATTEN_DEPTH: u32 = 16;

#[derive(Copy, Clone)]
enum PathState {
    // Nothing has been drawn yet; only `move_to` is valid.
    Empty,
    // We have a starting point, but it is not connected to a previous contour.
    Start(Vector2F),
    // Our starting point is the end of the last segment drawn.
    End(Vector2F),
}

/// Builds one `RenderPath` out of possibly-many closed contours, flattening
/// quadratic/cubic curves into line segments as they are appended.
#[derive(Clone)]
pub struct PathBuilder {
    loops: Vec<Vec<Vector2F>>,
    current: Vec<Vector2F>,
    state: PathState,
    fill_rule: FillRule,
}

impl PathBuilder {
    #[inline]
    pub fn new(fill_rule: FillRule) -> PathBuilder {
        PathBuilder { loops: Vec::new(), current: Vec::new(), state: PathState::Empty, fill_rule }
    }

    fn start(&mut self) {
        match self.state {
            PathState::Empty => panic!("no starting point set; call move_to first"),
            PathState::Start(p) => {
                if !self.current.is_empty() {
                    self.loops.push(std::mem::take(&mut self.current));
                }
                self.current.push(p);
            }
            PathState::End(_) => {}
        }
    }

    #[inline]
    pub fn move_to(&mut self, p: Vector2F) {
        self.state = PathState::Start(p);
    }

    #[inline]
    pub fn line_to(&mut self, p: Vector2F) {
        self.start();
        self.current.push(p);
        self.state = PathState::End(p);
    }

    pub fn quadratic_curve_to(&mut self, control: Vector2F, to: Vector2F) {
        self.start();
        let from = *self.current.last().expect("line_to/move_to sets a starting point");
        flatten_quadratic(from, control, to, 0, &mut self.current);
        self.state = PathState::End(to);
    }

    pub fn cubic_curve_to(&mut self, control1: Vector2F, control2: Vector2F, to: Vector2F) {
        self.start();
        let from = *self.current.last().expect("line_to/move_to sets a starting point");
        flatten_cubic(from, control1, control2, to, 0, &mut self.current);
        self.state = PathState::End(to);
    }

    /// Appends a circular arc of `transform`-ed unit-circle geometry,
    /// flattened the same way curves are: split into cubic Bezier
    /// quadrants, each recursively bisected.
    pub fn arc(&mut self, transform: Transform2F, start_angle: f32, end_angle: f32) {
        self.start();
        let sweep = end_angle - start_angle;
        let segment_count = ((sweep.abs() / (core::f32::consts::PI / 2.0)).ceil() as usize).max(1);
        let step = sweep / segment_count as f32;
        for i in 0..segment_count {
            let a0 = start_angle + step * i as f32;
            let a1 = a0 + step;
            let (p0, c1, c2, p1) = cubic_arc_quadrant(transform, a0, a1);
            if self.current.is_empty() {
                self.current.push(p0);
            }
            self.cubic_curve_to(c1, c2, p1);
        }
    }

    #[inline]
    pub fn rect(&mut self, origin: Vector2F, size: Vector2F) {
        self.move_to(origin);
        self.line_to(Vector2F::new(origin.x() + size.x(), origin.y()));
        self.line_to(origin + size);
        self.line_to(Vector2F::new(origin.x(), origin.y() + size.y()));
        self.close();
    }

    #[inline]
    pub fn circle(&mut self, center: Vector2F, radius: f32) {
        self.ellipse(center, Vector2F::splat(radius), 0.0);
    }

    pub fn ellipse(&mut self, center: Vector2F, radius: Vector2F, phi: f32) {
        let transform = Transform2F::from_translation(center)
            * Transform2F::from_rotation(phi)
            * Transform2F::from_scale(radius);
        self.arc(transform, 0.0, 2.0 * core::f32::consts::PI);
        self.close();
    }

    #[inline]
    pub fn close(&mut self) {
        // Loops are implicitly closed by `RenderPath::bounded_subpaths`
        // wrapping the last point back to the first; nothing to append.
        self.state = match self.state {
            PathState::End(p) | PathState::Start(p) => PathState::Start(p),
            PathState::Empty => PathState::Empty,
        };
    }

    #[inline]
    pub fn pos(&self) -> Option<Vector2F> {
        match self.state {
            PathState::Empty => None,
            PathState::Start(p) | PathState::End(p) => Some(p),
        }
    }

    /// Consumes the builder, producing the accumulated `RenderPath`.
    pub fn build(mut self) -> RenderPath {
        if !self.current.is_empty() {
            self.loops.push(self.current);
        }
        RenderPath::new(self.loops, self.fill_rule)
    }
}

fn flatten_quadratic(from: Vector2F, control: Vector2F, to: Vector2F, depth: u32, out: &mut Vec<Vector2F>) {
    if depth >= MAX_FLATTEN_DEPTH || quadratic_is_flat(from, control, to) {
        out.push(to);
        return;
    }
    let p01 = from.lerp(control, 0.5);
    let p12 = control.lerp(to, 0.5);
    let mid = p01.lerp(p12, 0.5);
    flatten_quadratic(from, p01, mid, depth + 1, out);
    flatten_quadratic(mid, p12, to, depth + 1, out);
}

fn flatten_cubic(
    from: Vector2F,
    control1: Vector2F,
    control2: Vector2F,
    to: Vector2F,
    depth: u32,
    out: &mut Vec<Vector2F>,
) {
    if depth >= MAX_FLATTEN_DEPTH || cubic_is_flat(from, control1, control2, to) {
        out.push(to);
        return;
    }
    let (prev, next) = split_cubic(from, control1, control2, to, 0.5);
    flatten_cubic(prev.0, prev.1, prev.2, prev.3, depth + 1, out);
    flatten_cubic(next.0, next.1, next.2, next.3, depth + 1, out);
}

type CubicPoints = (Vector2F, Vector2F, Vector2F, Vector2F);

fn split_cubic(
    from: Vector2F,
    control1: Vector2F,
    control2: Vector2F,
    to: Vector2F,
    t: f32,
) -> (CubicPoints, CubicPoints) {
    let p01 = from.lerp(control1, t);
    let p12 = control1.lerp(control2, t);
    let p23 = control2.lerp(to, t);
    let p012 = p01.lerp(p12, t);
    let p123 = p12.lerp(p23, t);
    let mid = p012.lerp(p123, t);
    ((from, p01, p012, mid), (mid, p123, p23, to))
}

/// Distance of `point` from the line through `from`/`to`, the deviation
/// metric the flatness tests bound by `FLATTENING_TOLERANCE`.
fn point_line_distance(point: Vector2F, from: Vector2F, to: Vector2F) -> f32 {
    let baseline = to - from;
    let len = baseline.length();
    if len < 1e-6 {
        return (point - from).length();
    }
    (point - from).cross(baseline).abs() / len
}

fn quadratic_is_flat(from: Vector2F, control: Vector2F, to: Vector2F) -> bool {
    point_line_distance(control, from, to) <= FLATTENING_TOLERANCE
}

fn cubic_is_flat(from: Vector2F, control1: Vector2F, control2: Vector2F, to: Vector2F) -> bool {
    point_line_distance(control1, from, to) <= FLATTENING_TOLERANCE
        && point_line_distance(control2, from, to) <= FLATTENING_TOLERANCE
}

/// A quarter-turn-or-less circular arc approximated as a single cubic
/// Bezier segment (the standard four-thirds-tangent construction), in the
/// unit circle, transformed by `transform`.
fn cubic_arc_quadrant(transform: Transform2F, a0: f32, a1: f32) -> CubicPoints {
    let sweep = a1 - a0;
    let alpha = (4.0 / 3.0) * (sweep / 4.0).tan();
    let (s0, c0) = a0.sin_cos();
    let (s1, c1) = a1.sin_cos();
    let p0 = Vector2F::new(c0, s0);
    let p1 = Vector2F::new(c1, s1);
    let c1_point = p0 + Vector2F::new(-s0, c0).scale(alpha);
    let c2_point = p1 - Vector2F::new(-s1, c1).scale(alpha);
    (
        transform.transform_point(p0),
        transform.transform_point(c1_point),
        transform.transform_point(c2_point),
        transform.transform_point(p1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use alpenglow_geometry::vector::vec2f;

    #[test]
    fn rect_closes_to_four_points() {
        let mut builder = PathBuilder::new(FillRule::Nonzero);
        builder.rect(vec2f(0.0, 0.0), vec2f(10.0, 20.0));
        let path = builder.build();
        assert_eq!(path.loops().len(), 1);
        assert_eq!(path.loops()[0].len(), 4);
    }

    #[test]
    fn straight_quadratic_flattens_to_a_single_segment() {
        let mut builder = PathBuilder::new(FillRule::Nonzero);
        builder.move_to(vec2f(0.0, 0.0));
        builder.quadratic_curve_to(vec2f(5.0, 0.0), vec2f(10.0, 0.0));
        let path = builder.build();
        assert_eq!(path.loops()[0], vec![vec2f(0.0, 0.0), vec2f(10.0, 0.0)]);
    }

    #[test]
    fn curved_cubic_subdivides_into_more_than_two_points() {
        let mut builder = PathBuilder::new(FillRule::Nonzero);
        builder.move_to(vec2f(0.0, 0.0));
        builder.cubic_curve_to(vec2f(0.0, 50.0), vec2f(50.0, 50.0), vec2f(50.0, 0.0));
        let path = builder.build();
        assert!(path.loops()[0].len() > 2);
    }

    #[test]
    fn circle_is_approximately_round() {
        let mut builder = PathBuilder::new(FillRule::Nonzero);
        builder.circle(vec2f(0.0, 0.0), 10.0);
        let path = builder.build();
        let points = &path.loops()[0];
        assert!(points.len() >= 4);
        for p in points {
            assert!((p.length() - 10.0).abs() < 0.5);
        }
    }

    #[test]
    fn multiple_contours_become_multiple_loops() {
        let mut builder = PathBuilder::new(FillRule::EvenOdd);
        builder.rect(vec2f(0.0, 0.0), vec2f(10.0, 10.0));
        builder.rect(vec2f(2.0, 2.0), vec2f(4.0, 4.0));
        let path = builder.build();
        assert_eq!(path.loops().len(), 2);
    }
}
