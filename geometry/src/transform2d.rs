// alpenglow/geometry/src/transform2d.rs
//
// Copyright © 2024 The Alpenglow Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! 2D affine transforms: a 2x2 matrix plus a translation vector.

use crate::line_segment::LineSegment2F;
use crate::rect::RectF;
use crate::vector::Vector2F;
use std::ops::Mul;

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Matrix2x2F {
    m11: f32,
    m21: f32,
    m12: f32,
    m22: f32,
}

impl Matrix2x2F {
    #[inline]
    pub fn new(m11: f32, m21: f32, m12: f32, m22: f32) -> Matrix2x2F {
        Matrix2x2F { m11, m21, m12, m22 }
    }

    #[inline]
    pub fn identity() -> Matrix2x2F {
        Matrix2x2F::new(1.0, 0.0, 0.0, 1.0)
    }

    #[inline]
    pub fn from_scale(scale: Vector2F) -> Matrix2x2F {
        Matrix2x2F::new(scale.x(), 0.0, 0.0, scale.y())
    }

    #[inline]
    pub fn from_rotation(theta: f32) -> Matrix2x2F {
        let (sin, cos) = theta.sin_cos();
        Matrix2x2F::new(cos, sin, -sin, cos)
    }

    #[inline]
    pub fn m11(self) -> f32 {
        self.m11
    }

    #[inline]
    pub fn m22(self) -> f32 {
        self.m22
    }

    #[inline]
    pub fn det(self) -> f32 {
        self.m11 * self.m22 - self.m21 * self.m12
    }

    #[inline]
    pub fn inverse(self) -> Matrix2x2F {
        let det = self.det();
        let inv_det = 1.0 / det;
        Matrix2x2F::new(
            self.m22 * inv_det,
            -self.m21 * inv_det,
            -self.m12 * inv_det,
            self.m11 * inv_det,
        )
    }

    #[inline]
    pub fn transform_vector(self, v: Vector2F) -> Vector2F {
        Vector2F::new(self.m11 * v.x() + self.m12 * v.y(), self.m21 * v.x() + self.m22 * v.y())
    }
}

impl Mul<Matrix2x2F> for Matrix2x2F {
    type Output = Matrix2x2F;
    #[inline]
    fn mul(self, other: Matrix2x2F) -> Matrix2x2F {
        Matrix2x2F::new(
            self.m11 * other.m11 + self.m12 * other.m21,
            self.m21 * other.m11 + self.m22 * other.m21,
            self.m11 * other.m12 + self.m12 * other.m22,
            self.m21 * other.m12 + self.m22 * other.m22,
        )
    }
}

/// An affine transform: `p -> matrix * p + vector`.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Transform2F {
    pub matrix: Matrix2x2F,
    pub vector: Vector2F,
}

impl Default for Transform2F {
    #[inline]
    fn default() -> Transform2F {
        Transform2F::identity()
    }
}

impl Transform2F {
    #[inline]
    pub fn identity() -> Transform2F {
        Transform2F { matrix: Matrix2x2F::identity(), vector: Vector2F::zero() }
    }

    #[inline]
    pub fn from_translation(vector: Vector2F) -> Transform2F {
        Transform2F { matrix: Matrix2x2F::identity(), vector }
    }

    #[inline]
    pub fn from_scale(scale: Vector2F) -> Transform2F {
        Transform2F { matrix: Matrix2x2F::from_scale(scale), vector: Vector2F::zero() }
    }

    #[inline]
    pub fn from_uniform_scale(scale: f32) -> Transform2F {
        Transform2F::from_scale(Vector2F::splat(scale))
    }

    #[inline]
    pub fn from_rotation(theta: f32) -> Transform2F {
        Transform2F { matrix: Matrix2x2F::from_rotation(theta), vector: Vector2F::zero() }
    }

    #[inline]
    pub fn is_identity(self) -> bool {
        self == Transform2F::identity()
    }

    #[inline]
    pub fn inverse(self) -> Transform2F {
        let inv_matrix = self.matrix.inverse();
        Transform2F { matrix: inv_matrix, vector: -inv_matrix.transform_vector(self.vector) }
    }

    #[inline]
    pub fn transform_point(self, point: Vector2F) -> Vector2F {
        self.matrix.transform_vector(point) + self.vector
    }

    #[inline]
    pub fn transform_rect(self, rect: RectF) -> RectF {
        let a = self.transform_point(rect.origin());
        let b = self.transform_point(rect.upper_right());
        let c = self.transform_point(rect.lower_left());
        let d = self.transform_point(rect.lower_right());
        RectF::from_points(a.min(b).min(c).min(d), a.max(b).max(c).max(d))
    }

    #[inline]
    pub fn transform_line_segment(self, segment: LineSegment2F) -> LineSegment2F {
        LineSegment2F::new(self.transform_point(segment.from()), self.transform_point(segment.to()))
    }
}

impl Mul<Transform2F> for Transform2F {
    type Output = Transform2F;
    #[inline]
    fn mul(self, other: Transform2F) -> Transform2F {
        Transform2F { matrix: self.matrix * other.matrix, vector: self.transform_point(other.vector) }
    }
}

impl Mul<Vector2F> for Transform2F {
    type Output = Vector2F;
    #[inline]
    fn mul(self, point: Vector2F) -> Vector2F {
        self.transform_point(point)
    }
}

impl Mul<RectF> for Transform2F {
    type Output = RectF;
    #[inline]
    fn mul(self, rect: RectF) -> RectF {
        self.transform_rect(rect)
    }
}

impl Mul<LineSegment2F> for Transform2F {
    type Output = LineSegment2F;
    #[inline]
    fn mul(self, segment: LineSegment2F) -> LineSegment2F {
        self.transform_line_segment(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::vec2f;

    #[test]
    fn inverse_round_trips() {
        let transform =
            Transform2F::from_translation(vec2f(3.0, -2.0)) * Transform2F::from_rotation(0.7);
        let point = vec2f(5.0, 11.0);
        let round_tripped = transform.inverse() * (transform * point);
        assert!((round_tripped - point).length() < 1e-4);
    }
}
