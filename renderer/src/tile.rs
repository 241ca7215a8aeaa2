// alpenglow/renderer/src/tile.rs
//
// Copyright © 2024 The Alpenglow Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tile-bounds math: partitioning the output into `tileSize`-square tiles
//! and, per tile, the scale/translate transform into the 20-bit integer
//! coordinate frame Constructive Area Geometry runs in (spec.md §4.1,
//! "Coordinate transform").

use alpenglow_geometry::rect::RectF;
use alpenglow_geometry::transform2d::Transform2F;
use alpenglow_geometry::vector::Vector2F;

/// The precision budget from spec.md §4.1: all rounded integer-edge
/// endpoints must fit within a signed 21-bit window (`|coord| < 2^20`) so
/// every exact-intersection intermediate fits in a 64-bit numerator.
pub const INTEGER_PRECISION_BITS: i32 = 20;

/// Expands `bounds` outward to the smallest rectangle whose edges lie on
/// `tile_size`-aligned grid lines, mirroring the teacher's
/// `round_rect_out_to_tile_bounds` convention.
pub fn round_rect_out_to_tile_bounds(bounds: RectF, tile_size: f32) -> RectF {
    let min = (bounds.origin() / tile_size).floor() * tile_size;
    let max = (bounds.lower_right() / tile_size).ceil() * tile_size;
    RectF::from_points(min, max)
}

/// Enumerates the `tile_size`-square tiles covering `bounds` (which must
/// already be tile-aligned, e.g. via `round_rect_out_to_tile_bounds`), in
/// row-major order.
pub fn tiles_covering(bounds: RectF, tile_size: f32) -> Vec<RectF> {
    let mut tiles = Vec::new();
    let mut y = bounds.min_y();
    while y < bounds.max_y() - 1e-6 {
        let mut x = bounds.min_x();
        while x < bounds.max_x() - 1e-6 {
            tiles.push(RectF::new(Vector2F::new(x, y), Vector2F::splat(tile_size)));
            x += tile_size;
        }
        y += tile_size;
    }
    tiles
}

/// The tile-space-to-integer-grid transform and its inverse, computed
/// once per tile. Centers the tile's bounds (already dilated by the
/// filter radius by the caller) on the origin, then scales so the
/// furthest extent lands within `2^INTEGER_PRECISION_BITS`.
#[derive(Clone, Copy, Debug)]
pub struct TileIntegerFrame {
    pub to_integer: Transform2F,
    pub from_integer: Transform2F,
}

impl TileIntegerFrame {
    pub fn for_bounds(tile_bounds: RectF) -> TileIntegerFrame {
        let max_dim = tile_bounds.width().max(tile_bounds.height()).max(1e-6);
        let exponent = (max_dim.log2().ceil()) as i32;
        let scale = 2.0_f32.powi(INTEGER_PRECISION_BITS - exponent);
        let center = tile_bounds.center();
        let to_integer = Transform2F::from_uniform_scale(scale) * Transform2F::from_translation(-center);
        TileIntegerFrame { to_integer, from_integer: to_integer.inverse() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_rect_out_grows_to_tile_multiples() {
        let bounds = RectF::new(Vector2F::new(1.0, 1.0), Vector2F::new(10.0, 10.0));
        let rounded = round_rect_out_to_tile_bounds(bounds, 8.0);
        assert_eq!(rounded.min_x(), 0.0);
        assert_eq!(rounded.min_y(), 0.0);
        assert_eq!(rounded.max_x(), 16.0);
        assert_eq!(rounded.max_y(), 16.0);
    }

    #[test]
    fn tiles_covering_tiles_exactly() {
        let bounds = RectF::new(Vector2F::zero(), Vector2F::new(16.0, 8.0));
        let tiles = tiles_covering(bounds, 8.0);
        assert_eq!(tiles.len(), 2);
    }

    #[test]
    fn integer_frame_keeps_tile_corners_within_budget() {
        let bounds = RectF::new(Vector2F::new(100.0, 100.0), Vector2F::splat(256.0));
        let frame = TileIntegerFrame::for_bounds(bounds);
        let limit = 2.0_f32.powi(INTEGER_PRECISION_BITS);
        for corner in [bounds.origin(), bounds.upper_right(), bounds.lower_left(), bounds.lower_right()] {
            let integer = frame.to_integer.transform_point(corner);
            assert!(integer.x().abs() < limit, "x={} limit={}", integer.x(), limit);
            assert!(integer.y().abs() < limit, "y={} limit={}", integer.y(), limit);
        }
    }

    #[test]
    fn integer_frame_round_trips() {
        let bounds = RectF::new(Vector2F::new(-50.0, 20.0), Vector2F::splat(64.0));
        let frame = TileIntegerFrame::for_bounds(bounds);
        let point = bounds.center() + Vector2F::new(3.0, -7.0);
        let round_tripped = frame.from_integer.transform_point(frame.to_integer.transform_point(point));
        assert!((round_tripped - point).length() < 1e-2);
    }
}
