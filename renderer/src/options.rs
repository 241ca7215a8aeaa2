// alpenglow/renderer/src/options.rs
//
// Copyright © 2024 The Alpenglow Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `RasterizeOptions`: the one configuration surface this library has
//! (spec.md §6's options table). Validated up front by `validate()` so a
//! rejected combination fails fast with `AlpenglowError::Usage` rather
//! than surfacing as a confusing panic deep in the pipeline.

use crate::error::{AlpenglowError, Result};
use alpenglow_geometry::vector::Vector2F;

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum PolygonFiltering {
    Box,
    Bilinear,
    MitchellNetravali,
}

impl Default for PolygonFiltering {
    #[inline]
    fn default() -> PolygonFiltering {
        PolygonFiltering::Box
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EdgeIntersectionSortMethod {
    None,
    CenterSize,
    MinMax,
    MinMaxSize,
    CenterMinMax,
    Random,
}

impl Default for EdgeIntersectionSortMethod {
    #[inline]
    fn default() -> EdgeIntersectionSortMethod {
        EdgeIntersectionSortMethod::CenterMinMax
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EdgeIntersectionMethod {
    Quadratic,
    BoundsTree,
    ArrayBoundsTree,
}

impl Default for EdgeIntersectionMethod {
    #[inline]
    fn default() -> EdgeIntersectionMethod {
        EdgeIntersectionMethod::ArrayBoundsTree
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RenderableFaceType {
    Polygonal,
    Edged,
    EdgedClipped,
}

impl Default for RenderableFaceType {
    #[inline]
    fn default() -> RenderableFaceType {
        RenderableFaceType::Polygonal
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RenderableFaceMethod {
    Simple,
    FullyCombined,
    SimplifyingCombined,
    Traced,
}

impl Default for RenderableFaceMethod {
    #[inline]
    fn default() -> RenderableFaceMethod {
        RenderableFaceMethod::Traced
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ExecutionMethod {
    Evaluation,
    Instructions,
}

impl Default for ExecutionMethod {
    #[inline]
    fn default() -> ExecutionMethod {
        ExecutionMethod::Instructions
    }
}

#[derive(Clone, Debug)]
pub struct RasterizeOptions {
    pub output_raster_offset: Vector2F,
    pub tile_size: u32,
    pub polygon_filtering: PolygonFiltering,
    /// Scales the reconstruction filter's radius. Spec.md describes the
    /// `!= 1` windowed path but explicitly allows omitting it for
    /// conformance; this implementation validates the field (so the
    /// option surface is complete) but only the `1.0` fast path is built.
    pub polygon_filter_window_multiplier: f32,
    pub edge_intersection_sort_method: EdgeIntersectionSortMethod,
    pub edge_intersection_method: EdgeIntersectionMethod,
    pub renderable_face_type: RenderableFaceType,
    pub renderable_face_method: RenderableFaceMethod,
    pub split_programs: bool,
    pub execution_method: ExecutionMethod,
}

impl Default for RasterizeOptions {
    fn default() -> RasterizeOptions {
        RasterizeOptions {
            output_raster_offset: Vector2F::zero(),
            tile_size: 256,
            polygon_filtering: PolygonFiltering::default(),
            polygon_filter_window_multiplier: 1.0,
            edge_intersection_sort_method: EdgeIntersectionSortMethod::default(),
            edge_intersection_method: EdgeIntersectionMethod::default(),
            renderable_face_type: RenderableFaceType::default(),
            renderable_face_method: RenderableFaceMethod::default(),
            split_programs: true,
            execution_method: ExecutionMethod::default(),
        }
    }
}

impl RasterizeOptions {
    /// Rejects combinations spec.md §7 calls out as usage errors. Called
    /// once, up front, by both `partition_renderable_faces` and
    /// `rasterize`.
    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(AlpenglowError::Usage {
                field: "tile_size",
                reason: "must be positive".to_string(),
            });
        }
        if !self.polygon_filter_window_multiplier.is_finite() || self.polygon_filter_window_multiplier <= 0.0 {
            return Err(AlpenglowError::Usage {
                field: "polygon_filter_window_multiplier",
                reason: "must be a positive finite number".to_string(),
            });
        }
        if (self.polygon_filter_window_multiplier - 1.0).abs() > 1e-6 {
            return Err(AlpenglowError::Usage {
                field: "polygon_filter_window_multiplier",
                reason: "values other than 1 require the windowed filter path, which this \
                          implementation does not build (spec.md explicitly allows omitting it)"
                    .to_string(),
            });
        }
        if self.renderable_face_method == RenderableFaceMethod::SimplifyingCombined
            && self.renderable_face_type == RenderableFaceType::Polygonal
        {
            return Err(AlpenglowError::Usage {
                field: "renderable_face_method",
                reason: "`simplifyingCombined` is invalid with `renderableFaceType = polygonal`".to_string(),
            });
        }
        if !self.output_raster_offset.is_finite() {
            return Err(AlpenglowError::Usage {
                field: "output_raster_offset",
                reason: "must be finite".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(RasterizeOptions::default().validate().is_ok());
    }

    #[test]
    fn simplifying_combined_with_polygonal_is_rejected() {
        let mut options = RasterizeOptions::default();
        options.renderable_face_type = RenderableFaceType::Polygonal;
        options.renderable_face_method = RenderableFaceMethod::SimplifyingCombined;
        assert!(matches!(options.validate(), Err(AlpenglowError::Usage { field: "renderable_face_method", .. })));
    }

    #[test]
    fn simplifying_combined_with_edged_is_accepted() {
        let mut options = RasterizeOptions::default();
        options.renderable_face_type = RenderableFaceType::Edged;
        options.renderable_face_method = RenderableFaceMethod::SimplifyingCombined;
        assert!(options.validate().is_ok());
    }

    #[test]
    fn nondefault_filter_window_multiplier_is_rejected() {
        let mut options = RasterizeOptions::default();
        options.polygon_filter_window_multiplier = 2.0;
        assert!(options.validate().is_err());
    }

    #[test]
    fn zero_tile_size_is_rejected() {
        let mut options = RasterizeOptions::default();
        options.tile_size = 0;
        assert!(options.validate().is_err());
    }
}
