// alpenglow/renderer/src/lib.rs
//
// Copyright © 2024 The Alpenglow Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Constructive Area Geometry, the `ClippableFace` clipping kernels, and
//! the CPU rasterize driver: everything downstream of a path set and a
//! shading program, down to filtered pixel contributions.
//!
//! `boundary`/`face`/`half_edge`/`integer_edge`/`intersect`/`tile` build
//! the per-tile planar subdivision and its winding maps (spec.md §4.1,
//! §4.2); `clippable_face`/`filter` are the per-face measurement and
//! reconstruction-filter math (§4.3, §4.7); `raster` is the top-level
//! driver that ties them to a [`content`](alpenglow_content)
//! `RenderProgram` and an [`OutputRaster`](raster::OutputRaster) sink
//! (§4.6).

pub mod boundary;
pub mod clippable_face;
pub mod error;
pub mod face;
pub mod filter;
pub mod half_edge;
pub mod integer_edge;
pub mod intersect;
pub mod options;
pub mod raster;
pub mod tile;

pub use clippable_face::{Accumulator, ClippableFace, FacePolygon};
pub use error::{AlpenglowError, Result};
pub use filter::{filter_for, ReconstructionFilter};
pub use options::{
    EdgeIntersectionMethod, EdgeIntersectionSortMethod, ExecutionMethod, PolygonFiltering, RasterizeOptions,
    RenderableFaceMethod, RenderableFaceType,
};
pub use raster::{partition_renderable_faces, rasterize, BufferRaster, OutputRaster, RenderableFace};
