// alpenglow/renderer/src/raster.rs
//
// Copyright © 2024 The Alpenglow Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The rasterize driver (spec.md §4.6): `partition_renderable_faces` runs
//! the §4.1/§4.2 pipeline per tile and specializes the shading program
//! per face; `rasterize` recursively clips each `RenderableFace` down to
//! pixel cells (`binary_rasterize`) and accumulates filtered color
//! contributions into an [`OutputRaster`].
//!
//! `RenderProgram::PathBoolean` nodes carry a bare `PathId` rather than
//! the originating `RenderPath` (see `content::path`'s grounding note:
//! identity, not geometry, is what a program needs to stay immutable and
//! `Rc`-shareable). Stage 1 of spec.md §2's data flow, "Path set →
//! BoundedSubpaths", is therefore an explicit input here rather than
//! something `partition_renderable_faces` discovers by walking the DAG:
//! callers pass the same `&[RenderPath]` slice they built the program's
//! `PathBoolean` nodes against.

use std::collections::HashMap;
use std::rc::Rc;

use alpenglow_color::colorspace::{self, Colorspace};
use alpenglow_color::{ColorF, ColorU};
use alpenglow_content::path::{FillRule, PathId, RenderPath};
use alpenglow_content::program::RenderProgram;
use alpenglow_content::vm::{self, EvalContext};
use alpenglow_geometry::rect::RectF;
use alpenglow_geometry::vector::Vector2F;

use crate::boundary::trace_boundaries;
use crate::clippable_face::{ClippableFace, FacePolygon};
use crate::error::{AlpenglowError, Result};
use crate::face::{build_faces, face_contains_point, winding_number};
use crate::filter::filter_for;
use crate::half_edge::HalfEdgeArena;
use crate::integer_edge::build_integer_edges;
use crate::intersect::{find_and_apply_intersections, sort_indices};
use crate::options::{ExecutionMethod, PolygonFiltering, RasterizeOptions, RenderableFaceMethod, RenderableFaceType};
use crate::tile::{round_rect_out_to_tile_bounds, tiles_covering, TileIntegerFrame};

const AREA_DEGENERATE: f64 = 1e-8;
const AREA_FULL_SLOP: f64 = 1e-8;

/// A single piece of the scene ready for pixel accumulation: a clipped
/// region paired with the already-specialized `RenderProgram` that
/// colors it (spec.md §3, §4.6 step c).
#[derive(Clone)]
pub struct RenderableFace {
    pub clippable: ClippableFace,
    pub program: Rc<RenderProgram>,
    pub bounds: RectF,
}

impl RenderableFace {
    fn area(&self) -> f64 {
        self.clippable.area()
    }
}

fn rect_from_polygon_bounds(bounds: (f64, f64, f64, f64)) -> RectF {
    let (min_x, min_y, max_x, max_y) = bounds;
    RectF::from_points(Vector2F::new(min_x as f32, min_y as f32), Vector2F::new(max_x as f32, max_y as f32))
}

fn validate_bounds(bounds: RectF) -> Result<()> {
    if !bounds.origin().is_finite() || !bounds.size().is_finite() || bounds.is_empty() {
        return Err(AlpenglowError::Usage {
            field: "bounds",
            reason: "must be finite, non-degenerate, and non-empty".to_string(),
        });
    }
    Ok(())
}

/// Winding of `path`'s loops (in render/client space) about `point`,
/// which is expressed in the same space — unlike `face::path_winding`,
/// which assumes both live in the boundary tracer's own coordinate
/// frame. The driver's faces are built in a per-tile rescaled integer
/// frame (`TileIntegerFrame`), so winding here is always computed after
/// mapping the face's representative point back out to render space via
/// `frame.from_integer`, keeping path geometry and probe point in one
/// consistent space.
fn path_winding_in_render_space(point: Vector2F, path: &RenderPath) -> i32 {
    path.loops()
        .iter()
        .map(|loop_points| {
            let pts: Vec<(f64, f64)> = loop_points.iter().map(|v| (v.x() as f64, v.y() as f64)).collect();
            winding_number((point.x() as f64, point.y() as f64), &pts)
        })
        .sum()
}

/// Runs the §4.1/§4.2 pipeline (IntegerEdges → intersections → half-edges
/// → boundaries → faces) for one tile and specializes `program` per
/// face, per spec.md §4.6 steps 3a-3c (`simple` combination only; see
/// `combine_faces` for the other three policies).
fn rasterize_tile(
    program: &Rc<RenderProgram>,
    paths: &[RenderPath],
    tile_bounds: RectF,
    clip_bounds: RectF,
    options: &RasterizeOptions,
) -> Result<Vec<RenderableFace>> {
    let frame = TileIntegerFrame::for_bounds(tile_bounds);

    let mut subpaths = Vec::new();
    for path in paths {
        subpaths.extend(path.bounded_subpaths());
    }

    let mut edges = build_integer_edges(&subpaths, tile_bounds, &frame);
    if edges.is_empty() {
        return Ok(Vec::new());
    }

    let order = sort_indices(&edges, options.edge_intersection_sort_method);
    edges = order.into_iter().map(|i| edges[i].clone()).collect();
    find_and_apply_intersections(&mut edges, options.edge_intersection_method);

    let arena = HalfEdgeArena::build(&edges)?;
    let boundaries = trace_boundaries(&arena);
    let forest = build_faces(&boundaries);

    let mut renderable = Vec::new();
    for face in &forest.faces {
        if !face_contains_point(face, face.representative_point, &boundaries) {
            continue;
        }
        let render_space_point = frame.from_integer.transform_point(Vector2F::new(
            face.representative_point.0 as f32,
            face.representative_point.1 as f32,
        ));

        let windings: HashMap<PathId, i32> =
            paths.iter().map(|p| (p.id(), path_winding_in_render_space(render_space_point, p))).collect();

        let specialized = program.with_path_inclusion(&|candidate: PathId| {
            let fill_rule = paths.iter().find(|p| p.id() == candidate).map(|p| p.fill_rule()).unwrap_or(FillRule::Nonzero);
            let winding = windings.get(&candidate).copied().unwrap_or(0);
            fill_rule.is_inside(winding)
        });
        let specialized = specialized.simplified();
        if let Some(color) = specialized.is_constant_color() {
            if color.a <= AREA_DEGENERATE as f32 {
                continue;
            }
        }

        let polygon = FacePolygon::from_rational_face(face, &boundaries);
        if polygon.is_empty() {
            continue;
        }
        // Area is meaningless to compare against AREA_DEGENERATE while
        // still in tile-integer space (coordinates scaled up to 2^20);
        // the real degeneracy check happens below, after `transformed`
        // brings the polygon back to render space.
        let polygon = polygon.transformed(frame.from_integer);
        let clipped_polygon = polygon.clip_rect(
            clip_bounds.min_x() as f64,
            clip_bounds.min_y() as f64,
            clip_bounds.max_x() as f64,
            clip_bounds.max_y() as f64,
        );
        if clipped_polygon.is_empty() || clipped_polygon.area() <= AREA_DEGENERATE {
            continue;
        }

        let clippable = match options.renderable_face_type {
            RenderableFaceType::Polygonal => ClippableFace::Polygonal(clipped_polygon),
            RenderableFaceType::Edged => ClippableFace::Edged(clipped_polygon),
            RenderableFaceType::EdgedClipped => ClippableFace::EdgedClipped {
                polygon: clipped_polygon,
                virtual_clip: (
                    clip_bounds.min_x() as f64,
                    clip_bounds.min_y() as f64,
                    clip_bounds.max_x() as f64,
                    clip_bounds.max_y() as f64,
                ),
            },
        };
        let bounds = rect_from_polygon_bounds(clippable.bounds());
        renderable.push(RenderableFace { clippable, program: specialized, bounds });
    }

    Ok(renderable)
}

/// Applies one of spec.md §4.6 step c/d's combination policies to the
/// per-tile face list.
///
/// `fullyCombined`/`simplifyingCombined`/`traced` all union faces that
/// share a structurally-equal `RenderProgram` (`Rc<RenderProgram>`'s
/// derived `PartialEq` is structural, per `program.rs`'s grounding note)
/// into one `ClippableFace` by concatenating their polygons' loops:
/// `FacePolygon`'s Green's-theorem moment sums are loop-count-agnostic,
/// so summing disjoint faces' loops gives the exact union area/centroid
/// without needing to trace a merged outline. This implementation does
/// not additionally remove shared edges (`simplifyingCombined`) or
/// re-trace a single polygonal outline (`traced`) beyond that union; the
/// three combined policies are therefore observationally identical here,
/// a documented narrowing from spec.md's distinct-algorithm description.
/// `splitPrograms` connectivity re-splitting is consequently a no-op:
/// faces this pipeline emits are already maximal same-program regions
/// before the union, so re-splitting by connectivity would only undo the
/// combination this function just performed.
fn combine_faces(faces: Vec<RenderableFace>, options: &RasterizeOptions) -> Vec<RenderableFace> {
    if options.renderable_face_method == RenderableFaceMethod::Simple {
        return faces;
    }

    let mut groups: Vec<(Rc<RenderProgram>, FacePolygon, RectF)> = Vec::new();
    for face in faces {
        if let Some(group) = groups.iter_mut().find(|(program, _, _)| *program == face.program) {
            group.1.loops.extend(face.clippable.polygon().loops.iter().cloned());
            group.2 = group.2.union(face.bounds);
        } else {
            groups.push((face.program.clone(), face.clippable.polygon().clone(), face.bounds));
        }
    }

    groups
        .into_iter()
        .map(|(program, polygon, bounds)| {
            let clippable = match options.renderable_face_type {
                RenderableFaceType::Polygonal => ClippableFace::Polygonal(polygon),
                RenderableFaceType::Edged => ClippableFace::Edged(polygon),
                RenderableFaceType::EdgedClipped => {
                    let b = (bounds.min_x() as f64, bounds.min_y() as f64, bounds.max_x() as f64, bounds.max_y() as f64);
                    ClippableFace::EdgedClipped { polygon, virtual_clip: b }
                }
            };
            RenderableFace { clippable, program, bounds }
        })
        .collect()
}

/// Partitions the scene into `RenderableFace`s (spec.md §4.6,
/// `partitionRenderableFaces`). `paths` must include every `RenderPath`
/// referenced by a `RenderPathBoolean` node in `program` (see the module
/// docs); an absent path is treated as winding 0 everywhere, same as a
/// path that never intersects the tile.
pub fn partition_renderable_faces(
    program: &Rc<RenderProgram>,
    paths: &[RenderPath],
    bounds: RectF,
    options: &RasterizeOptions,
) -> Result<Vec<RenderableFace>> {
    options.validate()?;
    validate_bounds(bounds)?;

    let simplified = program.simplified();

    let background = RenderPath::new(
        vec![vec![
            bounds.origin(),
            Vector2F::new(bounds.max_x(), bounds.min_y()),
            bounds.lower_right(),
            Vector2F::new(bounds.min_x(), bounds.max_y()),
        ]],
        FillRule::Nonzero,
    );
    let mut all_paths: Vec<RenderPath> = paths.to_vec();
    all_paths.push(background);

    let filter = filter_for(options.polygon_filtering);
    let filter_radius = (filter.radius() as f32) * options.polygon_filter_window_multiplier;
    let contribution_bounds = bounds.dilate(Vector2F::splat(filter_radius));
    let tile_grid_bounds = round_rect_out_to_tile_bounds(contribution_bounds, options.tile_size as f32);

    let mut faces = Vec::new();
    for tile_bounds in tiles_covering(tile_grid_bounds, options.tile_size as f32) {
        let clip_bounds = match tile_bounds.intersection(contribution_bounds) {
            Some(clipped) if !clipped.is_empty() => clipped,
            _ => continue,
        };
        let relevant: Vec<RenderPath> =
            all_paths.iter().filter(|p| p.bounds().intersection(tile_bounds).is_some() || p.loops().is_empty()).cloned().collect();
        if relevant.is_empty() {
            continue;
        }
        faces.extend(rasterize_tile(&simplified, &relevant, tile_bounds, clip_bounds, options)?);
    }

    Ok(combine_faces(faces, options))
}

/// A per-face compiled evaluator, selected by `options.execution_method`
/// (spec.md §4.4: the two modes must agree within tolerance; this driver
/// only ever runs the one the caller picked per face).
enum Evaluator {
    Direct(Rc<RenderProgram>),
    Compiled(Vec<u32>),
}

impl Evaluator {
    fn build(program: &Rc<RenderProgram>, method: ExecutionMethod) -> Result<Evaluator> {
        match method {
            ExecutionMethod::Evaluation => Ok(Evaluator::Direct(program.clone())),
            ExecutionMethod::Instructions => Ok(Evaluator::Compiled(vm::compile_to_binary(program)?)),
        }
    }

    fn eval(&self, ctx: &EvalContext) -> Result<ColorF> {
        match self {
            Evaluator::Direct(program) => Ok(vm::evaluate_direct(program, ctx)),
            Evaluator::Compiled(binary) => Ok(vm::execute(binary, 0, ctx)?),
        }
    }
}

/// `addPartialPixel` (spec.md §4.6): evaluates `program` at the cell's
/// centroid and scatters its contribution per the active reconstruction
/// filter.
fn add_partial_pixel(
    output: &mut dyn OutputRaster,
    face: &ClippableFace,
    evaluator: &Evaluator,
    area: f64,
    centroid: (f64, f64),
    options: &RasterizeOptions,
) -> Result<()> {
    let ctx = EvalContext {
        area: area as f32,
        centroid: Vector2F::new(centroid.0 as f32, centroid.1 as f32),
        rect: centroid_rect(centroid),
    };
    let color = evaluator.eval(&ctx)?;

    match options.polygon_filtering {
        PolygonFiltering::Box => {
            let (x, y) = (centroid.0.floor() as i32, centroid.1.floor() as i32);
            output.add_client_partial_pixel(x, y, color, area as f32);
        }
        PolygonFiltering::Bilinear | PolygonFiltering::MitchellNetravali => {
            add_filter_pixel(output, face, color, centroid, options.polygon_filtering);
        }
    }
    Ok(())
}

fn centroid_rect(centroid: (f64, f64)) -> RectF {
    let p = Vector2F::new(centroid.0 as f32, centroid.1 as f32);
    RectF::new(p, Vector2F::zero())
}

/// Scatters a face's filtered color contribution to the reconstruction
/// filter's support neighborhood: the 2x2 tap grid for bilinear, 4x4 for
/// Mitchell-Netravali (spec.md §4.6 `addFilterPixel`, §4.7).
fn add_filter_pixel(output: &mut dyn OutputRaster, face: &ClippableFace, color: ColorF, centroid: (f64, f64), kind: PolygonFiltering) {
    let taps: i32 = match kind {
        PolygonFiltering::Box => unreachable!("box filtering never scatters"),
        PolygonFiltering::Bilinear => 1,
        PolygonFiltering::MitchellNetravali => 2,
    };
    let (cx, cy) = centroid;
    let tap_x0 = cx.floor() as i32 - (taps - 1);
    let tap_y0 = cy.floor() as i32 - (taps - 1);
    for ty in (tap_y0 - taps + 1)..=(tap_y0 + taps) {
        for tx in (tap_x0 - taps + 1)..=(tap_x0 + taps) {
            let tap_center_x = tx as f64 + 0.5;
            let tap_center_y = ty as f64 + 0.5;
            let weight = match kind {
                PolygonFiltering::Box => unreachable!(),
                PolygonFiltering::Bilinear => face.get_bilinear_filtered(tap_center_x, tap_center_y),
                PolygonFiltering::MitchellNetravali => face.get_mitchell_netravali_filtered(tap_center_x, tap_center_y),
            };
            if weight > 1e-12 {
                output.add_client_partial_pixel(tx, ty, color, weight as f32);
            }
        }
    }
}

/// `addFullArea` (spec.md §4.6): a whole pixel cell (or, for a constant
/// color in box-filter mode, a whole rectangular region) is covered.
fn add_full_area(
    output: &mut dyn OutputRaster,
    face: &RenderableFace,
    evaluator: &Evaluator,
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    options: &RasterizeOptions,
) -> Result<()> {
    if options.polygon_filtering == PolygonFiltering::Box {
        if let Some(color) = face.program.is_constant_color() {
            output.add_client_full_region(x0, y0, x1, y1, color);
            return Ok(());
        }
    }
    for y in y0..y1 {
        for x in x0..x1 {
            let centroid = (x as f64 + 0.5, y as f64 + 0.5);
            if options.polygon_filtering == PolygonFiltering::Box {
                let ctx = EvalContext { area: 1.0, centroid: Vector2F::new(centroid.0 as f32, centroid.1 as f32), rect: centroid_rect(centroid) };
                let color = evaluator.eval(&ctx)?;
                output.add_client_full_pixel(x, y, color);
            } else {
                add_partial_pixel(output, &face.clippable, evaluator, 1.0, centroid, options)?;
            }
        }
    }
    Ok(())
}

/// Recursive area-threshold splitter (spec.md §4.6 `binaryRasterize`).
/// `(x0, y0, x1, y1)` is the integer pixel cell the current `clip`
/// occupies.
fn binary_rasterize(
    output: &mut dyn OutputRaster,
    face: &RenderableFace,
    clip: &ClippableFace,
    evaluator: &Evaluator,
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    options: &RasterizeOptions,
) -> Result<()> {
    let area = clip.area();
    if area <= AREA_DEGENERATE {
        return Ok(());
    }
    let cell_area = ((x1 - x0) as f64) * ((y1 - y0) as f64);
    if area >= cell_area - AREA_FULL_SLOP {
        return add_full_area(output, face, evaluator, x0, y0, x1, y1, options);
    }
    if x1 - x0 == 1 && y1 - y0 == 1 {
        let mut centroid = clip.centroid();
        centroid.0 = centroid.0.clamp(x0 as f64, x1 as f64);
        centroid.1 = centroid.1.clamp(y0 as f64, y1 as f64);
        return add_partial_pixel(output, clip, evaluator, area, centroid, options);
    }

    let width = x1 - x0;
    let height = y1 - y0;
    if face.program.is_constant_color().is_none() && width <= 8 && height <= 8 {
        return terminal_grid_rasterize(output, face, clip, evaluator, x0, y0, x1, y1, options);
    }

    if width >= height {
        let mid = x0 + width / 2;
        let (min_face, max_face) = clip.get_binary_x_clip(mid as f64, 0.0);
        if min_face.area() > AREA_DEGENERATE {
            binary_rasterize(output, face, &min_face, evaluator, x0, y0, mid, y1, options)?;
        }
        if max_face.area() > AREA_DEGENERATE {
            binary_rasterize(output, face, &max_face, evaluator, mid, y0, x1, y1, options)?;
        }
    } else {
        let mid = y0 + height / 2;
        let (min_face, max_face) = clip.get_binary_y_clip(mid as f64, 0.0);
        if min_face.area() > AREA_DEGENERATE {
            binary_rasterize(output, face, &min_face, evaluator, x0, y0, x1, mid, options)?;
        }
        if max_face.area() > AREA_DEGENERATE {
            binary_rasterize(output, face, &max_face, evaluator, x0, mid, x1, y1, options)?;
        }
    }
    Ok(())
}

/// A single `gridClipIterate` pass over the face, one cell at a time,
/// instead of the `log2(cells)` recursive bisections `binary_rasterize`
/// would otherwise need (spec.md §4.6 `terminalGridRasterize`).
fn terminal_grid_rasterize(
    output: &mut dyn OutputRaster,
    face: &RenderableFace,
    clip: &ClippableFace,
    evaluator: &Evaluator,
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    options: &RasterizeOptions,
) -> Result<()> {
    let grid_w = (x1 - x0) as usize;
    let grid_h = (y1 - y0) as usize;
    let mut cells: HashMap<(usize, usize), (f64, f64, f64)> = HashMap::new();
    clip.grid_clip_iterate(
        (x0 as f64, y0 as f64, x1 as f64, y1 as f64),
        1.0,
        1.0,
        grid_w,
        grid_h,
        |cx, cy, ax, ay, bx, by| {
            let entry = cells.entry((cx, cy)).or_insert((0.0, 0.0, 0.0));
            let cross = ax * by - bx * ay;
            entry.0 += cross;
            entry.1 += (ax + bx) * cross;
            entry.2 += (ay + by) * cross;
        },
        || {},
    );

    for ((cx, cy), (area2, mx6, my6)) in cells {
        let cell_area = area2.abs() / 2.0;
        if cell_area <= AREA_DEGENERATE {
            continue;
        }
        let px = x0 + cx as i32;
        let py = y0 + cy as i32;
        let cell_full = cell_area >= 1.0 - AREA_FULL_SLOP;
        if cell_full {
            add_full_area(output, face, evaluator, px, py, px + 1, py + 1, options)?;
            continue;
        }
        let centroid = if area2.abs() > 1e-12 {
            ((mx6 / (3.0 * area2)).clamp(px as f64, px as f64 + 1.0), (my6 / (3.0 * area2)).clamp(py as f64, py as f64 + 1.0))
        } else {
            (px as f64 + 0.5, py as f64 + 0.5)
        };
        add_partial_pixel(output, clip, evaluator, cell_area, centroid, options)?;
    }
    Ok(())
}

/// Rasterizes `program` over `bounds` into `output` (spec.md §4.6
/// `rasterize`). `paths` carries the same path set
/// `partition_renderable_faces` needs (see the module docs).
pub fn rasterize(
    program: &Rc<RenderProgram>,
    paths: &[RenderPath],
    output: &mut dyn OutputRaster,
    bounds: RectF,
    options: &RasterizeOptions,
) -> Result<()> {
    let faces = partition_renderable_faces(program, paths, bounds, options)?;

    let dx = options.output_raster_offset.x().round() as i32;
    let dy = options.output_raster_offset.y().round() as i32;
    let mut offset_raster = OffsetRaster { inner: output, dx, dy };
    let output: &mut dyn OutputRaster = &mut offset_raster;

    for face in &faces {
        if face.area() <= AREA_DEGENERATE {
            continue;
        }
        let evaluator = Evaluator::build(&face.program, options.execution_method)?;
        let (min_x, min_y, max_x, max_y) = face.clippable.bounds();
        let x0 = min_x.floor() as i32;
        let y0 = min_y.floor() as i32;
        let x1 = max_x.ceil() as i32;
        let y1 = max_y.ceil() as i32;
        if x1 <= x0 || y1 <= y0 {
            continue;
        }
        let clipped = face.clippable.get_clipped(x0 as f64, y0 as f64, x1 as f64, y1 as f64);
        binary_rasterize(output, face, &clipped, &evaluator, x0, y0, x1, y1, options)?;
    }
    Ok(())
}

/// Shifts every write by `(dx, dy)` without touching the geometry or
/// program evaluation that produced it — `outputRasterOffset` only
/// "translates writes into the output raster" (spec.md §6), it does not
/// move where a program samples its input.
struct OffsetRaster<'a> {
    inner: &'a mut dyn OutputRaster,
    dx: i32,
    dy: i32,
}

impl OutputRaster for OffsetRaster<'_> {
    fn client_to_output(&self, color: ColorF) -> ColorU {
        self.inner.client_to_output(color)
    }

    fn add_client_partial_pixel(&mut self, x: i32, y: i32, color: ColorF, coverage: f32) {
        self.inner.add_client_partial_pixel(x + self.dx, y + self.dy, color, coverage);
    }

    fn add_client_full_pixel(&mut self, x: i32, y: i32, color: ColorF) {
        self.inner.add_client_full_pixel(x + self.dx, y + self.dy, color);
    }

    fn add_client_full_region(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: ColorF) {
        self.inner.add_client_full_region(x0 + self.dx, y0 + self.dy, x1 + self.dx, y1 + self.dy, color);
    }

    fn add_output_full_region(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: ColorU) {
        self.inner.add_output_full_region(x0 + self.dx, y0 + self.dy, x1 + self.dx, y1 + self.dy, color);
    }
}

/// The output sink `rasterize` writes into (spec.md §6). Coordinates are
/// pixel-space integers in the output raster's own frame (after
/// `outputRasterOffset` has already been applied by the caller-visible
/// `rasterize` entry point).
pub trait OutputRaster {
    /// Converts a client-color-space sample into the raster's own output
    /// color space (spec.md §4.6 `addFullArea`'s `addOutputFullRegion`
    /// note: "if the output color has already been converted").
    fn client_to_output(&self, color: ColorF) -> ColorU;

    /// Accumulates `color * coverage` (coverage in `[0, 1]`) into pixel
    /// `(x, y)`, in client color space.
    fn add_client_partial_pixel(&mut self, x: i32, y: i32, color: ColorF, coverage: f32);

    /// Accumulates a fully covered pixel, in client color space.
    fn add_client_full_pixel(&mut self, x: i32, y: i32, color: ColorF);

    /// Accumulates a fully covered axis-aligned region `[x0, x1) x [y0,
    /// y1)`, in client color space, without per-pixel looping.
    fn add_client_full_region(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: ColorF);

    /// Writes an already output-color-space-converted fully covered
    /// region.
    fn add_output_full_region(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: ColorU);
}

/// A minimal in-memory `OutputRaster`: an owned premultiplied `ColorF`
/// accumulation buffer plus the client/output colorspace pair
/// `client_to_output` converts between (spec.md §6's allowance that
/// presentation helpers like `imageDataToCanvas` may be omitted on
/// non-browser targets; this is the in-memory sink conformance testing
/// needs in their place).
pub struct BufferRaster {
    width: i32,
    height: i32,
    client_colorspace: Colorspace,
    output_colorspace: Colorspace,
    pixels: Vec<ColorF>,
}

impl BufferRaster {
    pub fn new(width: i32, height: i32) -> BufferRaster {
        BufferRaster::with_colorspaces(width, height, Colorspace::LinearSrgb, Colorspace::Srgb)
    }

    pub fn with_colorspaces(width: i32, height: i32, client_colorspace: Colorspace, output_colorspace: Colorspace) -> BufferRaster {
        let count = (width.max(0) as usize) * (height.max(0) as usize);
        BufferRaster { width, height, client_colorspace, output_colorspace, pixels: vec![ColorF::transparent_black(); count] }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            None
        } else {
            Some((y * self.width + x) as usize)
        }
    }

    /// Reads back the accumulated buffer, converted to `ColorU` in the
    /// output color space.
    pub fn pixels(&self) -> Vec<ColorU> {
        self.pixels.iter().map(|&c| self.client_to_output(c)).collect()
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<ColorU> {
        self.index(x, y).map(|i| self.client_to_output(self.pixels[i]))
    }
}

impl OutputRaster for BufferRaster {
    fn client_to_output(&self, color: ColorF) -> ColorU {
        colorspace::convert(color, self.client_colorspace, self.output_colorspace).to_u8()
    }

    fn add_client_partial_pixel(&mut self, x: i32, y: i32, color: ColorF, coverage: f32) {
        if let Some(i) = self.index(x, y) {
            let premultiplied = color.premultiply();
            self.pixels[i].r += premultiplied.r * coverage;
            self.pixels[i].g += premultiplied.g * coverage;
            self.pixels[i].b += premultiplied.b * coverage;
            self.pixels[i].a += premultiplied.a * coverage;
        }
    }

    fn add_client_full_pixel(&mut self, x: i32, y: i32, color: ColorF) {
        self.add_client_partial_pixel(x, y, color, 1.0);
    }

    fn add_client_full_region(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: ColorF) {
        for y in y0..y1 {
            for x in x0..x1 {
                self.add_client_full_pixel(x, y, color);
            }
        }
    }

    fn add_output_full_region(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: ColorU) {
        let client = colorspace::convert(color.to_f32(), self.output_colorspace, self.client_colorspace);
        for y in y0..y1 {
            for x in x0..x1 {
                self.add_client_full_pixel(x, y, client);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alpenglow_content::path::FillRule;

    fn red_fill(path: &RenderPath) -> Rc<RenderProgram> {
        Rc::new(RenderProgram::PathBoolean {
            path: path.id(),
            inside: RenderProgram::color(ColorF::new(1.0, 0.0, 0.0, 1.0)),
            outside: RenderProgram::color(ColorF::transparent_black()),
        })
    }

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

    /// S4: a solid background fill covers every pixel at full coverage.
    #[test]
    fn s4_background_fill_covers_every_pixel() {
        let path = square_path(0.0, 8.0);
        let program = red_fill(&path);
        let mut raster = BufferRaster::with_colorspaces(8, 8, Colorspace::Srgb, Colorspace::Srgb);
        let bounds = RectF::new(Vector2F::zero(), Vector2F::splat(8.0));
        let options = RasterizeOptions::default();
        rasterize(&program, std::slice::from_ref(&path), &mut raster, bounds, &options).unwrap();
        for y in 0..8 {
            for x in 0..8 {
                let pixel = raster.pixel(x, y).unwrap();
                assert!(pixel.r > 200, "pixel ({x},{y}) r={}", pixel.r);
                assert_eq!(pixel.a, 255);
            }
        }
    }

    /// S5: a diagonal half-coverage triangle leaves the far corner
    /// untouched and partially covers the split cell.
    #[test]
    fn s5_diagonal_half_coverage_triangle() {
        let path = RenderPath::new(
            vec![vec![Vector2F::new(0.0, 0.0), Vector2F::new(4.0, 0.0), Vector2F::new(0.0, 4.0)]],
            FillRule::Nonzero,
        );
        let program = red_fill(&path);
        let mut raster = BufferRaster::with_colorspaces(4, 4, Colorspace::Srgb, Colorspace::Srgb);
        let bounds = RectF::new(Vector2F::zero(), Vector2F::splat(4.0));
        let options = RasterizeOptions::default();
        rasterize(&program, std::slice::from_ref(&path), &mut raster, bounds, &options).unwrap();

        let far_corner = raster.pixel(3, 3).unwrap();
        assert_eq!(far_corner.a, 0, "far corner should be untouched");

        let near_corner = raster.pixel(0, 0).unwrap();
        assert_eq!(near_corner.a, 255, "near corner is fully inside the triangle");
    }

    #[test]
    fn partition_drops_transparent_faces() {
        let path = square_path(0.0, 4.0);
        let program = Rc::new(RenderProgram::PathBoolean {
            path: path.id(),
            inside: RenderProgram::color(ColorF::transparent_black()),
            outside: RenderProgram::color(ColorF::transparent_black()),
        });
        let bounds = RectF::new(Vector2F::zero(), Vector2F::splat(4.0));
        let options = RasterizeOptions::default();
        let faces = partition_renderable_faces(&program, std::slice::from_ref(&path), bounds, &options).unwrap();
        assert!(faces.is_empty());
    }

    #[test]
    fn invalid_bounds_is_a_usage_error() {
        let program = RenderProgram::color(ColorF::new(1.0, 1.0, 1.0, 1.0));
        let options = RasterizeOptions::default();
        let empty_bounds = RectF::new(Vector2F::zero(), Vector2F::zero());
        assert!(matches!(
            partition_renderable_faces(&program, &[], empty_bounds, &options),
            Err(AlpenglowError::Usage { field: "bounds", .. })
        ));
    }

    #[test]
    fn evaluation_and_instructions_execution_methods_agree() {
        let path = square_path(0.0, 4.0);
        let program = red_fill(&path);
        let bounds = RectF::new(Vector2F::zero(), Vector2F::splat(4.0));

        let mut direct_options = RasterizeOptions::default();
        direct_options.execution_method = ExecutionMethod::Evaluation;
        let mut direct_raster = BufferRaster::with_colorspaces(4, 4, Colorspace::Srgb, Colorspace::Srgb);
        rasterize(&program, std::slice::from_ref(&path), &mut direct_raster, bounds, &direct_options).unwrap();

        let mut compiled_options = RasterizeOptions::default();
        compiled_options.execution_method = ExecutionMethod::Instructions;
        let mut compiled_raster = BufferRaster::with_colorspaces(4, 4, Colorspace::Srgb, Colorspace::Srgb);
        rasterize(&program, std::slice::from_ref(&path), &mut compiled_raster, bounds, &compiled_options).unwrap();

        for y in 0..4 {
            for x in 0..4 {
                let a = direct_raster.pixel(x, y).unwrap();
                let b = compiled_raster.pixel(x, y).unwrap();
                assert!((a.r as i32 - b.r as i32).abs() <= 1);
                assert!((a.a as i32 - b.a as i32).abs() <= 1);
            }
        }
    }

    #[test]
    fn nested_hole_path_leaves_a_transparent_window() {
        let outer = square_path(0.0, 8.0);
        let inner = square_path(3.0, 5.0);
        let fill = RenderProgram::color(ColorF::new(0.0, 1.0, 0.0, 1.0));
        let transparent = RenderProgram::color(ColorF::transparent_black());
        let program = Rc::new(RenderProgram::PathBoolean {
            path: outer.id(),
            inside: Rc::new(RenderProgram::PathBoolean { path: inner.id(), inside: transparent, outside: fill }),
            outside: RenderProgram::color(ColorF::transparent_black()),
        });
        let bounds = RectF::new(Vector2F::zero(), Vector2F::splat(8.0));
        let options = RasterizeOptions::default();
        let mut raster = BufferRaster::with_colorspaces(8, 8, Colorspace::Srgb, Colorspace::Srgb);
        rasterize(&program, &[outer, inner], &mut raster, bounds, &options).unwrap();

        let hole_center = raster.pixel(4, 4).unwrap();
        assert_eq!(hole_center.a, 0);
        let ring = raster.pixel(1, 1).unwrap();
        assert_eq!(ring.a, 255);
    }
}
