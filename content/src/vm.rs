// alpenglow/content/src/vm.rs
//
// Copyright © 2024 The Alpenglow Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Compiles a `RenderProgram` to the instruction stream and runs it on a
//! small stack VM, plus a direct recursive evaluator used as a
//! cross-check / fallback (§4.4's two execution modes must agree).

use crate::instructions::{self, GradientStop, Instruction, InstructionError};
use crate::program::{FilterKind, RenderProgram};
use alpenglow_color::colorspace::{self, Colorspace};
use alpenglow_color::ColorF;
use alpenglow_geometry::rect::RectF;
use alpenglow_geometry::vector::Vector2F;
use arrayvec::ArrayVec;
use std::rc::Rc;
use thiserror::Error;

/// Operand stack depth the evaluated node set never exceeds; chosen
/// generously above the deepest program this crate compiles (a handful
/// of nested blends).
pub const OPERAND_STACK_MAX: usize = 10;
/// Call stack depth; unused until the compiler emits `Call` (see the
/// note on `compile`), kept here so the limit is documented alongside
/// its sibling.
pub const CALL_STACK_MAX: usize = 8;

#[derive(Error, Debug, PartialEq)]
pub enum CompileError {
    #[error("RenderProgram still contains an unspecialized PathBoolean node; call with_path_inclusion first")]
    UnspecializedPathBoolean,
    #[error(transparent)]
    Instruction(#[from] InstructionError),
    #[error("operand stack exceeded depth {max} during execution")]
    OperandStackOverflow { max: usize },
}

/// Everything a compiled program may read about the pixel sample it is
/// being evaluated for.
#[derive(Clone, Copy, Debug)]
pub struct EvalContext {
    pub area: f32,
    pub centroid: Vector2F,
    pub rect: RectF,
}

impl EvalContext {
    pub fn at_centroid(centroid: Vector2F) -> EvalContext {
        EvalContext { area: 1.0, centroid, rect: RectF::new(centroid, Vector2F::zero()) }
    }
}

/// Compiles `program` to a flat instruction list. `program` must already
/// be path-specialized (no `PathBoolean` nodes) — callers run
/// `with_path_inclusion` then `simplified()` first.
///
/// This always duplicates a shared subtree's instructions at every use
/// site rather than emitting `Call`/`Return` to reuse one copy; real
/// programs in this node set are shallow enough (a handful of blends per
/// face) that the code-size cost of duplication is negligible; `Call`
/// and `Return` remain implemented in the VM for a future compiler pass
/// that wants true subroutine sharing.
pub fn compile(program: &Rc<RenderProgram>) -> Result<Vec<Instruction>, CompileError> {
    if !program.is_path_specialized() {
        return Err(CompileError::UnspecializedPathBoolean);
    }
    let mut out = Vec::new();
    compile_into(program, &mut out)?;
    Ok(out)
}

pub fn compile_to_binary(program: &Rc<RenderProgram>) -> Result<Vec<u32>, CompileError> {
    Ok(instructions::instructions_to_binary(&compile(program)?))
}

fn compile_into(node: &Rc<RenderProgram>, out: &mut Vec<Instruction>) -> Result<(), CompileError> {
    match &**node {
        RenderProgram::Color(color) => {
            out.push(Instruction::Push([color.r, color.g, color.b, color.a]));
        }

        RenderProgram::Stack(children) => {
            if children.is_empty() {
                out.push(Instruction::Push([0.0; 4]));
                return Ok(());
            }
            compile_into(&children[0], out)?;
            for child in &children[1..] {
                compile_into(child, out)?;
                out.push(Instruction::StackBlend);
            }
        }

        RenderProgram::PathBoolean { .. } => return Err(CompileError::UnspecializedPathBoolean),

        RenderProgram::LinearBlend { axis, from, to } => {
            compile_into(from, out)?;
            compile_into(to, out)?;
            let (a, b, c) = linear_ratio_coefficients(*axis);
            out.push(Instruction::LinearBlendGeom { a, b, c });
        }

        RenderProgram::RadialBlend { center, start_radius, end_radius, from, to } => {
            compile_into(from, out)?;
            compile_into(to, out)?;
            out.push(Instruction::RadialBlendGeom {
                center: *center,
                start_radius: *start_radius,
                end_radius: *end_radius,
            });
        }

        RenderProgram::BarycentricBlend { a, b, c, color_a, color_b, color_c } => {
            compile_into(color_a, out)?;
            compile_into(color_b, out)?;
            compile_into(color_c, out)?;
            out.push(Instruction::BarycentricBlendGeom { a: *a, b: *b, c: *c });
        }

        RenderProgram::LinearGradient { line, gradient } => {
            out.push(Instruction::LinearGradientSample {
                line: *line,
                stops: gradient.stops().iter().map(|stop| GradientStop { offset: stop.offset, color: stop.color }).collect(),
            });
        }

        RenderProgram::RadialGradient { line, start_radius, end_radius, gradient } => {
            out.push(Instruction::RadialGradientSample {
                line: *line,
                start_radius: *start_radius,
                end_radius: *end_radius,
                stops: gradient.stops().iter().map(|stop| GradientStop { offset: stop.offset, color: stop.color }).collect(),
            });
        }

        RenderProgram::Filter { kind, input } => {
            compile_into(input, out)?;
            match kind {
                FilterKind::Opacity(factor) => {
                    out.push(Instruction::Premultiply);
                    out.push(Instruction::MultiplyScalar(*factor));
                    out.push(Instruction::Unpremultiply);
                }
            }
        }

        RenderProgram::Image { width, height, bounds, pixels } => {
            out.push(Instruction::Image { width: *width, height: *height, bounds: *bounds, pixels: pixels.clone() });
        }

        RenderProgram::ColorSpaceConvert { from, to, input } => {
            compile_into(input, out)?;
            emit_conversion_chain(*from, *to, out);
        }

        RenderProgram::Premultiply(input) => {
            compile_into(input, out)?;
            out.push(Instruction::Premultiply);
        }

        RenderProgram::Unpremultiply(input) => {
            compile_into(input, out)?;
            out.push(Instruction::Unpremultiply);
        }

        RenderProgram::Normalize(input) => {
            compile_into(input, out)?;
            out.push(Instruction::Normalize);
        }
    }
    Ok(())
}

fn emit_conversion_chain(from: Colorspace, to: Colorspace, out: &mut Vec<Instruction>) {
    if from == to {
        return;
    }
    match from {
        Colorspace::Srgb => out.push(Instruction::SrgbToLinear),
        Colorspace::DisplayP3 => out.push(Instruction::DisplayP3ToLinear),
        Colorspace::Oklab => out.push(Instruction::OklabToLinear),
        Colorspace::LinearSrgb => {}
    }
    match to {
        Colorspace::Srgb => out.push(Instruction::LinearToSrgb),
        Colorspace::DisplayP3 => out.push(Instruction::LinearToDisplayP3),
        Colorspace::Oklab => out.push(Instruction::LinearToOklab),
        Colorspace::LinearSrgb => {}
    }
}

/// Coefficients `(a, b, c)` such that `a*px + b*py + c` is the fractional
/// projection of point `(px, py)` onto `axis`, precomputed at compile
/// time so the VM never divides at runtime.
fn linear_ratio_coefficients(axis: alpenglow_geometry::line_segment::LineSegment2F) -> (f32, f32, f32) {
    let direction = axis.vector();
    let len2 = direction.dot(direction).max(1e-12);
    let a = direction.x() / len2;
    let b = direction.y() / len2;
    let c = -axis.from().dot(direction) / len2;
    (a, b, c)
}

fn composite_over(src: ColorF, dst: ColorF) -> ColorF {
    let inv_src_a = 1.0 - src.a;
    ColorF::new(
        src.r + dst.r * inv_src_a,
        src.g + dst.g * inv_src_a,
        src.b + dst.b * inv_src_a,
        src.a + dst.a * inv_src_a,
    )
}

fn barycentric_weights(p: Vector2F, a: Vector2F, b: Vector2F, c: Vector2F) -> (f32, f32, f32) {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let denom = v0.cross(v1);
    if denom.abs() < 1e-12 {
        return (1.0, 0.0, 0.0);
    }
    let w_b = v2.cross(v1) / denom;
    let w_c = v0.cross(v2) / denom;
    let w_a = 1.0 - w_b - w_c;
    (w_a, w_b, w_c)
}

fn sample_stops(stops: &[GradientStop], t: f32) -> ColorF {
    if stops.is_empty() {
        return ColorF::transparent_black();
    }
    let t = t.clamp(0.0, 1.0);
    let mut lower = &stops[0];
    let mut upper = &stops[stops.len() - 1];
    for window in stops.windows(2) {
        if t >= window[0].offset && t <= window[1].offset {
            lower = &window[0];
            upper = &window[1];
            break;
        }
    }
    let denom = upper.offset - lower.offset;
    if denom.abs() < 1e-12 {
        return lower.color.to_f32();
    }
    lower.color.to_f32().lerp(upper.color.to_f32(), (t - lower.offset) / denom)
}

fn sample_image(width: u32, height: u32, bounds: RectF, pixels: &[alpenglow_color::ColorU], point: Vector2F) -> ColorF {
    if width == 0 || height == 0 {
        return ColorF::transparent_black();
    }
    let u = ((point.x() - bounds.min_x()) / bounds.width().max(1e-12)).clamp(0.0, 0.999_999);
    let v = ((point.y() - bounds.min_y()) / bounds.height().max(1e-12)).clamp(0.0, 0.999_999);
    let x = (u * width as f32) as u32;
    let y = (v * height as f32) as u32;
    let index = (y * width + x) as usize;
    pixels.get(index).copied().unwrap_or_else(alpenglow_color::ColorU::transparent_black).to_f32()
}

/// Executes the binary instruction stream starting at dword `start`
/// against `ctx`, returning the final operand stack top.
pub fn execute(binary: &[u32], start: usize, ctx: &EvalContext) -> Result<ColorF, CompileError> {
    let mut operand_stack: ArrayVec<[ColorF; OPERAND_STACK_MAX]> = ArrayVec::new();
    let mut call_stack: ArrayVec<[usize; CALL_STACK_MAX]> = ArrayVec::new();
    let mut pc = start;
    log::trace!("executing instruction stream at dword offset {}", start);

    macro_rules! push {
        ($value:expr) => {{
            operand_stack.try_push($value).map_err(|_| CompileError::OperandStackOverflow { max: OPERAND_STACK_MAX })?;
        }};
    }
    macro_rules! pop {
        () => {
            operand_stack.pop().expect("operand stack underflow: malformed instruction stream")
        };
    }

    loop {
        let (instruction, length) = Instruction::decode(binary, pc)?;
        match instruction {
            Instruction::Exit => break,
            Instruction::Return => {
                pc = call_stack.pop().expect("Return with empty call stack");
                continue;
            }
            Instruction::Call(target) => {
                call_stack.push(pc + length);
                debug_assert!(call_stack.len() <= CALL_STACK_MAX);
                pc = target as usize;
                continue;
            }
            Instruction::StackBlend | Instruction::BlendCompose => {
                let src = pop!();
                let dst = pop!();
                push!(composite_over(src, dst));
            }
            Instruction::Premultiply => {
                let color = pop!();
                push!(color.premultiply());
            }
            Instruction::Unpremultiply => {
                let color = pop!();
                push!(color.unpremultiply());
            }
            Instruction::Normalize => {
                let color = pop!();
                push!(color.normalize());
            }
            Instruction::SrgbToLinear => {
                let color = pop!();
                push!(colorspace::convert(color, Colorspace::Srgb, Colorspace::LinearSrgb));
            }
            Instruction::LinearToSrgb => {
                let color = pop!();
                push!(colorspace::convert(color, Colorspace::LinearSrgb, Colorspace::Srgb));
            }
            Instruction::DisplayP3ToLinear => {
                let color = pop!();
                push!(colorspace::convert(color, Colorspace::DisplayP3, Colorspace::LinearSrgb));
            }
            Instruction::LinearToDisplayP3 => {
                let color = pop!();
                push!(colorspace::convert(color, Colorspace::LinearSrgb, Colorspace::DisplayP3));
            }
            Instruction::OklabToLinear => {
                let color = pop!();
                push!(colorspace::convert(color, Colorspace::Oklab, Colorspace::LinearSrgb));
            }
            Instruction::LinearToOklab => {
                let color = pop!();
                push!(colorspace::convert(color, Colorspace::LinearSrgb, Colorspace::Oklab));
            }
            Instruction::OpaqueJump(offset) => {
                let top = operand_stack.last().expect("OpaqueJump with empty operand stack");
                if top.a >= 1.0 - 1e-5 {
                    pc += length + offset as usize;
                    continue;
                }
            }
            Instruction::NormalDebug => {}
            Instruction::MultiplyScalar(scalar) => {
                let color = pop!();
                push!(ColorF::new(color.r * scalar, color.g * scalar, color.b * scalar, color.a * scalar));
            }
            Instruction::LinearBlendGeom { a, b, c } => {
                let to = pop!();
                let from = pop!();
                let t = (a * ctx.centroid.x() + b * ctx.centroid.y() + c).clamp(0.0, 1.0);
                push!(from.lerp(to, t));
            }
            Instruction::Push(components) => {
                push!(ColorF::new(components[0], components[1], components[2], components[3]));
            }
            Instruction::RadialBlendGeom { center, start_radius, end_radius } => {
                let to = pop!();
                let from = pop!();
                let distance = (ctx.centroid - center).length();
                let span = (end_radius - start_radius).abs().max(1e-6);
                let t = ((distance - start_radius) / span).clamp(0.0, 1.0);
                push!(from.lerp(to, t));
            }
            Instruction::BarycentricBlendGeom { a, b, c } => {
                let color_c = pop!();
                let color_b = pop!();
                let color_a = pop!();
                let (wa, wb, wc) = barycentric_weights(ctx.centroid, a, b, c);
                push!(ColorF::new(
                    wa * color_a.r + wb * color_b.r + wc * color_c.r,
                    wa * color_a.g + wb * color_b.g + wc * color_c.g,
                    wa * color_a.b + wb * color_b.b + wc * color_c.b,
                    wa * color_a.a + wb * color_b.a + wc * color_c.a,
                ));
            }
            Instruction::LinearGradientSample { line, stops } => {
                let (a, b, c) = linear_ratio_coefficients(line);
                let t = a * ctx.centroid.x() + b * ctx.centroid.y() + c;
                push!(sample_stops(&stops, t));
            }
            Instruction::RadialGradientSample { line, start_radius, end_radius, stops } => {
                let distance = (ctx.centroid - line.from()).length();
                let span = (end_radius - start_radius).abs().max(1e-6);
                let t = (distance - start_radius) / span;
                push!(sample_stops(&stops, t));
            }
            Instruction::Image { width, height, bounds, pixels } => {
                push!(sample_image(width, height, bounds, &pixels, ctx.centroid));
            }
        }
        pc += length;
    }

    Ok(operand_stack.pop().unwrap_or_else(ColorF::transparent_black))
}

/// Evaluates `program` directly without compiling, by walking the DAG.
/// The reference implementation every compiled run is cross-checked
/// against.
pub fn evaluate_direct(node: &Rc<RenderProgram>, ctx: &EvalContext) -> ColorF {
    match &**node {
        RenderProgram::Color(color) => *color,

        RenderProgram::Stack(children) => {
            children.iter().fold(ColorF::transparent_black(), |dst, child| {
                composite_over(evaluate_direct(child, ctx), dst)
            })
        }

        RenderProgram::PathBoolean { .. } => {
            panic!("evaluate_direct requires a path-specialized program")
        }

        RenderProgram::LinearBlend { axis, from, to } => {
            let (a, b, c) = linear_ratio_coefficients(*axis);
            let t = (a * ctx.centroid.x() + b * ctx.centroid.y() + c).clamp(0.0, 1.0);
            evaluate_direct(from, ctx).lerp(evaluate_direct(to, ctx), t)
        }

        RenderProgram::RadialBlend { center, start_radius, end_radius, from, to } => {
            let distance = (ctx.centroid - *center).length();
            let span = (end_radius - start_radius).abs().max(1e-6);
            let t = ((distance - start_radius) / span).clamp(0.0, 1.0);
            evaluate_direct(from, ctx).lerp(evaluate_direct(to, ctx), t)
        }

        RenderProgram::BarycentricBlend { a, b, c, color_a, color_b, color_c } => {
            let (wa, wb, wc) = barycentric_weights(ctx.centroid, *a, *b, *c);
            let ca = evaluate_direct(color_a, ctx);
            let cb = evaluate_direct(color_b, ctx);
            let cc = evaluate_direct(color_c, ctx);
            ColorF::new(
                wa * ca.r + wb * cb.r + wc * cc.r,
                wa * ca.g + wb * cb.g + wc * cc.g,
                wa * ca.b + wb * cb.b + wc * cc.b,
                wa * ca.a + wb * cb.a + wc * cc.a,
            )
        }

        RenderProgram::LinearGradient { line, gradient } => {
            let (a, b, c) = linear_ratio_coefficients(*line);
            let t = a * ctx.centroid.x() + b * ctx.centroid.y() + c;
            gradient.sample(t).to_f32()
        }

        RenderProgram::RadialGradient { line, start_radius, end_radius, gradient } => {
            let distance = (ctx.centroid - line.from()).length();
            let span = (end_radius - start_radius).abs().max(1e-6);
            let t = (distance - start_radius) / span;
            gradient.sample(t).to_f32()
        }

        RenderProgram::Filter { kind, input } => {
            let color = evaluate_direct(input, ctx);
            match kind {
                FilterKind::Opacity(factor) => ColorF::new(color.r, color.g, color.b, color.a * factor),
            }
        }

        RenderProgram::Image { width, height, bounds, pixels } => {
            sample_image(*width, *height, *bounds, pixels, ctx.centroid)
        }

        RenderProgram::ColorSpaceConvert { from, to, input } => {
            colorspace::convert(evaluate_direct(input, ctx), *from, *to)
        }

        RenderProgram::Premultiply(input) => evaluate_direct(input, ctx).premultiply(),
        RenderProgram::Unpremultiply(input) => evaluate_direct(input, ctx).unpremultiply(),
        RenderProgram::Normalize(input) => evaluate_direct(input, ctx).normalize(),
    }
}

pub fn evaluate_compiled(program: &Rc<RenderProgram>, ctx: &EvalContext) -> Result<ColorF, CompileError> {
    let binary = compile_to_binary(program)?;
    execute(&binary, 0, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradient::{ColorStop, Gradient};
    use alpenglow_color::ColorU;
    use alpenglow_geometry::line_segment::LineSegment2F;
    use alpenglow_geometry::vector::vec2f;

    fn color(r: f32, g: f32, b: f32, a: f32) -> Rc<RenderProgram> {
        RenderProgram::color(ColorF::new(r, g, b, a))
    }

    #[test]
    fn s7_push_and_multiply_scalar() {
        let binary = instructions::instructions_to_binary(&[
            Instruction::Push([1.0, 2.0, 3.0, 4.0]),
            Instruction::MultiplyScalar(0.5),
        ]);
        let result = execute(&binary, 0, &EvalContext::at_centroid(vec2f(0.0, 0.0))).unwrap();
        assert!((result.r - 0.5).abs() < 1e-6);
        assert!((result.g - 1.0).abs() < 1e-6);
        assert!((result.b - 1.5).abs() < 1e-6);
        assert!((result.a - 2.0).abs() < 1e-6);
    }

    #[test]
    fn direct_and_compiled_agree_on_a_stack() {
        let program = Rc::new(RenderProgram::Stack(vec![
            color(0.0, 0.0, 1.0, 1.0),
            color(1.0, 0.0, 0.0, 0.5),
        ]));
        let ctx = EvalContext::at_centroid(vec2f(0.0, 0.0));
        let direct = evaluate_direct(&program, &ctx);
        let compiled = evaluate_compiled(&program, &ctx).unwrap();
        assert!((direct.r - compiled.r).abs() < 1e-5);
        assert!((direct.g - compiled.g).abs() < 1e-5);
        assert!((direct.b - compiled.b).abs() < 1e-5);
        assert!((direct.a - compiled.a).abs() < 1e-5);
    }

    #[test]
    fn direct_and_compiled_agree_on_linear_blend() {
        let axis = LineSegment2F::new(vec2f(0.0, 0.0), vec2f(2.0, 0.0));
        let program = Rc::new(RenderProgram::LinearBlend {
            axis,
            from: color(1.0, 0.0, 0.0, 1.0),
            to: color(0.0, 0.0, 1.0, 1.0),
        });

        for x in [0.0_f32, 0.5, 1.0, 2.0] {
            let ctx = EvalContext::at_centroid(vec2f(x, 0.0));
            let direct = evaluate_direct(&program, &ctx);
            let compiled = evaluate_compiled(&program, &ctx).unwrap();
            assert!((direct.r - compiled.r).abs() < 1e-5, "x={}", x);
            assert!((direct.b - compiled.b).abs() < 1e-5, "x={}", x);
        }
    }

    #[test]
    fn s6_linear_gradient_specialization_endpoints() {
        let mut gradient = Gradient::linear(LineSegment2F::new(vec2f(0.0, 0.0), vec2f(2.0, 0.0)));
        gradient.add_color_stop(ColorStop::new(ColorU::new(255, 0, 0, 255), 0.0));
        gradient.add_color_stop(ColorStop::new(ColorU::new(0, 0, 255, 255), 1.0));
        let program = Rc::new(RenderProgram::LinearGradient {
            line: LineSegment2F::new(vec2f(0.0, 0.0), vec2f(2.0, 0.0)),
            gradient: Rc::new(gradient),
        });

        let left = evaluate_direct(&program, &EvalContext::at_centroid(vec2f(0.0, 0.0)));
        let right = evaluate_direct(&program, &EvalContext::at_centroid(vec2f(2.0, 0.0)));
        assert!(left.r > 0.9 && left.b < 0.1);
        assert!(right.b > 0.9 && right.r < 0.1);
    }

    #[test]
    fn compile_rejects_unspecialized_path_boolean() {
        let loops = vec![vec![vec2f(0.0, 0.0), vec2f(1.0, 0.0), vec2f(1.0, 1.0)]];
        let path = crate::path::RenderPath::new(loops, crate::path::FillRule::Nonzero);
        let program = Rc::new(RenderProgram::PathBoolean {
            path: path.id(),
            inside: color(1.0, 0.0, 0.0, 1.0),
            outside: color(0.0, 0.0, 0.0, 0.0),
        });
        assert_eq!(compile(&program).unwrap_err(), CompileError::UnspecializedPathBoolean);
    }

    #[test]
    fn barycentric_blend_agrees_at_a_vertex() {
        let a = vec2f(0.0, 0.0);
        let b = vec2f(1.0, 0.0);
        let c = vec2f(0.0, 1.0);
        let program = Rc::new(RenderProgram::BarycentricBlend {
            a,
            b,
            c,
            color_a: color(1.0, 0.0, 0.0, 1.0),
            color_b: color(0.0, 1.0, 0.0, 1.0),
            color_c: color(0.0, 0.0, 1.0, 1.0),
        });
        let ctx = EvalContext::at_centroid(a);
        let direct = evaluate_direct(&program, &ctx);
        let compiled = evaluate_compiled(&program, &ctx).unwrap();
        assert!(direct.r > 0.99);
        assert!((direct.r - compiled.r).abs() < 1e-5);
    }
}
