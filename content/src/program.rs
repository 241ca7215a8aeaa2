// alpenglow/content/src/program.rs
//
// Copyright © 2024 The Alpenglow Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `RenderProgram`: the immutable shading DAG. Nodes are reference
//! counted so subtrees can be shared between faces; structural equality
//! (not pointer equality) is what `PartialEq` reports, since `Rc<T>`
//! forwards `==` to the pointee.

use crate::gradient::Gradient;
use crate::path::PathId;
use alpenglow_color::colorspace::Colorspace;
use alpenglow_color::{ColorF, ColorU};
use alpenglow_geometry::line_segment::LineSegment2F;
use alpenglow_geometry::rect::RectF;
use alpenglow_geometry::vector::Vector2F;
use std::rc::Rc;
use std::sync::Arc;

/// A color filter applied to a single child's output. Only the filters
/// conformance actually exercises are modeled; this is a closed enum so
/// adding a kind is a compile-time-checked change at every match site.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum FilterKind {
    /// Scales alpha (and, proportionally, premultiplied color) by a
    /// constant factor in `[0, 1]`.
    Opacity(f32),
}

#[derive(Clone, PartialEq, Debug)]
pub enum RenderProgram {
    /// A constant color, independent of pixel position.
    Color(ColorF),
    /// Composites children bottom-to-top with source-over blending.
    Stack(Vec<Rc<RenderProgram>>),
    /// Branches on whether the evaluation face is inside `path` under
    /// that path's fill rule.
    PathBoolean { path: PathId, inside: Rc<RenderProgram>, outside: Rc<RenderProgram> },
    /// Blends two colors by the fractional projection of the pixel
    /// position onto `axis`.
    LinearBlend { axis: LineSegment2F, from: Rc<RenderProgram>, to: Rc<RenderProgram> },
    /// Blends two colors by normalized distance from `center` between
    /// `start_radius` and `end_radius`.
    RadialBlend { center: Vector2F, start_radius: f32, end_radius: f32, from: Rc<RenderProgram>, to: Rc<RenderProgram> },
    /// Blends three colors by the barycentric coordinates of the pixel
    /// position within triangle `(a, b, c)`.
    BarycentricBlend {
        a: Vector2F,
        b: Vector2F,
        c: Vector2F,
        color_a: Rc<RenderProgram>,
        color_b: Rc<RenderProgram>,
        color_c: Rc<RenderProgram>,
    },
    /// Samples a discrete multi-stop gradient directly (as opposed to
    /// `LinearBlend`'s two-color primitive).
    LinearGradient { line: LineSegment2F, gradient: Rc<Gradient> },
    RadialGradient { line: LineSegment2F, start_radius: f32, end_radius: f32, gradient: Rc<Gradient> },
    /// A filter applied to a child program's output.
    Filter { kind: FilterKind, input: Rc<RenderProgram> },
    /// Nearest-neighbor samples a raw pixel buffer over `bounds`.
    Image { width: u32, height: u32, bounds: RectF, pixels: Arc<Vec<ColorU>> },
    /// Converts a child's output between color spaces, always pivoting
    /// through linear sRGB.
    ColorSpaceConvert { from: Colorspace, to: Colorspace, input: Rc<RenderProgram> },
    Premultiply(Rc<RenderProgram>),
    Unpremultiply(Rc<RenderProgram>),
    /// Clamps RGB into `[0, 1]`, alpha untouched.
    Normalize(Rc<RenderProgram>),
}

/// Aggregated capability requirements of a subtree, used to decide what
/// evaluation context a face needs to assemble before running a program.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Capabilities {
    pub needs_face: bool,
    pub needs_area: bool,
    pub needs_centroid: bool,
}

impl Capabilities {
    #[inline]
    fn merge(self, other: Capabilities) -> Capabilities {
        Capabilities {
            needs_face: self.needs_face || other.needs_face,
            needs_area: self.needs_area || other.needs_area,
            needs_centroid: self.needs_centroid || other.needs_centroid,
        }
    }

    #[inline]
    fn only_centroid() -> Capabilities {
        Capabilities { needs_face: false, needs_area: false, needs_centroid: true }
    }

    #[inline]
    fn only_face() -> Capabilities {
        Capabilities { needs_face: true, needs_area: false, needs_centroid: false }
    }
}

impl RenderProgram {
    #[inline]
    pub fn color(color: ColorF) -> Rc<RenderProgram> {
        Rc::new(RenderProgram::Color(color))
    }

    pub fn children(&self) -> Vec<&Rc<RenderProgram>> {
        match self {
            RenderProgram::Color(_) | RenderProgram::LinearGradient { .. } |
            RenderProgram::RadialGradient { .. } | RenderProgram::Image { .. } => vec![],
            RenderProgram::Stack(children) => children.iter().collect(),
            RenderProgram::PathBoolean { inside, outside, .. } => vec![inside, outside],
            RenderProgram::LinearBlend { from, to, .. } => vec![from, to],
            RenderProgram::RadialBlend { from, to, .. } => vec![from, to],
            RenderProgram::BarycentricBlend { color_a, color_b, color_c, .. } => {
                vec![color_a, color_b, color_c]
            }
            RenderProgram::Filter { input, .. } |
            RenderProgram::ColorSpaceConvert { input, .. } |
            RenderProgram::Premultiply(input) |
            RenderProgram::Unpremultiply(input) |
            RenderProgram::Normalize(input) => vec![input],
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        let own = match self {
            RenderProgram::Color(_) | RenderProgram::Filter { .. } |
            RenderProgram::ColorSpaceConvert { .. } | RenderProgram::Premultiply(_) |
            RenderProgram::Unpremultiply(_) | RenderProgram::Normalize(_) |
            RenderProgram::Stack(_) => Capabilities::default(),
            RenderProgram::PathBoolean { .. } => Capabilities::only_face(),
            RenderProgram::LinearBlend { .. } | RenderProgram::RadialBlend { .. } |
            RenderProgram::BarycentricBlend { .. } | RenderProgram::LinearGradient { .. } |
            RenderProgram::RadialGradient { .. } | RenderProgram::Image { .. } => {
                Capabilities::only_centroid()
            }
        };
        self.children().into_iter().fold(own, |acc, child| acc.merge(child.capabilities()))
    }

    #[inline]
    pub fn is_constant_color(&self) -> Option<ColorF> {
        match self {
            RenderProgram::Color(color) => Some(*color),
            _ => None,
        }
    }

    /// Algebraic simplification: constant folding, identity elimination,
    /// stack flattening. Idempotent — `simplified()` on an already
    /// simplified tree returns a structurally equal tree.
    pub fn simplified(self: &Rc<RenderProgram>) -> Rc<RenderProgram> {
        match &**self {
            RenderProgram::Color(_) => self.clone(),

            RenderProgram::Stack(children) => {
                let mut flattened = Vec::with_capacity(children.len());
                for child in children {
                    let simplified_child = child.simplified();
                    match &*simplified_child {
                        RenderProgram::Stack(inner) => flattened.extend(inner.iter().cloned()),
                        RenderProgram::Color(color) if color.a <= 0.0 => {}
                        _ => flattened.push(simplified_child),
                    }
                }
                // An opaque layer makes everything beneath it invisible.
                if let Some(top_opaque_index) = flattened.iter().rposition(|child| {
                    matches!(&**child, RenderProgram::Color(color) if color.is_opaque())
                }) {
                    flattened.drain(0..top_opaque_index);
                }
                match flattened.len() {
                    0 => RenderProgram::color(ColorF::transparent_black()),
                    1 => flattened.into_iter().next().unwrap(),
                    _ => Rc::new(RenderProgram::Stack(flattened)),
                }
            }

            RenderProgram::PathBoolean { path, inside, outside } => {
                let inside = inside.simplified();
                let outside = outside.simplified();
                if inside == outside {
                    inside
                } else {
                    Rc::new(RenderProgram::PathBoolean { path: *path, inside, outside })
                }
            }

            RenderProgram::LinearBlend { axis, from, to } => {
                let from = from.simplified();
                let to = to.simplified();
                match (from.is_constant_color(), to.is_constant_color()) {
                    (Some(a), Some(b)) if a == b => RenderProgram::color(a),
                    _ => Rc::new(RenderProgram::LinearBlend { axis: *axis, from, to }),
                }
            }

            RenderProgram::RadialBlend { center, start_radius, end_radius, from, to } => {
                let from = from.simplified();
                let to = to.simplified();
                match (from.is_constant_color(), to.is_constant_color()) {
                    (Some(a), Some(b)) if a == b => RenderProgram::color(a),
                    _ => Rc::new(RenderProgram::RadialBlend {
                        center: *center,
                        start_radius: *start_radius,
                        end_radius: *end_radius,
                        from,
                        to,
                    }),
                }
            }

            RenderProgram::BarycentricBlend { a, b, c, color_a, color_b, color_c } => {
                let color_a = color_a.simplified();
                let color_b = color_b.simplified();
                let color_c = color_c.simplified();
                match (color_a.is_constant_color(), color_b.is_constant_color(), color_c.is_constant_color()) {
                    (Some(x), Some(y), Some(z)) if x == y && y == z => RenderProgram::color(x),
                    _ => Rc::new(RenderProgram::BarycentricBlend {
                        a: *a,
                        b: *b,
                        c: *c,
                        color_a,
                        color_b,
                        color_c,
                    }),
                }
            }

            RenderProgram::LinearGradient { .. } | RenderProgram::RadialGradient { .. } |
            RenderProgram::Image { .. } => self.clone(),

            RenderProgram::Filter { kind, input } => {
                let input = input.simplified();
                match (*kind, input.is_constant_color()) {
                    (FilterKind::Opacity(k), Some(color)) => {
                        RenderProgram::color(ColorF::new(color.r, color.g, color.b, color.a * k))
                    }
                    _ => Rc::new(RenderProgram::Filter { kind: *kind, input }),
                }
            }

            RenderProgram::ColorSpaceConvert { from, to, input } => {
                let input = input.simplified();
                if from == to {
                    return input;
                }
                match input.is_constant_color() {
                    Some(color) => RenderProgram::color(alpenglow_color::colorspace::convert(color, *from, *to)),
                    None => Rc::new(RenderProgram::ColorSpaceConvert { from: *from, to: *to, input }),
                }
            }

            RenderProgram::Premultiply(input) => {
                let input = input.simplified();
                match input.is_constant_color() {
                    Some(color) => RenderProgram::color(color.premultiply()),
                    None => Rc::new(RenderProgram::Premultiply(input)),
                }
            }

            RenderProgram::Unpremultiply(input) => {
                let input = input.simplified();
                match input.is_constant_color() {
                    Some(color) => RenderProgram::color(color.unpremultiply()),
                    None => Rc::new(RenderProgram::Unpremultiply(input)),
                }
            }

            RenderProgram::Normalize(input) => {
                let input = input.simplified();
                match input.is_constant_color() {
                    Some(color) => RenderProgram::color(color.normalize()),
                    None => Rc::new(RenderProgram::Normalize(input)),
                }
            }
        }
    }

    /// Replaces every `PathBoolean` node by its `inside` or `outside`
    /// branch according to `predicate(path)`, without simplifying.
    /// Callers should call `simplified()` on the result.
    pub fn with_path_inclusion(self: &Rc<RenderProgram>, predicate: &dyn Fn(PathId) -> bool) -> Rc<RenderProgram> {
        match &**self {
            RenderProgram::Color(_) | RenderProgram::LinearGradient { .. } |
            RenderProgram::RadialGradient { .. } | RenderProgram::Image { .. } => self.clone(),

            RenderProgram::PathBoolean { path, inside, outside } => {
                let branch = if predicate(*path) { inside } else { outside };
                branch.with_path_inclusion(predicate)
            }

            RenderProgram::Stack(children) => {
                Rc::new(RenderProgram::Stack(
                    children.iter().map(|child| child.with_path_inclusion(predicate)).collect(),
                ))
            }

            RenderProgram::LinearBlend { axis, from, to } => {
                Rc::new(RenderProgram::LinearBlend {
                    axis: *axis,
                    from: from.with_path_inclusion(predicate),
                    to: to.with_path_inclusion(predicate),
                })
            }

            RenderProgram::RadialBlend { center, start_radius, end_radius, from, to } => {
                Rc::new(RenderProgram::RadialBlend {
                    center: *center,
                    start_radius: *start_radius,
                    end_radius: *end_radius,
                    from: from.with_path_inclusion(predicate),
                    to: to.with_path_inclusion(predicate),
                })
            }

            RenderProgram::BarycentricBlend { a, b, c, color_a, color_b, color_c } => {
                Rc::new(RenderProgram::BarycentricBlend {
                    a: *a,
                    b: *b,
                    c: *c,
                    color_a: color_a.with_path_inclusion(predicate),
                    color_b: color_b.with_path_inclusion(predicate),
                    color_c: color_c.with_path_inclusion(predicate),
                })
            }

            RenderProgram::Filter { kind, input } => {
                Rc::new(RenderProgram::Filter { kind: *kind, input: input.with_path_inclusion(predicate) })
            }

            RenderProgram::ColorSpaceConvert { from, to, input } => {
                Rc::new(RenderProgram::ColorSpaceConvert {
                    from: *from,
                    to: *to,
                    input: input.with_path_inclusion(predicate),
                })
            }

            RenderProgram::Premultiply(input) => {
                Rc::new(RenderProgram::Premultiply(input.with_path_inclusion(predicate)))
            }
            RenderProgram::Unpremultiply(input) => {
                Rc::new(RenderProgram::Unpremultiply(input.with_path_inclusion(predicate)))
            }
            RenderProgram::Normalize(input) => {
                Rc::new(RenderProgram::Normalize(input.with_path_inclusion(predicate)))
            }
        }
    }

    /// `true` once no `PathBoolean` node remains, the precondition for
    /// instruction compilation.
    pub fn is_path_specialized(&self) -> bool {
        !matches!(self, RenderProgram::PathBoolean { .. })
            && self.children().into_iter().all(|child| child.is_path_specialized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alpenglow_geometry::vector::vec2f;

    fn red() -> Rc<RenderProgram> {
        RenderProgram::color(ColorF::new(1.0, 0.0, 0.0, 1.0))
    }

    fn blue() -> Rc<RenderProgram> {
        RenderProgram::color(ColorF::new(0.0, 0.0, 1.0, 1.0))
    }

    #[test]
    fn stack_of_single_color_collapses() {
        let stack = Rc::new(RenderProgram::Stack(vec![red()]));
        assert_eq!(stack.simplified(), red());
    }

    #[test]
    fn opaque_layer_hides_everything_beneath_it() {
        let stack = Rc::new(RenderProgram::Stack(vec![blue(), red()]));
        assert_eq!(stack.simplified(), red());
    }

    #[test]
    fn transparent_layers_are_dropped() {
        let transparent = RenderProgram::color(ColorF::transparent_black());
        let stack = Rc::new(RenderProgram::Stack(vec![transparent, red()]));
        assert_eq!(stack.simplified(), red());
    }

    #[test]
    fn nested_stacks_flatten() {
        let inner = Rc::new(RenderProgram::Stack(vec![red()]));
        let outer = Rc::new(RenderProgram::Stack(vec![inner, blue()]));
        assert_eq!(outer.simplified(), blue());
    }

    #[test]
    fn simplification_is_idempotent() {
        let stack = Rc::new(RenderProgram::Stack(vec![
            Rc::new(RenderProgram::Stack(vec![red()])),
            RenderProgram::color(ColorF::transparent_black()),
            blue(),
        ]));
        let once = stack.simplified();
        let twice = once.simplified();
        assert_eq!(once, twice);
    }

    #[test]
    fn linear_blend_of_equal_constants_folds() {
        let axis = LineSegment2F::new(vec2f(0.0, 0.0), vec2f(1.0, 0.0));
        let blend = Rc::new(RenderProgram::LinearBlend { axis, from: red(), to: red() });
        assert_eq!(blend.simplified(), red());
    }

    #[test]
    fn path_inclusion_picks_the_matching_branch() {
        let loops = vec![vec![vec2f(0.0, 0.0), vec2f(1.0, 0.0), vec2f(1.0, 1.0)]];
        let path = crate::path::RenderPath::new(loops, crate::path::FillRule::Nonzero);
        let program = Rc::new(RenderProgram::PathBoolean { path: path.id(), inside: red(), outside: blue() });
        let specialized = program.with_path_inclusion(&|candidate| candidate == path.id());
        assert_eq!(specialized, red());
        assert!(specialized.is_path_specialized());
    }

    #[test]
    fn capabilities_propagate_from_children() {
        let axis = LineSegment2F::new(vec2f(0.0, 0.0), vec2f(1.0, 0.0));
        let blend = Rc::new(RenderProgram::LinearBlend { axis, from: red(), to: blue() });
        let stack = Rc::new(RenderProgram::Stack(vec![red(), blend]));
        assert!(stack.capabilities().needs_centroid);
        assert!(!red().capabilities().needs_centroid);
    }
}
