// alpenglow/content/src/instructions.rs
//
// Copyright © 2024 The Alpenglow Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The compiled instruction stream: a linear sequence of 32-bit
//! little-endian dwords, one opcode table governing both the encoder and
//! the decoder so they can never drift apart.
//!
//! Three opcode bands, identified by the top two bits of the first
//! dword's low byte:
//!   - `0x00..=0x0F` — fixed length 1 (this dword only). A small
//!     immediate may be packed into bits 8..32 of that same dword.
//!   - `0x80..=0xBF` — fixed length, chosen per opcode so that `opcode &
//!     0x1F == length`; the decoder cross-checks this (the redundancy is
//!     an assertable invariant, not load-bearing data, but catches a
//!     malformed table at a single call site instead of silently
//!     misreading dwords downstream).
//!   - `0xC0..=0xFF` — variable length; the count of trailing elements
//!     (gradient stops, image texels) is packed into bits 8..24 of the
//!     first dword, and total length is computed from it.

use alpenglow_color::ColorU;
use alpenglow_geometry::line_segment::LineSegment2F;
use alpenglow_geometry::rect::RectF;
use alpenglow_geometry::vector::{vec2f, Vector2F};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum InstructionError {
    #[error("unreachable opcode 0x{0:02x} in instruction decoder")]
    UnreachableOpcode(u8),
    #[error("instruction stream truncated: expected {expected} more dwords at offset {offset}")]
    Truncated { offset: usize, expected: usize },
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct GradientStop {
    pub offset: f32,
    pub color: ColorU,
}

#[derive(Clone, PartialEq, Debug)]
pub enum Instruction {
    // 0x00..=0x0F, fixed length 1.
    Exit,
    Return,
    StackBlend,
    Premultiply,
    Unpremultiply,
    Normalize,
    SrgbToLinear,
    LinearToSrgb,
    DisplayP3ToLinear,
    LinearToDisplayP3,
    OklabToLinear,
    LinearToOklab,
    OpaqueJump(u32),
    NormalDebug,
    BlendCompose,
    Call(u32),

    // 0x80..=0xBF, fixed length.
    MultiplyScalar(f32),
    LinearBlendGeom { a: f32, b: f32, c: f32 },
    Push([f32; 4]),
    RadialBlendGeom { center: Vector2F, start_radius: f32, end_radius: f32 },
    BarycentricBlendGeom { a: Vector2F, b: Vector2F, c: Vector2F },

    // 0xC0..=0xFF, variable length.
    LinearGradientSample { line: LineSegment2F, stops: Vec<GradientStop> },
    RadialGradientSample { line: LineSegment2F, start_radius: f32, end_radius: f32, stops: Vec<GradientStop> },
    Image { width: u32, height: u32, bounds: RectF, pixels: Arc<Vec<ColorU>> },
}

const OP_EXIT: u8 = 0x00;
const OP_RETURN: u8 = 0x01;
const OP_STACK_BLEND: u8 = 0x02;
const OP_PREMULTIPLY: u8 = 0x03;
const OP_UNPREMULTIPLY: u8 = 0x04;
const OP_NORMALIZE: u8 = 0x05;
const OP_SRGB_TO_LINEAR: u8 = 0x06;
const OP_LINEAR_TO_SRGB: u8 = 0x07;
const OP_P3_TO_LINEAR: u8 = 0x08;
const OP_LINEAR_TO_P3: u8 = 0x09;
const OP_OKLAB_TO_LINEAR: u8 = 0x0A;
const OP_LINEAR_TO_OKLAB: u8 = 0x0B;
const OP_OPAQUE_JUMP: u8 = 0x0C;
const OP_NORMAL_DEBUG: u8 = 0x0D;
const OP_BLEND_COMPOSE: u8 = 0x0E;
const OP_CALL: u8 = 0x0F;

const OP_MULTIPLY_SCALAR: u8 = 0x82;
const OP_LINEAR_BLEND_GEOM: u8 = 0x84;
const OP_PUSH: u8 = 0x85;
const OP_RADIAL_BLEND_GEOM: u8 = 0xA5;
const OP_BARYCENTRIC_BLEND_GEOM: u8 = 0x87;

const OP_LINEAR_GRADIENT_SAMPLE: u8 = 0xC0;
const OP_RADIAL_GRADIENT_SAMPLE: u8 = 0xC1;
const OP_IMAGE: u8 = 0xFF;

#[inline]
fn pack_header(opcode: u8, immediate24: u32) -> u32 {
    debug_assert!(immediate24 < (1 << 24));
    opcode as u32 | (immediate24 << 8)
}

#[inline]
fn unpack_immediate24(dword: u32) -> u32 {
    dword >> 8
}

impl Instruction {
    /// Total dword length of this instruction once encoded, matching
    /// exactly what `encode_into` writes.
    pub fn len_dwords(&self) -> usize {
        match self {
            Instruction::Exit | Instruction::Return | Instruction::StackBlend |
            Instruction::Premultiply | Instruction::Unpremultiply | Instruction::Normalize |
            Instruction::SrgbToLinear | Instruction::LinearToSrgb |
            Instruction::DisplayP3ToLinear | Instruction::LinearToDisplayP3 |
            Instruction::OklabToLinear | Instruction::LinearToOklab |
            Instruction::OpaqueJump(_) | Instruction::NormalDebug |
            Instruction::BlendCompose | Instruction::Call(_) => 1,

            Instruction::MultiplyScalar(_) => 2,
            Instruction::LinearBlendGeom { .. } => 4,
            Instruction::Push(_) => 5,
            Instruction::RadialBlendGeom { .. } => 5,
            Instruction::BarycentricBlendGeom { .. } => 7,

            Instruction::LinearGradientSample { stops, .. } => 5 + stops.len() * 2,
            Instruction::RadialGradientSample { stops, .. } => 7 + stops.len() * 2,
            Instruction::Image { width, height, .. } => 7 + (*width as usize) * (*height as usize),
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u32>) {
        match self {
            Instruction::Exit => out.push(pack_header(OP_EXIT, 0)),
            Instruction::Return => out.push(pack_header(OP_RETURN, 0)),
            Instruction::StackBlend => out.push(pack_header(OP_STACK_BLEND, 0)),
            Instruction::Premultiply => out.push(pack_header(OP_PREMULTIPLY, 0)),
            Instruction::Unpremultiply => out.push(pack_header(OP_UNPREMULTIPLY, 0)),
            Instruction::Normalize => out.push(pack_header(OP_NORMALIZE, 0)),
            Instruction::SrgbToLinear => out.push(pack_header(OP_SRGB_TO_LINEAR, 0)),
            Instruction::LinearToSrgb => out.push(pack_header(OP_LINEAR_TO_SRGB, 0)),
            Instruction::DisplayP3ToLinear => out.push(pack_header(OP_P3_TO_LINEAR, 0)),
            Instruction::LinearToDisplayP3 => out.push(pack_header(OP_LINEAR_TO_P3, 0)),
            Instruction::OklabToLinear => out.push(pack_header(OP_OKLAB_TO_LINEAR, 0)),
            Instruction::LinearToOklab => out.push(pack_header(OP_LINEAR_TO_OKLAB, 0)),
            Instruction::OpaqueJump(offset) => out.push(pack_header(OP_OPAQUE_JUMP, *offset)),
            Instruction::NormalDebug => out.push(pack_header(OP_NORMAL_DEBUG, 0)),
            Instruction::BlendCompose => out.push(pack_header(OP_BLEND_COMPOSE, 0)),
            Instruction::Call(target) => out.push(pack_header(OP_CALL, *target)),

            Instruction::MultiplyScalar(scalar) => {
                out.push(OP_MULTIPLY_SCALAR as u32);
                out.push(scalar.to_bits());
            }
            Instruction::LinearBlendGeom { a, b, c } => {
                out.push(OP_LINEAR_BLEND_GEOM as u32);
                out.push(a.to_bits());
                out.push(b.to_bits());
                out.push(c.to_bits());
            }
            Instruction::Push(components) => {
                out.push(OP_PUSH as u32);
                for component in components {
                    out.push(component.to_bits());
                }
            }
            Instruction::RadialBlendGeom { center, start_radius, end_radius } => {
                out.push(OP_RADIAL_BLEND_GEOM as u32);
                out.push(center.x().to_bits());
                out.push(center.y().to_bits());
                out.push(start_radius.to_bits());
                out.push(end_radius.to_bits());
            }
            Instruction::BarycentricBlendGeom { a, b, c } => {
                out.push(OP_BARYCENTRIC_BLEND_GEOM as u32);
                for vertex in [a, b, c] {
                    out.push(vertex.x().to_bits());
                    out.push(vertex.y().to_bits());
                }
            }

            Instruction::LinearGradientSample { line, stops } => {
                out.push(pack_header(OP_LINEAR_GRADIENT_SAMPLE, stops.len() as u32));
                out.push(line.from().x().to_bits());
                out.push(line.from().y().to_bits());
                out.push(line.to().x().to_bits());
                out.push(line.to().y().to_bits());
                encode_stops(stops, out);
            }
            Instruction::RadialGradientSample { line, start_radius, end_radius, stops } => {
                out.push(pack_header(OP_RADIAL_GRADIENT_SAMPLE, stops.len() as u32));
                out.push(line.from().x().to_bits());
                out.push(line.from().y().to_bits());
                out.push(line.to().x().to_bits());
                out.push(line.to().y().to_bits());
                out.push(start_radius.to_bits());
                out.push(end_radius.to_bits());
                encode_stops(stops, out);
            }
            Instruction::Image { width, height, bounds, pixels } => {
                out.push(OP_IMAGE as u32);
                out.push(*width);
                out.push(*height);
                out.push(bounds.origin().x().to_bits());
                out.push(bounds.origin().y().to_bits());
                out.push(bounds.size().x().to_bits());
                out.push(bounds.size().y().to_bits());
                for pixel in pixels.iter() {
                    out.push(pack_color_u(*pixel));
                }
            }
        }
    }

    /// Decodes one instruction starting at `dwords[offset]`, returning it
    /// along with the number of dwords consumed.
    pub fn decode(dwords: &[u32], offset: usize) -> Result<(Instruction, usize), InstructionError> {
        let first = *dwords.get(offset).ok_or(InstructionError::Truncated { offset, expected: 1 })?;
        let opcode = (first & 0xFF) as u8;

        let require = |count: usize| -> Result<(), InstructionError> {
            if offset + count <= dwords.len() {
                Ok(())
            } else {
                Err(InstructionError::Truncated { offset, expected: count })
            }
        };

        let instruction = match opcode {
            OP_EXIT => Instruction::Exit,
            OP_RETURN => Instruction::Return,
            OP_STACK_BLEND => Instruction::StackBlend,
            OP_PREMULTIPLY => Instruction::Premultiply,
            OP_UNPREMULTIPLY => Instruction::Unpremultiply,
            OP_NORMALIZE => Instruction::Normalize,
            OP_SRGB_TO_LINEAR => Instruction::SrgbToLinear,
            OP_LINEAR_TO_SRGB => Instruction::LinearToSrgb,
            OP_P3_TO_LINEAR => Instruction::DisplayP3ToLinear,
            OP_LINEAR_TO_P3 => Instruction::LinearToDisplayP3,
            OP_OKLAB_TO_LINEAR => Instruction::OklabToLinear,
            OP_LINEAR_TO_OKLAB => Instruction::LinearToOklab,
            OP_OPAQUE_JUMP => Instruction::OpaqueJump(unpack_immediate24(first)),
            OP_NORMAL_DEBUG => Instruction::NormalDebug,
            OP_BLEND_COMPOSE => Instruction::BlendCompose,
            OP_CALL => Instruction::Call(unpack_immediate24(first)),

            OP_MULTIPLY_SCALAR => {
                require(2)?;
                debug_assert_eq!(opcode & 0x1F, 2);
                Instruction::MultiplyScalar(f32::from_bits(dwords[offset + 1]))
            }
            OP_LINEAR_BLEND_GEOM => {
                require(4)?;
                debug_assert_eq!(opcode & 0x1F, 4);
                Instruction::LinearBlendGeom {
                    a: f32::from_bits(dwords[offset + 1]),
                    b: f32::from_bits(dwords[offset + 2]),
                    c: f32::from_bits(dwords[offset + 3]),
                }
            }
            OP_PUSH => {
                require(5)?;
                debug_assert_eq!(opcode & 0x1F, 5);
                let mut components = [0.0_f32; 4];
                for (index, component) in components.iter_mut().enumerate() {
                    *component = f32::from_bits(dwords[offset + 1 + index]);
                }
                Instruction::Push(components)
            }
            OP_RADIAL_BLEND_GEOM => {
                require(5)?;
                debug_assert_eq!(opcode & 0x1F, 5);
                Instruction::RadialBlendGeom {
                    center: vec2f(f32::from_bits(dwords[offset + 1]), f32::from_bits(dwords[offset + 2])),
                    start_radius: f32::from_bits(dwords[offset + 3]),
                    end_radius: f32::from_bits(dwords[offset + 4]),
                }
            }
            OP_BARYCENTRIC_BLEND_GEOM => {
                require(7)?;
                debug_assert_eq!(opcode & 0x1F, 7);
                let vertex = |index: usize| {
                    vec2f(f32::from_bits(dwords[offset + 1 + index * 2]), f32::from_bits(dwords[offset + 2 + index * 2]))
                };
                Instruction::BarycentricBlendGeom { a: vertex(0), b: vertex(1), c: vertex(2) }
            }

            OP_LINEAR_GRADIENT_SAMPLE => {
                let stop_count = unpack_immediate24(first) as usize;
                require(5 + stop_count * 2)?;
                let line = LineSegment2F::new(
                    vec2f(f32::from_bits(dwords[offset + 1]), f32::from_bits(dwords[offset + 2])),
                    vec2f(f32::from_bits(dwords[offset + 3]), f32::from_bits(dwords[offset + 4])),
                );
                let stops = decode_stops(dwords, offset + 5, stop_count);
                Instruction::LinearGradientSample { line, stops }
            }
            OP_RADIAL_GRADIENT_SAMPLE => {
                let stop_count = unpack_immediate24(first) as usize;
                require(7 + stop_count * 2)?;
                let line = LineSegment2F::new(
                    vec2f(f32::from_bits(dwords[offset + 1]), f32::from_bits(dwords[offset + 2])),
                    vec2f(f32::from_bits(dwords[offset + 3]), f32::from_bits(dwords[offset + 4])),
                );
                let start_radius = f32::from_bits(dwords[offset + 5]);
                let end_radius = f32::from_bits(dwords[offset + 6]);
                let stops = decode_stops(dwords, offset + 7, stop_count);
                Instruction::RadialGradientSample { line, start_radius, end_radius, stops }
            }
            OP_IMAGE => {
                require(7)?;
                let width = dwords[offset + 1];
                let height = dwords[offset + 2];
                require(7 + (width as usize) * (height as usize))?;
                let bounds = RectF::new(
                    vec2f(f32::from_bits(dwords[offset + 3]), f32::from_bits(dwords[offset + 4])),
                    vec2f(f32::from_bits(dwords[offset + 5]), f32::from_bits(dwords[offset + 6])),
                );
                let pixel_count = (width as usize) * (height as usize);
                let pixels = (0..pixel_count)
                    .map(|index| unpack_color_u(dwords[offset + 7 + index]))
                    .collect();
                Instruction::Image { width, height, bounds, pixels: Arc::new(pixels) }
            }

            other => return Err(InstructionError::UnreachableOpcode(other)),
        };

        let length = instruction.len_dwords();
        Ok((instruction, length))
    }
}

fn encode_stops(stops: &[GradientStop], out: &mut Vec<u32>) {
    for stop in stops {
        out.push(stop.offset.to_bits());
        out.push(pack_color_u(stop.color));
    }
}

fn decode_stops(dwords: &[u32], offset: usize, count: usize) -> Vec<GradientStop> {
    (0..count)
        .map(|index| {
            let base = offset + index * 2;
            GradientStop {
                offset: f32::from_bits(dwords[base]),
                color: unpack_color_u(dwords[base + 1]),
            }
        })
        .collect()
}

#[inline]
fn pack_color_u(color: ColorU) -> u32 {
    u32::from_le_bytes([color.r, color.g, color.b, color.a])
}

#[inline]
fn unpack_color_u(dword: u32) -> ColorU {
    let bytes = dword.to_le_bytes();
    ColorU::new(bytes[0], bytes[1], bytes[2], bytes[3])
}

/// Encodes a full instruction list, always appending a terminating
/// `Exit` so multiple programs can share one buffer distinguished only
/// by their start offset.
pub fn instructions_to_binary(instructions: &[Instruction]) -> Vec<u32> {
    let mut out = Vec::new();
    for instruction in instructions {
        instruction.encode_into(&mut out);
    }
    out.push(pack_header(OP_EXIT, 0));
    out
}

/// Reconstructs the instruction list starting at `offset`, stopping at
/// (and not including) the terminating `Exit`.
pub fn binary_to_instructions(buffer: &[u32], offset: usize) -> Result<Vec<Instruction>, InstructionError> {
    let mut instructions = Vec::new();
    let mut cursor = offset;
    loop {
        let (instruction, length) = Instruction::decode(buffer, cursor)?;
        if instruction == Instruction::Exit {
            break;
        }
        cursor += length;
        instructions.push(instruction);
    }
    Ok(instructions)
}

/// Compares two instruction lists for `instructionsEquals`: non-location
/// instructions compare structurally. Alpenglow's compiler never emits
/// zero-length label pseudo-instructions (jump targets are pre-resolved
/// to dword offsets at compile time, see `vm::compile`), so this is
/// currently plain structural equality; it is kept as a named function
/// rather than inlined `==` because that pre-resolution is exactly the
/// invariant a future label-emitting compiler change would need to
/// preserve here.
pub fn instructions_equal(a: &[Instruction], b: &[Instruction]) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_program() -> Vec<Instruction> {
        vec![
            Instruction::Push([0.1, 0.2, 0.3, 0.4]),
            Instruction::MultiplyScalar(0.5),
            Instruction::Premultiply,
            Instruction::OpaqueJump(7),
            Instruction::LinearBlendGeom { a: 1.0, b: 0.0, c: -0.5 },
            Instruction::LinearGradientSample {
                line: LineSegment2F::new(vec2f(0.0, 0.0), vec2f(1.0, 0.0)),
                stops: vec![
                    GradientStop { offset: 0.0, color: ColorU::black() },
                    GradientStop { offset: 1.0, color: ColorU::white() },
                ],
            },
        ]
    }

    #[test]
    fn round_trip_contract_holds() {
        let original = sample_program();
        let binary = instructions_to_binary(&original);
        let decoded = binary_to_instructions(&binary, 0).unwrap();
        assert!(instructions_equal(&original, &decoded));
    }

    #[test]
    fn binary_always_ends_with_exit() {
        let binary = instructions_to_binary(&sample_program());
        assert_eq!(binary.last().copied().unwrap() & 0xFF, OP_EXIT as u32);
    }

    #[test]
    fn two_programs_share_one_buffer_by_offset() {
        let first = vec![Instruction::Push([1.0, 0.0, 0.0, 1.0])];
        let second = vec![Instruction::Push([0.0, 1.0, 0.0, 1.0])];
        let mut buffer = instructions_to_binary(&first);
        let second_offset = buffer.len();
        buffer.extend(instructions_to_binary(&second));

        assert_eq!(binary_to_instructions(&buffer, 0).unwrap(), first);
        assert_eq!(binary_to_instructions(&buffer, second_offset).unwrap(), second);
    }

    #[test]
    fn fixed_band_lengths_match_opcode_low_five_bits() {
        for instruction in [
            Instruction::MultiplyScalar(1.0),
            Instruction::LinearBlendGeom { a: 0.0, b: 0.0, c: 0.0 },
            Instruction::Push([0.0; 4]),
            Instruction::RadialBlendGeom { center: vec2f(0.0, 0.0), start_radius: 0.0, end_radius: 1.0 },
            Instruction::BarycentricBlendGeom { a: vec2f(0.0, 0.0), b: vec2f(1.0, 0.0), c: vec2f(0.0, 1.0) },
        ] {
            let mut out = Vec::new();
            instruction.encode_into(&mut out);
            let opcode = (out[0] & 0xFF) as u8;
            assert_eq!(opcode & 0x1F, instruction.len_dwords() as u8);
        }
    }

    #[test]
    fn truncated_buffer_is_reported_not_panicking() {
        let err = Instruction::decode(&[OP_PUSH as u32], 0).unwrap_err();
        assert_eq!(err, InstructionError::Truncated { offset: 0, expected: 5 });
    }

    #[test]
    fn unreachable_opcode_is_reported() {
        let err = Instruction::decode(&[0x55], 0).unwrap_err();
        assert_eq!(err, InstructionError::UnreachableOpcode(0x55));
    }
}
