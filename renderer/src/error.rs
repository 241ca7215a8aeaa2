// alpenglow/renderer/src/error.rs
//
// Copyright © 2024 The Alpenglow Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The typed error surface the top-level `rasterize`/`partition_renderable_faces`
//! calls return. Usage errors (bad options) and data errors (a geometry
//! invariant broken mid-pipeline) both propagate here; numerical
//! degeneracies never do — those are recovered locally per spec.md §7.

use alpenglow_geometry::rational::Rational2;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum AlpenglowError {
    /// An invalid `RasterizeOptions` field or combination, caught by
    /// `RasterizeOptions::validate` before any geometry work begins.
    #[error("invalid option `{field}`: {reason}")]
    Usage { field: &'static str, reason: String },

    /// The half-edge filter-and-connect pass found a vertex of odd total
    /// degree, meaning the intersection pass produced an inconsistent
    /// edge set.
    #[error("odd-degree vertex after half-edge filtering at {0:?}")]
    OddDegreeVertex(Box<Rational2>),

    /// An exact-rational intermediate product or sum overflowed 64 bits.
    #[error("rational overflow during {0}")]
    Overflow(&'static str),

    /// The instruction decoder encountered a dword whose opcode byte has
    /// no entry in the opcode table.
    #[error("unreachable opcode 0x{0:02x} in instruction decoder")]
    UnreachableOpcode(u8),

    #[error(transparent)]
    Instruction(#[from] alpenglow_content::InstructionError),

    #[error(transparent)]
    Compile(#[from] alpenglow_content::CompileError),
}

pub type Result<T> = std::result::Result<T, AlpenglowError>;
