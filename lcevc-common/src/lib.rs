/*!
Shared leaf types for the lcevc-rs decoder crates.

This crate holds the types that every other layer of the decoder needs but
that carry no behaviour of their own beyond pure arithmetic: the fixed-point
sample formats, the entropy-coded chunk descriptor and the transform-unit
geometry used to traverse residual surfaces.

# Safety
This crate forbids unsafe code via a crate-level attribute.
*/

#![forbid(unsafe_code)]
#![allow(missing_docs)]

mod chunk;
mod error;
pub mod fixed_point;
mod geometry;

pub use chunk::Chunk;
pub use error::GeometryError;
pub use fixed_point::FixedPoint;
pub use geometry::{BLOCK_SIZE, BLOCK_SIZE_SHIFT, TuCoords, TuState};
