//! Error types for the shared leaf layer.

use core::fmt;

/// Errors raised when setting up or traversing transform-unit geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    /// Plane width is not a multiple of the transform size.
    UnalignedWidth,
    /// Plane height is not a multiple of the transform size.
    UnalignedHeight,
    /// A transform-unit index lies beyond the end of the surface.
    IndexOutOfRange,
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnalignedWidth => write!(f, "plane width is not a multiple of the TU size"),
            Self::UnalignedHeight => write!(f, "plane height is not a multiple of the TU size"),
            Self::IndexOutOfRange => write!(f, "transform unit index out of range"),
        }
    }
}

impl core::error::Error for GeometryError {}
