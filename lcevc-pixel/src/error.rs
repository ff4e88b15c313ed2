//! Error types for pixel processing.

use core::fmt;

/// Errors raised by the pixel-processing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelError {
    /// The requested fixed-point combination has no kernel.
    NotSupported,
    /// Plane geometry or arguments are inconsistent.
    InvalidParam,
}

impl fmt::Display for PixelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSupported => write!(f, "unsupported fixed-point combination"),
            Self::InvalidParam => write!(f, "invalid pixel-processing parameters"),
        }
    }
}

impl core::error::Error for PixelError {}

/// Result type for pixel-processing operations.
pub type Result<T> = core::result::Result<T, PixelError>;
