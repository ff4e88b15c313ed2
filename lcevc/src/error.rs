//! The public error type of the decoder.

use core::fmt;

use lcevc_enhancement::DecodeError;
use lcevc_pixel::PixelError;

/// Errors surfaced across the decoder boundary.
///
/// No panic crosses this boundary; every fallible operation reports through
/// this type. Saturation during residual application is defined behaviour,
/// not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The decoder has not been configured.
    Uninitialized,
    /// Arguments or configuration are inconsistent.
    InvalidParam,
    /// The requested format combination has no implementation.
    NotSupported,
    /// The coded data is corrupt; the frame is abandoned. The decoder
    /// remains usable from the next IDR.
    Corrupt(DecodeError),
    /// The current frame was abandoned by a cancellation signal.
    Cancelled,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "decoder not initialized"),
            Self::InvalidParam => write!(f, "invalid parameter"),
            Self::NotSupported => write!(f, "unsupported configuration"),
            Self::Corrupt(e) => write!(f, "corrupt enhancement data: {e}"),
            Self::Cancelled => write!(f, "decode cancelled"),
        }
    }
}

impl core::error::Error for Error {}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        match e {
            // Misconfiguration is caller-visible before any bitstream blame.
            DecodeError::InvalidConfig | DecodeError::Geometry(_) => Self::InvalidParam,
            other => Self::Corrupt(other),
        }
    }
}

impl From<PixelError> for Error {
    fn from(e: PixelError) -> Self {
        match e {
            PixelError::NotSupported => Self::NotSupported,
            PixelError::InvalidParam => Self::InvalidParam,
        }
    }
}

/// Result type of decoder operations.
pub type Result<T> = core::result::Result<T, Error>;
