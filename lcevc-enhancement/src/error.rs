//! Error types for enhancement-layer decoding.

use core::fmt;

use lcevc_common::GeometryError;

/// The main error type for enhancement decoding operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Errors in the entropy-coded layer data.
    Entropy(EntropyError),
    /// Errors in surface traversal setup.
    Geometry(GeometryError),
    /// A decoded temporal run had an invalid length.
    InvalidTemporalRun,
    /// Configuration fields are inconsistent with the coded data.
    InvalidConfig,
}

/// Errors raised while decoding an entropy-coded chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyError {
    /// The chunk ended in the middle of a record.
    Truncated,
    /// A prefix code did not match any table entry.
    InvalidCode,
    /// The signalled code table is malformed.
    InvalidTable,
    /// A decoded run or coefficient is out of range.
    InvalidValue,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entropy(e) => write!(f, "{e}"),
            Self::Geometry(e) => write!(f, "{e}"),
            Self::InvalidTemporalRun => write!(f, "invalid temporal run length"),
            Self::InvalidConfig => write!(f, "inconsistent enhancement configuration"),
        }
    }
}

impl fmt::Display for EntropyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "chunk truncated mid-record"),
            Self::InvalidCode => write!(f, "invalid prefix code"),
            Self::InvalidTable => write!(f, "malformed code table"),
            Self::InvalidValue => write!(f, "decoded value out of range"),
        }
    }
}

impl core::error::Error for DecodeError {}
impl core::error::Error for EntropyError {}

impl From<EntropyError> for DecodeError {
    fn from(e: EntropyError) -> Self {
        Self::Entropy(e)
    }
}

impl From<GeometryError> for DecodeError {
    fn from(e: GeometryError) -> Self {
        Self::Geometry(e)
    }
}

/// Result type for enhancement decoding operations.
pub type Result<T> = core::result::Result<T, DecodeError>;
