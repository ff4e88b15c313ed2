/*!
Enhancement-layer decoding for lcevc-rs.

This crate turns pre-parsed enhancement data into residual command buffers:
entropy decoding of the per-layer coefficient chunks, dequantization, the
inverse Hadamard transforms, the temporal prediction state machine and the
command-buffer serialization consumed by `lcevc-pixel`.

The bitstream parser itself is an upstream collaborator; this crate starts
from a populated [`GlobalConfig`] and [`FrameConfig`].

# Safety
This crate forbids unsafe code via a crate-level attribute.
*/

#![forbid(unsafe_code)]
#![allow(missing_docs)]

mod cmdbuffer;
mod config;
mod decode;
mod dequant;
mod entropy;
mod error;
mod huffman;
mod reader;
mod transform;

pub use cmdbuffer::{CmdBuffer, CmdBufferCmd, Command, EnhancementTile, EntryPoint, SegmentIter};
pub use config::{
    BitDepth, Chroma, Crop, Deblock, DequantOffsetMode, DitherType, FieldType, FrameConfig,
    GlobalConfig, HdrInfo, Kernel, LOQ_ENHANCED_COUNT, LoqIndex, MAX_LAYERS, MAX_PLANES, NalType,
    QuantMatrix, ScalingMode, SharpenType, TileDimensions, TransformType, UpscaleType,
    UserDataConfig, VuiInfo,
};
pub use decode::{TileDecodeInput, TileGeometry, decode_residuals};
pub use dequant::Dequant;
pub use entropy::{
    BITSTREAM_VERSION_CURRENT, DecoderKind, EntropyDecoder, TemporalSignal,
};
pub use error::{DecodeError, EntropyError, Result};
pub use transform::{dds_to_scanline, deblock_residuals, inverse_dd, inverse_dds};
