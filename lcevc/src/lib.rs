/*!
An LCEVC (MPEG-5 Part 2) enhancement decoder core in pure Rust.

`lcevc` takes a stream of already-decoded base pictures plus pre-parsed
enhancement data and produces enhanced output pictures by applying residual
corrections: entropy decoding, dequantization and inverse Hadamard
transforms, the temporal prediction surface, command-buffer application and
convolution upscaling.

The bitstream parser and the base video decoder are external collaborators:
this crate starts from a populated [`GlobalConfig`] / [`FrameConfig`] pair
and the raw chunk byte ranges.

# Example

```rust,no_run
use lcevc::{Decoder, FrameData, GlobalConfig, Picture, PictureMut};

let global = GlobalConfig { width: 1920, height: 1080, ..GlobalConfig::default() };
let mut decoder = Decoder::new(global).unwrap();

let data = FrameData::default();
let base = Picture::default();
let mut output = PictureMut::default();
decoder.decode_frame(&data, &base, &mut output).unwrap();
```
*/

#![forbid(unsafe_code)]
#![allow(missing_docs)]

mod cancel;
mod decoder;
mod error;
mod picture;

pub use cancel::CancelToken;
pub use decoder::{Decoder, DecoderOptions, FrameData, TileData};
pub use error::{Error, Result};
pub use picture::{Picture, PictureMut, PlaneBuffer, PlanePixels, PlanePixelsMut};

// The configuration and chunk types cross the decoder boundary; re-export
// them so integrations need only this crate.
pub use lcevc_common::{Chunk, FixedPoint};
pub use lcevc_enhancement::{
    BitDepth, Chroma, Deblock, DequantOffsetMode, DitherType, FieldType, FrameConfig, GlobalConfig,
    Kernel, LoqIndex, NalType, QuantMatrix, ScalingMode, TileDimensions, TransformType, UpscaleType,
};
