/*!
Pixel processing for lcevc-rs.

This crate applies decoded residual command buffers to picture planes,
copies and composes planes across fixed-point formats, and performs the
convolution upscaling between the two enhancement levels of quality,
including the predicted-average correction and dithering.

All kernels here are scalar and allocation-free on the hot path; callers
own the plane memory for the duration of each call.
*/

#![forbid(unsafe_code)]
#![allow(missing_docs)]

mod apply;
mod blit;
mod dither;
mod error;
mod plane;
mod upscale;

pub use apply::apply_cmdbuffer;
pub use blit::{BlitMode, blit};
pub use dither::{DitherFrame, DitherSlice};
pub use error::{PixelError, Result};
pub use plane::{PlaneDesc, PlaneRef};
pub use upscale::{Interleaving, IntermediateSurface, UpscaleArgs, upscale_plane};
