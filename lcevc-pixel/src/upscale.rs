//! Convolution upscaling.
//!
//! Each input sample produces two output samples via a two-phase kernel: an
//! off-pixel convolution where the even output comes from the reverse-phase
//! taps and the odd output from the forward-phase taps over the window
//! advanced by one. Plane edges repeat the boundary sample. Results carry a
//! 2^14 gain, removed with rounding and saturated to 15 bits before the
//! optional predicted-average correction, dithering and the final store.
//!
//! 2D mode runs the vertical pass into an intermediate surface first (two
//! output rows per input row), then the horizontal pass; 1D mode is
//! horizontal only; 0D passes through.
//!
//! The predicted average restores the mean of the pre-upscale base sample:
//! with output pair (a, b) (and (c, d) on the second row in 2D mode),
//! `avg = base - (a + b + 1) / 2` in 1D and
//! `avg = base - (a + b + c + d + 2) / 4` in 2D, added to every sample of
//! the pair.

use rayon::prelude::*;

use lcevc_common::FixedPoint;
use lcevc_common::fixed_point::saturate_i15;
use lcevc_enhancement::{Kernel, ScalingMode};

use crate::blit::{BlitMode, blit};
use crate::dither::{DitherFrame, DitherSlice};
use crate::error::{PixelError, Result};
use crate::plane::{PlaneDesc, PlaneRef, rows};

const SHIFT: u32 = 14;
const ROUNDING: i32 = 1 << (SHIFT - 1);

/// Sample interleaving of a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interleaving {
    /// Planar surface.
    None,
    /// YUV422 as YUYV.
    Yuyv,
    /// The interleaved UV plane of NV12.
    Nv12,
    /// YUV422 as UYVY.
    Uyvy,
    /// Interleaved RGB channels.
    Rgb,
    /// Interleaved RGBA channels.
    Rgba,
}

/// Per-interleaving channel tables.
///
/// `skip` is the sample stride of each channel within a row; `map` folds one
/// interleave slot onto another channel's state, used for YUYV/UYVY where
/// the second luma slot is the first luma channel advanced by one.
#[derive(Debug, Clone, Copy)]
struct ChannelLayout {
    count: usize,
    skip: [usize; 4],
    map: [usize; 4],
}

impl Interleaving {
    fn layout(self) -> ChannelLayout {
        match self {
            Self::None => ChannelLayout {
                count: 1,
                skip: [1; 4],
                map: [0, 1, 2, 3],
            },
            Self::Nv12 => ChannelLayout {
                count: 2,
                skip: [2, 2, 2, 2],
                map: [0, 1, 2, 3],
            },
            Self::Yuyv => ChannelLayout {
                count: 4,
                skip: [2, 4, 2, 4],
                map: [0, 1, 0, 3],
            },
            Self::Uyvy => ChannelLayout {
                count: 4,
                skip: [4, 2, 4, 2],
                map: [0, 1, 2, 1],
            },
            Self::Rgb => ChannelLayout {
                count: 3,
                skip: [3, 3, 3, 3],
                map: [0, 1, 2, 3],
            },
            Self::Rgba => ChannelLayout {
                count: 4,
                skip: [4, 4, 4, 4],
                map: [0, 1, 2, 3],
            },
        }
    }
}

/// Load-time conversion of a sample into the destination domain.
#[derive(Debug, Clone, Copy)]
struct Promotion {
    shift: u32,
    offset: i32,
}

impl Promotion {
    const IDENTITY: Self = Self {
        shift: 0,
        offset: 0,
    };

    #[inline(always)]
    fn apply(self, value: i32) -> i32 {
        (value << self.shift) + self.offset
    }
}

/// The promotion from `src_fp` samples into the `dst_fp` domain.
///
/// Demotions are not supported, nor are sign crossings other than an
/// unsigned format promoting into its own signed twin.
fn promotion(src_fp: FixedPoint, dst_fp: FixedPoint) -> Result<Promotion> {
    if src_fp == dst_fp {
        return Ok(Promotion::IDENTITY);
    }

    match (src_fp.is_signed(), dst_fp.is_signed()) {
        (false, false) => {
            let src_bits = src_fp.bit_depth();
            let dst_bits = dst_fp.bit_depth();
            if dst_bits < src_bits {
                return Err(PixelError::NotSupported);
            }
            Ok(Promotion {
                shift: dst_bits - src_bits,
                offset: 0,
            })
        }
        (false, true) if dst_fp.low_precision() == src_fp => Ok(Promotion {
            shift: src_fp.radix_shift(),
            offset: -16384,
        }),
        _ => Err(PixelError::NotSupported),
    }
}

/// Upscale parameters for one plane.
#[derive(Debug)]
pub struct UpscaleArgs<'a> {
    pub mode: ScalingMode,
    pub kernel: &'a Kernel,
    pub interleaving: Interleaving,
    pub src_fp: FixedPoint,
    pub dst_fp: FixedPoint,
    /// Format of the plane the predicted average reads, normally `src_fp`.
    pub base_fp: FixedPoint,
    pub pa_enabled: bool,
    pub dither: Option<DitherFrame>,
    pub plane_index: usize,
}

/// Scratch surface for the vertical pass of 2D upscaling.
///
/// Grown on demand and never shrunk, so steady-state decoding does not
/// allocate.
#[derive(Debug, Default)]
pub struct IntermediateSurface {
    data: Vec<u8>,
    row_byte_stride: usize,
}

impl IntermediateSurface {
    fn ensure(&mut self, row_bytes: usize, row_count: usize) {
        self.row_byte_stride = row_bytes;
        let needed = row_bytes * row_count;
        if self.data.len() < needed {
            self.data.resize(needed, 0);
        }
    }
}

/// Upscale one plane of `src_width x src_height` pixels.
///
/// The destination must hold twice the width (1D/2D) and twice the height
/// (2D) in the destination fixed-point type.
pub fn upscale_plane(
    src: PlaneRef<'_>,
    dst: &mut PlaneDesc<'_>,
    intermediate: &mut IntermediateSurface,
    src_width: u32,
    src_height: u32,
    args: &UpscaleArgs<'_>,
) -> Result<()> {
    if args.mode == ScalingMode::None {
        let layout = args.interleaving.layout();
        return blit(
            src,
            args.src_fp,
            dst,
            args.dst_fp,
            src_width * layout.count as u32,
            src_height,
            BlitMode::Copy,
        );
    }

    if !matches!(args.kernel.length, 2 | 4 | 6 | 8) {
        log::warn!("unsupported upscale kernel length {}", args.kernel.length);
        return Err(PixelError::InvalidParam);
    }

    let layout = args.interleaving.layout();
    let conv = promotion(args.src_fp, args.dst_fp)?;
    let base_conv = promotion(args.base_fp, args.dst_fp)?;

    match args.mode {
        ScalingMode::None => unreachable!(),
        ScalingMode::OneD => {
            horizontal_pass(
                src,
                args.src_fp,
                conv,
                dst,
                src,
                base_conv,
                src_width,
                src_height,
                layout,
                args,
                false,
            );
            Ok(())
        }
        ScalingMode::TwoD => {
            let samples_per_row = 2 * src_width as usize * layout.count;
            let row_bytes = samples_per_row * args.dst_fp.byte_size();
            intermediate.ensure(row_bytes, 2 * src_height as usize);

            vertical_pass(
                src,
                args.src_fp,
                conv,
                intermediate,
                args.dst_fp,
                src_width as usize * layout.count,
                src_height,
                args.kernel,
            );

            let mid = PlaneRef::new(&intermediate.data, intermediate.row_byte_stride);
            horizontal_pass(
                mid,
                args.dst_fp,
                Promotion::IDENTITY,
                dst,
                src,
                base_conv,
                src_width,
                2 * src_height,
                layout,
                args,
                true,
            );
            Ok(())
        }
    }
}

/// The vertical pass: every input row becomes two intermediate rows, the
/// even from the reverse phase and the odd from the forward phase.
fn vertical_pass(
    src: PlaneRef<'_>,
    src_fp: FixedPoint,
    conv: Promotion,
    intermediate: &mut IntermediateSurface,
    dst_fp: FixedPoint,
    width_samples: usize,
    src_height: u32,
    kernel: &Kernel,
) {
    let stride = intermediate.row_byte_stride;
    let length = kernel.length as i32;
    let half = length / 2;

    intermediate
        .data
        .par_chunks_mut(2 * stride)
        .take(src_height as usize)
        .enumerate()
        .for_each(|(y, out_pair)| {
            let (out0, rest) = out_pair.split_at_mut(stride);
            let out1_len = stride.min(rest.len());
            let out1 = &mut rest[..out1_len];
            let y = y as i32;

            let row_at =
                |offset: i32| src.row(offset.clamp(0, src_height as i32 - 1) as u32);

            for x in 0..width_samples {
                let mut pels = [0i32; 8];
                for (i, pel) in pels.iter_mut().take(kernel.length).enumerate() {
                    *pel = conv.apply(rows::load(row_at(y - half + i as i32), x, src_fp));
                }

                let mut reverse = 0i32;
                for i in 0..kernel.length {
                    reverse += i32::from(kernel.reverse[i]) * pels[i];
                }

                // Advance one row past the reverse window for the forward
                // phase; the convolution sits between pixels.
                pels.copy_within(1..kernel.length, 0);
                pels[kernel.length - 1] =
                    conv.apply(rows::load(row_at(y - half + length), x, src_fp));

                let mut forward = 0i32;
                for i in 0..kernel.length {
                    forward += i32::from(kernel.forward[i]) * pels[i];
                }

                rows::store(out0, x, dst_fp, shift_saturate(reverse));
                rows::store(out1, x, dst_fp, shift_saturate(forward));
            }
        });
}

/// The horizontal pass over all rows, two at a time.
fn horizontal_pass(
    input: PlaneRef<'_>,
    input_fp: FixedPoint,
    conv: Promotion,
    dst: &mut PlaneDesc<'_>,
    base: PlaneRef<'_>,
    base_conv: Promotion,
    src_width: u32,
    row_count: u32,
    layout: ChannelLayout,
    args: &UpscaleArgs<'_>,
    two_d: bool,
) {
    let dst_stride = dst.row_byte_stride();

    dst.bytes_mut()
        .par_chunks_mut(2 * dst_stride)
        .take(row_count.div_ceil(2) as usize)
        .enumerate()
        .for_each(|(pair, chunk)| {
            let y = 2 * pair as u32;
            let (row0, rest) = chunk.split_at_mut(dst_stride.min(chunk.len()));
            let row1 = if y + 1 < row_count && !rest.is_empty() {
                let row1_len = dst_stride.min(rest.len());
                Some(&mut rest[..row1_len])
            } else {
                None
            };

            let src0 = input.row(y);
            let src1 = input.row((y + 1).min(row_count - 1));

            let pa = if !args.pa_enabled {
                PaBase::Off
            } else if two_d {
                PaBase::TwoD(base.row(y >> 1))
            } else {
                PaBase::OneD([base.row(y), base.row((y + 1).min(row_count - 1))])
            };

            let mut dither = args
                .dither
                .as_ref()
                .map(|frame| frame.slice(args.plane_index, y));

            horizontal_rows(
                [src0, src1],
                input_fp,
                conv,
                row0,
                row1,
                args.dst_fp,
                pa,
                args.base_fp,
                base_conv,
                src_width,
                layout,
                args.kernel,
                dither.as_mut(),
            );
        });
}

/// Predicted-average source rows for one output row pair.
enum PaBase<'a> {
    Off,
    /// 1D: each row corrects against its own source row.
    OneD([&'a [u8]; 2]),
    /// 2D: both rows correct against the shared pre-upscale row.
    TwoD(&'a [u8]),
}

/// Upscale two rows horizontally across all interleaved channels.
#[allow(clippy::too_many_arguments)]
fn horizontal_rows(
    src_rows: [&[u8]; 2],
    src_fp: FixedPoint,
    conv: Promotion,
    dst_row0: &mut [u8],
    mut dst_row1: Option<&mut [u8]>,
    dst_fp: FixedPoint,
    pa: PaBase<'_>,
    base_fp: FixedPoint,
    base_conv: Promotion,
    width: u32,
    layout: ChannelLayout,
    kernel: &Kernel,
    mut dither: Option<&mut DitherSlice>,
) {
    let length = kernel.length;
    let half = (length / 2) as i32;
    let count = layout.count;

    // Convolution windows: [channel][row][tap].
    let mut pels = [[[0i32; 8]; 2]; 4];
    let mut channel_width = [0i32; 4];
    let mut load_offset = [-half; 4];
    let mut store_offset = [0usize, 1, 2, 3];
    let mut base_index = 0usize;

    // Prime the windows. Mapped slots (YUYV/UYVY second luma) share the
    // primary channel's window and skip the initial load.
    for channel_idx in 0..count {
        let channel = layout.map[channel_idx];
        if channel == channel_idx {
            let skip = layout.skip[channel];
            channel_width[channel] = (width as usize * (count / skip)) as i32;

            for row in 0..2 {
                get_pels(
                    src_rows[row],
                    src_fp,
                    conv,
                    channel_idx,
                    skip,
                    channel_width[channel],
                    load_offset[channel],
                    &mut pels[channel][row],
                    length,
                );
            }
            load_offset[channel] += 1;
        }
    }

    for _x in 0..width {
        for channel_idx in 0..count {
            let channel = layout.map[channel_idx];
            let skip = layout.skip[channel];
            let local_width = channel_width[channel];

            let mut values = [0i32; 4];
            for i in 0..length {
                values[0] += i32::from(kernel.reverse[i]) * pels[channel][0][i];
                values[2] += i32::from(kernel.reverse[i]) * pels[channel][1][i];
            }

            // Advance past the reverse window; the convolution is off-pixel.
            // Mapped slots continue the primary channel's sample stream, so
            // the load base is the primary channel index.
            for row in 0..2 {
                next_pel(
                    src_rows[row],
                    src_fp,
                    conv,
                    channel,
                    skip,
                    local_width,
                    load_offset[channel],
                    &mut pels[channel][row],
                    length,
                );
            }

            for i in 0..length {
                values[1] += i32::from(kernel.forward[i]) * pels[channel][0][i];
                values[3] += i32::from(kernel.forward[i]) * pels[channel][1][i];
            }

            for value in &mut values {
                *value = shift_saturate(*value);
            }

            match &pa {
                PaBase::OneD(base_rows) => {
                    let base0 = base_conv.apply(rows::load(base_rows[0], base_index, base_fp));
                    let base1 = base_conv.apply(rows::load(base_rows[1], base_index, base_fp));
                    let avg0 = base0 - ((values[0] + values[1] + 1) >> 1);
                    let avg1 = base1 - ((values[2] + values[3] + 1) >> 1);
                    values[0] += avg0;
                    values[1] += avg0;
                    values[2] += avg1;
                    values[3] += avg1;
                    base_index += 1;
                }
                PaBase::TwoD(base_row) => {
                    let base_value = base_conv.apply(rows::load(base_row, base_index, base_fp));
                    let avg =
                        base_value - ((values[0] + values[1] + values[2] + values[3] + 2) >> 2);
                    for value in &mut values {
                        *value += avg;
                    }
                    base_index += 1;
                }
                PaBase::Off => {}
            }

            if let Some(noise) = dither.as_deref_mut() {
                for value in &mut values {
                    *value += noise.next(dst_fp);
                }
            }

            let store = store_offset[channel];
            rows::store(dst_row0, store, dst_fp, values[0]);
            rows::store(dst_row0, store + skip, dst_fp, values[1]);
            if let Some(row1) = dst_row1.as_deref_mut() {
                rows::store(row1, store, dst_fp, values[2]);
                rows::store(row1, store + skip, dst_fp, values[3]);
            }

            store_offset[channel] += skip * 2;
            load_offset[channel] += 1;
        }
    }
}

#[inline(always)]
fn shift_saturate(value: i32) -> i32 {
    i32::from(saturate_i15((value + ROUNDING) >> SHIFT))
}

/// Fill a convolution window, repeating the boundary samples.
#[inline]
fn get_pels(
    row: &[u8],
    fp: FixedPoint,
    conv: Promotion,
    channel_base: usize,
    skip: usize,
    size: i32,
    offset: i32,
    pels: &mut [i32; 8],
    length: usize,
) {
    for (i, pel) in pels.iter_mut().take(length).enumerate() {
        let index = (offset + i as i32).clamp(0, size - 1) as usize;
        *pel = conv.apply(rows::load(row, channel_base + index * skip, fp));
    }
}

/// Slide a window one sample to the right.
#[inline]
fn next_pel(
    row: &[u8],
    fp: FixedPoint,
    conv: Promotion,
    channel_base: usize,
    skip: usize,
    size: i32,
    offset: i32,
    pels: &mut [i32; 8],
    length: usize,
) {
    pels.copy_within(1..length, 0);
    let index = (offset + length as i32 - 1).clamp(0, size - 1) as usize;
    pels[length - 1] = conv.apply(rows::load(row, channel_base + index * skip, fp));
}
