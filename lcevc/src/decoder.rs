//! The decoder: per-frame orchestration of the enhancement pipeline.
//!
//! For every plane, one frame runs
//!
//! ```text
//! LOQ1 decode -> apply to base copy -> upscale -> LOQ0 decode
//!     -> apply to temporal surface -> compose onto the output
//! ```
//!
//! Planes are independent at this layer and run as parallel jobs; tiles
//! within a plane are sequential because the entropy decoder is stateful
//! and chunks are laid out per tile. The temporal surface of a plane is
//! touched only by that plane's LOQ0 pipeline.

use rayon::prelude::*;
use smallvec::SmallVec;

use lcevc_common::Chunk;
use lcevc_enhancement::{
    Dequant, EnhancementTile, FrameConfig, GlobalConfig, LOQ_ENHANCED_COUNT, LoqIndex, MAX_PLANES,
    TileDecodeInput, TileGeometry, TileDimensions, decode_residuals,
};
use lcevc_pixel::{
    BlitMode, DitherFrame, Interleaving, IntermediateSurface, PlaneDesc, PlaneRef, UpscaleArgs,
    apply_cmdbuffer, blit, upscale_plane,
};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::picture::{Picture, PictureMut, PlanePixelsMut};

/// Tuning knobs that do not come from the bitstream.
#[derive(Debug, Clone, Copy)]
pub struct DecoderOptions {
    /// Entry points to record per command buffer, 0 to disable splitting.
    pub num_entry_points: usize,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self { num_entry_points: 0 }
    }
}

/// The chunks of one tile for one LOQ.
#[derive(Debug, Clone, Copy, Default)]
pub struct TileData<'a> {
    /// One chunk per coefficient layer, `None` when the tile has none.
    pub layers: Option<&'a [Chunk<'a>]>,
    /// The temporal signal chunk, LOQ0 only.
    pub temporal: Option<&'a Chunk<'a>>,
}

/// Everything one access unit carries into the decoder.
#[derive(Debug, Default)]
pub struct FrameData<'a> {
    pub config: FrameConfig,
    /// `tiles[plane][loq]` lists the per-tile chunk sets. Missing entries
    /// mean "no data".
    pub tiles: Vec<[Vec<TileData<'a>>; LOQ_ENHANCED_COUNT]>,
}

/// Per-plane persistent state.
#[derive(Debug, Default)]
struct PlaneState {
    /// The carried residual surfaces, LOQ0 resolution, signed 16-bit. One
    /// per interlaced field; progressive streams only touch the first.
    temporal: [Vec<i16>; 2],
    /// Working copy of the base plane residuals are applied to.
    base_work: Vec<u8>,
    /// Command buffers per LOQ, retained and reused across frames.
    tiles: [Vec<EnhancementTile>; LOQ_ENHANCED_COUNT],
    /// Scratch for the vertical upscale pass, grown monotonically.
    intermediate: IntermediateSurface,
}

/// An LCEVC enhancement decoder.
///
/// Created from a parsed [`GlobalConfig`] at an IDR; fed one [`FrameData`]
/// per access unit together with the decoded base picture, producing the
/// enhanced output picture.
#[derive(Debug)]
pub struct Decoder {
    global: GlobalConfig,
    options: DecoderOptions,
    planes: Vec<PlaneState>,
    highlight: [bool; LOQ_ENHANCED_COUNT],
    cancel: CancelToken,
    frame_count: u32,
}

impl Decoder {
    pub fn new(global: GlobalConfig) -> Result<Self> {
        Self::with_options(global, DecoderOptions::default())
    }

    pub fn with_options(global: GlobalConfig, options: DecoderOptions) -> Result<Self> {
        if global.width == 0
            || global.height == 0
            || global.num_planes == 0
            || global.num_planes > MAX_PLANES
            || global.num_layers != global.transform.layer_count()
        {
            return Err(Error::InvalidParam);
        }

        let tu_size = 1u32 << global.transform.tu_width_shift();
        let mut planes = Vec::with_capacity(global.num_planes);
        for plane_index in 0..global.num_planes {
            for loq in [LoqIndex::Loq0, LoqIndex::Loq1] {
                let (width, height) = global.plane_dimensions(plane_index, loq);
                if width % tu_size != 0 || height % tu_size != 0 {
                    return Err(Error::InvalidParam);
                }
            }

            let (width, height) = global.plane_dimensions(plane_index, LoqIndex::Loq0);
            let surface_len = (width * height) as usize;
            planes.push(PlaneState {
                temporal: [vec![0; surface_len], vec![0; surface_len]],
                ..PlaneState::default()
            });
        }

        Ok(Self {
            global,
            options,
            planes,
            highlight: [false; LOQ_ENHANCED_COUNT],
            cancel: CancelToken::new(),
            frame_count: 0,
        })
    }

    #[inline]
    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    /// The token a caller can trip to abandon the running decode.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Toggle the highlight debug visualization for one LOQ.
    pub fn set_highlight(&mut self, loq: LoqIndex, enabled: bool) {
        self.highlight[loq as usize] = enabled;
    }

    /// Decode one access unit.
    ///
    /// `base` supplies one decoded base plane per enhanced plane at LOQ1
    /// resolution; `output` receives the enhanced picture at LOQ0
    /// resolution. Both are owned by the caller for the duration of the
    /// call.
    pub fn decode_frame<'a>(
        &mut self,
        data: &FrameData<'_>,
        base: &Picture<'a>,
        output: &mut PictureMut<'a>,
    ) -> Result<()> {
        let num_planes = self.global.num_planes;
        if base.planes.len() < num_planes || output.planes.len() < num_planes {
            return Err(Error::InvalidParam);
        }

        let frame = &data.config;
        log::debug!(
            "decode frame {}: loq1={} loq0={} refresh={}",
            self.frame_count,
            frame.loq_enabled[LoqIndex::Loq1 as usize],
            frame.loq_enabled[LoqIndex::Loq0 as usize],
            frame.temporal_refresh
        );
        let dither = (frame.dither_enabled && frame.dither_strength > 0)
            .then(|| DitherFrame::new(self.frame_count, frame.dither_strength));

        let global = &self.global;
        let options = self.options;
        let highlight = self.highlight;
        let cancel = &self.cancel;

        let mut jobs: Vec<PlaneJob<'_, '_>> = Vec::with_capacity(num_planes);
        for ((plane_index, state), out) in self
            .planes
            .iter_mut()
            .enumerate()
            .zip(output.planes.iter_mut())
            .take(num_planes)
        {
            jobs.push(PlaneJob {
                plane_index,
                base: base.planes[plane_index],
                out,
                state,
                tile_data: data.tiles.get(plane_index),
            });
        }

        jobs.into_par_iter().try_for_each(|job| {
            run_plane(global, frame, options, highlight, dither, cancel, job)
        })?;

        self.frame_count = self.frame_count.wrapping_add(1);
        Ok(())
    }
}

struct PlaneJob<'a, 'b> {
    plane_index: usize,
    base: crate::picture::PlanePixels<'b>,
    out: &'a mut PlanePixelsMut<'b>,
    state: &'a mut PlaneState,
    tile_data: Option<&'a [Vec<TileData<'a>>; LOQ_ENHANCED_COUNT]>,
}

fn run_plane(
    global: &GlobalConfig,
    frame: &FrameConfig,
    options: DecoderOptions,
    highlight: [bool; LOQ_ENHANCED_COUNT],
    dither: Option<DitherFrame>,
    cancel: &CancelToken,
    job: PlaneJob<'_, '_>,
) -> Result<()> {
    let PlaneJob {
        plane_index,
        base,
        out,
        state,
        tile_data,
    } = job;

    let (loq1_width, loq1_height) = global.plane_dimensions(plane_index, LoqIndex::Loq1);
    let (loq0_width, loq0_height) = global.plane_dimensions(plane_index, LoqIndex::Loq0);
    let block_order = global.block_traversal();

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    // Residuals are applied to a working copy so the caller's base picture
    // is left untouched.
    let base_fp = base.fixed_point;
    let base_stride = loq1_width as usize * base_fp.byte_size();
    let base_bytes = base_stride * loq1_height as usize;
    if state.base_work.len() < base_bytes {
        state.base_work.resize(base_bytes, 0);
    }
    {
        let mut work = PlaneDesc::new(&mut state.base_work[..base_bytes], base_stride);
        blit(
            PlaneRef::new(base.samples, base.row_byte_stride),
            base_fp,
            &mut work,
            base_fp,
            loq1_width,
            loq1_height,
            BlitMode::Copy,
        )?;
    }

    if frame.loq_enabled[LoqIndex::Loq1 as usize] {
        let mut work = PlaneDesc::new(&mut state.base_work[..base_bytes], base_stride);
        decode_and_apply_loq(
            global,
            frame,
            options,
            &mut state.tiles[LoqIndex::Loq1 as usize],
            tile_data,
            plane_index,
            LoqIndex::Loq1,
            loq1_width,
            loq1_height,
            &mut work,
            base_fp,
            !block_order,
            highlight[LoqIndex::Loq1 as usize],
            cancel,
        )?;
    }

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    // Upscale the (possibly corrected) base up to LOQ0 resolution.
    let out_fp = out.fixed_point;
    {
        let src = PlaneRef::new(&state.base_work[..base_bytes], base_stride);
        let mut dst = PlaneDesc::new(out.samples, out.row_byte_stride);
        upscale_plane(
            src,
            &mut dst,
            &mut state.intermediate,
            loq1_width,
            loq1_height,
            &UpscaleArgs {
                mode: global.scaling_modes[LoqIndex::Loq0 as usize],
                kernel: &global.kernel,
                interleaving: Interleaving::None,
                src_fp: base_fp,
                dst_fp: out_fp,
                base_fp,
                pa_enabled: global.predicted_average_enabled,
                dither,
                plane_index,
            },
        )?;
    }

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    if global.temporal_enabled {
        let surface = &mut state.temporal[frame.field_type as usize];

        // After an IDR with temporal refresh the surface is zero before
        // any residual lands on it.
        if frame.temporal_refresh {
            surface.fill(0);
        }

        let temporal_fp = out_fp.high_precision();
        let temporal_stride = loq0_width as usize * 2;

        if frame.loq_enabled[LoqIndex::Loq0 as usize] {
            let bytes: &mut [u8] = bytemuck::cast_slice_mut(surface.as_mut_slice());
            let mut target = PlaneDesc::new(bytes, temporal_stride);
            decode_and_apply_loq(
                global,
                frame,
                options,
                &mut state.tiles[LoqIndex::Loq0 as usize],
                tile_data,
                plane_index,
                LoqIndex::Loq0,
                loq0_width,
                loq0_height,
                &mut target,
                temporal_fp,
                false,
                highlight[LoqIndex::Loq0 as usize],
                cancel,
            )?;
        }

        // Compose the carried surface onto the upscaled picture.
        let bytes: &[u8] = bytemuck::cast_slice(state.temporal[frame.field_type as usize].as_slice());
        let mut dst = PlaneDesc::new(out.samples, out.row_byte_stride);
        blit(
            PlaneRef::new(bytes, temporal_stride),
            temporal_fp,
            &mut dst,
            out_fp,
            loq0_width,
            loq0_height,
            BlitMode::Add,
        )?;
    } else if frame.loq_enabled[LoqIndex::Loq0 as usize] {
        let mut dst = PlaneDesc::new(out.samples, out.row_byte_stride);
        decode_and_apply_loq(
            global,
            frame,
            options,
            &mut state.tiles[LoqIndex::Loq0 as usize],
            tile_data,
            plane_index,
            LoqIndex::Loq0,
            loq0_width,
            loq0_height,
            &mut dst,
            out_fp,
            !block_order,
            highlight[LoqIndex::Loq0 as usize],
            cancel,
        )?;
    }

    Ok(())
}

/// Decode every tile of one LOQ and replay the command buffers onto the
/// target plane.
#[allow(clippy::too_many_arguments)]
fn decode_and_apply_loq(
    global: &GlobalConfig,
    frame: &FrameConfig,
    options: DecoderOptions,
    tiles: &mut Vec<EnhancementTile>,
    tile_data: Option<&[Vec<TileData<'_>>; LOQ_ENHANCED_COUNT]>,
    plane_index: usize,
    loq: LoqIndex,
    width: u32,
    height: u32,
    target: &mut PlaneDesc<'_>,
    target_fp: lcevc_common::FixedPoint,
    surface_order: bool,
    highlight: bool,
    cancel: &CancelToken,
) -> Result<()> {
    let dequant = Dequant::new(global, frame, plane_index, loq);
    let grid = tile_grid(global, plane_index, width, height);

    if tiles.len() < grid.len() {
        tiles.resize_with(grid.len(), EnhancementTile::default);
    }

    for (tile_index, geometry) in grid.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let chunk_set = tile_data
            .map(|per_loq| &per_loq[loq as usize])
            .and_then(|list| list.get(tile_index))
            .copied()
            .unwrap_or_default();

        let tile = &mut tiles[tile_index];
        tile.tile_x = geometry.x;
        tile.tile_y = geometry.y;
        tile.tile_width = geometry.width;
        tile.tile_height = geometry.height;
        tile.plane_width = width;
        tile.plane_height = height;

        decode_residuals(
            global,
            frame,
            &dequant,
            &TileDecodeInput {
                chunks: chunk_set.layers,
                temporal_chunk: chunk_set.temporal,
                geometry: *geometry,
                plane_index,
                loq,
                num_entry_points: options.num_entry_points,
            },
            &mut tile.buffer,
        )?;

        for segment in 0..tile.buffer.num_segments() {
            apply_cmdbuffer(tile, segment, target, target_fp, surface_order, highlight)?;
        }
    }

    Ok(())
}

/// The tile geometries covering one plane at one LOQ.
fn tile_grid(
    global: &GlobalConfig,
    plane_index: usize,
    width: u32,
    height: u32,
) -> SmallVec<[TileGeometry; 4]> {
    let mut grid = SmallVec::new();

    let (tile_width, tile_height) = match global.tile_dimensions {
        TileDimensions::None => (width, height),
        _ => (
            u32::from(global.tile_width[plane_index]).max(1),
            u32::from(global.tile_height[plane_index]).max(1),
        ),
    };

    let mut y = 0;
    while y < height {
        let mut x = 0;
        while x < width {
            grid.push(TileGeometry {
                x,
                y,
                width: tile_width.min(width - x),
                height: tile_height.min(height - y),
            });
            x += tile_width;
        }
        y += tile_height;
    }

    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use lcevc_enhancement::TransformType;

    #[test]
    fn tile_grid_covers_the_plane() {
        let global = GlobalConfig {
            width: 100,
            height: 60,
            tile_dimensions: TileDimensions::Custom,
            tile_width: [64; MAX_PLANES],
            tile_height: [32; MAX_PLANES],
            ..GlobalConfig::default()
        };

        let grid = tile_grid(&global, 0, 100, 60);
        assert_eq!(grid.len(), 4);
        assert_eq!(grid[0].width, 64);
        assert_eq!(grid[1].width, 36);
        assert_eq!(grid[2].height, 28);

        let area: u32 = grid.iter().map(|t| t.width * t.height).sum();
        assert_eq!(area, 100 * 60);
    }

    #[test]
    fn misaligned_dimensions_are_rejected_up_front() {
        let global = GlobalConfig {
            width: 98,
            height: 50,
            num_planes: 1,
            transform: TransformType::Dds,
            num_layers: 16,
            ..GlobalConfig::default()
        };
        // 98 / 2 = 49 is not a multiple of the DDS TU size.
        assert_eq!(Decoder::new(global).unwrap_err(), Error::InvalidParam);
    }
}
