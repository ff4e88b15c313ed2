//! The residual decode loop.
//!
//! One invocation decodes every coefficient layer of one tile at one LOQ and
//! serializes the result into the tile's command buffer. The loop threads
//! three coupled pieces of integer state:
//!
//! - a zero run per layer, fast-forwarded collectively by their common
//!   minimum;
//! - the temporal signal run, a separate stream that says whether residuals
//!   add onto or overwrite the carried temporal surface;
//! - the reduced-signalling block-clear queue, which converts an Intra run
//!   that lands on a block start into whole-block clears.
//!
//! Layers must be decoded together because the zero-run RLE couples them:
//! the loop can only skip transforms that every layer agrees are zero (and
//! that the temporal stream does not need written anyway).

use lcevc_common::{Chunk, TuCoords, TuState};
use smallvec::SmallVec;

use crate::cmdbuffer::{CmdBuffer, CmdBufferCmd};
use crate::config::{FrameConfig, GlobalConfig, LoqIndex, MAX_LAYERS, TransformType, UserDataConfig};
use crate::dequant::Dequant;
use crate::entropy::{DecoderKind, EntropyDecoder, TemporalSignal};
use crate::error::{DecodeError, Result};
use crate::transform::{dds_to_scanline, deblock_residuals, inverse_dd, inverse_dds};

/// Position and size of a tile within its plane.
#[derive(Debug, Clone, Copy)]
pub struct TileGeometry {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Inputs for decoding one tile at one LOQ.
#[derive(Debug)]
pub struct TileDecodeInput<'a> {
    /// One chunk per coefficient layer, or `None` when the tile carries no
    /// residual data at all.
    pub chunks: Option<&'a [Chunk<'a>]>,
    /// The temporal signal chunk, present only on LOQ-0 of temporal streams.
    pub temporal_chunk: Option<&'a Chunk<'a>>,
    pub geometry: TileGeometry,
    pub plane_index: usize,
    pub loq: LoqIndex,
    /// Entry points to record for parallel application, 0 for none.
    pub num_entry_points: usize,
}

/// Decode one tile's residuals into `buffer`.
///
/// The buffer is reset first and afterwards holds the full command stream
/// for the tile, with jumps in block-aligned index space when temporal
/// prediction or tiling is active and in surface index space otherwise.
pub fn decode_residuals(
    global: &GlobalConfig,
    frame: &FrameConfig,
    dequant: &Dequant,
    input: &TileDecodeInput<'_>,
    buffer: &mut CmdBuffer,
) -> Result<()> {
    let transform = global.transform;
    let num_layers = global.num_layers;
    let dds = transform == TransformType::Dds;
    let geometry = &input.geometry;

    let tu = TuState::new(
        geometry.width,
        geometry.height,
        geometry.x,
        geometry.y,
        transform.tu_width_shift(),
    )?;
    let block_mode = global.block_traversal();

    buffer.reset(transform);

    let mut decoders: SmallVec<[EntropyDecoder<'_>; MAX_LAYERS]> = SmallVec::new();
    if let Some(chunks) = input.chunks {
        if chunks.len() < num_layers {
            return Err(DecodeError::InvalidConfig);
        }
        for chunk in &chunks[..num_layers] {
            decoders.push(EntropyDecoder::new(
                chunk,
                DecoderKind::Residual,
                global.bitstream_version,
            )?);
        }
    }

    let apply_temporal = input.loq == LoqIndex::Loq0 && global.temporal_enabled;
    let mut temporal_decoder = match input.temporal_chunk {
        Some(chunk) if apply_temporal => Some(EntropyDecoder::new(
            chunk,
            DecoderKind::Temporal,
            global.bitstream_version,
        )?),
        _ => None,
    };
    let temporal_active = temporal_decoder.is_some();

    let mut coeffs = [0i16; MAX_LAYERS];
    let mut layer_run = [0u32; MAX_LAYERS];
    let mut temporal = TemporalSignal::Inter;
    // TUs after the current one still covered by `temporal`.
    let mut temporal_run = 0u32;
    // Set from the first block-start Intra of a run until its region ends.
    let mut in_cleared_region = false;
    // Whole-block clears still owed at upcoming block starts.
    let mut clear_block_queue = 0u32;

    let mut tu_index = 0u32;
    let mut last_index = 0u32;
    let mut splits_done = 0usize;

    while tu_index < tu.tu_total {
        let (x, y) = coords(&tu, tu_index, block_mode)?;

        // Entry-point boundaries are spread evenly over the TU space.
        if input.num_entry_points > 0 {
            while splits_done + 1 < input.num_entry_points
                && u64::from(tu_index) * input.num_entry_points as u64
                    >= u64::from(tu.tu_total) * (splits_done as u64 + 1)
            {
                buffer.split();
                splits_done += 1;
            }
        }

        // Run down the zero run of every layer, decoding where one expired.
        let mut min_zero = u32::MAX;
        for i in 0..num_layers {
            if layer_run[i] > 0 {
                layer_run[i] -= 1;
                coeffs[i] = 0;
            } else if !decoders.is_empty() {
                match decoders[i].decode().map_err(DecodeError::from)? {
                    Some((coeff, run)) => {
                        coeffs[i] = coeff;
                        layer_run[i] = run;
                    }
                    None => {
                        // End of the layer: an implicit zero run to the end
                        // of the surface.
                        coeffs[i] = 0;
                        layer_run[i] = tu.tu_total - 1;
                    }
                }
            } else {
                coeffs[i] = 0;
                layer_run[i] = tu.tu_total - 1;
            }
            min_zero = min_zero.min(layer_run[i]);
        }

        strip_user_data(input.loq, &global.user_data, &mut coeffs);

        let mut cleared_block = false;
        if temporal_active {
            if temporal_run > 0 || clear_block_queue > 0 {
                temporal_run = temporal_run.saturating_sub(1);
            } else {
                match temporal_decoder
                    .as_mut()
                    .expect("temporal_active implies a decoder")
                    .decode_temporal()
                    .map_err(DecodeError::from)?
                {
                    Some((signal, run)) => {
                        if run == 0 {
                            return Err(DecodeError::InvalidTemporalRun);
                        }
                        // The run includes the current symbol; track only
                        // what follows it.
                        temporal = signal;
                        temporal_run = run - 1;
                    }
                    None => {
                        temporal = TemporalSignal::Inter;
                        temporal_run = tu.tu_total;
                    }
                }
                in_cleared_region = false;

                // Reduced signalling: once an Intra run touches a block
                // start, every remaining signal of the run names a block
                // start, so the run converts into whole-block clears.
                if global.temporal_reduced_signalling_enabled
                    && temporal == TemporalSignal::Intra
                    && tu.is_block_start(x, y)
                {
                    let blocks = temporal_run + 1;
                    let mut region_tus = 0u32;
                    let (mut bx, mut by) = (x, y);
                    let mut walk_index = tu_index;
                    for k in 0..blocks {
                        let count = tu.block_tu_count(bx, by);
                        region_tus += count;
                        if k + 1 < blocks {
                            walk_index += count;
                            match tu.coords_block_raster(walk_index)? {
                                TuCoords::At(nx, ny) => {
                                    bx = nx;
                                    by = ny;
                                }
                                TuCoords::End => {
                                    log::warn!(
                                        "temporal block run of {blocks} blocks overruns the plane"
                                    );
                                    return Err(DecodeError::InvalidTemporalRun);
                                }
                            }
                        }
                    }
                    clear_block_queue = blocks;
                    temporal_run = region_tus - 1;
                    in_cleared_region = true;
                }
            }

            if clear_block_queue > 0 && tu.is_block_start(x, y) {
                let index = tu.coords_block_aligned_index(x, y);
                buffer.append(CmdBufferCmd::Clear, None, index - last_index);
                last_index = index;
                clear_block_queue -= 1;
                cleared_block = true;
            }
        }

        // Emit a residual command unless this transform is a pure skip: an
        // Inter all-zero (nothing to add) or a cleared block's zero.
        let nonzero = coeffs[..num_layers].iter().any(|&c| c != 0);
        let clearing = cleared_block || clear_block_queue > 0;
        if nonzero || (!cleared_block && (!apply_temporal || temporal == TemporalSignal::Intra)) {
            let mut residuals = [0i16; MAX_LAYERS];
            if nonzero {
                let mut dequantized = [0i16; MAX_LAYERS];
                for i in 0..num_layers {
                    dequantized[i] = dequant.apply(temporal, i, coeffs[i]);
                }
                if dds {
                    let coeffs16: &[i16; 16] = dequantized[..16].try_into().unwrap();
                    let out: &mut [i16; 16] = (&mut residuals[..16]).try_into().unwrap();
                    inverse_dds(coeffs16, out);
                    if input.loq == LoqIndex::Loq1
                        && frame.deblock_enabled
                        && global.deblock.enabled
                    {
                        deblock_residuals(&global.deblock, out);
                    }
                } else {
                    let coeffs4: &[i16; 4] = dequantized[..4].try_into().unwrap();
                    let out: &mut [i16; 4] = (&mut residuals[..4]).try_into().unwrap();
                    inverse_dd(coeffs4, out);
                }
            }

            let cmd = if !nonzero && apply_temporal && temporal == TemporalSignal::Intra {
                CmdBufferCmd::SetZero
            } else if input.loq == LoqIndex::Loq0
                && apply_temporal
                && (temporal == TemporalSignal::Intra || clearing)
            {
                CmdBufferCmd::Set
            } else {
                CmdBufferCmd::Add
            };

            let index = if block_mode {
                tu.coords_block_aligned_index(x, y)
            } else {
                tu_index
            };

            if cmd.has_residuals() {
                // The command buffer stores payloads row by row; DDS comes
                // out of the transform in its natural order.
                if dds {
                    let natural: &[i16; 16] = residuals[..16].try_into().unwrap();
                    buffer.append(cmd, Some(&dds_to_scanline(natural)), index - last_index);
                } else {
                    buffer.append(cmd, Some(&residuals[..4]), index - last_index);
                }
            } else {
                buffer.append(cmd, None, index - last_index);
            }
            last_index = index;
        }

        // Fast-forward as far as every run allows. The temporal stream
        // limits the skip: Inter (or already-cleared) runs can be jumped,
        // a live Intra run cannot, and a pending block clear must stop at
        // the next block start.
        let mut advance = min_zero;
        if temporal_active {
            if cleared_block {
                advance = advance.min(tu.block_tus_remaining(x, y) - 1);
            }
            if clear_block_queue > 0 {
                advance = advance
                    .min(tu.block_tus_remaining(x, y) - 1)
                    .min(temporal_run);
            } else if temporal == TemporalSignal::Inter || in_cleared_region {
                advance = advance.min(temporal_run);
            } else {
                advance = 0;
            }
        }

        tu_index += advance + 1;
        if temporal_active {
            temporal_run = temporal_run.saturating_sub(advance);
        }
        for run in layer_run.iter_mut().take(num_layers) {
            *run -= advance;
        }
    }

    if input.num_entry_points > 0 {
        buffer.split();
    }

    Ok(())
}

#[inline]
fn coords(tu: &TuState, tu_index: u32, block_mode: bool) -> Result<(u32, u32)> {
    let coords = if block_mode {
        tu.coords_block_raster(tu_index)?
    } else {
        tu.coords_surface_raster(tu_index)?
    };
    match coords {
        TuCoords::At(x, y) => Ok((x, y)),
        // The loop bound keeps the index strictly inside the surface.
        TuCoords::End => Err(DecodeError::InvalidConfig),
    }
}

/// Strip embedded user data from its host coefficient.
///
/// The user bits are shifted out; of what remains, bit 0 is a sign flag for
/// the value above it.
#[inline]
fn strip_user_data(loq: LoqIndex, user_data: &UserDataConfig, coeffs: &mut [i16; MAX_LAYERS]) {
    if loq == LoqIndex::Loq1 && user_data.enabled {
        let mut coeff = i32::from(coeffs[user_data.layer_index]);
        coeff >>= user_data.shift;
        let sign = if coeff & 1 != 0 { -1 } else { 1 };
        coeffs[user_data.layer_index] = ((coeff >> 1) * sign) as i16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::test_stream;

    fn payload_values(bytes: &[u8]) -> Vec<i16> {
        bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect()
    }

    /// A config whose dequant is the identity: unit step width, zero offset.
    fn identity_configs(transform: TransformType) -> (GlobalConfig, FrameConfig) {
        let global = GlobalConfig {
            transform,
            num_layers: transform.layer_count(),
            temporal_enabled: false,
            ..GlobalConfig::default()
        };
        let frame = FrameConfig {
            step_widths: [1, 1],
            ..FrameConfig::default()
        };
        (global, frame)
    }

    fn empty_chunks(count: usize) -> Vec<Chunk<'static>> {
        vec![Chunk::EMPTY; count]
    }

    #[test]
    fn surface_order_emits_adds_with_gap_jumps() {
        let (global, frame) = identity_configs(TransformType::Dd);
        let dequant = Dequant::new(&global, &frame, 0, LoqIndex::Loq0);

        // Layer 0: coefficient 4, then 9 zero TUs. Other layers empty.
        let mut layer0 = Vec::new();
        test_stream::record(&mut layer0, 4, 9);
        let mut chunks = empty_chunks(4);
        chunks[0] = Chunk::new(&layer0, true);

        let input = TileDecodeInput {
            chunks: Some(&chunks),
            temporal_chunk: None,
            geometry: TileGeometry {
                x: 0,
                y: 0,
                width: 8,
                height: 8,
            },
            plane_index: 0,
            loq: LoqIndex::Loq0,
            num_entry_points: 0,
        };

        let mut buffer = CmdBuffer::new(0);
        decode_residuals(&global, &frame, &dequant, &input, &mut buffer).unwrap();

        let commands: Vec<_> = buffer.segment(0).collect();
        assert_eq!(commands.len(), 2);

        // TU 0: the DC coefficient spreads to a constant 2x2 residual.
        assert_eq!(commands[0].cmd, CmdBufferCmd::Add);
        assert_eq!(commands[0].jump, 0);
        assert_eq!(payload_values(commands[0].residuals.unwrap()), [4, 4, 4, 4]);

        // TU 10: the layer ran out, leaving a zero-residual add where the
        // common run expired.
        assert_eq!(commands[1].cmd, CmdBufferCmd::Add);
        assert_eq!(commands[1].jump, 10);
        assert_eq!(payload_values(commands[1].residuals.unwrap()), [0, 0, 0, 0]);
    }

    #[test]
    fn no_chunks_emits_a_single_zero_add() {
        let (global, frame) = identity_configs(TransformType::Dds);
        let dequant = Dequant::new(&global, &frame, 0, LoqIndex::Loq0);

        let input = TileDecodeInput {
            chunks: None,
            temporal_chunk: None,
            geometry: TileGeometry {
                x: 0,
                y: 0,
                width: 64,
                height: 64,
            },
            plane_index: 0,
            loq: LoqIndex::Loq0,
            num_entry_points: 0,
        };

        let mut buffer = CmdBuffer::new(0);
        decode_residuals(&global, &frame, &dequant, &input, &mut buffer).unwrap();
        // Without temporal state there is nothing to write: the single
        // expiring run emits one zero add, nothing else.
        let commands: Vec<_> = buffer.segment(0).collect();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].cmd, CmdBufferCmd::Add);
        assert!(payload_values(commands[0].residuals.unwrap())
            .iter()
            .all(|&v| v == 0));
    }

    #[test]
    fn reduced_signalling_clears_whole_blocks() {
        // 64x64 DDS plane: four 32x32 blocks of 64 TUs each. A single Intra
        // run of 3 starting at TU 0 must clear the first three blocks, with
        // the first TU's residual written into the cleared surface.
        let (mut global, frame) = identity_configs(TransformType::Dds);
        global.temporal_enabled = true;
        global.temporal_reduced_signalling_enabled = true;
        // Keep the dequant an identity for the test.
        global.temporal_step_width_modifier = 0;
        let dequant = Dequant::new(&global, &frame, 0, LoqIndex::Loq0);

        let mut layer0 = Vec::new();
        test_stream::record(&mut layer0, 2, 1000);
        let mut chunks = empty_chunks(16);
        chunks[0] = Chunk::new(&layer0, true);

        let mut temporal_data = Vec::new();
        test_stream::temporal(&mut temporal_data, TemporalSignal::Intra, 3);
        let temporal_chunk = Chunk::new(&temporal_data, true);

        let input = TileDecodeInput {
            chunks: Some(&chunks),
            temporal_chunk: Some(&temporal_chunk),
            geometry: TileGeometry {
                x: 0,
                y: 0,
                width: 64,
                height: 64,
            },
            plane_index: 0,
            loq: LoqIndex::Loq0,
            num_entry_points: 0,
        };

        let mut buffer = CmdBuffer::new(0);
        decode_residuals(&global, &frame, &dequant, &input, &mut buffer).unwrap();

        let commands: Vec<_> = buffer.segment(0).collect();
        let kinds: Vec<_> = commands.iter().map(|c| (c.cmd, c.jump)).collect();
        assert_eq!(
            kinds,
            [
                (CmdBufferCmd::Clear, 0),
                (CmdBufferCmd::Set, 0),
                (CmdBufferCmd::Clear, 64),
                (CmdBufferCmd::Clear, 64),
            ]
        );

        // The Intra residual of the first TU is written, not added.
        assert_eq!(
            payload_values(commands[1].residuals.unwrap()),
            vec![2i16; 16]
        );
    }

    #[test]
    fn intra_without_reduced_signalling_writes_every_tu() {
        let (mut global, frame) = identity_configs(TransformType::Dds);
        global.temporal_enabled = true;
        global.temporal_step_width_modifier = 0;
        let dequant = Dequant::new(&global, &frame, 0, LoqIndex::Loq0);

        // All layers empty; temporal says Intra for 4 TUs then ends
        // (implicit Inter for the rest).
        let chunks = empty_chunks(16);
        let mut temporal_data = Vec::new();
        test_stream::temporal(&mut temporal_data, TemporalSignal::Intra, 4);
        let temporal_chunk = Chunk::new(&temporal_data, true);

        let input = TileDecodeInput {
            chunks: Some(&chunks),
            temporal_chunk: Some(&temporal_chunk),
            geometry: TileGeometry {
                x: 0,
                y: 0,
                width: 64,
                height: 64,
            },
            plane_index: 0,
            loq: LoqIndex::Loq0,
            num_entry_points: 0,
        };

        let mut buffer = CmdBuffer::new(0);
        decode_residuals(&global, &frame, &dequant, &input, &mut buffer).unwrap();

        // Four SetZero commands at TUs 0..4, then nothing: the remaining
        // Inter zeros are skipped entirely.
        let commands: Vec<_> = buffer.segment(0).collect();
        assert_eq!(commands.len(), 4);
        for (i, command) in commands.iter().enumerate() {
            assert_eq!(command.cmd, CmdBufferCmd::SetZero);
            assert_eq!(command.jump, u32::from(i > 0));
        }
    }

    #[test]
    fn user_data_is_stripped_from_the_host_layer() {
        let (mut global, frame) = identity_configs(TransformType::Dd);
        global.user_data = UserDataConfig {
            enabled: true,
            layer_index: 0,
            shift: 2,
        };
        let dequant = Dequant::new(&global, &frame, 0, LoqIndex::Loq1);

        // Coefficient 0b101101 = 45: strip 2 user bits -> 0b1011; bit 0 is
        // the sign (negative), value above it is 0b101 = 5 -> -5.
        let mut layer0 = Vec::new();
        test_stream::record(&mut layer0, 45, 0);
        let mut chunks = empty_chunks(4);
        chunks[0] = Chunk::new(&layer0, true);

        let input = TileDecodeInput {
            chunks: Some(&chunks),
            temporal_chunk: None,
            geometry: TileGeometry {
                x: 0,
                y: 0,
                width: 8,
                height: 8,
            },
            plane_index: 0,
            loq: LoqIndex::Loq1,
            num_entry_points: 0,
        };

        let mut buffer = CmdBuffer::new(0);
        decode_residuals(&global, &frame, &dequant, &input, &mut buffer).unwrap();

        let commands: Vec<_> = buffer.segment(0).collect();
        // inverse_dd([-5, 0, 0, 0]) spreads the DC to all four residuals.
        assert_eq!(
            payload_values(commands[0].residuals.unwrap()),
            [-5, -5, -5, -5]
        );
    }

    #[test]
    fn entry_points_partition_the_commands() {
        let (global, frame) = identity_configs(TransformType::Dd);
        let dequant = Dequant::new(&global, &frame, 0, LoqIndex::Loq0);

        // One coefficient per TU across a 16-TU surface.
        let mut layer0 = Vec::new();
        for i in 0..16 {
            test_stream::record(&mut layer0, 1 + i, 0);
        }
        let mut chunks = empty_chunks(4);
        chunks[0] = Chunk::new(&layer0, true);

        let input = TileDecodeInput {
            chunks: Some(&chunks),
            temporal_chunk: None,
            geometry: TileGeometry {
                x: 0,
                y: 0,
                width: 8,
                height: 8,
            },
            plane_index: 0,
            loq: LoqIndex::Loq0,
            num_entry_points: 4,
        };

        let mut buffer = CmdBuffer::new(0);
        decode_residuals(&global, &frame, &dequant, &input, &mut buffer).unwrap();

        assert_eq!(buffer.num_segments(), 4);
        let total: usize = (0..4).map(|i| buffer.segment(i).count()).sum();
        assert_eq!(total, 16);

        // Replaying segment by segment visits every TU exactly once, in
        // order.
        let mut seen = Vec::new();
        for segment_index in 0..4 {
            let segment = buffer.segment(segment_index);
            let mut tu_index = segment.initial_jump();
            for command in segment {
                tu_index += command.jump;
                seen.push(tu_index);
            }
        }
        assert_eq!(seen, (0..16).collect::<Vec<_>>());
    }
}
