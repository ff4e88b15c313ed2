//! Command-buffer application.
//!
//! Replays one segment of an enhancement tile's command stream against a
//! picture plane. In block order (temporal streams) the TU positions come
//! from the block-aligned raster and all four commands are meaningful; in
//! surface order only adds occur. Highlight mode substitutes the format's
//! maximum value for every written TU, as a debug visualization.

use lcevc_common::fixed_point::saturate_i16;
use lcevc_common::{BLOCK_SIZE, FixedPoint, TuCoords, TuState};
use lcevc_enhancement::{CmdBufferCmd, EnhancementTile};

use crate::error::{PixelError, Result};
use crate::plane::{PlaneDesc, rows};

/// Apply one entry-point segment of `tile` onto `plane`.
///
/// `surface_order` selects the traversal used when the buffer was built:
/// block-aligned raster for temporal streams, plain surface raster
/// otherwise. A buffer without entry points is applied whole with
/// `entry_point_index == 0`.
pub fn apply_cmdbuffer(
    tile: &EnhancementTile,
    entry_point_index: usize,
    plane: &mut PlaneDesc<'_>,
    fixed_point: FixedPoint,
    surface_order: bool,
    highlight: bool,
) -> Result<()> {
    let buffer = &tile.buffer;
    if buffer.is_empty() {
        return Ok(());
    }

    let transform_size = buffer.transform_size();
    let tu_width = if transform_size == 16 { 4u32 } else { 2u32 };
    let tu_width_shift = if transform_size == 16 { 2 } else { 1 };

    let tu = TuState::new(
        tile.tile_width,
        tile.tile_height,
        tile.tile_x,
        tile.tile_y,
        tu_width_shift,
    )
    .map_err(|_| PixelError::InvalidParam)?;

    let segment = buffer.segment(entry_point_index);
    let mut tu_index = segment.initial_jump();

    for command in segment {
        tu_index += command.jump;

        let (x, y) = if surface_order {
            match tu.coords_surface_raster(tu_index) {
                Ok(TuCoords::At(x, y)) => (x, y),
                _ => return Err(PixelError::InvalidParam),
            }
        } else {
            tu.coords_block_aligned_raster(tu_index)
        };
        debug_assert!(x < tile.plane_width && y < tile.plane_height);

        if highlight {
            match command.cmd {
                CmdBufferCmd::Clear => clear_block(plane, tile, x, y, fixed_point),
                _ => write_highlight(plane, x, y, tu_width, fixed_point),
            }
            continue;
        }

        match command.cmd {
            CmdBufferCmd::Add => {
                let residuals = command.residuals.expect("add carries residuals");
                add_residuals(plane, x, y, tu_width, residuals, fixed_point);
            }
            CmdBufferCmd::Set => {
                if !fixed_point.is_signed() {
                    return Err(PixelError::NotSupported);
                }
                let residuals = command.residuals.expect("set carries residuals");
                set_residuals(plane, x, y, tu_width, residuals);
            }
            CmdBufferCmd::SetZero => {
                if !fixed_point.is_signed() {
                    return Err(PixelError::NotSupported);
                }
                zero_tu(plane, x, y, tu_width);
            }
            CmdBufferCmd::Clear => clear_block(plane, tile, x, y, fixed_point),
        }
    }

    Ok(())
}

#[inline]
fn residual_at(residuals: &[u8], index: usize) -> i32 {
    i32::from(i16::from_le_bytes([
        residuals[index * 2],
        residuals[index * 2 + 1],
    ]))
}

fn add_residuals(
    plane: &mut PlaneDesc<'_>,
    x: u32,
    y: u32,
    tu_width: u32,
    residuals: &[u8],
    fp: FixedPoint,
) {
    for row_index in 0..tu_width {
        let row = plane.row_mut(y + row_index);
        for column in 0..tu_width {
            let index = (x + column) as usize;
            let residual = residual_at(residuals, (row_index * tu_width + column) as usize);
            let out = if fp.is_signed() {
                i32::from(saturate_i16(rows::load(row, index, fp) + residual))
            } else {
                let pel = fp.to_signed(rows::load(row, index, fp) as u16);
                i32::from(fp.to_unsigned(i32::from(pel) + residual))
            };
            rows::store(row, index, fp, out);
        }
    }
}

fn set_residuals(plane: &mut PlaneDesc<'_>, x: u32, y: u32, tu_width: u32, residuals: &[u8]) {
    for row_index in 0..tu_width {
        let row = plane.row_mut(y + row_index);
        let row_base = (row_index * tu_width) as usize * 2;
        let dst_base = (x as usize) * 2;
        row[dst_base..dst_base + tu_width as usize * 2]
            .copy_from_slice(&residuals[row_base..row_base + tu_width as usize * 2]);
    }
}

fn zero_tu(plane: &mut PlaneDesc<'_>, x: u32, y: u32, tu_width: u32) {
    for row_index in 0..tu_width {
        let row = plane.row_mut(y + row_index);
        let dst_base = (x as usize) * 2;
        row[dst_base..dst_base + tu_width as usize * 2].fill(0);
    }
}

/// Zero a whole block, clipped at the right and bottom plane edges.
fn clear_block(plane: &mut PlaneDesc<'_>, tile: &EnhancementTile, x: u32, y: u32, fp: FixedPoint) {
    let clear_width = BLOCK_SIZE.min(tile.plane_width - x) as usize;
    let clear_height = BLOCK_SIZE.min(tile.plane_height - y);
    let sample_size = fp.byte_size();

    for row_index in 0..clear_height {
        let row = plane.row_mut(y + row_index);
        let start = x as usize * sample_size;
        row[start..start + clear_width * sample_size].fill(0);
    }
}

fn write_highlight(plane: &mut PlaneDesc<'_>, x: u32, y: u32, tu_width: u32, fp: FixedPoint) {
    let value = fp.highlight_value();
    for row_index in 0..tu_width {
        let row = plane.row_mut(y + row_index);
        for column in 0..tu_width {
            rows::store(row, (x + column) as usize, fp, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lcevc_enhancement::TransformType;

    const WIDTH: u32 = 180;
    const HEIGHT: u32 = 100;

    fn tile(transform: TransformType) -> EnhancementTile {
        let mut tile = EnhancementTile::whole_plane(WIDTH, HEIGHT, 0);
        tile.buffer.reset(transform);
        tile
    }

    fn u8_plane(fill: u8) -> Vec<u8> {
        vec![fill; (WIDTH * HEIGHT) as usize]
    }

    fn i16_plane(fill: i16) -> Vec<u8> {
        (0..WIDTH * HEIGHT)
            .flat_map(|_| fill.to_le_bytes())
            .collect()
    }

    fn read_u8(data: &[u8], x: u32, y: u32) -> u8 {
        data[(y * WIDTH + x) as usize]
    }

    fn read_i16(data: &[u8], x: u32, y: u32) -> i16 {
        let index = ((y * WIDTH + x) * 2) as usize;
        i16::from_le_bytes([data[index], data[index + 1]])
    }

    #[test]
    fn add_in_surface_order_on_u8() {
        let mut t = tile(TransformType::Dds);
        // One S8.7 step per U8 step: +2 steps at TU 0, +4 at TU 3.
        t.buffer
            .append(CmdBufferCmd::Add, Some(&[2 << 7; 16]), 0);
        t.buffer
            .append(CmdBufferCmd::Add, Some(&[4 << 7; 16]), 3);

        let mut data = u8_plane(100);
        let mut plane = PlaneDesc::new(&mut data, WIDTH as usize);
        apply_cmdbuffer(&t, 0, &mut plane, FixedPoint::U8, true, false).unwrap();

        // TU 0 covers pixels (0..4, 0..4).
        assert_eq!(read_u8(&data, 0, 0), 102);
        assert_eq!(read_u8(&data, 3, 3), 102);
        // TU 3 in surface raster is at x = 12.
        assert_eq!(read_u8(&data, 12, 0), 104);
        assert_eq!(read_u8(&data, 15, 3), 104);
        // Everything else untouched.
        assert_eq!(read_u8(&data, 4, 0), 100);
        assert_eq!(read_u8(&data, 0, 4), 100);
    }

    #[test]
    fn set_zero_and_clear_in_block_order() {
        let mut t = tile(TransformType::Dds);
        // Clear block 0, set TU 0, zero TU 1, add at TU 64 (next block,
        // x = 32 in block-aligned space).
        t.buffer.append(CmdBufferCmd::Clear, None, 0);
        t.buffer.append(CmdBufferCmd::Set, Some(&[77i16; 16]), 0);
        t.buffer.append(CmdBufferCmd::SetZero, None, 1);
        t.buffer.append(CmdBufferCmd::Add, Some(&[5i16; 16]), 63);

        let mut data = i16_plane(1000);
        let mut plane = PlaneDesc::new(&mut data, WIDTH as usize * 2);
        apply_cmdbuffer(&t, 0, &mut plane, FixedPoint::S8, false, false).unwrap();

        // The cleared block is zero except the SET at its first TU.
        assert_eq!(read_i16(&data, 0, 0), 77);
        assert_eq!(read_i16(&data, 3, 3), 77);
        assert_eq!(read_i16(&data, 4, 0), 0);
        assert_eq!(read_i16(&data, 31, 31), 0);
        // The add in block 1 lands on the carried value.
        assert_eq!(read_i16(&data, 32, 0), 1005);
        // Outside both blocks nothing changed.
        assert_eq!(read_i16(&data, 0, 32), 1000);
    }

    #[test]
    fn clear_clips_at_the_plane_edges() {
        let mut t = tile(TransformType::Dds);
        // The block at (160, 96) is 20x4 pixels. Its block-aligned index:
        // block row 3 * (192/4*8) + block col 5 * 64.
        let tu = TuState::new(WIDTH, HEIGHT, 0, 0, 2).unwrap();
        let index = tu.coords_block_aligned_index(160, 96);
        t.buffer.append(CmdBufferCmd::Clear, None, index);

        let mut data = i16_plane(7);
        let mut plane = PlaneDesc::new(&mut data, WIDTH as usize * 2);
        apply_cmdbuffer(&t, 0, &mut plane, FixedPoint::S8, false, false).unwrap();

        assert_eq!(read_i16(&data, 160, 96), 0);
        assert_eq!(read_i16(&data, 179, 99), 0);
        // The row above and the column to the left are untouched.
        assert_eq!(read_i16(&data, 160, 95), 7);
        assert_eq!(read_i16(&data, 159, 96), 7);
    }

    #[test]
    fn highlight_overrides_written_tus() {
        let mut t = tile(TransformType::Dds);
        // A TU at (64, 64): block-aligned index of that position, with a
        // residual that would otherwise add +10 steps.
        let tu = TuState::new(WIDTH, HEIGHT, 0, 0, 2).unwrap();
        let index = tu.coords_block_aligned_index(64, 64);
        t.buffer
            .append(CmdBufferCmd::Add, Some(&[10 << 7; 16]), index);

        let mut data = u8_plane(100);
        let mut plane = PlaneDesc::new(&mut data, WIDTH as usize);
        apply_cmdbuffer(&t, 0, &mut plane, FixedPoint::U8, false, true).unwrap();

        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let expected = if (64..68).contains(&x) && (64..68).contains(&y) {
                    255
                } else {
                    100
                };
                assert_eq!(read_u8(&data, x, y), expected, "({x},{y})");
            }
        }
    }

    #[test]
    fn set_on_unsigned_plane_is_rejected() {
        let mut t = tile(TransformType::Dd);
        t.buffer.append(CmdBufferCmd::Set, Some(&[1i16; 4]), 0);

        let mut data = u8_plane(0);
        let mut plane = PlaneDesc::new(&mut data, WIDTH as usize);
        assert_eq!(
            apply_cmdbuffer(&t, 0, &mut plane, FixedPoint::U8, false, false).unwrap_err(),
            PixelError::NotSupported
        );
    }

    #[test]
    fn direct_and_command_buffer_application_agree() {
        // Build the same residual pattern twice: once applied through the
        // command stream, once computed directly on the pixels.
        let mut t = tile(TransformType::Dd);
        let residuals: [i16; 4] = [3 << 7, -(2 << 7), 1 << 7, 0];
        let jumps = [0u32, 5, 61, 200];
        for &jump in &jumps {
            t.buffer.append(CmdBufferCmd::Add, Some(&residuals), jump);
        }

        let mut via_buffer = u8_plane(128);
        let mut plane = PlaneDesc::new(&mut via_buffer, WIDTH as usize);
        apply_cmdbuffer(&t, 0, &mut plane, FixedPoint::U8, true, false).unwrap();

        let mut direct = u8_plane(128);
        let tu = TuState::new(WIDTH, HEIGHT, 0, 0, 1).unwrap();
        let mut tu_index = 0;
        for &jump in &jumps {
            tu_index += jump;
            let TuCoords::At(x, y) = tu.coords_surface_raster(tu_index).unwrap() else {
                panic!("index in range");
            };
            for (i, &residual) in residuals.iter().enumerate() {
                let px = x + (i as u32 % 2);
                let py = y + (i as u32 / 2);
                let offset = (py * WIDTH + px) as usize;
                let signed = i32::from(FixedPoint::U8.to_signed(u16::from(direct[offset])));
                direct[offset] = FixedPoint::U8.to_unsigned(signed + i32::from(residual)) as u8;
            }
        }

        assert_eq!(via_buffer, direct);
    }
}
