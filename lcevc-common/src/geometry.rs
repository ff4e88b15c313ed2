//! Transform-unit geometry.
//!
//! Residuals are laid out sparsely, and the entropy layer only tracks runs of
//! zero-valued transforms, so the decode loop needs a cheap mapping from a
//! linear transform-unit index to 2D surface coordinates. Two traversal
//! orders exist:
//!
//! - *Surface raster*: plain raster order of TUs across the plane, stepping
//!   by the transform size.
//! - *Block raster*: the plane is divided into 32x32 blocks; TUs are visited
//!   in raster order within a block, blocks in raster order across the
//!   plane. Right-edge and bottom-edge blocks may be partial and contain
//!   fewer TUs.
//!
//! The *block-aligned* variants treat the plane as if it were rounded up to
//! a multiple of 32 in both dimensions, so every block is whole. Command
//! buffers index TUs in that space because it keeps jump arithmetic free of
//! edge cases.
//!
//! All of this is pure integer arithmetic on constants computed once per
//! plane; nothing here allocates.

use crate::error::GeometryError;

/// Side length in pixels of a temporal block.
pub const BLOCK_SIZE: u32 = 32;
/// log2 of [`BLOCK_SIZE`].
pub const BLOCK_SIZE_SHIFT: u32 = 5;

/// Result of mapping a TU index to coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuCoords {
    /// The pixel coordinates of the TU origin.
    At(u32, u32),
    /// The index is one past the last TU of the surface.
    End,
}

#[derive(Debug, Clone, Copy, Default)]
struct BlockArgs {
    /// Number of TUs in a bottom-edge block.
    tu_per_block_bottom_edge: u32,
    /// Number of TUs across a right-edge block.
    tu_per_block_row_right_edge: u32,
    /// Number of TUs down a bottom-edge block.
    tu_per_block_col_bottom_edge: u32,
    /// Number of TUs in a whole row of blocks, edge block included.
    tu_per_row: u32,
    whole_blocks_per_row: u32,
    whole_blocks_per_col: u32,
    blocks_per_row: u32,
    blocks_per_col: u32,
    /// TUs in a whole block: 256 for DD, 64 for DDS.
    tu_per_block: u32,
    /// TUs across a whole block: 16 for DD, 8 for DDS.
    tu_per_block_dims: u32,
    tu_per_block_dims_shift: u32,
    tu_per_block_shift: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct BlockAlignedArgs {
    /// TUs in a whole aligned row of blocks.
    tu_per_row: u32,
    /// Y position of the first row of partial-height blocks.
    max_whole_block_y: u32,
}

/// Per-plane traversal state for one transform size.
#[derive(Debug, Clone, Copy)]
pub struct TuState {
    /// Total number of TUs in the surface.
    pub tu_total: u32,
    /// Width of the surface in TUs.
    pub num_across: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    /// log2 of the TU side length: 1 for DD, 2 for DDS.
    pub tu_width_shift: u32,
    block: BlockArgs,
    block_aligned: BlockAlignedArgs,
}

impl TuState {
    /// Set up traversal state for a region.
    ///
    /// `width` and `height` must each be divisible by the TU side length.
    /// The offsets position a tile within its plane.
    pub fn new(
        width: u32,
        height: u32,
        x_offset: u32,
        y_offset: u32,
        tu_width_shift: u32,
    ) -> Result<Self, GeometryError> {
        debug_assert!(tu_width_shift == 1 || tu_width_shift == 2);
        let tu_size = 1u32 << tu_width_shift;

        if width & (tu_size - 1) != 0 {
            return Err(GeometryError::UnalignedWidth);
        }
        if height & (tu_size - 1) != 0 {
            return Err(GeometryError::UnalignedHeight);
        }

        let num_across = width >> tu_width_shift;
        let tu_per_block_dims_shift = if tu_width_shift == 1 { 4 } else { 3 };
        let tu_per_block_shift = tu_per_block_dims_shift << 1;

        let block = BlockArgs {
            tu_per_block_dims_shift,
            tu_per_block_dims: 1 << tu_per_block_dims_shift,
            tu_per_block_shift,
            tu_per_block: 1 << tu_per_block_shift,
            tu_per_block_row_right_edge: (width & (BLOCK_SIZE - 1)) >> tu_width_shift,
            tu_per_block_col_bottom_edge: (height & (BLOCK_SIZE - 1)) >> tu_width_shift,
            tu_per_block_bottom_edge: ((height & (BLOCK_SIZE - 1)) >> tu_width_shift)
                << tu_per_block_dims_shift,
            tu_per_row: num_across << tu_per_block_dims_shift,
            whole_blocks_per_row: width >> BLOCK_SIZE_SHIFT,
            whole_blocks_per_col: height >> BLOCK_SIZE_SHIFT,
            blocks_per_row: width.div_ceil(BLOCK_SIZE),
            blocks_per_col: height.div_ceil(BLOCK_SIZE),
        };

        let block_aligned_width = width.next_multiple_of(BLOCK_SIZE);
        let block_aligned = BlockAlignedArgs {
            tu_per_row: (block_aligned_width >> tu_width_shift) << tu_per_block_dims_shift,
            max_whole_block_y: block.whole_blocks_per_col << BLOCK_SIZE_SHIFT,
        };

        Ok(Self {
            tu_total: num_across * (height >> tu_width_shift),
            num_across,
            x_offset,
            y_offset,
            tu_width_shift,
            block,
            block_aligned,
        })
    }

    /// Total number of blocks covering the surface, partial blocks included.
    #[inline]
    pub fn block_count(&self) -> u32 {
        self.block.blocks_per_row * self.block.blocks_per_col
    }

    /// Whether the plane divides exactly into whole 32x32 blocks.
    #[inline]
    pub fn has_partial_blocks(&self) -> bool {
        self.block.tu_per_block_row_right_edge != 0 || self.block.tu_per_block_col_bottom_edge != 0
    }

    /// Map a TU index to coordinates in surface-raster order.
    pub fn coords_surface_raster(&self, tu_index: u32) -> Result<TuCoords, GeometryError> {
        if tu_index > self.tu_total {
            return Err(GeometryError::IndexOutOfRange);
        }
        if tu_index == self.tu_total {
            return Ok(TuCoords::End);
        }

        let x = ((tu_index % self.num_across) << self.tu_width_shift) + self.x_offset;
        let y = ((tu_index / self.num_across) << self.tu_width_shift) + self.y_offset;
        Ok(TuCoords::At(x, y))
    }

    /// Inverse of [`Self::coords_surface_raster`] for a TU origin.
    #[inline]
    pub fn coords_surface_index(&self, x: u32, y: u32) -> u32 {
        ((y - self.y_offset) >> self.tu_width_shift) * self.num_across
            + ((x - self.x_offset) >> self.tu_width_shift)
    }

    /// Map a TU index to coordinates in block-raster order.
    ///
    /// Partial right-edge and bottom-edge blocks hold fewer TUs, which this
    /// mapping accounts for.
    pub fn coords_block_raster(&self, tu_index: u32) -> Result<TuCoords, GeometryError> {
        if tu_index > self.tu_total {
            return Err(GeometryError::IndexOutOfRange);
        }
        if tu_index == self.tu_total {
            return Ok(TuCoords::End);
        }

        let b = &self.block;

        // Row of blocks this TU falls into, and the TU's index within it.
        let block_row_index = tu_index / b.tu_per_row;
        let row_tu_index = tu_index - block_row_index * b.tu_per_row;

        // Column of blocks, handling the shorter bottom-edge blocks.
        let (block_col_index, block_tu_index) = if block_row_index >= b.whole_blocks_per_col {
            debug_assert_eq!(block_row_index, b.whole_blocks_per_col);
            (
                row_tu_index / b.tu_per_block_bottom_edge,
                row_tu_index % b.tu_per_block_bottom_edge,
            )
        } else {
            let col = row_tu_index >> b.tu_per_block_shift;
            (col, row_tu_index - (col << b.tu_per_block_shift))
        };

        // Coordinates within the block, handling the narrower right edge.
        let (tu_x, tu_y) = if block_col_index >= b.whole_blocks_per_row {
            debug_assert_eq!(block_col_index, b.whole_blocks_per_row);
            (
                block_tu_index % b.tu_per_block_row_right_edge,
                block_tu_index / b.tu_per_block_row_right_edge,
            )
        } else {
            let y = block_tu_index >> b.tu_per_block_dims_shift;
            (block_tu_index - (y << b.tu_per_block_dims_shift), y)
        };

        let tu_x = tu_x + (block_col_index << b.tu_per_block_dims_shift);
        let tu_y = tu_y + (block_row_index << b.tu_per_block_dims_shift);

        Ok(TuCoords::At(
            (tu_x << self.tu_width_shift) + self.x_offset,
            (tu_y << self.tu_width_shift) + self.y_offset,
        ))
    }

    /// Map a TU index to coordinates in block-raster order over the plane
    /// rounded up to whole 32x32 blocks.
    pub fn coords_block_aligned_raster(&self, tu_index: u32) -> (u32, u32) {
        let b = &self.block;

        let block_row_index = tu_index / self.block_aligned.tu_per_row;
        let row_tu_index = tu_index - block_row_index * self.block_aligned.tu_per_row;

        let block_col_index = row_tu_index >> b.tu_per_block_shift;
        let block_tu_index = row_tu_index - (block_col_index << b.tu_per_block_shift);
        let tu_y = block_tu_index >> b.tu_per_block_dims_shift;
        let tu_x = block_tu_index - (tu_y << b.tu_per_block_dims_shift);

        let tu_x = tu_x + (block_col_index << b.tu_per_block_dims_shift);
        let tu_y = tu_y + (block_row_index << b.tu_per_block_dims_shift);

        (
            (tu_x << self.tu_width_shift) + self.x_offset,
            (tu_y << self.tu_width_shift) + self.y_offset,
        )
    }

    /// Inverse of [`Self::coords_block_aligned_raster`] for a TU origin.
    pub fn coords_block_aligned_index(&self, x: u32, y: u32) -> u32 {
        debug_assert!(x >= self.x_offset && y >= self.y_offset);

        let x = x - self.x_offset;
        let y = y - self.y_offset;
        let block_index_x = x >> BLOCK_SIZE_SHIFT;
        let block_index_y = y >> BLOCK_SIZE_SHIFT;

        // TU index of the block's top-left corner. tu_per_row spans a row of
        // blocks, not a row of pixels.
        let mut index = block_index_y * self.block_aligned.tu_per_row
            + (block_index_x << self.block.tu_per_block_shift);

        // Offset within the block.
        index += ((y - (block_index_y << BLOCK_SIZE_SHIFT)) >> self.tu_width_shift)
            << self.block.tu_per_block_dims_shift;
        index += (x - (block_index_x << BLOCK_SIZE_SHIFT)) >> self.tu_width_shift;

        index
    }

    /// The raster index of the block containing the given pixel coordinate.
    pub fn block_index(&self, x: u32, y: u32) -> Result<u32, GeometryError> {
        debug_assert!(x >= self.x_offset && y >= self.y_offset);

        let block_index_x = (x - self.x_offset) / BLOCK_SIZE;
        let block_index_y = (y - self.y_offset) / BLOCK_SIZE;
        let index = block_index_y * self.block.blocks_per_row + block_index_x;

        if index > self.block_count() {
            return Err(GeometryError::IndexOutOfRange);
        }
        Ok(index)
    }

    /// Pixel dimensions and TU count of the block containing `(x, y)`.
    pub fn block_details(&self, x: u32, y: u32) -> (u32, u32, u32) {
        let b = &self.block;
        let right_limit = b.whole_blocks_per_row << BLOCK_SIZE_SHIFT;
        let bottom_limit = b.whole_blocks_per_col << BLOCK_SIZE_SHIFT;
        let x_pos = x - self.x_offset;
        let y_pos = y - self.y_offset;

        let tu_wide = if x_pos >= right_limit {
            b.tu_per_block_row_right_edge
        } else {
            b.tu_per_block_dims
        };
        let tu_high = if y_pos >= bottom_limit {
            b.tu_per_block_col_bottom_edge
        } else {
            b.tu_per_block_dims
        };

        (
            tu_wide << self.tu_width_shift,
            tu_high << self.tu_width_shift,
            tu_wide * tu_high,
        )
    }

    /// TU count of the block containing `(x, y)`.
    #[inline]
    pub fn block_tu_count(&self, x: u32, y: u32) -> u32 {
        self.block_details(x, y).2
    }

    /// Whether `(x, y)` is the top-left TU of a block.
    #[inline]
    pub fn is_block_start(&self, x: u32, y: u32) -> bool {
        (x - self.x_offset) % BLOCK_SIZE == 0 && (y - self.y_offset) % BLOCK_SIZE == 0
    }

    /// Number of TUs from `(x, y)` to the end of its block, in block-raster
    /// order, including the TU at `(x, y)` itself.
    pub fn block_tus_remaining(&self, x: u32, y: u32) -> u32 {
        let (block_width, _, tu_count) = self.block_details(x, y);
        let tu_wide = block_width >> self.tu_width_shift;
        let in_block_x = ((x - self.x_offset) % BLOCK_SIZE) >> self.tu_width_shift;
        let in_block_y = ((y - self.y_offset) % BLOCK_SIZE) >> self.tu_width_shift;
        tu_count - (in_block_y * tu_wide + in_block_x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_raster_stays_in_bounds() {
        for (w, h, shift) in [(64, 64, 1), (64, 64, 2), (180, 100, 2), (180, 100, 1)] {
            let state = TuState::new(w, h, 0, 0, shift).unwrap();
            for i in 0..state.tu_total {
                match state.coords_surface_raster(i).unwrap() {
                    TuCoords::At(x, y) => {
                        assert!(x < w && y < h, "({x},{y}) outside {w}x{h}");
                        assert_eq!(x % (1 << shift), 0);
                        assert_eq!(y % (1 << shift), 0);
                    }
                    TuCoords::End => panic!("unexpected end at {i}"),
                }
            }
            assert_eq!(
                state.coords_surface_raster(state.tu_total).unwrap(),
                TuCoords::End
            );
            assert!(state.coords_surface_raster(state.tu_total + 1).is_err());
        }
    }

    #[test]
    fn block_raster_stays_in_bounds_with_partial_blocks() {
        // 180x100 with 4x4 TUs has a 20px right edge and a 4px bottom edge.
        let state = TuState::new(180, 100, 0, 0, 2).unwrap();
        assert!(state.has_partial_blocks());

        let mut seen = vec![false; state.tu_total as usize];
        for i in 0..state.tu_total {
            match state.coords_block_raster(i).unwrap() {
                TuCoords::At(x, y) => {
                    assert!(x < 180 && y < 100, "({x},{y}) at index {i}");
                    let linear = state.coords_surface_index(x, y) as usize;
                    assert!(!seen[linear], "({x},{y}) visited twice");
                    seen[linear] = true;
                }
                TuCoords::End => panic!("unexpected end at {i}"),
            }
        }
        assert!(seen.iter().all(|&v| v), "not every TU was visited");
    }

    #[test]
    fn block_raster_matches_documented_order() {
        // 64x64 surface, 4x4 TUs: the second block starts at TU index 64 and
        // pixel x 32.
        let state = TuState::new(64, 64, 0, 0, 2).unwrap();
        assert_eq!(state.coords_block_raster(0).unwrap(), TuCoords::At(0, 0));
        assert_eq!(state.coords_block_raster(7).unwrap(), TuCoords::At(28, 0));
        assert_eq!(state.coords_block_raster(8).unwrap(), TuCoords::At(0, 4));
        assert_eq!(state.coords_block_raster(64).unwrap(), TuCoords::At(32, 0));
        assert_eq!(state.coords_block_raster(128).unwrap(), TuCoords::At(0, 32));
    }

    #[test]
    fn block_aligned_round_trips() {
        for (w, h, shift) in [(64, 64, 2), (180, 100, 2), (180, 100, 1), (96, 64, 1)] {
            let state = TuState::new(w, h, 0, 0, shift).unwrap();
            let step = 1u32 << shift;
            for y in (0..h).step_by(step as usize) {
                for x in (0..w).step_by(step as usize) {
                    let index = state.coords_block_aligned_index(x, y);
                    assert_eq!(
                        state.coords_block_aligned_raster(index),
                        (x, y),
                        "({x},{y}) in {w}x{h} shift {shift}"
                    );
                }
            }
        }
    }

    #[test]
    fn partial_block_tu_counts() {
        // DDS on 180x100: right-edge blocks are 20px wide (5 TUs across),
        // bottom-edge blocks 4px high (1 TU down).
        let state = TuState::new(180, 100, 0, 0, 2).unwrap();
        assert_eq!(state.block_tu_count(0, 0), 64);
        assert_eq!(state.block_tu_count(160, 0), 5 * 8);
        assert_eq!(state.block_tu_count(0, 96), 8);
        assert_eq!(state.block_tu_count(160, 96), 5);

        // DD on the same plane: 16x16 TUs per whole block.
        let state = TuState::new(180, 100, 0, 0, 1).unwrap();
        assert_eq!(state.block_tu_count(0, 0), 256);
        assert_eq!(state.block_tu_count(160, 0), 10 * 16);
        assert_eq!(state.block_tu_count(0, 96), 2 * 16);
        assert_eq!(state.block_tu_count(160, 96), 10 * 2);
    }

    #[test]
    fn block_starts_and_remaining() {
        let state = TuState::new(64, 64, 0, 0, 2).unwrap();
        assert!(state.is_block_start(0, 0));
        assert!(state.is_block_start(32, 32));
        assert!(!state.is_block_start(4, 0));
        assert_eq!(state.block_tus_remaining(0, 0), 64);
        assert_eq!(state.block_tus_remaining(28, 28), 1);
        assert_eq!(state.block_tus_remaining(0, 4), 56);
    }

    #[test]
    fn unaligned_dimensions_are_rejected() {
        assert_eq!(
            TuState::new(63, 64, 0, 0, 2).unwrap_err(),
            GeometryError::UnalignedWidth
        );
        assert_eq!(
            TuState::new(64, 63, 0, 0, 1).unwrap_err(),
            GeometryError::UnalignedHeight
        );
    }

    #[test]
    fn tile_offsets_are_applied() {
        let state = TuState::new(64, 64, 128, 96, 2).unwrap();
        assert_eq!(state.coords_block_raster(0).unwrap(), TuCoords::At(128, 96));
        assert_eq!(state.coords_block_aligned_index(128, 96), 0);
        assert_eq!(state.coords_block_aligned_raster(64), (160, 96));
    }
}
