//! Inverse Hadamard transforms and residual deblocking.
//!
//! Coefficients arrive per layer in the decoder's natural order; the inverse
//! transform turns the 4 (DD) or 16 (DDS) coefficients of one transform unit
//! into residuals in the same natural order. The spatial meaning of the DDS
//! natural order is:
//!
//! ```text
//!     [ 0  1  4  5 ]
//!     [ 2  3  6  7 ]
//!     [ 8  9 12 13 ]
//!     [10 11 14 15 ]
//! ```
//!
//! The scanline reordering for command buffers happens at the append site,
//! not here.

use lcevc_common::fixed_point::saturate_i16;

use crate::config::Deblock;

/// DD butterfly: two cascaded stages of `(a + b, a - b)` pairs over four
/// values, widened to i32.
#[inline]
fn butterfly4(c0: i32, c1: i32, c2: i32, c3: i32) -> [i32; 4] {
    let t0 = c0 + c1;
    let t1 = c0 - c1;
    let t2 = c2 + c3;
    let t3 = c2 - c3;
    [t0 + t2, t1 + t3, t0 - t2, t1 - t3]
}

/// Inverse DD transform: 4 coefficients to 4 residuals.
pub fn inverse_dd(coeffs: &[i16; 4], residuals: &mut [i16; 4]) {
    let out = butterfly4(
        i32::from(coeffs[0]),
        i32::from(coeffs[1]),
        i32::from(coeffs[2]),
        i32::from(coeffs[3]),
    );
    for (residual, value) in residuals.iter_mut().zip(out) {
        *residual = saturate_i16(value);
    }
}

/// Inverse DDS transform: 16 coefficients to 16 residuals, as the tensor
/// product of two DD stages.
pub fn inverse_dds(coeffs: &[i16; 16], residuals: &mut [i16; 16]) {
    let mut mid = [0i32; 16];

    // First stage across the four coefficient groups.
    for j in 0..4 {
        let out = butterfly4(
            i32::from(coeffs[j]),
            i32::from(coeffs[j + 4]),
            i32::from(coeffs[j + 8]),
            i32::from(coeffs[j + 12]),
        );
        mid[j] = out[0];
        mid[j + 4] = out[1];
        mid[j + 8] = out[2];
        mid[j + 12] = out[3];
    }

    // Second stage within each group.
    for group in 0..4 {
        let base = group * 4;
        let out = butterfly4(mid[base], mid[base + 1], mid[base + 2], mid[base + 3]);
        for (offset, value) in out.into_iter().enumerate() {
            residuals[base + offset] = saturate_i16(value);
        }
    }
}

/// Deblock a DDS residual block in place.
///
/// The outer ring of the 4x4 spatial block is scaled by the corner or side
/// factor and shifted down by 4; the centre four samples are untouched.
/// Natural-order indices and their spatial positions:
///
/// ```text
///     corner: 0 (0,0)   5 (3,0)  10 (0,3)  15 (3,3)
///     side:   1 (1,0)   4 (2,0)   2 (0,1)   7 (3,1)
///             8 (0,2)  13 (3,2)  11 (1,3)  14 (2,3)
/// ```
pub fn deblock_residuals(deblock: &Deblock, residuals: &mut [i16; 16]) {
    debug_assert!(deblock.enabled);

    const CORNER: [usize; 4] = [0, 5, 10, 15];
    const SIDE: [usize; 8] = [1, 4, 2, 7, 8, 13, 11, 14];

    for &i in &CORNER {
        residuals[i] = ((i32::from(deblock.corner) * i32::from(residuals[i])) >> 4) as i16;
    }
    for &i in &SIDE {
        residuals[i] = ((i32::from(deblock.side) * i32::from(residuals[i])) >> 4) as i16;
    }
}

/// Scanline reorder of a natural-order DDS residual block.
///
/// Command buffers store residual payloads row by row so the applicator can
/// copy them with plain row strides; this is the permutation from the
/// natural order documented above to that layout.
pub fn dds_to_scanline(values: &[i16; 16]) -> [i16; 16] {
    [
        values[0], values[1], values[4], values[5], values[2], values[3], values[6], values[7],
        values[8], values[9], values[12], values[13], values[10], values[11], values[14],
        values[15],
    ]
}
