//! Pseudo-random dithering.
//!
//! When enabled for a frame, a bounded noise value is added to each upscaled
//! output sample before the final saturation. The noise is generated by an
//! xorshift sequence seeded per (frame, plane, slice start row), so slices
//! can run in parallel and still produce the same samples as a serial pass.

use lcevc_common::FixedPoint;

/// Frame-level dither state.
#[derive(Debug, Clone, Copy)]
pub struct DitherFrame {
    seed: u32,
    /// Maximum noise amplitude in output LSBs, 0..=31.
    pub strength: u8,
}

impl DitherFrame {
    pub fn new(seed: u32, strength: u8) -> Self {
        Self {
            // xorshift must not start at zero.
            seed: seed | 1,
            strength,
        }
    }

    /// Noise source for one horizontal slice starting at `y_start`.
    pub fn slice(&self, plane_index: usize, y_start: u32) -> DitherSlice {
        let mix = self
            .seed
            .wrapping_mul(0x9E37_79B9)
            .wrapping_add((plane_index as u32) << 24)
            .wrapping_add(y_start);
        DitherSlice {
            state: mix | 1,
            strength: i32::from(self.strength),
        }
    }
}

/// Per-slice noise stream.
#[derive(Debug, Clone)]
pub struct DitherSlice {
    state: u32,
    strength: i32,
}

impl DitherSlice {
    /// Next noise value in `[-strength, strength]`, scaled into the signed
    /// domain for fixed-point output formats.
    #[inline]
    pub fn next(&mut self, dst_fp: FixedPoint) -> i32 {
        // xorshift32.
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;

        let span = self.strength * 2 + 1;
        let noise = (x % span as u32) as i32 - self.strength;
        if dst_fp.is_signed() {
            noise << dst_fp.radix_shift()
        } else {
            noise
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_stays_within_strength() {
        let frame = DitherFrame::new(12345, 4);
        let mut slice = frame.slice(0, 0);
        for _ in 0..1000 {
            let v = slice.next(FixedPoint::U8);
            assert!((-4..=4).contains(&v), "{v}");
        }
    }

    #[test]
    fn slices_are_deterministic() {
        let frame = DitherFrame::new(7, 3);
        let a: Vec<i32> = {
            let mut s = frame.slice(1, 32);
            (0..64).map(|_| s.next(FixedPoint::U10)).collect()
        };
        let b: Vec<i32> = {
            let mut s = frame.slice(1, 32);
            (0..64).map(|_| s.next(FixedPoint::U10)).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn signed_formats_scale_the_noise() {
        let frame = DitherFrame::new(99, 2);
        let mut slice = frame.slice(0, 0);
        for _ in 0..100 {
            let v = slice.next(FixedPoint::S8);
            assert_eq!(v % (1 << 7), 0);
            assert!((-2 << 7..=2 << 7).contains(&v));
        }
    }
}
