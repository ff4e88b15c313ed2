//! Picture plane descriptors crossing the decoder boundary.

use lcevc_common::FixedPoint;

/// A read-only plane handed in by the base decoder.
///
/// The memory is owned by the caller for the duration of the decode call.
#[derive(Debug, Clone, Copy)]
pub struct PlanePixels<'a> {
    pub samples: &'a [u8],
    pub row_byte_stride: usize,
    pub fixed_point: FixedPoint,
}

/// A writable plane the decoder produces samples into.
#[derive(Debug)]
pub struct PlanePixelsMut<'a> {
    pub samples: &'a mut [u8],
    pub row_byte_stride: usize,
    pub fixed_point: FixedPoint,
}

/// The planes of one input picture.
#[derive(Debug, Default)]
pub struct Picture<'a> {
    pub planes: Vec<PlanePixels<'a>>,
}

/// The planes of one output picture.
#[derive(Debug, Default)]
pub struct PictureMut<'a> {
    pub planes: Vec<PlanePixelsMut<'a>>,
}

/// An owned plane buffer, convenient for tests and harnesses.
#[derive(Debug, Clone)]
pub struct PlaneBuffer {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub fixed_point: FixedPoint,
}

impl PlaneBuffer {
    /// Allocate a plane filled with zero bytes, tightly packed.
    pub fn new(width: u32, height: u32, fixed_point: FixedPoint) -> Self {
        Self {
            data: vec![0; (width * height) as usize * fixed_point.byte_size()],
            width,
            height,
            fixed_point,
        }
    }

    /// Fill every sample with one value.
    pub fn fill(&mut self, value: i32) {
        let size = self.fixed_point.byte_size();
        if size == 1 {
            self.data.fill(value as u8);
        } else {
            let raw = (value as i16).to_le_bytes();
            for pair in self.data.chunks_exact_mut(2) {
                pair.copy_from_slice(&raw);
            }
        }
    }

    #[inline]
    pub fn row_byte_stride(&self) -> usize {
        self.width as usize * self.fixed_point.byte_size()
    }

    /// Sample at `(x, y)` as a wide value.
    pub fn sample(&self, x: u32, y: u32) -> i32 {
        let index = (y * self.width + x) as usize;
        if self.fixed_point.byte_size() == 1 {
            i32::from(self.data[index])
        } else {
            let raw = [self.data[index * 2], self.data[index * 2 + 1]];
            if self.fixed_point.is_signed() {
                i32::from(i16::from_le_bytes(raw))
            } else {
                i32::from(u16::from_le_bytes(raw))
            }
        }
    }

    pub fn as_pixels(&self) -> PlanePixels<'_> {
        PlanePixels {
            samples: &self.data,
            row_byte_stride: self.row_byte_stride(),
            fixed_point: self.fixed_point,
        }
    }

    pub fn as_pixels_mut(&mut self) -> PlanePixelsMut<'_> {
        let stride = self.row_byte_stride();
        PlanePixelsMut {
            samples: &mut self.data,
            row_byte_stride: stride,
            fixed_point: self.fixed_point,
        }
    }
}
