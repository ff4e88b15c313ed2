//! Raw frame I/O over the supported color format tags.

use std::io::{self, Read, Write};

use lcevc_common::FixedPoint;

/// The color formats a raw file can carry. Plane count, subsampling and bit
/// depth all derive from the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum ColorFormat {
    I420_8,
    I420_10_LE,
    I420_12_LE,
    I420_14_LE,
    I420_16_LE,
    I422_8,
    I422_10_LE,
    I422_12_LE,
    I422_14_LE,
    I422_16_LE,
    I444_8,
    I444_10_LE,
    I444_12_LE,
    I444_14_LE,
    I444_16_LE,
    NV12_8,
    NV21_8,
    RGB_8,
    BGR_8,
    RGBA_8,
    BGRA_8,
    ARGB_8,
    ABGR_8,
    RGBA_10_2_LE,
    GRAY_8,
    GRAY_10_LE,
    GRAY_12_LE,
    GRAY_14_LE,
    GRAY_16_LE,
}

impl ColorFormat {
    /// Number of stored planes.
    pub fn plane_count(self) -> usize {
        match self {
            Self::I420_8
            | Self::I420_10_LE
            | Self::I420_12_LE
            | Self::I420_14_LE
            | Self::I420_16_LE
            | Self::I422_8
            | Self::I422_10_LE
            | Self::I422_12_LE
            | Self::I422_14_LE
            | Self::I422_16_LE
            | Self::I444_8
            | Self::I444_10_LE
            | Self::I444_12_LE
            | Self::I444_14_LE
            | Self::I444_16_LE => 3,
            Self::NV12_8 | Self::NV21_8 => 2,
            _ => 1,
        }
    }

    pub fn bit_depth(self) -> u32 {
        match self {
            Self::I420_10_LE | Self::I422_10_LE | Self::I444_10_LE | Self::GRAY_10_LE => 10,
            Self::I420_12_LE | Self::I422_12_LE | Self::I444_12_LE | Self::GRAY_12_LE => 12,
            Self::I420_14_LE | Self::I422_14_LE | Self::I444_14_LE | Self::GRAY_14_LE => 14,
            Self::I420_16_LE | Self::I422_16_LE | Self::I444_16_LE | Self::GRAY_16_LE => 16,
            Self::RGBA_10_2_LE => 10,
            _ => 8,
        }
    }

    /// The closest decoder fixed-point tag for a plane of this format.
    pub fn fixed_point(self) -> FixedPoint {
        match self.bit_depth() {
            10 => FixedPoint::U10,
            12 => FixedPoint::U12,
            14 => FixedPoint::U14,
            // 16-bit storage decodes through the 14-bit pipeline.
            16 => FixedPoint::U14,
            _ => FixedPoint::U8,
        }
    }

    /// Bytes per stored sample.
    pub fn sample_size(self) -> usize {
        match self {
            Self::RGBA_10_2_LE => 4,
            _ if self.bit_depth() > 8 => 2,
            _ => 1,
        }
    }

    /// Samples per pixel in plane 0 (interleaved formats).
    pub fn interleave(self) -> usize {
        match self {
            Self::RGB_8 | Self::BGR_8 => 3,
            Self::RGBA_8 | Self::BGRA_8 | Self::ARGB_8 | Self::ABGR_8 => 4,
            _ => 1,
        }
    }

    /// Width shift of plane `index` relative to the picture width.
    pub fn width_shift(self, index: usize) -> u32 {
        match self {
            Self::I420_8
            | Self::I420_10_LE
            | Self::I420_12_LE
            | Self::I420_14_LE
            | Self::I420_16_LE
            | Self::I422_8
            | Self::I422_10_LE
            | Self::I422_12_LE
            | Self::I422_14_LE
            | Self::I422_16_LE
            | Self::NV12_8
            | Self::NV21_8
                if index > 0 =>
            {
                1
            }
            _ => 0,
        }
    }

    /// Height shift of plane `index` relative to the picture height.
    pub fn height_shift(self, index: usize) -> u32 {
        match self {
            Self::I420_8
            | Self::I420_10_LE
            | Self::I420_12_LE
            | Self::I420_14_LE
            | Self::I420_16_LE
            | Self::NV12_8
            | Self::NV21_8
                if index > 0 =>
            {
                1
            }
            _ => 0,
        }
    }

    /// Byte size of plane `index` for a `width x height` picture.
    pub fn plane_size(self, index: usize, width: u32, height: u32) -> usize {
        let plane_width = (width >> self.width_shift(index)) as usize;
        let plane_height = (height >> self.height_shift(index)) as usize;
        let samples = match self {
            // NV12/NV21 interleave both chroma channels into plane 1.
            Self::NV12_8 | Self::NV21_8 if index > 0 => plane_width * 2,
            _ => plane_width * self.interleave(),
        };
        samples * plane_height * self.sample_size()
    }

    /// Total byte size of one frame.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        (0..self.plane_count())
            .map(|index| self.plane_size(index, width, height))
            .sum()
    }
}

/// Reads whole frames of a raw file.
#[derive(Debug)]
pub struct RawFrameReader<R> {
    inner: R,
    format: ColorFormat,
    width: u32,
    height: u32,
}

impl<R: Read> RawFrameReader<R> {
    pub fn new(inner: R, format: ColorFormat, width: u32, height: u32) -> Self {
        Self {
            inner,
            format,
            width,
            height,
        }
    }

    #[inline]
    pub fn format(&self) -> ColorFormat {
        self.format
    }

    /// Read the next frame's planes, or `None` at a clean end of file.
    pub fn read_frame(&mut self) -> io::Result<Option<Vec<Vec<u8>>>> {
        let mut planes = Vec::with_capacity(self.format.plane_count());
        for index in 0..self.format.plane_count() {
            let mut data = vec![0u8; self.format.plane_size(index, self.width, self.height)];

            if index == 0 {
                match self.inner.read(&mut data[..1])? {
                    0 => return Ok(None),
                    _ => self.inner.read_exact(&mut data[1..])?,
                }
            } else {
                self.inner.read_exact(&mut data)?;
            }
            planes.push(data);
        }
        Ok(Some(planes))
    }
}

/// Writes whole frames of a raw file.
#[derive(Debug)]
pub struct RawFrameWriter<W> {
    inner: W,
}

impl<W: Write> RawFrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_frame(&mut self, planes: &[Vec<u8>]) -> io::Result<()> {
        for plane in planes {
            self.inner.write_all(plane)?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_sizes_follow_subsampling() {
        assert_eq!(ColorFormat::I420_8.frame_size(16, 8), 16 * 8 * 3 / 2);
        assert_eq!(ColorFormat::I420_10_LE.frame_size(16, 8), 16 * 8 * 3);
        assert_eq!(ColorFormat::I422_8.frame_size(16, 8), 16 * 8 * 2);
        assert_eq!(ColorFormat::I444_8.frame_size(16, 8), 16 * 8 * 3);
        assert_eq!(ColorFormat::NV12_8.frame_size(16, 8), 16 * 8 * 3 / 2);
        assert_eq!(ColorFormat::GRAY_8.frame_size(16, 8), 16 * 8);
        assert_eq!(ColorFormat::RGB_8.frame_size(16, 8), 16 * 8 * 3);
        assert_eq!(ColorFormat::RGBA_10_2_LE.frame_size(16, 8), 16 * 8 * 4);
    }

    #[test]
    fn frames_round_trip() {
        let format = ColorFormat::I420_8;
        let frame: Vec<Vec<u8>> = (0..3)
            .map(|index| {
                let size = format.plane_size(index, 8, 8);
                (0..size).map(|i| (i + index * 7) as u8).collect()
            })
            .collect();

        let mut writer = RawFrameWriter::new(Vec::new());
        writer.write_frame(&frame).unwrap();
        writer.write_frame(&frame).unwrap();
        let bytes = writer.into_inner();

        let mut reader = RawFrameReader::new(bytes.as_slice(), format, 8, 8);
        assert_eq!(reader.read_frame().unwrap(), Some(frame.clone()));
        assert_eq!(reader.read_frame().unwrap(), Some(frame));
        assert_eq!(reader.read_frame().unwrap(), None);
    }
}
