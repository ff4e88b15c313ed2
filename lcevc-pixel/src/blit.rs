//! Whole-plane copy and add between pictures.
//!
//! `Copy` converts between fixed-point formats where a conversion exists:
//! identity, promotion and demotion between unsigned depths, and the
//! canonical pairing between an unsigned format and its signed fixed-point
//! twin. `Add` composes a signed residual plane onto any destination with
//! saturation. Anything else is rejected before touching a sample.

use rayon::prelude::*;

use lcevc_common::FixedPoint;
use lcevc_common::fixed_point::saturate_i16;

use crate::error::{PixelError, Result};
use crate::plane::{PlaneDesc, PlaneRef, rows};

/// Blit operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlitMode {
    /// Convert-and-overwrite.
    Copy,
    /// Saturating add of a signed source.
    Add,
}

/// Per-sample conversion applied by a copy blit.
#[derive(Debug, Clone, Copy)]
enum CopyKind {
    Identity,
    /// Unsigned to unsigned, shifting up.
    Promote(u32),
    /// Unsigned to unsigned, shifting down.
    Demote(u32),
    /// Unsigned to its signed fixed-point twin.
    ToSigned(u32),
    /// Signed back to its unsigned twin, with rounding.
    FromSigned,
}

fn copy_kind(src_fp: FixedPoint, dst_fp: FixedPoint) -> Result<CopyKind> {
    if src_fp == dst_fp {
        return Ok(CopyKind::Identity);
    }

    match (src_fp.is_signed(), dst_fp.is_signed()) {
        (false, false) => {
            let src_bits = src_fp.bit_depth();
            let dst_bits = dst_fp.bit_depth();
            if dst_bits >= src_bits {
                Ok(CopyKind::Promote(dst_bits - src_bits))
            } else {
                Ok(CopyKind::Demote(src_bits - dst_bits))
            }
        }
        (false, true) if dst_fp.low_precision() == src_fp => {
            Ok(CopyKind::ToSigned(src_fp.radix_shift()))
        }
        (true, false) if src_fp.low_precision() == dst_fp => Ok(CopyKind::FromSigned),
        _ => Err(PixelError::NotSupported),
    }
}

/// Blit `width x height` samples from `src` to `dst`.
pub fn blit(
    src: PlaneRef<'_>,
    src_fp: FixedPoint,
    dst: &mut PlaneDesc<'_>,
    dst_fp: FixedPoint,
    width: u32,
    height: u32,
    mode: BlitMode,
) -> Result<()> {
    match mode {
        BlitMode::Copy => {
            let kind = copy_kind(src_fp, dst_fp)?;

            if matches!(kind, CopyKind::Identity) {
                return blit_identity(src, dst, width, height, src_fp.byte_size());
            }

            let dst_stride = dst.row_byte_stride();
            dst.bytes_mut()
                .par_chunks_mut(dst_stride)
                .take(height as usize)
                .enumerate()
                .for_each(|(y, dst_row)| {
                    let src_row = src.row(y as u32);
                    for x in 0..width as usize {
                        let value = rows::load(src_row, x, src_fp);
                        let out = match kind {
                            CopyKind::Identity => value,
                            CopyKind::Promote(shift) => value << shift,
                            CopyKind::Demote(shift) => value >> shift,
                            CopyKind::ToSigned(shift) => (value << shift) - 16384,
                            CopyKind::FromSigned => i32::from(dst_fp.to_unsigned(value)),
                        };
                        rows::store(dst_row, x, dst_fp, out);
                    }
                });
            Ok(())
        }
        BlitMode::Add => {
            if !src_fp.is_signed() {
                return Err(PixelError::NotSupported);
            }

            let dst_stride = dst.row_byte_stride();
            dst.bytes_mut()
                .par_chunks_mut(dst_stride)
                .take(height as usize)
                .enumerate()
                .for_each(|(y, dst_row)| {
                    let src_row = src.row(y as u32);
                    if dst_fp.is_signed() {
                        for x in 0..width as usize {
                            let sum = rows::load(dst_row, x, dst_fp) + rows::load(src_row, x, src_fp);
                            rows::store(dst_row, x, dst_fp, i32::from(saturate_i16(sum)));
                        }
                    } else {
                        for x in 0..width as usize {
                            let pel = dst_fp.to_signed(rows::load(dst_row, x, dst_fp) as u16);
                            let sum = i32::from(pel) + rows::load(src_row, x, src_fp);
                            rows::store(dst_row, x, dst_fp, i32::from(dst_fp.to_unsigned(sum)));
                        }
                    }
                });
            Ok(())
        }
    }
}

/// Identity copies collapse to memcpy: one call when the strides agree and
/// are fully covered, a per-row copy otherwise.
fn blit_identity(
    src: PlaneRef<'_>,
    dst: &mut PlaneDesc<'_>,
    width: u32,
    height: u32,
    sample_size: usize,
) -> Result<()> {
    let row_bytes = width as usize * sample_size;
    if row_bytes > dst.row_byte_stride() || row_bytes > src.row_byte_stride() {
        return Err(PixelError::InvalidParam);
    }

    if src.row_byte_stride() == dst.row_byte_stride() && src.row_byte_stride() == row_bytes {
        let total = row_bytes * height as usize;
        dst.bytes_mut()[..total].copy_from_slice(&src.bytes()[..total]);
        return Ok(());
    }

    let dst_stride = dst.row_byte_stride();
    dst.bytes_mut()
        .par_chunks_mut(dst_stride)
        .take(height as usize)
        .enumerate()
        .for_each(|(y, dst_row)| {
            dst_row[..row_bytes].copy_from_slice(&src.row(y as u32)[..row_bytes]);
        });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16_plane(values: &[u16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn as_u16(bytes: &[u8]) -> Vec<u16> {
        bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect()
    }

    fn as_i16(bytes: &[u8]) -> Vec<i16> {
        bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect()
    }

    #[test]
    fn identity_copy_equals_memcpy_per_row() {
        let src_data: Vec<u8> = (0..40u8).collect();
        let mut dst_data = vec![0u8; 40];

        let src = PlaneRef::new(&src_data, 10);
        let mut dst = PlaneDesc::new(&mut dst_data, 10);
        blit(
            src,
            FixedPoint::U8,
            &mut dst,
            FixedPoint::U8,
            10,
            4,
            BlitMode::Copy,
        )
        .unwrap();
        assert_eq!(dst_data, src_data);
    }

    #[test]
    fn promote_and_demote_unsigned() {
        let src_data = vec![0u8, 128, 255, 64];
        let mut dst_data = vec![0u8; 8];

        let src = PlaneRef::new(&src_data, 4);
        let mut dst = PlaneDesc::new(&mut dst_data, 8);
        blit(
            src,
            FixedPoint::U8,
            &mut dst,
            FixedPoint::U10,
            4,
            1,
            BlitMode::Copy,
        )
        .unwrap();
        assert_eq!(as_u16(&dst_data), [0, 512, 1020, 256]);

        // And back down.
        let src_data = u16_plane(&[0, 512, 1020, 256]);
        let mut narrow = vec![0u8; 4];
        let src = PlaneRef::new(&src_data, 8);
        let mut dst = PlaneDesc::new(&mut narrow, 4);
        blit(
            src,
            FixedPoint::U10,
            &mut dst,
            FixedPoint::U8,
            4,
            1,
            BlitMode::Copy,
        )
        .unwrap();
        assert_eq!(narrow, [0, 128, 255, 64]);
    }

    #[test]
    fn canonical_signed_round_trip() {
        let src_data = vec![0u8, 100, 200, 255];
        let mut signed_data = vec![0u8; 8];

        let src = PlaneRef::new(&src_data, 4);
        let mut dst = PlaneDesc::new(&mut signed_data, 8);
        blit(
            src,
            FixedPoint::U8,
            &mut dst,
            FixedPoint::S8,
            4,
            1,
            BlitMode::Copy,
        )
        .unwrap();
        assert_eq!(as_i16(&signed_data), [-16384, -3584, 9216, 16256]);

        let signed_copy = signed_data.clone();
        let mut back = vec![0u8; 4];
        let src = PlaneRef::new(&signed_copy, 8);
        let mut dst = PlaneDesc::new(&mut back, 4);
        blit(
            src,
            FixedPoint::S8,
            &mut dst,
            FixedPoint::U8,
            4,
            1,
            BlitMode::Copy,
        )
        .unwrap();
        assert_eq!(back, [0, 100, 200, 255]);
    }

    #[test]
    fn add_saturates_into_unsigned() {
        let residuals: Vec<i16> = vec![1 << 7, -(1 << 7), 30000, -30000];
        let src_data: Vec<u8> = residuals.iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut dst_data = vec![100u8, 100, 100, 100];

        let src = PlaneRef::new(&src_data, 8);
        let mut dst = PlaneDesc::new(&mut dst_data, 4);
        blit(
            src,
            FixedPoint::S8,
            &mut dst,
            FixedPoint::U8,
            4,
            1,
            BlitMode::Add,
        )
        .unwrap();
        // One S8.7 step is one U8 step; large residuals clamp.
        assert_eq!(dst_data, [101, 99, 255, 0]);
    }

    #[test]
    fn add_of_unsigned_source_is_rejected() {
        let src_data = vec![0u8; 4];
        let mut dst_data = vec![0u8; 4];
        let src = PlaneRef::new(&src_data, 4);
        let mut dst = PlaneDesc::new(&mut dst_data, 4);
        assert_eq!(
            blit(
                src,
                FixedPoint::U8,
                &mut dst,
                FixedPoint::U8,
                4,
                1,
                BlitMode::Add,
            )
            .unwrap_err(),
            PixelError::NotSupported
        );
    }

    #[test]
    fn mismatched_signed_pair_is_rejected() {
        let src_data = vec![0u8; 8];
        let mut dst_data = vec![0u8; 4];
        let src = PlaneRef::new(&src_data, 8);
        let mut dst = PlaneDesc::new(&mut dst_data, 4);
        assert_eq!(
            blit(
                src,
                FixedPoint::S10,
                &mut dst,
                FixedPoint::U8,
                4,
                1,
                BlitMode::Copy,
            )
            .unwrap_err(),
            PixelError::NotSupported
        );
    }
}
