//! Plane digests for conformance harnesses.

/// MD5 digest of the active area of a plane, as a lowercase hex string.
///
/// Only `width_bytes` of each row participate, so padding bytes in strided
/// buffers never affect the digest.
pub fn plane_digest(data: &[u8], row_byte_stride: usize, width_bytes: usize, rows: usize) -> String {
    debug_assert!(width_bytes <= row_byte_stride);

    let mut active = Vec::with_capacity(width_bytes * rows);
    for row in 0..rows {
        let start = row * row_byte_stride;
        active.extend_from_slice(&data[start..start + width_bytes]);
    }
    format!("{:x}", md5::compute(&active))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_ignores_row_padding() {
        // Two buffers with the same active samples but different padding.
        let tight: Vec<u8> = (0..32u8).collect();
        let mut padded = Vec::new();
        for row in tight.chunks(8) {
            padded.extend_from_slice(row);
            padded.extend_from_slice(&[0xEE; 4]);
        }

        assert_eq!(
            plane_digest(&tight, 8, 8, 4),
            plane_digest(&padded, 12, 8, 4)
        );
    }

    #[test]
    fn digest_matches_a_known_vector() {
        // RFC 1321: MD5("abc") = 900150983cd24fb0d6963f7d28e17f72.
        assert_eq!(
            plane_digest(b"abc", 3, 3, 1),
            "900150983cd24fb0d6963f7d28e17f72"
        );
    }
}
