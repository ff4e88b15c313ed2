//! Entropy-coded chunk descriptor.

/// One layer of encoded data for one tile: a contiguous byte range together
/// with the flags needed to decode it.
///
/// A chunk with `entropy_enabled == false` carries no coefficients at all;
/// the corresponding layer is an implicit run of zeros across the whole
/// surface. `rle_only` chunks skip the prefix-code stage and are plain
/// run-length byte streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct Chunk<'a> {
    pub rle_only: bool,
    pub entropy_enabled: bool,
    pub data: &'a [u8],
}

impl<'a> Chunk<'a> {
    /// A disabled chunk, decoding to a surface-long zero run.
    pub const EMPTY: Chunk<'static> = Chunk {
        rle_only: false,
        entropy_enabled: false,
        data: &[],
    };

    pub fn new(data: &'a [u8], rle_only: bool) -> Self {
        Self {
            rle_only,
            entropy_enabled: true,
            data,
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
