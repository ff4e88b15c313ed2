//! Canonical prefix-code tables for entropy-coded chunks.
//!
//! Each Huffman-coded chunk starts with a table description: the minimum and
//! maximum symbol values, then for every symbol in that range a presence bit
//! followed by a 5-bit code length. Codes are assigned canonically, shortest
//! first, in symbol order within a length. A table whose range collapses to
//! one symbol needs no code bits at all; the caller handles that case.

use crate::error::EntropyError;
use crate::reader::Reader;

const MAX_CODE_LENGTH: usize = 31;

/// A table description read from a chunk header.
#[derive(Debug, Clone)]
pub(crate) enum ReadTable {
    /// A real prefix-code table.
    Coded(HuffmanTable),
    /// The range held a single symbol; no code bits follow per symbol.
    Single(u8),
}

/// A canonical prefix-code table over byte symbols.
#[derive(Debug, Clone)]
pub(crate) struct HuffmanTable {
    /// Symbols sorted by (code length, symbol value).
    symbols: Vec<u8>,
    /// Number of codes of each length.
    count: [u32; MAX_CODE_LENGTH + 1],
    /// First canonical code of each length.
    first_code: [u32; MAX_CODE_LENGTH + 1],
    /// Index into `symbols` of the first symbol of each length.
    first_index: [u32; MAX_CODE_LENGTH + 1],
    max_length: usize,
}

impl HuffmanTable {
    /// Build a table from `(symbol, code length)` pairs.
    pub(crate) fn build(lengths: &[(u8, u8)]) -> Result<Self, EntropyError> {
        if lengths.len() < 2 {
            return Err(EntropyError::InvalidTable);
        }

        let mut count = [0u32; MAX_CODE_LENGTH + 1];
        let mut max_length = 0usize;
        for &(_, len) in lengths {
            let len = len as usize;
            if len == 0 || len > MAX_CODE_LENGTH {
                return Err(EntropyError::InvalidTable);
            }
            count[len] += 1;
            max_length = max_length.max(len);
        }

        // Canonical code assignment: codes of length n start where the
        // previous length's codes ended, shifted up one bit.
        let mut first_code = [0u32; MAX_CODE_LENGTH + 1];
        let mut first_index = [0u32; MAX_CODE_LENGTH + 1];
        let mut next_index = 0u32;
        for len in 1..=max_length {
            first_code[len] = (first_code[len - 1] + count[len - 1]) << 1;
            first_index[len] = next_index;
            next_index += count[len];

            // An over-subscribed length cannot form a prefix code.
            if u64::from(first_code[len]) + u64::from(count[len]) > (1u64 << len) {
                return Err(EntropyError::InvalidTable);
            }
        }

        let mut sorted: Vec<(u8, u8)> = lengths.to_vec();
        sorted.sort_by_key(|&(symbol, len)| (len, symbol));
        let symbols = sorted.iter().map(|&(symbol, _)| symbol).collect();

        Ok(Self {
            symbols,
            count,
            first_code,
            first_index,
            max_length,
        })
    }

    /// Read a table description from the bitstream.
    ///
    /// Layout: `min_symbol` byte, `max_symbol` byte, then one presence bit
    /// and an optional 5-bit code length per symbol in `min..=max`. A table
    /// whose range collapses to one symbol carries no length bits; its
    /// symbol is returned directly.
    pub(crate) fn read(reader: &mut Reader<'_>) -> Result<ReadTable, EntropyError> {
        let min_symbol = reader.read_byte()?;
        let max_symbol = reader.read_byte()?;

        if min_symbol > max_symbol {
            return Err(EntropyError::InvalidTable);
        }
        if min_symbol == max_symbol {
            return Ok(ReadTable::Single(min_symbol));
        }

        let mut lengths = Vec::new();
        for symbol in min_symbol..=max_symbol {
            if reader.read_bit().ok_or(EntropyError::Truncated)? == 1 {
                let len = reader.read_bits(5)? as u8;
                lengths.push((symbol, len));
            }
        }

        Ok(ReadTable::Coded(Self::build(&lengths)?))
    }

    /// Decode one symbol, walking the canonical code MSB first.
    pub(crate) fn decode(&self, reader: &mut Reader<'_>) -> Result<u8, EntropyError> {
        let mut code = 0u32;
        for len in 1..=self.max_length {
            let bit = reader.read_bit().ok_or(EntropyError::Truncated)?;
            code = (code << 1) | bit;

            if self.count[len] > 0 && code < self.first_code[len] + self.count[len] {
                // first_code is the smallest code of this length, so the
                // range check above is sufficient on the upper side only.
                if code >= self.first_code[len] {
                    let index = self.first_index[len] + (code - self.first_code[len]);
                    return Ok(self.symbols[index as usize]);
                }
            }
        }

        Err(EntropyError::InvalidCode)
    }
}
