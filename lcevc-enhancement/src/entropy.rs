//! Entropy decoding of per-layer coefficient and temporal-signal chunks.
//!
//! Residual layers are coded as `(coefficient, zero run)` pairs: the
//! coefficient as a zig-zag value in 7-bit continuation groups, the trailing
//! run of zero-valued transforms likewise. Temporal chunks carry
//! `(signal, run)` pairs where the run is inclusive of the current symbol.
//!
//! A chunk either feeds these records from raw bytes (`rle_only`) or routes
//! every byte through a prefix-code table signalled at the start of the
//! chunk: a 24-bit symbol count, then the table description, then the coded
//! bits. Running out of data *between* records is the normal end-of-layer
//! condition ("no data"); running out inside a record is corruption and
//! fatal to the enclosing frame.

use lcevc_common::Chunk;

use crate::error::EntropyError;
use crate::huffman::{HuffmanTable, ReadTable};
use crate::reader::Reader;

/// Current revision of the coded-layer dialect.
pub const BITSTREAM_VERSION_CURRENT: u8 = 1;

/// Residual mode relative to the temporal surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalSignal {
    /// Residuals add onto the carried surface.
    Inter = 0,
    /// Residuals overwrite the carried surface.
    Intra = 1,
}

/// Which record grammar a decoder produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderKind {
    Residual,
    Temporal,
}

#[derive(Debug)]
enum ByteSource<'a> {
    /// Chunk with `entropy_enabled == false`: an endless zero layer.
    Disabled,
    /// `rle_only` chunk: plain bytes.
    Raw(Reader<'a>),
    /// Prefix-coded chunk.
    Coded {
        reader: Reader<'a>,
        table: HuffmanTable,
        remaining: u32,
    },
    /// Degenerate one-symbol chunk.
    Single { symbol: u8, remaining: u32 },
}

/// Decoder over one chunk.
#[derive(Debug)]
pub struct EntropyDecoder<'a> {
    source: ByteSource<'a>,
    kind: DecoderKind,
    version: u8,
}

impl<'a> EntropyDecoder<'a> {
    /// Set up a decoder for a chunk.
    ///
    /// `version` selects the bitstream dialect; pass
    /// [`BITSTREAM_VERSION_CURRENT`] for current streams.
    pub fn new(chunk: &Chunk<'a>, kind: DecoderKind, version: u8) -> Result<Self, EntropyError> {
        let source = if !chunk.entropy_enabled {
            ByteSource::Disabled
        } else if chunk.rle_only {
            ByteSource::Raw(Reader::new(chunk.data))
        } else {
            let mut reader = Reader::new(chunk.data);
            let remaining = reader.read_bits(24)?;
            match HuffmanTable::read(&mut reader)? {
                ReadTable::Coded(table) => ByteSource::Coded {
                    reader,
                    table,
                    remaining,
                },
                ReadTable::Single(symbol) => ByteSource::Single { symbol, remaining },
            }
        };

        Ok(Self {
            source,
            kind,
            version,
        })
    }

    /// Next symbol byte, or `None` at a clean end of the chunk.
    fn next_byte(&mut self) -> Result<Option<u8>, EntropyError> {
        match &mut self.source {
            ByteSource::Disabled => Ok(None),
            ByteSource::Raw(reader) => {
                if reader.at_end() {
                    Ok(None)
                } else {
                    reader.read_byte().map(Some)
                }
            }
            ByteSource::Coded {
                reader,
                table,
                remaining,
            } => {
                if *remaining == 0 {
                    Ok(None)
                } else {
                    *remaining -= 1;
                    table.decode(reader).map(Some)
                }
            }
            ByteSource::Single { symbol, remaining } => {
                if *remaining == 0 {
                    Ok(None)
                } else {
                    *remaining -= 1;
                    Ok(Some(*symbol))
                }
            }
        }
    }

    /// A byte that must exist because a record has been started.
    fn require_byte(&mut self) -> Result<u8, EntropyError> {
        self.next_byte()?.ok_or(EntropyError::Truncated)
    }

    /// Decode one `(coefficient, zero run)` record.
    ///
    /// `Ok(None)` signals the end of the layer; the remaining transforms are
    /// an implicit zero run.
    pub fn decode(&mut self) -> Result<Option<(i16, u32)>, EntropyError> {
        debug_assert_eq!(self.kind, DecoderKind::Residual);

        let Some(first) = self.next_byte()? else {
            return Ok(None);
        };

        // Zig-zag coefficient in 7-bit groups, least significant first.
        let mut raw = u32::from(first & 0x7F);
        let mut byte = first;
        let mut shift = 7u32;
        while byte & 0x80 != 0 {
            byte = self.require_byte()?;
            raw |= u32::from(byte & 0x7F) << shift;
            shift += 7;
            if shift > 21 {
                return Err(EntropyError::InvalidValue);
            }
        }
        if raw > u32::from(u16::MAX) {
            return Err(EntropyError::InvalidValue);
        }
        let coeff = zigzag_decode(raw as u16);

        let run = self.read_run(0, 0)?;
        Ok(Some((coeff, run)))
    }

    /// Decode one `(signal, run)` record. The run counts the current symbol
    /// too, i.e. "this signal holds for N transforms".
    ///
    /// `Ok(None)` means the rest of the plane is Inter.
    pub fn decode_temporal(&mut self) -> Result<Option<(TemporalSignal, u32)>, EntropyError> {
        debug_assert_eq!(self.kind, DecoderKind::Temporal);

        let Some(first) = self.next_byte()? else {
            return Ok(None);
        };

        let signal = if first & 1 == 1 {
            TemporalSignal::Intra
        } else {
            TemporalSignal::Inter
        };

        let low = u32::from((first >> 1) & 0x3F);
        let mut run = if first & 0x80 != 0 {
            self.read_run(low, 6)?
        } else {
            low
        };

        // Version 0 coded temporal runs exclusive of the current symbol.
        if self.version == 0 {
            run += 1;
        }

        Ok(Some((signal, run)))
    }

    /// Continue a 7-bit-group run whose low bits (and continuation flag
    /// position) came from an earlier byte.
    fn read_run(&mut self, seed: u32, seed_bits: u32) -> Result<u32, EntropyError> {
        let mut run = seed;
        let mut shift = seed_bits;
        loop {
            let byte = self.require_byte()?;
            run |= u32::from(byte & 0x7F) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                return Ok(run);
            }
            if shift > 28 {
                return Err(EntropyError::InvalidValue);
            }
        }
    }
}

#[inline]
fn zigzag_decode(value: u16) -> i16 {
    ((value >> 1) as i16) ^ -((value & 1) as i16)
}

#[cfg(test)]
pub(crate) mod test_stream {
    //! Helpers for building coded-layer byte streams by hand in tests.

    use super::TemporalSignal;

    #[inline]
    fn zigzag_encode(value: i16) -> u16 {
        ((value << 1) ^ (value >> 15)) as u16
    }

    fn push_groups(out: &mut Vec<u8>, mut value: u32) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                out.push(byte);
                return;
            }
            out.push(byte | 0x80);
        }
    }

    /// Append one residual `(coefficient, run)` record.
    pub(crate) fn record(out: &mut Vec<u8>, coeff: i16, run: u32) {
        push_groups(out, u32::from(zigzag_encode(coeff)));
        push_groups(out, run);
    }

    /// Append one temporal `(signal, run)` record. `run` is inclusive.
    pub(crate) fn temporal(out: &mut Vec<u8>, signal: TemporalSignal, run: u32) {
        let low = (run & 0x3F) as u8;
        let rest = run >> 6;
        let mut first = (low << 1) | (signal as u8);
        if rest != 0 {
            first |= 0x80;
        }
        out.push(first);
        if rest != 0 {
            push_groups(out, rest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_chunk(data: &[u8]) -> Chunk<'_> {
        Chunk::new(data, true)
    }

    #[test]
    fn raw_residual_records() {
        let mut data = Vec::new();
        test_stream::record(&mut data, 5, 3);
        test_stream::record(&mut data, -200, 0);
        test_stream::record(&mut data, 0, 100_000);

        let chunk = raw_chunk(&data);
        let mut decoder = EntropyDecoder::new(&chunk, DecoderKind::Residual, 1).unwrap();
        assert_eq!(decoder.decode().unwrap(), Some((5, 3)));
        assert_eq!(decoder.decode().unwrap(), Some((-200, 0)));
        assert_eq!(decoder.decode().unwrap(), Some((0, 100_000)));
        assert_eq!(decoder.decode().unwrap(), None);
        assert_eq!(decoder.decode().unwrap(), None);
    }

    #[test]
    fn truncation_inside_a_record_is_an_error() {
        let mut data = Vec::new();
        test_stream::record(&mut data, -200, 7);
        data.pop();

        let chunk = raw_chunk(&data);
        let mut decoder = EntropyDecoder::new(&chunk, DecoderKind::Residual, 1).unwrap();
        assert_eq!(decoder.decode().unwrap_err(), EntropyError::Truncated);
    }

    #[test]
    fn temporal_records() {
        let mut data = Vec::new();
        test_stream::temporal(&mut data, TemporalSignal::Intra, 3);
        test_stream::temporal(&mut data, TemporalSignal::Inter, 70);
        test_stream::temporal(&mut data, TemporalSignal::Intra, 100_000);

        let chunk = raw_chunk(&data);
        let mut decoder = EntropyDecoder::new(&chunk, DecoderKind::Temporal, 1).unwrap();
        assert_eq!(
            decoder.decode_temporal().unwrap(),
            Some((TemporalSignal::Intra, 3))
        );
        assert_eq!(
            decoder.decode_temporal().unwrap(),
            Some((TemporalSignal::Inter, 70))
        );
        assert_eq!(
            decoder.decode_temporal().unwrap(),
            Some((TemporalSignal::Intra, 100_000))
        );
        assert_eq!(decoder.decode_temporal().unwrap(), None);
    }

    #[test]
    fn disabled_chunk_is_immediately_empty() {
        let chunk = Chunk::EMPTY;
        let mut decoder = EntropyDecoder::new(&chunk, DecoderKind::Residual, 1).unwrap();
        assert_eq!(decoder.decode().unwrap(), None);
    }

    #[test]
    fn coded_chunk_round_trip() {
        // Two records, (1, 2) then (-1, 0), over the byte alphabet they
        // need. zigzag(1) = 2, zigzag(-1) = 1.
        let mut symbols = Vec::new();
        test_stream::record(&mut symbols, 1, 2);
        test_stream::record(&mut symbols, -1, 0);
        assert_eq!(symbols, [2, 2, 1, 0]);

        // Table over symbols 0..=2 with lengths 0:2, 1:2, 2:1.
        // Canonical codes: 2 -> 0, 0 -> 10, 1 -> 11.
        let mut data = Vec::new();
        data.extend_from_slice(&[0, 0, symbols.len() as u8]); // 24-bit count
        data.push(0); // min symbol
        data.push(2); // max symbol
        // presence/length bits (18) directly followed by the code bits for
        // symbols 2,2,1,0 (0 0 11 10, 6 bits) -- 24 bits in total:
        // 1,00010 1,00010 1,00001 001110
        data.extend_from_slice(&[0b1_00010_1_0, 0b0010_1_000, 0b01_001110]);

        let chunk = Chunk::new(&data, false);
        let mut decoder = EntropyDecoder::new(&chunk, DecoderKind::Residual, 1).unwrap();
        assert_eq!(decoder.decode().unwrap(), Some((1, 2)));
        assert_eq!(decoder.decode().unwrap(), Some((-1, 0)));
        assert_eq!(decoder.decode().unwrap(), None);
    }

    #[test]
    fn single_symbol_chunk() {
        // Four zero symbols: records (0,0) twice.
        let data = [0u8, 0, 4, 0, 0];
        let chunk = Chunk::new(&data, false);
        let mut decoder = EntropyDecoder::new(&chunk, DecoderKind::Residual, 1).unwrap();
        assert_eq!(decoder.decode().unwrap(), Some((0, 0)));
        assert_eq!(decoder.decode().unwrap(), Some((0, 0)));
        assert_eq!(decoder.decode().unwrap(), None);
    }

    #[test]
    fn version_zero_runs_are_exclusive() {
        let mut data = Vec::new();
        test_stream::temporal(&mut data, TemporalSignal::Intra, 3);

        let chunk = raw_chunk(&data);
        let mut decoder = EntropyDecoder::new(&chunk, DecoderKind::Temporal, 0).unwrap();
        assert_eq!(
            decoder.decode_temporal().unwrap(),
            Some((TemporalSignal::Intra, 4))
        );
    }
}
