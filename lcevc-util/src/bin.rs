//! BIN enhancement files.
//!
//! A BIN file is a sequence of records, each carrying the pre-parsed
//! enhancement payload of one access unit:
//!
//! ```text
//! decode_index: i64 LE | presentation_index: i64 LE | size: u32 LE | payload
//! ```
//!
//! Harnesses pair these with a raw base file to drive the decoder without a
//! bitstream parser.

use std::io::{self, Read, Write};

/// One access unit's worth of enhancement data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinRecord {
    pub decode_index: i64,
    pub presentation_index: i64,
    pub payload: Vec<u8>,
}

/// Reads BIN records from a byte stream.
#[derive(Debug)]
pub struct BinReader<R> {
    inner: R,
}

impl<R: Read> BinReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read the next record, or `None` at a clean end of the stream.
    pub fn read_record(&mut self) -> io::Result<Option<BinRecord>> {
        let mut header = [0u8; 20];

        // A clean EOF before the header means the file is done; a partial
        // header is corruption.
        match self.inner.read(&mut header[..1])? {
            0 => return Ok(None),
            _ => self.inner.read_exact(&mut header[1..])?,
        }

        let decode_index = i64::from_le_bytes(header[0..8].try_into().unwrap());
        let presentation_index = i64::from_le_bytes(header[8..16].try_into().unwrap());
        let size = u32::from_le_bytes(header[16..20].try_into().unwrap());

        let mut payload = vec![0u8; size as usize];
        self.inner.read_exact(&mut payload)?;

        Ok(Some(BinRecord {
            decode_index,
            presentation_index,
            payload,
        }))
    }
}

/// Writes BIN records to a byte stream.
#[derive(Debug)]
pub struct BinWriter<W> {
    inner: W,
}

impl<W: Write> BinWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_record(&mut self, record: &BinRecord) -> io::Result<()> {
        self.inner.write_all(&record.decode_index.to_le_bytes())?;
        self.inner
            .write_all(&record.presentation_index.to_le_bytes())?;
        self.inner
            .write_all(&(record.payload.len() as u32).to_le_bytes())?;
        self.inner.write_all(&record.payload)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_round_trip() {
        let records = [
            BinRecord {
                decode_index: 0,
                presentation_index: 0,
                payload: vec![1, 2, 3],
            },
            BinRecord {
                decode_index: 1,
                presentation_index: -1,
                payload: vec![],
            },
            BinRecord {
                decode_index: i64::MAX,
                presentation_index: i64::MIN,
                payload: vec![0xAB; 1000],
            },
        ];

        let mut writer = BinWriter::new(Vec::new());
        for record in &records {
            writer.write_record(record).unwrap();
        }
        let bytes = writer.into_inner();

        let mut reader = BinReader::new(bytes.as_slice());
        for record in &records {
            assert_eq!(reader.read_record().unwrap().as_ref(), Some(record));
        }
        assert_eq!(reader.read_record().unwrap(), None);
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let mut writer = BinWriter::new(Vec::new());
        writer
            .write_record(&BinRecord {
                decode_index: 3,
                presentation_index: 3,
                payload: vec![9; 64],
            })
            .unwrap();
        let mut bytes = writer.into_inner();
        bytes.truncate(bytes.len() - 10);

        let mut reader = BinReader::new(bytes.as_slice());
        assert!(reader.read_record().is_err());
    }
}
