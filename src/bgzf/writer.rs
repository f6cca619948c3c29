use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};

use super::{VirtualOffset, BLOCK_MAGIC, BSIZE_SUBFIELD, TERMINAL_BLOCK};
use crate::error::FormatError;
use crate::Result;

/// Staged payload is flushed at this size. Kept below the 64 KiB payload
/// limit so the envelope length stays within its 16-bit field even when
/// deflate expands an incompressible payload.
const PAYLOAD_CAP: usize = crate::MAX_BLOCK_SIZE - 256;

/// Fixed envelope bytes around the deflate body: 18-byte header plus
/// CRC32 and payload-length trailer.
const ENVELOPE_SIZE: usize = 18 + 8;

/// Writes a block-compressed stream.
///
/// Payload bytes are staged in an internal buffer and emitted as a
/// framed, deflate-compressed block whenever the buffer fills or
/// [`flush_block`](Self::flush_block) is called. [`finish`](Self::finish)
/// flushes the last block and appends the terminal block.
pub struct BgzfWriter<W: Write> {
    inner: W,
    buffer: Vec<u8>,
    compressed_offset: u64,
    finished: bool,
}

impl<W: Write> BgzfWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buffer: Vec::with_capacity(PAYLOAD_CAP),
            compressed_offset: 0,
            finished: false,
        }
    }

    /// The virtual offset at which the next payload byte will land.
    #[must_use]
    pub fn virtual_offset(&self) -> VirtualOffset {
        VirtualOffset::new(self.compressed_offset, self.buffer.len() as u16)
    }

    /// Stages payload bytes, flushing full blocks as needed.
    pub fn write_payload(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            let room = PAYLOAD_CAP - self.buffer.len();
            let take = room.min(bytes.len());
            self.buffer.extend_from_slice(&bytes[..take]);
            bytes = &bytes[take..];
            if self.buffer.len() == PAYLOAD_CAP {
                self.flush_block()?;
            }
        }
        Ok(())
    }

    /// Emits the staged payload as one compressed block. A no-op when
    /// nothing is staged.
    pub fn flush_block(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let payload = std::mem::take(&mut self.buffer);
        self.write_block(&payload)?;
        self.buffer = payload;
        self.buffer.clear();
        Ok(())
    }

    /// Flushes the last block, appends the terminal block, and flushes
    /// the underlying stream. Idempotent.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.flush_block()?;
        self.inner.write_all(&TERMINAL_BLOCK)?;
        self.compressed_offset += TERMINAL_BLOCK.len() as u64;
        self.inner.flush()?;
        self.finished = true;
        Ok(())
    }

    /// Consumes the writer and returns the underlying stream.
    pub fn into_inner(mut self) -> Result<W> {
        self.finish()?;
        Ok(self.inner)
    }

    fn write_block(&mut self, payload: &[u8]) -> Result<()> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload)?;
        let deflated = encoder.finish()?;

        let total = ENVELOPE_SIZE + deflated.len();
        if total - 1 > usize::from(u16::MAX) {
            return Err(FormatError::OversizedPayload(payload.len()).into());
        }

        let mut crc = Crc::new();
        crc.update(payload);

        self.inner.write_all(&BLOCK_MAGIC)?;
        // MTIME, XFL, OS (unknown)
        self.inner.write_all(&[0, 0, 0, 0, 0, 255])?;
        // one extra subfield of two bytes
        self.inner.write_u16::<LittleEndian>(6)?;
        self.inner.write_all(&BSIZE_SUBFIELD)?;
        self.inner.write_u16::<LittleEndian>(2)?;
        self.inner.write_u16::<LittleEndian>((total - 1) as u16)?;
        self.inner.write_all(&deflated)?;
        self.inner.write_u32::<LittleEndian>(crc.sum())?;
        self.inner.write_u32::<LittleEndian>(payload.len() as u32)?;

        self.compressed_offset += total as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgzf::BgzfReader;
    use std::io::{Cursor, Read};

    fn round_trip(payload: &[u8]) -> Vec<u8> {
        let mut writer = BgzfWriter::new(Vec::new());
        writer.write_payload(payload).unwrap();
        let bytes = writer.into_inner().unwrap();
        let mut reader = BgzfReader::new(Cursor::new(bytes));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        out
    }

    // ==================== Round Trip Tests ====================

    #[test]
    fn test_round_trip_small_payload() {
        let payload = b"hello alignment blocks";
        assert_eq!(round_trip(payload), payload);
    }

    #[test]
    fn test_round_trip_empty_stream() {
        assert!(round_trip(b"").is_empty());
    }

    #[test]
    fn test_round_trip_exact_block_boundary() {
        let payload = vec![7u8; PAYLOAD_CAP];
        assert_eq!(round_trip(&payload), payload);
    }

    #[test]
    fn test_round_trip_multi_block() {
        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        assert_eq!(round_trip(&payload), payload);
    }

    // ==================== Envelope Tests ====================

    #[test]
    fn test_terminal_block_appended() {
        let mut writer = BgzfWriter::new(Vec::new());
        writer.write_payload(b"abc").unwrap();
        let bytes = writer.into_inner().unwrap();
        assert!(bytes.ends_with(&TERMINAL_BLOCK));
    }

    #[test]
    fn test_empty_stream_is_only_terminal_block() {
        let writer = BgzfWriter::new(Vec::new());
        let bytes = writer.into_inner().unwrap();
        assert_eq!(bytes, TERMINAL_BLOCK);
    }

    #[test]
    fn test_declared_block_size_matches() {
        let mut writer = BgzfWriter::new(Vec::new());
        writer.write_payload(b"payload").unwrap();
        writer.flush_block().unwrap();
        let bytes = writer.into_inner().unwrap();
        let declared = usize::from(u16::from_le_bytes([bytes[16], bytes[17]])) + 1;
        // first block runs up to the terminal block
        assert_eq!(declared, bytes.len() - TERMINAL_BLOCK.len());
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut writer = BgzfWriter::new(Vec::new());
        writer.write_payload(b"x").unwrap();
        writer.finish().unwrap();
        writer.finish().unwrap();
        let bytes = writer.into_inner().unwrap();
        let trailing = &bytes[bytes.len() - TERMINAL_BLOCK.len()..];
        assert_eq!(trailing, TERMINAL_BLOCK);
        assert!(!bytes[..bytes.len() - TERMINAL_BLOCK.len()].ends_with(&TERMINAL_BLOCK));
    }

    // ==================== Virtual Offset Tests ====================

    #[test]
    fn test_virtual_offset_tracks_staging() {
        let mut writer = BgzfWriter::new(Vec::new());
        assert_eq!(writer.virtual_offset(), VirtualOffset::new(0, 0));
        writer.write_payload(b"abcd").unwrap();
        assert_eq!(writer.virtual_offset(), VirtualOffset::new(0, 4));
        writer.flush_block().unwrap();
        let offset = writer.virtual_offset();
        assert!(offset.compressed > 0);
        assert_eq!(offset.uncompressed, 0);
    }
}
