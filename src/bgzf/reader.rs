use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::DeflateDecoder;

use super::{VirtualOffset, BLOCK_MAGIC, BSIZE_SUBFIELD};
use crate::error::{Error, FormatError};
use crate::Result;

/// Reads a block-compressed stream one block at a time.
///
/// Holds exactly one decompressed block and a cursor into it; the
/// [`Read`] implementation drains the current block and pulls the next
/// one on demand. The compressed offset of every block is tracked as it
/// is read, so [`virtual_offset`](Self::virtual_offset) is always the
/// address of the next payload byte.
///
/// An empty-payload block marks logical end of file; a stream that
/// simply ends at a block boundary is also treated as exhausted.
#[derive(Debug)]
pub struct BgzfReader<R: Read> {
    inner: R,
    block: Vec<u8>,
    cursor: usize,
    block_offset: u64,
    next_offset: u64,
    eof: bool,
}

impl<R: Read> BgzfReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            block: Vec::new(),
            cursor: 0,
            block_offset: 0,
            next_offset: 0,
            eof: false,
        }
    }

    /// The virtual offset of the next payload byte.
    ///
    /// When the current block is fully consumed this is the start of the
    /// following block, which is where the next byte will come from.
    #[must_use]
    pub fn virtual_offset(&self) -> VirtualOffset {
        if self.cursor == self.block.len() {
            VirtualOffset::new(self.next_offset, 0)
        } else {
            VirtualOffset::new(self.block_offset, self.cursor as u16)
        }
    }

    /// Compressed offset of the block currently being drained.
    #[must_use]
    pub fn block_offset(&self) -> u64 {
        self.block_offset
    }

    /// Cursor position within the current block's payload.
    #[must_use]
    pub fn block_cursor(&self) -> usize {
        self.cursor
    }

    /// Whether the logical end of the stream has been reached.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.eof && self.cursor == self.block.len()
    }

    /// Reads and decompresses the next block, replacing the current one.
    ///
    /// Returns `Ok(false)` at logical end of stream: underlying stream
    /// exhaustion or an empty-payload terminal block.
    pub fn advance_block(&mut self) -> Result<bool> {
        if self.eof {
            return Ok(false);
        }
        let offset = self.next_offset;

        let mut first = [0u8; 1];
        match self.inner.read_exact(&mut first) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                self.eof = true;
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }

        let mut header = [0u8; 12];
        header[0] = first[0];
        self.inner
            .read_exact(&mut header[1..])
            .map_err(|e| truncated(e, offset))?;
        if header[0..4] != BLOCK_MAGIC {
            return Err(FormatError::InvalidBlockMagic(offset).into());
        }

        let xlen = usize::from(u16::from_le_bytes([header[10], header[11]]));
        let mut extra = vec![0u8; xlen];
        self.inner
            .read_exact(&mut extra)
            .map_err(|e| truncated(e, offset))?;
        let total = usize::from(block_size(&extra, offset)?) + 1;

        // everything after the fixed header and extra field: deflate
        // body plus the 8-byte trailer
        let remaining = total
            .checked_sub(12 + xlen)
            .filter(|n| *n >= 8)
            .ok_or(FormatError::TruncatedBlock(offset))?;
        let mut body = vec![0u8; remaining];
        self.inner
            .read_exact(&mut body)
            .map_err(|e| truncated(e, offset))?;

        let trailer = &body[remaining - 8..];
        let declared = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);

        let mut payload = Vec::with_capacity(declared as usize);
        DeflateDecoder::new(&body[..remaining - 8])
            .read_to_end(&mut payload)
            .map_err(|e| truncated(e, offset))?;
        if payload.len() != declared as usize {
            return Err(FormatError::PayloadLengthMismatch {
                declared,
                got: payload.len(),
            }
            .into());
        }
        if payload.len() > crate::MAX_BLOCK_SIZE {
            return Err(FormatError::OversizedPayload(payload.len()).into());
        }

        self.block_offset = offset;
        self.next_offset = offset + total as u64;
        self.cursor = 0;
        if payload.is_empty() {
            // terminal block
            self.block.clear();
            self.eof = true;
            return Ok(false);
        }
        self.block = payload;
        self.eof = false;
        Ok(true)
    }
}

impl<R: Read + Seek> BgzfReader<R> {
    /// Repositions the reader at a virtual offset.
    ///
    /// Seeks the underlying stream to the block start, inflates the
    /// block, and places the cursor at the intra-block offset.
    pub fn seek_virtual(&mut self, offset: VirtualOffset) -> Result<()> {
        self.inner.seek(SeekFrom::Start(offset.compressed))?;
        self.next_offset = offset.compressed;
        self.block.clear();
        self.cursor = 0;
        self.eof = false;
        if self.advance_block()? {
            let skip = usize::from(offset.uncompressed);
            if skip > self.block.len() {
                return Err(FormatError::TruncatedBlock(offset.compressed).into());
            }
            self.cursor = skip;
        }
        Ok(())
    }
}

impl<R: Read> Read for BgzfReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.cursor == self.block.len() {
            match self.advance_block() {
                Ok(true) => {}
                Ok(false) => return Ok(0),
                Err(Error::IoError(e)) => return Err(e),
                Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
            }
        }
        let take = buf.len().min(self.block.len() - self.cursor);
        buf[..take].copy_from_slice(&self.block[self.cursor..self.cursor + take]);
        self.cursor += take;
        Ok(take)
    }
}

/// Extracts the declared total block size from the extra subfields.
fn block_size(extra: &[u8], offset: u64) -> Result<u16> {
    let mut slice = extra;
    while slice.len() >= 4 {
        let id = [slice[0], slice[1]];
        let len = usize::from(u16::from_le_bytes([slice[2], slice[3]]));
        if slice.len() < 4 + len {
            break;
        }
        if id == BSIZE_SUBFIELD && len == 2 {
            let mut field = &slice[4..6];
            return Ok(field.read_u16::<LittleEndian>()?);
        }
        slice = &slice[4 + len..];
    }
    Err(FormatError::MissingBlockSize(offset).into())
}

fn truncated(e: io::Error, offset: u64) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        FormatError::TruncatedBlock(offset).into()
    } else {
        e.into()
    }
}
