//! Sequential reading and region queries
//!
//! [`BamReader`] decodes the header up front and then iterates records
//! in file order through the block layer. With a seekable stream and an
//! [`Index`] it also answers region queries: candidate chunks come from
//! the index, the block layer seeks to each chunk start, and records
//! are decoded against the query window until the chunk is exhausted or
//! a record starts past the window.

use std::io::{Read, Seek};

use crate::bgzf::{BgzfReader, VirtualOffset};
use crate::codec::{decode_record, decode_record_within, WindowOutcome};
use crate::error::{RangeError, Result};
use crate::header::SamHeader;
use crate::index::{Chunk, Index, IndexBuilder};
use crate::record::AlignmentRecord;

/// Reads an alignment map file.
#[derive(Debug)]
pub struct BamReader<R: Read> {
    bgzf: BgzfReader<R>,
    header: SamHeader,
}

impl<R: Read> BamReader<R> {
    /// Opens a compressed alignment stream and decodes its header.
    pub fn new(inner: R) -> Result<Self> {
        let mut bgzf = BgzfReader::new(inner);
        let header = SamHeader::read_from(&mut bgzf)?;
        Ok(Self { bgzf, header })
    }

    #[must_use]
    pub fn header(&self) -> &SamHeader {
        &self.header
    }

    /// The virtual offset of the next record.
    #[must_use]
    pub fn virtual_offset(&self) -> VirtualOffset {
        self.bgzf.virtual_offset()
    }

    /// Decodes the next record in file order.
    pub fn read_record(&mut self) -> Result<Option<AlignmentRecord>> {
        decode_record(&mut self.bgzf)
    }

    /// A lazy iterator over the remaining records. Single pass: records
    /// already consumed are not revisited.
    pub fn records(&mut self) -> Records<'_, R> {
        Records { reader: self }
    }

    /// Eagerly decodes every remaining record.
    pub fn parse_all(&mut self) -> Result<Vec<AlignmentRecord>> {
        self.records().collect()
    }
}

impl<R: Read + Seek> BamReader<R> {
    /// Lazily yields the records overlapping the 0-based half-open
    /// interval `[start, end)` of reference `reference_id`.
    pub fn query<'a>(
        &'a mut self,
        index: &Index,
        reference_id: usize,
        start: u32,
        end: u32,
    ) -> Result<RegionQuery<'a, R>> {
        if start >= end {
            return Err(RangeError::InvalidInterval { start, end }.into());
        }
        let chunks = index.reference(reference_id)?.chunks_for_region(start, end);
        Ok(RegionQuery {
            reader: self,
            chunks,
            current: 0,
            positioned: false,
            done: false,
            start,
            end,
        })
    }

    /// [`query`](Self::query), resolving the reference by name through
    /// the header dictionary.
    pub fn query_by_name<'a>(
        &'a mut self,
        index: &Index,
        name: &str,
        start: u32,
        end: u32,
    ) -> Result<RegionQuery<'a, R>> {
        let reference_id = self
            .header
            .reference_id(name)
            .ok_or_else(|| RangeError::UnknownReferenceName(name.to_string()))?;
        self.query(index, reference_id, start, end)
    }
}

/// Builds an index by scanning every remaining record of `reader`.
///
/// The input must be coordinate sorted, as for [`IndexBuilder`].
pub fn build_index<R: Read>(reader: &mut BamReader<R>) -> Result<Index> {
    let mut builder = IndexBuilder::new(reader.header.references.len());
    loop {
        let start = reader.bgzf.virtual_offset();
        match decode_record(&mut reader.bgzf)? {
            Some(record) => builder.add_record(&record, start)?,
            // `start` is the post-last-block offset: the terminal block
            // had not been touched when it was captured
            None => return Ok(builder.finish(start)),
        }
    }
}

/// Lazy record iterator for sequential reads.
pub struct Records<'a, R: Read> {
    reader: &'a mut BamReader<R>,
}

impl<R: Read> Iterator for Records<'_, R> {
    type Item = Result<AlignmentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_record().transpose()
    }
}

/// Lazy record iterator for one region query.
///
/// Holds the chunk list and a cursor: the current chunk, whether the
/// block layer is positioned inside it, and the query window. A record
/// starting past the window ends the current chunk without corrupting
/// the position for the next one.
#[derive(Debug)]
pub struct RegionQuery<'a, R: Read + Seek> {
    reader: &'a mut BamReader<R>,
    chunks: Vec<Chunk>,
    current: usize,
    positioned: bool,
    done: bool,
    start: u32,
    end: u32,
}

impl<R: Read + Seek> RegionQuery<'_, R> {
    /// Whether the block cursor is still before the current chunk's end.
    fn within_chunk(&self, chunk: Chunk) -> bool {
        if self.reader.bgzf.is_eof() {
            return false;
        }
        self.reader.bgzf.block_offset() < chunk.end.compressed
            || (self.reader.bgzf.block_cursor() as u64) < u64::from(chunk.end.uncompressed)
    }
}

impl<R: Read + Seek> Iterator for RegionQuery<'_, R> {
    type Item = Result<AlignmentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if self.current >= self.chunks.len() {
                self.done = true;
                return None;
            }
            let chunk = self.chunks[self.current];
            if !self.positioned {
                if let Err(e) = self.reader.bgzf.seek_virtual(chunk.start) {
                    self.done = true;
                    return Some(Err(e));
                }
                self.positioned = true;
            }
            if !self.within_chunk(chunk) {
                self.current += 1;
                self.positioned = false;
                continue;
            }
            match decode_record_within(&mut self.reader.bgzf, self.start, self.end) {
                Ok(WindowOutcome::Record(record)) => return Some(Ok(record)),
                Ok(WindowOutcome::Skipped) => {}
                Ok(WindowOutcome::PastEnd | WindowOutcome::Eof) => {
                    self.current += 1;
                    self.positioned = false;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
