use super::{merge_chunks, region_to_bin, Bin, Chunk, Index, ReferenceIndex};
use crate::bgzf::VirtualOffset;
use crate::codec::reference_span;
use crate::error::{OrderingError, RangeError, Result};
use crate::record::AlignmentRecord;
use crate::LINEAR_WINDOW;

/// Builds an [`Index`] from one forward pass over coordinate-sorted
/// records and their start offsets.
///
/// Input must be sorted by (reference id, position); a decrease in
/// either is a fatal ordering error. A chunk is opened when a record
/// lands in a different bin than its predecessor and closed at the next
/// record's start offset, so every chunk covers a contiguous run of
/// same-bin records. Records without a reference are not indexed.
pub struct IndexBuilder {
    references: Vec<ReferenceIndex>,
    current_reference: i32,
    previous_position: i32,
    open: Option<OpenChunk>,
}

struct OpenChunk {
    reference: usize,
    bin: u32,
    start: VirtualOffset,
}

impl IndexBuilder {
    #[must_use]
    pub fn new(reference_count: usize) -> Self {
        Self {
            references: vec![ReferenceIndex::default(); reference_count],
            current_reference: -1,
            previous_position: 0,
            open: None,
        }
    }

    /// Indexes one record given the virtual offset at which its encoding
    /// starts.
    pub fn add_record(&mut self, record: &AlignmentRecord, start: VirtualOffset) -> Result<()> {
        if record.reference_id < 0 {
            return Ok(());
        }
        if record.reference_id < self.current_reference {
            return Err(OrderingError::ReferenceIdDecreased {
                previous: self.current_reference,
                current: record.reference_id,
            }
            .into());
        }
        let reference_id = record.reference_id as usize;
        if reference_id >= self.references.len() {
            return Err(RangeError::UnknownReferenceId {
                requested: reference_id,
                available: self.references.len(),
            }
            .into());
        }

        if record.reference_id > self.current_reference {
            self.close_chunk(start);
            self.current_reference = record.reference_id;
            self.previous_position = 0;
        } else if record.position < self.previous_position {
            return Err(OrderingError::PositionDecreased {
                reference_id: record.reference_id,
                previous: self.previous_position,
                current: record.position,
            }
            .into());
        }
        self.previous_position = record.position;

        let reference = &mut self.references[reference_id];
        if record.is_mapped() {
            reference.mapped += 1;
        } else {
            reference.unmapped += 1;
        }
        reference.bounds = match reference.bounds {
            Some((first, _)) => Some((first, start)),
            None => Some((start, start)),
        };

        // coordinates are 1-based on the record, 0-based in the index
        let begin = record.position.max(1) as u32 - 1;
        let span = reference_span(&record.cigar, record.sequence.len());
        let end = begin + span.max(1);
        let bin = region_to_bin(begin, end);

        match &self.open {
            Some(open) if open.bin == bin && open.reference == reference_id => {}
            _ => {
                self.close_chunk(start);
                self.open = Some(OpenChunk {
                    reference: reference_id,
                    bin,
                    start,
                });
            }
        }

        let reference = &mut self.references[reference_id];
        let first_window = (begin / LINEAR_WINDOW) as usize;
        let last_window = ((end - 1) / LINEAR_WINDOW) as usize;
        for window in first_window..=last_window {
            if let Some(entry) = reference.linear.get_mut(window) {
                if *entry > start {
                    *entry = start;
                }
            } else {
                reference.linear.resize(window + 1, start);
            }
        }
        Ok(())
    }

    /// Closes the last open chunk at `end` and freezes every reference.
    ///
    /// `end` should be the virtual offset just past the last record,
    /// which at end of stream is the start of the terminal block.
    #[must_use]
    pub fn finish(mut self, end: VirtualOffset) -> Index {
        self.close_chunk(end);
        for reference in &mut self.references {
            freeze(reference);
        }
        Index {
            references: self.references,
        }
    }

    fn close_chunk(&mut self, end: VirtualOffset) {
        if let Some(open) = self.open.take() {
            let reference = &mut self.references[open.reference];
            let slot = match reference.bins.iter().position(|b| b.number == open.bin) {
                Some(slot) => slot,
                None => {
                    reference.bins.push(Bin {
                        number: open.bin,
                        chunks: Vec::new(),
                    });
                    reference.bins.len() - 1
                }
            };
            reference.bins[slot].chunks.push(Chunk::new(open.start, end));
        }
    }
}

/// Finalizes a reference index: merges chunks that meet at a compressed
/// block boundary within each bin, then coalesces overlaps.
///
/// The block-boundary merge joins chunk `k+1` into chunk `k` whenever
/// `k` ends in the block `k+1` starts in, even if the two runs are not
/// adjacent in payload bytes. This matches the builder this format
/// originated with and only widens the scanned range.
fn freeze(reference: &mut ReferenceIndex) {
    for bin in &mut reference.bins {
        let mut merged: Vec<Chunk> = Vec::with_capacity(bin.chunks.len());
        for chunk in bin.chunks.drain(..) {
            match merged.last_mut() {
                Some(last) if last.end.compressed == chunk.start.compressed => {
                    last.end = last.end.max(chunk.end);
                }
                _ => merged.push(chunk),
            }
        }
        bin.chunks = merge_chunks(merged);
    }
}
