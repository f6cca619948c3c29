//! Region index
//!
//! Maps reference coordinate intervals to byte ranges of the compressed
//! file through a five-level binning scheme. Each bin covers a fixed
//! window of the reference (from 512 Mb at level 0 down to 16 kb at
//! level 4) and owns the chunks of virtual offsets where records
//! assigned to it live. A linear index samples the minimum virtual
//! offset per 16 kb window so chunks that end before a query's window
//! can be dropped without reading them.

mod builder;
mod io;

pub use builder::IndexBuilder;

use crate::bgzf::VirtualOffset;
use crate::error::{RangeError, Result};
use crate::LINEAR_WINDOW;

/// (bin id base, coordinate shift) for the five levels, coarse to fine
const LEVELS: [(u32, u32); 5] = [(1, 26), (9, 23), (73, 20), (585, 17), (4681, 14)];

/// Bin assigned to unplaced records
pub const UNPLACED_BIN: u32 = 4680;

/// The binning scheme covers coordinates below 2^29
const MAX_COORD: u32 = 1 << 29;

/// A contiguous virtual offset range holding records for one bin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Chunk {
    pub start: VirtualOffset,
    pub end: VirtualOffset,
}

impl Chunk {
    #[must_use]
    pub fn new(start: VirtualOffset, end: VirtualOffset) -> Self {
        Self { start, end }
    }
}

/// One node of the binning hierarchy and its chunks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bin {
    pub number: u32,
    pub chunks: Vec<Chunk>,
}

/// The index of a single reference sequence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReferenceIndex {
    pub bins: Vec<Bin>,
    /// Minimum virtual offset per 16 kb window
    pub linear: Vec<VirtualOffset>,
    /// Records aligned to this reference
    pub mapped: u64,
    /// Records assigned to this reference but flagged unmapped
    pub unmapped: u64,
    /// First and last record offsets seen, when any record was indexed
    pub bounds: Option<(VirtualOffset, VirtualOffset)>,
}

impl ReferenceIndex {
    /// All chunks of every bin, coalesced.
    #[must_use]
    pub fn all_chunks(&self) -> Vec<Chunk> {
        let chunks = self.bins.iter().flat_map(|bin| &bin.chunks).copied();
        merge_chunks(chunks.collect())
    }

    /// Chunks that can contain records overlapping `[start, end)`,
    /// pruned by the linear index and coalesced.
    #[must_use]
    pub fn chunks_for_region(&self, start: u32, end: u32) -> Vec<Chunk> {
        let candidates = region_to_candidate_bins(start, end);
        let mut chunks: Vec<Chunk> = self
            .bins
            .iter()
            .filter(|bin| candidates.binary_search(&bin.number).is_ok())
            .flat_map(|bin| &bin.chunks)
            .copied()
            .collect();

        if let Some(min_start) = self.linear_floor(start) {
            chunks.retain(|chunk| chunk.end >= min_start);
        }
        merge_chunks(chunks)
    }

    /// The linear index entry covering `position`, or the last entry
    /// when the window is beyond the indexed range.
    fn linear_floor(&self, position: u32) -> Option<VirtualOffset> {
        let window = (position / LINEAR_WINDOW) as usize;
        self.linear
            .get(window)
            .or_else(|| self.linear.last())
            .copied()
    }
}

/// The full region index: one [`ReferenceIndex`] per reference, in
/// header order. Immutable once built.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Index {
    pub references: Vec<ReferenceIndex>,
}

impl Index {
    /// The index of reference `id`, or a range error if the index does
    /// not cover it.
    pub fn reference(&self, id: usize) -> Result<&ReferenceIndex> {
        self.references.get(id).ok_or_else(|| {
            RangeError::UnknownReferenceId {
                requested: id,
                available: self.references.len(),
            }
            .into()
        })
    }
}

/// The single bin covering `[start, end)` exactly, at the finest level
/// whose windows contain the whole interval.
#[must_use]
pub fn region_to_bin(start: u32, end: u32) -> u32 {
    let start = start.min(MAX_COORD - 1);
    let last = end.saturating_sub(1).clamp(start, MAX_COORD - 1);
    for &(base, shift) in LEVELS.iter().rev() {
        if start >> shift == last >> shift {
            return base + (start >> shift);
        }
    }
    0
}

/// Every bin whose window intersects `[start, end)`, sorted ascending.
///
/// The root bin 0 is always included.
#[must_use]
pub fn region_to_candidate_bins(start: u32, end: u32) -> Vec<u32> {
    let start = start.min(MAX_COORD - 1);
    let last = end.saturating_sub(1).clamp(start, MAX_COORD - 1);
    let mut bins = vec![0];
    for (base, shift) in LEVELS {
        for k in (start >> shift)..=(last >> shift) {
            bins.push(base + k);
        }
    }
    bins
}

/// Sorts chunks by start and merges any chunk whose start lies within
/// its predecessor's range, inclusive of the end. Idempotent.
#[must_use]
pub fn merge_chunks(mut chunks: Vec<Chunk>) -> Vec<Chunk> {
    chunks.sort_by_key(|chunk| chunk.start);
    let mut merged: Vec<Chunk> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        match merged.last_mut() {
            Some(last) if chunk.start <= last.end => {
                last.end = last.end.max(chunk.end);
            }
            _ => merged.push(chunk),
        }
    }
    merged
}
