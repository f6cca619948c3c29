//! # alnmap
//!
//! A reader/writer library for block-compressed binary alignment map files
//! with a hierarchical region index.
//!
//! The format stores alignment records in deflate-compressed blocks of at
//! most 64 KiB of payload each. Because every block envelope declares its
//! own compressed length, a reader can seek to any block boundary without
//! scanning, and a [`VirtualOffset`] (compressed block offset plus offset
//! into the decompressed payload) addresses any record in the file.
//!
//! An [`Index`] maps reference coordinate intervals to chunks of virtual
//! offsets through a five-level binning scheme, so a region query touches
//! only the blocks that can contain overlapping records.
//!
//! ## Reading
//!
//! ```no_run
//! use alnmap::BamReader;
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! # fn main() -> alnmap::Result<()> {
//! let file = BufReader::new(File::open("sample.bam")?);
//! let mut reader = BamReader::new(file)?;
//! for record in reader.records() {
//!     let record = record?;
//!     println!("{} at {}", record.name, record.position);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Region queries
//!
//! ```no_run
//! use alnmap::{BamReader, Index};
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! # fn main() -> alnmap::Result<()> {
//! let index = Index::read_from(&mut BufReader::new(File::open("sample.bam.bai")?))?;
//! let mut reader = BamReader::new(BufReader::new(File::open("sample.bam")?))?;
//! for record in reader.query_by_name(&index, "chr2", 1, 50)? {
//!     let record = record?;
//!     println!("{}", record.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod alphabet;
pub mod bgzf;
mod codec;
mod error;
mod header;
pub mod index;
mod reader;
mod record;
mod writer;

pub use bgzf::{BgzfReader, BgzfWriter, VirtualOffset};
pub use codec::{decode_record, encode_record, reference_span};
pub use error::{Error, FormatError, OrderingError, RangeError, Result};
pub use header::{ReferenceSequence, SamHeader};
pub use index::{Bin, Chunk, Index, IndexBuilder, ReferenceIndex};
pub use reader::{build_index, BamReader, Records, RegionQuery};
pub use record::{cigar_from_text, cigar_to_text, flags, AlignmentRecord, CigarKind, CigarOp, Tag, TagValue};
pub use writer::{write_all, BamWriter};

/// Magic bytes opening an alignment map file (inside the compressed stream)
pub const FILE_MAGIC: &[u8; 4] = b"BAM\x01";
/// Magic bytes opening an index file
pub const INDEX_MAGIC: &[u8; 4] = b"BAI\x01";

/// Maximum decompressed payload size of one compressed block
pub const MAX_BLOCK_SIZE: usize = 65536;
/// Width of one linear-index window in reference bases
pub const LINEAR_WINDOW: u32 = 16384;
/// Number of bins in the five-level binning scheme; also the pseudo-bin
/// number used to carry per-reference metadata in the index file
pub const MAX_BINS: u32 = 37450;
