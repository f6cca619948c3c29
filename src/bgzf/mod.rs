//! Block compression layer
//!
//! The file is a sequence of gzip members, each holding at most 64 KiB of
//! decompressed payload. Every member header carries an extra subfield
//! declaring the member's total compressed length, so the byte offset of
//! each block boundary is known without inflating anything, and a
//! [`VirtualOffset`] can address any byte of decompressed payload.

mod reader;
mod virtual_offset;
mod writer;

pub use reader::BgzfReader;
pub use virtual_offset::VirtualOffset;
pub use writer::BgzfWriter;

/// gzip magic, deflate method, FEXTRA flag
pub(crate) const BLOCK_MAGIC: [u8; 4] = [31, 139, 8, 4];

/// Identifier bytes of the block-size extra subfield
pub(crate) const BSIZE_SUBFIELD: [u8; 2] = [66, 67];

/// The terminal block: an empty payload compressed and framed like any
/// other block, written after the last real block as an explicit
/// end-of-file marker.
pub(crate) const TERMINAL_BLOCK: [u8; 28] = [
    31, 139, 8, 4, 0, 0, 0, 0, 0, 255, 6, 0, 66, 67, 2, 0, 27, 0, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];
