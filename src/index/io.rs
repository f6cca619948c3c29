//! Index file serialization
//!
//! The index file is uncompressed: magic, reference count, then per
//! reference the bins with their chunks and the linear index. Each
//! virtual offset occupies eight bytes. Per-reference metadata (record
//! counts and first/last offsets) travels in a pseudo-bin numbered
//! [`MAX_BINS`](crate::MAX_BINS) with two pseudo chunks.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::{Bin, Chunk, Index, ReferenceIndex};
use crate::bgzf::VirtualOffset;
use crate::error::FormatError;
use crate::{Result, INDEX_MAGIC, MAX_BINS};

impl Index {
    /// Writes the index file representation.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(INDEX_MAGIC)?;
        writer.write_i32::<LittleEndian>(self.references.len() as i32)?;
        for reference in &self.references {
            write_reference(writer, reference)?;
        }
        Ok(())
    }

    /// Parses an index file.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != *INDEX_MAGIC {
            return Err(FormatError::InvalidIndexMagic(magic).into());
        }
        let reference_count = reader.read_i32::<LittleEndian>()?.max(0) as usize;
        let mut references = Vec::with_capacity(reference_count);
        for _ in 0..reference_count {
            references.push(read_reference(reader)?);
        }
        Ok(Self { references })
    }
}

fn write_reference<W: Write>(writer: &mut W, reference: &ReferenceIndex) -> Result<()> {
    let pseudo = usize::from(reference.bounds.is_some());
    writer.write_i32::<LittleEndian>((reference.bins.len() + pseudo) as i32)?;
    for bin in &reference.bins {
        writer.write_u32::<LittleEndian>(bin.number)?;
        writer.write_i32::<LittleEndian>(bin.chunks.len() as i32)?;
        for chunk in &bin.chunks {
            chunk.start.write_to(writer)?;
            chunk.end.write_to(writer)?;
        }
    }
    if let Some((first, last)) = reference.bounds {
        writer.write_u32::<LittleEndian>(MAX_BINS)?;
        writer.write_i32::<LittleEndian>(2)?;
        first.write_to(writer)?;
        last.write_to(writer)?;
        writer.write_u64::<LittleEndian>(reference.mapped)?;
        writer.write_u64::<LittleEndian>(reference.unmapped)?;
    }
    writer.write_i32::<LittleEndian>(reference.linear.len() as i32)?;
    for offset in &reference.linear {
        offset.write_to(writer)?;
    }
    Ok(())
}

fn read_reference<R: Read>(reader: &mut R) -> Result<ReferenceIndex> {
    let mut reference = ReferenceIndex::default();
    let bin_count = reader.read_i32::<LittleEndian>()?.max(0) as usize;
    for _ in 0..bin_count {
        let number = reader.read_u32::<LittleEndian>()?;
        if number > MAX_BINS {
            return Err(FormatError::BinNumberOutOfRange(number).into());
        }
        let chunk_count = reader.read_i32::<LittleEndian>()?.max(0) as usize;
        if number == MAX_BINS {
            read_metadata(reader, &mut reference, chunk_count)?;
            continue;
        }
        let mut chunks = Vec::with_capacity(chunk_count);
        for _ in 0..chunk_count {
            let start = VirtualOffset::read_from(reader)?;
            let end = VirtualOffset::read_from(reader)?;
            chunks.push(Chunk::new(start, end));
        }
        reference.bins.push(Bin { number, chunks });
    }
    let linear_count = reader.read_i32::<LittleEndian>()?.max(0) as usize;
    for _ in 0..linear_count {
        reference.linear.push(VirtualOffset::read_from(reader)?);
    }
    Ok(reference)
}

/// Parses the metadata pseudo-bin: the first pseudo chunk carries the
/// first/last record offsets, the last carries the record counts.
fn read_metadata<R: Read>(
    reader: &mut R,
    reference: &mut ReferenceIndex,
    chunk_count: usize,
) -> Result<()> {
    for pair in 0..chunk_count {
        let a = reader.read_u64::<LittleEndian>()?;
        let b = reader.read_u64::<LittleEndian>()?;
        if pair == 0 && chunk_count > 1 {
            reference.bounds = Some((VirtualOffset::from_u64(a), VirtualOffset::from_u64(b)));
        } else {
            reference.mapped = a;
            reference.unmapped = b;
        }
    }
    Ok(())
}
