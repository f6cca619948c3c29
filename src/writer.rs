//! Sequential writing
//!
//! [`BamWriter`] frames the header and records through the block layer.
//! Every written record reports its start virtual offset, which is what
//! an [`IndexBuilder`](crate::IndexBuilder) consumes to index the file
//! while it is being produced.

use std::io::Write;

use crate::bgzf::{BgzfWriter, VirtualOffset};
use crate::codec::encode_record;
use crate::header::SamHeader;
use crate::index::{Index, IndexBuilder};
use crate::record::AlignmentRecord;
use crate::Result;

/// Writes an alignment map file.
pub struct BamWriter<W: Write> {
    bgzf: BgzfWriter<W>,
    scratch: Vec<u8>,
    reference_count: usize,
}

impl<W: Write> BamWriter<W> {
    /// Validates `header` and writes it at the front of the stream.
    pub fn new(inner: W, header: &SamHeader) -> Result<Self> {
        header.validate()?;
        let mut bgzf = BgzfWriter::new(inner);
        let mut buf = Vec::new();
        header.write_to(&mut buf)?;
        bgzf.write_payload(&buf)?;
        Ok(Self {
            bgzf,
            scratch: Vec::new(),
            reference_count: header.references.len(),
        })
    }

    /// The virtual offset at which the next record will start.
    #[must_use]
    pub fn virtual_offset(&self) -> VirtualOffset {
        self.bgzf.virtual_offset()
    }

    /// Encodes one record, returning the virtual offset it starts at.
    pub fn write_record(&mut self, record: &AlignmentRecord) -> Result<VirtualOffset> {
        self.scratch.clear();
        encode_record(&mut self.scratch, record)?;
        let start = self.bgzf.virtual_offset();
        self.bgzf.write_payload(&self.scratch)?;
        Ok(start)
    }

    /// Compresses any staged payload as a final block.
    pub fn flush(&mut self) -> Result<()> {
        self.bgzf.flush_block()
    }

    /// Flushes and appends the terminal block. Idempotent.
    pub fn finish(&mut self) -> Result<()> {
        self.bgzf.finish()
    }

    /// Finishes the file and returns the underlying stream.
    pub fn into_inner(self) -> Result<W> {
        self.bgzf.into_inner()
    }
}

/// Writes a whole file: header, records, terminal block.
pub fn write_all<W: Write>(
    header: &SamHeader,
    records: &[AlignmentRecord],
    stream: W,
) -> Result<W> {
    let mut writer = BamWriter::new(stream, header)?;
    for record in records {
        writer.write_record(record)?;
    }
    writer.into_inner()
}

impl<W: Write> BamWriter<W> {
    /// Writes every record while feeding an index builder with their
    /// start offsets, then finishes the file and returns the index.
    /// Records must be coordinate sorted.
    pub fn write_all_indexed(&mut self, records: &[AlignmentRecord]) -> Result<Index> {
        let mut builder = IndexBuilder::new(self.reference_count);
        for record in records {
            let start = self.write_record(record)?;
            builder.add_record(record, start)?;
        }
        // close chunks at the post-last-block offset, before the
        // terminal block goes out
        self.flush()?;
        let end = self.virtual_offset();
        self.finish()?;
        Ok(builder.finish(end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::ReferenceSequence;
    use crate::reader::BamReader;
    use std::io::Cursor;

    fn sample_header() -> SamHeader {
        SamHeader::new(
            "@HD\tVN:1.6\n",
            vec![ReferenceSequence::new("chr1", 50_000)],
        )
    }

    fn record(position: i32, name: &str) -> AlignmentRecord {
        AlignmentRecord {
            reference_id: 0,
            position,
            name: name.to_string(),
            sequence: b"ACGT".to_vec(),
            ..Default::default()
        }
    }

    // ==================== Writer Tests ====================

    #[test]
    fn test_write_all_indexed_matches_rebuild() {
        let records = vec![record(5, "a"), record(90, "b"), record(20_000, "c")];
        let mut writer = BamWriter::new(Vec::new(), &sample_header()).unwrap();
        let index = writer.write_all_indexed(&records).unwrap();
        let bytes = writer.into_inner().unwrap();

        let mut reader = BamReader::new(Cursor::new(bytes)).unwrap();
        let rebuilt = crate::reader::build_index(&mut reader).unwrap();
        assert_eq!(index, rebuilt);
    }

    #[test]
    fn test_write_all_round_trip() {
        let records = vec![record(5, "a"), record(90, "b")];
        let bytes = write_all(&sample_header(), &records, Vec::new()).unwrap();
        let mut reader = BamReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.parse_all().unwrap(), records);
    }

    #[test]
    fn test_writer_rejects_invalid_header() {
        let header = SamHeader::new("", vec![ReferenceSequence::new("", 10)]);
        assert!(BamWriter::new(Vec::new(), &header).is_err());
    }

    #[test]
    fn test_record_offsets_are_monotonic() {
        let mut writer = BamWriter::new(Vec::new(), &sample_header()).unwrap();
        let first = writer.write_record(&record(5, "a")).unwrap();
        let second = writer.write_record(&record(9, "b")).unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_many_records_span_blocks() {
        // enough records to force several compressed blocks
        let records: Vec<_> = (0..5_000)
            .map(|i| {
                let mut r = record(1 + i, &format!("read_{i:05}"));
                r.sequence = b"ACGTACGTACGTACGTACGTACGTACGT".to_vec();
                r.quality = vec![30; 28];
                r
            })
            .collect();
        let bytes = write_all(&sample_header(), &records, Vec::new()).unwrap();
        let mut reader = BamReader::new(Cursor::new(bytes)).unwrap();
        let decoded = reader.parse_all().unwrap();
        assert_eq!(decoded.len(), records.len());
        assert_eq!(decoded.first(), records.first());
        assert_eq!(decoded.last(), records.last());
    }
}
