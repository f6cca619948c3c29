//! Record wire codec
//!
//! Each record is framed by a little-endian length prefix and holds a
//! 32-byte fixed section, the NUL-terminated read name, the CIGAR
//! words, the 4-bit packed sequence, the quality bytes, and the typed
//! optional fields. Decoding always consumes the full framed record
//! even when a region query rejects it early, so the stream cursor
//! stays on a record boundary.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use memchr::memchr;

use crate::alphabet;
use crate::error::FormatError;
use crate::index::{region_to_bin, UNPLACED_BIN};
use crate::record::{AlignmentRecord, CigarKind, CigarOp, TagValue};
use crate::Result;

/// Number of reference bases covered by an alignment.
///
/// The sum of reference-consuming CIGAR operations; an absent CIGAR
/// falls back to the read length.
#[must_use]
pub fn reference_span(cigar: &[CigarOp], read_len: usize) -> u32 {
    if cigar.is_empty() {
        return read_len as u32;
    }
    cigar
        .iter()
        .filter(|op| op.kind.consumes_reference())
        .map(|op| op.len)
        .sum()
}

/// Outcome of decoding one record against a query window.
#[derive(Debug)]
pub(crate) enum WindowOutcome {
    /// No more records in the stream
    Eof,
    /// Record consumed but it ends before the window starts
    Skipped,
    /// Record consumed and it starts at or past the window end; with
    /// sorted input nothing later in the chunk can overlap
    PastEnd,
    Record(AlignmentRecord),
}

/// Decodes the next record, or `Ok(None)` at a clean end of stream.
pub fn decode_record<R: Read>(reader: &mut R) -> Result<Option<AlignmentRecord>> {
    let Some(buf) = read_record_frame(reader)? else {
        return Ok(None);
    };
    match parse_record(&buf, None)? {
        WindowOutcome::Record(record) => Ok(Some(record)),
        // unreachable without a window, but keep the types honest
        _ => Ok(None),
    }
}

/// Decodes the next record against the 0-based half-open window
/// `[start, end)`, consuming its bytes regardless of the outcome.
pub(crate) fn decode_record_within<R: Read>(
    reader: &mut R,
    start: u32,
    end: u32,
) -> Result<WindowOutcome> {
    let Some(buf) = read_record_frame(reader)? else {
        return Ok(WindowOutcome::Eof);
    };
    parse_record(&buf, Some((start, end)))
}

/// Reads one length-prefixed record frame. `Ok(None)` when the stream
/// is exhausted before the prefix.
fn read_record_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix[..1]) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    reader
        .read_exact(&mut prefix[1..])
        .map_err(frame_truncated)?;
    let len = u32::from_le_bytes(prefix) as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).map_err(frame_truncated)?;
    Ok(Some(buf))
}

fn frame_truncated(e: io::Error) -> crate::Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        FormatError::TruncatedRecord.into()
    } else {
        e.into()
    }
}

fn u32_at(buf: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]])
}

fn i32_at(buf: &[u8], pos: usize) -> i32 {
    u32_at(buf, pos) as i32
}

fn u16_at(buf: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes([buf[pos], buf[pos + 1]])
}

/// Checks that `needed` bytes of the record frame exist.
fn ensure(buf: &[u8], needed: usize, name: &str) -> Result<()> {
    if needed > buf.len() {
        return Err(FormatError::RecordLengthMismatch {
            name: name.to_string(),
            declared: buf.len(),
            got: needed,
        }
        .into());
    }
    Ok(())
}

fn parse_record(buf: &[u8], window: Option<(u32, u32)>) -> Result<WindowOutcome> {
    ensure(buf, 32, "?")?;
    let reference_id = i32_at(buf, 0);
    let pos0 = i32_at(buf, 4);
    let bin_mq_nl = u32_at(buf, 8);
    let mapping_quality = ((bin_mq_nl >> 8) & 0xFF) as u8;
    let name_len = (bin_mq_nl & 0xFF) as usize;
    let flag_nc = u32_at(buf, 12);
    let flags = (flag_nc >> 16) as u16;
    let n_cigar = (flag_nc & 0xFFFF) as usize;
    let read_len = i32_at(buf, 16).max(0) as usize;
    let mate_reference_id = i32_at(buf, 20);
    let mate_pos0 = i32_at(buf, 24);
    let insert_size = i32_at(buf, 28);

    if let Some((_, end)) = window {
        // sorted input: a record starting past the window closes it
        if pos0 >= 0 && pos0 as u32 >= end {
            return Ok(WindowOutcome::PastEnd);
        }
    }

    let mut pos = 32;
    ensure(buf, pos + name_len, "?")?;
    let name_bytes = &buf[pos..pos + name_len];
    let nul = memchr(0, name_bytes).ok_or(FormatError::MissingNulTerminator("record name"))?;
    let name = std::str::from_utf8(&name_bytes[..nul])?.to_string();
    pos += name_len;

    ensure(buf, pos + 4 * n_cigar, &name)?;
    let mut cigar = Vec::with_capacity(n_cigar);
    for _ in 0..n_cigar {
        let word = u32_at(buf, pos);
        let code = (word & 0xF) as u8;
        let kind = CigarKind::from_code(code).ok_or_else(|| FormatError::InvalidCigarOp {
            name: name.clone(),
            code,
        })?;
        cigar.push(CigarOp::new(kind, word >> 4));
        pos += 4;
    }

    if let Some((start, _)) = window {
        let placed = reference_id >= 0 && pos0 >= 0;
        if placed {
            let span = reference_span(&cigar, read_len).max(1);
            if (pos0 as u32).saturating_add(span) <= start {
                return Ok(WindowOutcome::Skipped);
            }
        }
    }

    let seq_bytes = read_len.div_ceil(2);
    ensure(buf, pos + seq_bytes, &name)?;
    let sequence = alphabet::unpack(&buf[pos..pos + seq_bytes], read_len);
    pos += seq_bytes;

    ensure(buf, pos + read_len, &name)?;
    let quality_bytes = &buf[pos..pos + read_len];
    let quality = if quality_bytes.iter().all(|&q| q == 0xFF) {
        Vec::new()
    } else {
        quality_bytes.to_vec()
    };
    pos += read_len;

    let mut tags = Vec::new();
    while pos < buf.len() {
        let (tag, value, next) = parse_tag(buf, pos, &name)?;
        tags.push((tag, value));
        pos = next;
    }

    Ok(WindowOutcome::Record(AlignmentRecord {
        reference_id,
        position: if pos0 >= 0 { pos0 + 1 } else { 0 },
        mapping_quality,
        flags,
        cigar,
        mate_reference_id,
        mate_position: if mate_pos0 >= 0 { mate_pos0 + 1 } else { 0 },
        insert_size,
        name,
        sequence,
        quality,
        tags,
    }))
}

fn parse_tag(buf: &[u8], mut pos: usize, name: &str) -> Result<([u8; 2], TagValue, usize)> {
    ensure(buf, pos + 3, name)?;
    let tag = [buf[pos], buf[pos + 1]];
    let type_code = buf[pos + 2];
    pos += 3;

    let tag_name = || String::from_utf8_lossy(&tag).into_owned();
    let value = match type_code {
        b'A' => {
            ensure(buf, pos + 1, name)?;
            let v = TagValue::Char(buf[pos]);
            pos += 1;
            v
        }
        b'c' => {
            ensure(buf, pos + 1, name)?;
            let v = TagValue::Int8(buf[pos] as i8);
            pos += 1;
            v
        }
        b'C' => {
            ensure(buf, pos + 1, name)?;
            let v = TagValue::UInt8(buf[pos]);
            pos += 1;
            v
        }
        b's' => {
            ensure(buf, pos + 2, name)?;
            let v = TagValue::Int16(u16_at(buf, pos) as i16);
            pos += 2;
            v
        }
        b'S' => {
            ensure(buf, pos + 2, name)?;
            let v = TagValue::UInt16(u16_at(buf, pos));
            pos += 2;
            v
        }
        b'i' => {
            ensure(buf, pos + 4, name)?;
            let v = TagValue::Int32(i32_at(buf, pos));
            pos += 4;
            v
        }
        b'I' => {
            ensure(buf, pos + 4, name)?;
            let v = TagValue::UInt32(u32_at(buf, pos));
            pos += 4;
            v
        }
        b'f' => {
            ensure(buf, pos + 4, name)?;
            let v = TagValue::Float(f32::from_bits(u32_at(buf, pos)));
            pos += 4;
            v
        }
        b'Z' | b'H' => {
            let nul = memchr(0, &buf[pos..]).ok_or(FormatError::MissingNulTerminator(
                "string optional field",
            ))?;
            let text = std::str::from_utf8(&buf[pos..pos + nul])?.to_string();
            pos += nul + 1;
            if type_code == b'Z' {
                TagValue::String(text)
            } else {
                TagValue::Hex(text)
            }
        }
        b'B' => {
            ensure(buf, pos + 5, name)?;
            let element_type = buf[pos];
            let count = i32_at(buf, pos + 1).max(0) as usize;
            pos += 5;
            let (value, consumed) = parse_array(buf, pos, element_type, count, name, &tag)?;
            pos += consumed;
            value
        }
        _ => {
            return Err(FormatError::UnknownTagType {
                name: name.to_string(),
                tag: tag_name(),
                type_code: type_code as char,
            }
            .into())
        }
    };
    Ok((tag, value, pos))
}

fn parse_array(
    buf: &[u8],
    pos: usize,
    element_type: u8,
    count: usize,
    name: &str,
    tag: &[u8; 2],
) -> Result<(TagValue, usize)> {
    let width = match element_type {
        b'c' | b'C' => 1,
        b's' | b'S' => 2,
        b'i' | b'I' | b'f' => 4,
        _ => {
            return Err(FormatError::UnknownArrayType {
                name: name.to_string(),
                tag: String::from_utf8_lossy(tag).into_owned(),
                type_code: element_type as char,
            }
            .into())
        }
    };
    ensure(buf, pos + count * width, name)?;
    let bytes = &buf[pos..pos + count * width];
    let value = match element_type {
        b'c' => TagValue::Int8Array(bytes.iter().map(|&b| b as i8).collect()),
        b'C' => TagValue::UInt8Array(bytes.to_vec()),
        b's' => TagValue::Int16Array(
            bytes
                .chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]))
                .collect(),
        ),
        b'S' => TagValue::UInt16Array(
            bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect(),
        ),
        b'i' => TagValue::Int32Array(
            bytes
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        b'I' => TagValue::UInt32Array(
            bytes
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        b'f' => TagValue::FloatArray(
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        _ => unreachable!("width lookup rejected other codes"),
    };
    Ok((value, count * width))
}

/// Encodes one record as its framed wire form.
///
/// The bin field is recomputed from the record's reference span;
/// unplaced records get the conventional unplaced bin.
pub fn encode_record<W: Write>(writer: &mut W, record: &AlignmentRecord) -> Result<()> {
    let name_len = record.name.len() + 1;
    if name_len > 255 {
        return Err(encode_error(record, "name longer than 254 bytes"));
    }
    if record.cigar.len() > 0xFFFF {
        return Err(encode_error(record, "more than 65535 CIGAR operations"));
    }
    let read_len = record.sequence.len();
    if !record.quality.is_empty() && record.quality.len() != read_len {
        return Err(encode_error(
            record,
            "quality length does not match sequence length",
        ));
    }

    let tag_bytes: usize = record
        .tags
        .iter()
        .map(|(_, value)| 3 + tag_value_size(value))
        .sum();
    let block_size = 32 + name_len + 4 * record.cigar.len() + read_len.div_ceil(2) + read_len
        + tag_bytes;
    writer.write_u32::<LittleEndian>(block_size as u32)?;

    let pos0 = if record.position > 0 {
        record.position - 1
    } else {
        -1
    };
    let bin = if record.reference_id >= 0 && pos0 >= 0 {
        let begin = pos0 as u32;
        let span = reference_span(&record.cigar, read_len).max(1);
        region_to_bin(begin, begin + span)
    } else {
        UNPLACED_BIN
    };
    let mate_pos0 = if record.mate_position > 0 {
        record.mate_position - 1
    } else {
        -1
    };

    writer.write_i32::<LittleEndian>(record.reference_id)?;
    writer.write_i32::<LittleEndian>(pos0)?;
    writer.write_u32::<LittleEndian>(
        (bin << 16) | (u32::from(record.mapping_quality) << 8) | name_len as u32,
    )?;
    writer.write_u32::<LittleEndian>(
        (u32::from(record.flags) << 16) | record.cigar.len() as u32,
    )?;
    writer.write_i32::<LittleEndian>(read_len as i32)?;
    writer.write_i32::<LittleEndian>(record.mate_reference_id)?;
    writer.write_i32::<LittleEndian>(mate_pos0)?;
    writer.write_i32::<LittleEndian>(record.insert_size)?;

    writer.write_all(record.name.as_bytes())?;
    writer.write_all(&[0])?;

    for op in &record.cigar {
        writer.write_u32::<LittleEndian>((op.len << 4) | u32::from(op.kind as u8))?;
    }

    writer.write_all(&alphabet::pack(&record.sequence))?;

    if record.quality.is_empty() {
        writer.write_all(&vec![0xFF; read_len])?;
    } else {
        writer.write_all(&record.quality)?;
    }

    for (tag, value) in &record.tags {
        write_tag(writer, *tag, value)?;
    }
    Ok(())
}

fn encode_error(record: &AlignmentRecord, reason: &str) -> crate::Error {
    FormatError::InvalidRecord(format!("record '{}': {reason}", record.name)).into()
}

fn tag_value_size(value: &TagValue) -> usize {
    match value {
        TagValue::Char(_) | TagValue::Int8(_) | TagValue::UInt8(_) => 1,
        TagValue::Int16(_) | TagValue::UInt16(_) => 2,
        TagValue::Int32(_) | TagValue::UInt32(_) | TagValue::Float(_) => 4,
        TagValue::String(s) | TagValue::Hex(s) => s.len() + 1,
        TagValue::Int8Array(v) => 5 + v.len(),
        TagValue::UInt8Array(v) => 5 + v.len(),
        TagValue::Int16Array(v) => 5 + 2 * v.len(),
        TagValue::UInt16Array(v) => 5 + 2 * v.len(),
        TagValue::Int32Array(v) => 5 + 4 * v.len(),
        TagValue::UInt32Array(v) => 5 + 4 * v.len(),
        TagValue::FloatArray(v) => 5 + 4 * v.len(),
    }
}

fn write_tag<W: Write>(writer: &mut W, tag: [u8; 2], value: &TagValue) -> Result<()> {
    writer.write_all(&tag)?;
    match value {
        TagValue::Char(v) => {
            writer.write_all(b"A")?;
            writer.write_u8(*v)?;
        }
        TagValue::Int8(v) => {
            writer.write_all(b"c")?;
            writer.write_i8(*v)?;
        }
        TagValue::UInt8(v) => {
            writer.write_all(b"C")?;
            writer.write_u8(*v)?;
        }
        TagValue::Int16(v) => {
            writer.write_all(b"s")?;
            writer.write_i16::<LittleEndian>(*v)?;
        }
        TagValue::UInt16(v) => {
            writer.write_all(b"S")?;
            writer.write_u16::<LittleEndian>(*v)?;
        }
        TagValue::Int32(v) => {
            writer.write_all(b"i")?;
            writer.write_i32::<LittleEndian>(*v)?;
        }
        TagValue::UInt32(v) => {
            writer.write_all(b"I")?;
            writer.write_u32::<LittleEndian>(*v)?;
        }
        TagValue::Float(v) => {
            writer.write_all(b"f")?;
            writer.write_f32::<LittleEndian>(*v)?;
        }
        TagValue::String(s) => {
            writer.write_all(b"Z")?;
            writer.write_all(s.as_bytes())?;
            writer.write_all(&[0])?;
        }
        TagValue::Hex(s) => {
            writer.write_all(b"H")?;
            writer.write_all(s.as_bytes())?;
            writer.write_all(&[0])?;
        }
        TagValue::Int8Array(v) => {
            write_array_header(writer, b'c', v.len())?;
            for e in v {
                writer.write_i8(*e)?;
            }
        }
        TagValue::UInt8Array(v) => {
            write_array_header(writer, b'C', v.len())?;
            writer.write_all(v)?;
        }
        TagValue::Int16Array(v) => {
            write_array_header(writer, b's', v.len())?;
            for e in v {
                writer.write_i16::<LittleEndian>(*e)?;
            }
        }
        TagValue::UInt16Array(v) => {
            write_array_header(writer, b'S', v.len())?;
            for e in v {
                writer.write_u16::<LittleEndian>(*e)?;
            }
        }
        TagValue::Int32Array(v) => {
            write_array_header(writer, b'i', v.len())?;
            for e in v {
                writer.write_i32::<LittleEndian>(*e)?;
            }
        }
        TagValue::UInt32Array(v) => {
            write_array_header(writer, b'I', v.len())?;
            for e in v {
                writer.write_u32::<LittleEndian>(*e)?;
            }
        }
        TagValue::FloatArray(v) => {
            write_array_header(writer, b'f', v.len())?;
            for e in v {
                writer.write_f32::<LittleEndian>(*e)?;
            }
        }
    }
    Ok(())
}

fn write_array_header<W: Write>(writer: &mut W, element_type: u8, count: usize) -> Result<()> {
    writer.write_all(b"B")?;
    writer.write_u8(element_type)?;
    writer.write_i32::<LittleEndian>(count as i32)?;
    Ok(())
}
