use std::fmt;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::Result;

/// A file position in a block-compressed stream.
///
/// Pairs the byte offset of a compressed block's start in the underlying
/// stream with a byte offset into that block's decompressed payload. The
/// pair survives compression: seeking to `compressed`, inflating the
/// block, and skipping `uncompressed` bytes lands on the addressed byte.
///
/// Ordered by compressed offset first, then uncompressed offset, which
/// matches file order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualOffset {
    /// Byte offset of the block's first envelope byte in the compressed stream
    pub compressed: u64,
    /// Byte offset within the block's decompressed payload
    pub uncompressed: u16,
}

impl VirtualOffset {
    #[must_use]
    pub fn new(compressed: u64, uncompressed: u16) -> Self {
        Self {
            compressed,
            uncompressed,
        }
    }

    /// The packed 64-bit form: compressed offset in the high 48 bits,
    /// uncompressed offset in the low 16.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        (self.compressed << 16) | u64::from(self.uncompressed)
    }

    /// Unpacks the 64-bit form.
    #[must_use]
    pub fn from_u64(value: u64) -> Self {
        Self {
            compressed: value >> 16,
            uncompressed: (value & 0xFFFF) as u16,
        }
    }

    /// Reads the 8-byte index-file representation: two bytes of
    /// uncompressed offset followed by six bytes of compressed offset,
    /// both little endian.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let uncompressed = reader.read_u16::<LittleEndian>()?;
        let compressed = reader.read_uint::<LittleEndian>(6)?;
        Ok(Self {
            compressed,
            uncompressed,
        })
    }

    /// Writes the 8-byte index-file representation.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<LittleEndian>(self.uncompressed)?;
        writer.write_uint::<LittleEndian>(self.compressed & 0x0000_FFFF_FFFF_FFFF, 6)?;
        Ok(())
    }
}

impl fmt::Display for VirtualOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.compressed, self.uncompressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    // ==================== Ordering Tests ====================

    #[test]
    fn test_order_by_compressed_first() {
        let a = VirtualOffset::new(100, 500);
        let b = VirtualOffset::new(200, 0);
        assert!(a < b);
    }

    #[test]
    fn test_order_by_uncompressed_within_block() {
        let a = VirtualOffset::new(100, 10);
        let b = VirtualOffset::new(100, 11);
        assert!(a < b);
        assert_eq!(a, VirtualOffset::new(100, 10));
    }

    #[test]
    fn test_default_is_minimum() {
        let zero = VirtualOffset::default();
        assert!(zero <= VirtualOffset::new(0, 1));
        assert!(zero <= VirtualOffset::new(1, 0));
    }

    // ==================== Wire Format Tests ====================

    #[test]
    fn test_wire_round_trip() {
        let offset = VirtualOffset::new(0x0000_ABCD_EF01_2345, 0x6789);
        let mut buf = Vec::new();
        offset.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), 8);
        let decoded = VirtualOffset::read_from(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(decoded, offset);
    }

    #[test]
    fn test_wire_layout() {
        let offset = VirtualOffset::new(0x01, 0x02);
        let mut buf = Vec::new();
        offset.write_to(&mut buf).unwrap();
        // uncompressed LE u16 first, then compressed as 48-bit LE
        assert_eq!(buf, vec![0x02, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_u64_form_matches_wire_bytes() {
        let offset = VirtualOffset::new(0x1234, 0x56);
        let mut buf = Vec::new();
        offset.write_to(&mut buf).unwrap();
        let wire = u64::from_le_bytes(buf.try_into().unwrap());
        assert_eq!(wire, offset.as_u64());
        assert_eq!(VirtualOffset::from_u64(offset.as_u64()), offset);
    }

    #[test]
    fn test_wire_maximum_compressed_offset() {
        let offset = VirtualOffset::new(0x0000_FFFF_FFFF_FFFF, u16::MAX);
        let mut buf = Vec::new();
        offset.write_to(&mut buf).unwrap();
        let decoded = VirtualOffset::read_from(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(decoded, offset);
    }
}
