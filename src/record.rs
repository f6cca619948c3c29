//! Alignment record model
//!
//! Plain owned data: the codec in [`crate::codec`] moves these to and
//! from their binary layout, and everything else treats them as values.

use std::fmt;

/// Named bits of [`AlignmentRecord::flags`].
pub mod flags {
    /// Template has multiple segments
    pub const PAIRED: u16 = 0x1;
    /// Each segment properly aligned
    pub const PROPER_PAIR: u16 = 0x2;
    /// Segment unmapped
    pub const UNMAPPED: u16 = 0x4;
    /// Mate unmapped
    pub const MATE_UNMAPPED: u16 = 0x8;
    /// Sequence reverse complemented
    pub const REVERSE: u16 = 0x10;
    /// Mate reverse complemented
    pub const MATE_REVERSE: u16 = 0x20;
    /// First segment in the template
    pub const FIRST_SEGMENT: u16 = 0x40;
    /// Last segment in the template
    pub const LAST_SEGMENT: u16 = 0x80;
    /// Secondary alignment
    pub const SECONDARY: u16 = 0x100;
    /// Failed quality checks
    pub const QC_FAIL: u16 = 0x200;
    /// PCR or optical duplicate
    pub const DUPLICATE: u16 = 0x400;
}

/// One CIGAR edit operation kind, with its wire code 0..=8.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CigarKind {
    /// `M` — alignment match or mismatch
    Match = 0,
    /// `I` — insertion to the reference
    Insertion = 1,
    /// `D` — deletion from the reference
    Deletion = 2,
    /// `N` — skipped region on the reference
    Skip = 3,
    /// `S` — soft clip
    SoftClip = 4,
    /// `H` — hard clip
    HardClip = 5,
    /// `P` — padding
    Padding = 6,
    /// `=` — sequence match
    SeqMatch = 7,
    /// `X` — sequence mismatch
    SeqMismatch = 8,
}

impl CigarKind {
    /// Maps a wire code to its kind.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Match),
            1 => Some(Self::Insertion),
            2 => Some(Self::Deletion),
            3 => Some(Self::Skip),
            4 => Some(Self::SoftClip),
            5 => Some(Self::HardClip),
            6 => Some(Self::Padding),
            7 => Some(Self::SeqMatch),
            8 => Some(Self::SeqMismatch),
            _ => None,
        }
    }

    /// Maps a textual operator to its kind.
    #[must_use]
    pub fn from_symbol(symbol: u8) -> Option<Self> {
        match symbol {
            b'M' => Some(Self::Match),
            b'I' => Some(Self::Insertion),
            b'D' => Some(Self::Deletion),
            b'N' => Some(Self::Skip),
            b'S' => Some(Self::SoftClip),
            b'H' => Some(Self::HardClip),
            b'P' => Some(Self::Padding),
            b'=' => Some(Self::SeqMatch),
            b'X' => Some(Self::SeqMismatch),
            _ => None,
        }
    }

    /// The textual operator character.
    #[must_use]
    pub fn symbol(self) -> char {
        match self {
            Self::Match => 'M',
            Self::Insertion => 'I',
            Self::Deletion => 'D',
            Self::Skip => 'N',
            Self::SoftClip => 'S',
            Self::HardClip => 'H',
            Self::Padding => 'P',
            Self::SeqMatch => '=',
            Self::SeqMismatch => 'X',
        }
    }

    /// Whether this operation advances the reference coordinate.
    #[must_use]
    pub fn consumes_reference(self) -> bool {
        matches!(
            self,
            Self::Match | Self::Deletion | Self::Skip | Self::SeqMatch | Self::SeqMismatch
        )
    }
}

/// One CIGAR operation: a kind and a run length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CigarOp {
    pub kind: CigarKind,
    pub len: u32,
}

impl CigarOp {
    #[must_use]
    pub fn new(kind: CigarKind, len: u32) -> Self {
        Self { kind, len }
    }
}

impl fmt::Display for CigarOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.len, self.kind.symbol())
    }
}

/// Formats CIGAR operations as their compact text form, `*` when empty.
#[must_use]
pub fn cigar_to_text(ops: &[CigarOp]) -> String {
    if ops.is_empty() {
        return "*".to_string();
    }
    ops.iter().map(ToString::to_string).collect()
}

/// Parses the compact text form of a CIGAR string; `*` yields no ops.
///
/// Returns `None` on an unknown operator or a length without one.
#[must_use]
pub fn cigar_from_text(text: &str) -> Option<Vec<CigarOp>> {
    if text == "*" {
        return Some(Vec::new());
    }
    let mut ops = Vec::new();
    let mut len: u32 = 0;
    let mut have_digits = false;
    for byte in text.bytes() {
        if byte.is_ascii_digit() {
            len = len.checked_mul(10)?.checked_add(u32::from(byte - b'0'))?;
            have_digits = true;
        } else {
            let kind = CigarKind::from_symbol(byte)?;
            if !have_digits {
                return None;
            }
            ops.push(CigarOp::new(kind, len));
            len = 0;
            have_digits = false;
        }
    }
    if have_digits {
        return None;
    }
    Some(ops)
}

/// A typed optional field value.
///
/// One variant per wire type code, so matches over field contents stay
/// exhaustive at compile time.
#[derive(Clone, Debug, PartialEq)]
pub enum TagValue {
    /// `A` — a printable character
    Char(u8),
    /// `c`
    Int8(i8),
    /// `C`
    UInt8(u8),
    /// `s`
    Int16(i16),
    /// `S`
    UInt16(u16),
    /// `i`
    Int32(i32),
    /// `I`
    UInt32(u32),
    /// `f`
    Float(f32),
    /// `Z` — NUL-terminated string
    String(String),
    /// `H` — NUL-terminated hex string
    Hex(String),
    /// `B,c`
    Int8Array(Vec<i8>),
    /// `B,C`
    UInt8Array(Vec<u8>),
    /// `B,s`
    Int16Array(Vec<i16>),
    /// `B,S`
    UInt16Array(Vec<u16>),
    /// `B,i`
    Int32Array(Vec<i32>),
    /// `B,I`
    UInt32Array(Vec<u32>),
    /// `B,f`
    FloatArray(Vec<f32>),
}

/// A two-character optional field tag.
pub type Tag = [u8; 2];

/// One alignment record.
///
/// Positions are 1-based here; `0` means unplaced. The wire layout
/// stores them 0-based with `-1` for unplaced, and the codec converts.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct AlignmentRecord {
    /// Index into the header's reference dictionary, `-1` if unmapped
    pub reference_id: i32,
    /// 1-based leftmost coordinate, `0` if unplaced
    pub position: i32,
    pub mapping_quality: u8,
    pub flags: u16,
    pub cigar: Vec<CigarOp>,
    pub mate_reference_id: i32,
    /// 1-based mate coordinate, `0` if unplaced
    pub mate_position: i32,
    pub insert_size: i32,
    pub name: String,
    /// ASCII nucleotide symbols
    pub sequence: Vec<u8>,
    /// Raw per-base quality values; empty means absent
    pub quality: Vec<u8>,
    pub tags: Vec<(Tag, TagValue)>,
}

impl AlignmentRecord {
    /// Whether the record is placed on a reference coordinate.
    #[must_use]
    pub fn is_placed(&self) -> bool {
        self.reference_id >= 0 && self.position > 0
    }

    /// Whether the record aligned (FLAG unmapped bit clear and placed).
    #[must_use]
    pub fn is_mapped(&self) -> bool {
        self.is_placed() && self.flags & flags::UNMAPPED == 0
    }

    /// The tag value for `tag`, if present.
    #[must_use]
    pub fn tag(&self, tag: Tag) -> Option<&TagValue> {
        self.tags
            .iter()
            .find_map(|(id, value)| (*id == tag).then_some(value))
    }
}
