//! File header and reference dictionary
//!
//! The header travels at the front of the compressed stream: the file
//! magic, the free-form header text, then the reference dictionary of
//! (name, length) pairs. Record reference ids are indexes into that
//! dictionary, so the header must be decoded before any record.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use memchr::memchr;

use crate::error::FormatError;
use crate::{Result, FILE_MAGIC};

/// One reference sequence: its name and length in bases.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceSequence {
    pub name: String,
    pub length: i32,
}

impl ReferenceSequence {
    pub fn new(name: impl Into<String>, length: i32) -> Self {
        Self {
            name: name.into(),
            length,
        }
    }
}

/// The alignment file header: free-form text plus the reference
/// dictionary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SamHeader {
    /// Free-form header text (structured key/value lines, kept opaque)
    pub text: String,
    pub references: Vec<ReferenceSequence>,
}

impl SamHeader {
    pub fn new(text: impl Into<String>, references: Vec<ReferenceSequence>) -> Self {
        Self {
            text: text.into(),
            references,
        }
    }

    /// The dictionary index of the reference named `name`.
    #[must_use]
    pub fn reference_id(&self, name: &str) -> Option<usize> {
        self.references.iter().position(|r| r.name == name)
    }

    /// Checks the reference dictionary for empty names, duplicate names,
    /// and non-positive lengths.
    pub fn validate(&self) -> Result<()> {
        for (slot, reference) in self.references.iter().enumerate() {
            if reference.name.is_empty() {
                return Err(
                    FormatError::InvalidHeader(format!("reference {slot} has an empty name"))
                        .into(),
                );
            }
            if reference.length <= 0 {
                return Err(FormatError::InvalidHeader(format!(
                    "reference '{}' has non-positive length {}",
                    reference.name, reference.length
                ))
                .into());
            }
            if self.references[..slot]
                .iter()
                .any(|other| other.name == reference.name)
            {
                return Err(FormatError::InvalidHeader(format!(
                    "duplicate reference name '{}'",
                    reference.name
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Decodes the magic, header text, and reference dictionary from the
    /// front of a decompressed stream.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != *FILE_MAGIC {
            return Err(FormatError::InvalidFileMagic(magic).into());
        }

        let text_len = reader.read_i32::<LittleEndian>()?.max(0) as usize;
        let mut text = vec![0u8; text_len];
        reader.read_exact(&mut text)?;
        let text = std::str::from_utf8(&text)?.to_string();

        let reference_count = reader.read_i32::<LittleEndian>()?.max(0) as usize;
        let mut references = Vec::with_capacity(reference_count);
        for _ in 0..reference_count {
            let name_len = reader.read_i32::<LittleEndian>()?.max(0) as usize;
            let mut name = vec![0u8; name_len];
            reader.read_exact(&mut name)?;
            let nul = memchr(0, &name)
                .ok_or(FormatError::MissingNulTerminator("reference name"))?;
            let name = std::str::from_utf8(&name[..nul])?.to_string();
            let length = reader.read_i32::<LittleEndian>()?;
            references.push(ReferenceSequence { name, length });
        }
        Ok(Self { text, references })
    }

    /// Encodes the magic, header text, and reference dictionary.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(FILE_MAGIC)?;
        writer.write_i32::<LittleEndian>(self.text.len() as i32)?;
        writer.write_all(self.text.as_bytes())?;
        writer.write_i32::<LittleEndian>(self.references.len() as i32)?;
        for reference in &self.references {
            writer.write_i32::<LittleEndian>(reference.name.len() as i32 + 1)?;
            writer.write_all(reference.name.as_bytes())?;
            writer.write_all(&[0])?;
            writer.write_i32::<LittleEndian>(reference.length)?;
        }
        Ok(())
    }
}
