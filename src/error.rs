/// Custom Result type for alnmap operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the alnmap library, encompassing all possible error
/// cases that can occur while reading, writing, or indexing alignment data.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Errors related to malformed file or record bytes
    #[error("Error in file format: {0}")]
    FormatError(#[from] FormatError),

    /// Errors raised when input records violate coordinate sort order
    #[error("Error in record ordering: {0}")]
    OrderingError(#[from] OrderingError),

    /// Errors related to reference lookups and query intervals
    #[error("Error in query range: {0}")]
    RangeError(#[from] RangeError),

    /// Standard I/O errors
    #[error("Error with IO: {0}")]
    IoError(#[from] std::io::Error),

    /// UTF-8 conversion errors
    #[error("Error with UTF8: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),
}

/// Errors raised by malformed bytes in an alignment or index file
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    /// The file magic does not match the expected value
    #[error("Invalid file magic: {0:?}")]
    InvalidFileMagic([u8; 4]),

    /// The index file magic does not match the expected value
    #[error("Invalid index file magic: {0:?}")]
    InvalidIndexMagic([u8; 4]),

    /// A compressed block envelope did not start with the gzip magic
    ///
    /// The parameter is the compressed byte offset of the block
    #[error("Invalid block magic at compressed offset {0}")]
    InvalidBlockMagic(u64),

    /// A compressed block header is missing the block-size extra subfield
    #[error("Missing block size subfield in block at compressed offset {0}")]
    MissingBlockSize(u64),

    /// The stream ended in the middle of a block envelope or payload
    #[error("Truncated block at compressed offset {0}")]
    TruncatedBlock(u64),

    /// The decompressed payload length does not match the declared length
    #[error("Block payload length {got} does not match declared length {declared}")]
    PayloadLengthMismatch { declared: u32, got: usize },

    /// The decompressed payload exceeds the maximum block size
    #[error("Block payload of {0} bytes exceeds maximum block size")]
    OversizedPayload(usize),

    /// A record's declared length disagrees with its parsed contents
    #[error("Record '{name}' declares {declared} bytes but parsing consumed {got}")]
    RecordLengthMismatch {
        name: String,
        declared: usize,
        got: usize,
    },

    /// The stream ended in the middle of a record
    #[error("Stream ended in the middle of a record")]
    TruncatedRecord,

    /// A CIGAR word carries an operation code outside 0..=8
    #[error("Invalid CIGAR operation code {code} in record '{name}'")]
    InvalidCigarOp { name: String, code: u8 },

    /// An optional field carries an unknown type code
    #[error("Unknown optional field type '{type_code}' for tag '{tag}' in record '{name}'")]
    UnknownTagType {
        name: String,
        tag: String,
        type_code: char,
    },

    /// An array optional field carries an unknown element type code
    #[error("Unknown array element type '{type_code}' for tag '{tag}' in record '{name}'")]
    UnknownArrayType {
        name: String,
        tag: String,
        type_code: char,
    },

    /// A NUL-terminated field is missing its terminator
    #[error("Missing NUL terminator in {0}")]
    MissingNulTerminator(&'static str),

    /// An index bin number exceeds the maximum allowed by the binning scheme
    #[error("Bin number {0} exceeds the maximum bin count")]
    BinNumberOutOfRange(u32),

    /// The header failed validation
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// A record cannot be represented in the wire format
    #[error("Unencodable record: {0}")]
    InvalidRecord(String),
}

/// Errors raised when index construction observes out-of-order records
#[derive(thiserror::Error, Debug)]
pub enum OrderingError {
    /// A record's reference id is lower than the previous record's
    #[error("Reference id decreased from {previous} to {current}; input must be coordinate sorted")]
    ReferenceIdDecreased { previous: i32, current: i32 },

    /// A record's position is lower than the previous record's within a reference
    #[error(
        "Position decreased from {previous} to {current} on reference {reference_id}; input must be coordinate sorted"
    )]
    PositionDecreased {
        reference_id: i32,
        previous: i32,
        current: i32,
    },
}

/// Errors raised by invalid region queries
#[derive(thiserror::Error, Debug)]
pub enum RangeError {
    /// The requested reference id is not present in the index
    #[error("Reference id {requested} is out of range ({available} references)")]
    UnknownReferenceId { requested: usize, available: usize },

    /// The requested reference name is not present in the header
    #[error("Unknown reference name: {0}")]
    UnknownReferenceName(String),

    /// The query interval is empty or inverted
    #[error("Invalid query interval: start ({start}) must be less than end ({end})")]
    InvalidInterval { start: u32, end: u32 },
}

#[cfg(test)]
mod testing {
    use super::*;

    // ==================== Error Conversion Tests ====================

    #[test]
    fn test_error_from_format_error() {
        let format_error = FormatError::InvalidFileMagic(*b"XXXX");
        let error: Error = format_error.into();
        assert!(matches!(error, Error::FormatError(_)));
    }

    #[test]
    fn test_error_from_ordering_error() {
        let ordering_error = OrderingError::ReferenceIdDecreased {
            previous: 3,
            current: 1,
        };
        let error: Error = ordering_error.into();
        assert!(matches!(error, Error::OrderingError(_)));
    }

    #[test]
    fn test_error_from_range_error() {
        let range_error = RangeError::UnknownReferenceName("chrX".to_string());
        let error: Error = range_error.into();
        assert!(matches!(error, Error::RangeError(_)));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let error: Error = io_error.into();
        assert!(matches!(error, Error::IoError(_)));
    }

    // ==================== FormatError Display Tests ====================

    #[test]
    fn test_format_error_unknown_tag_type() {
        let error = FormatError::UnknownTagType {
            name: "read42".to_string(),
            tag: "XY".to_string(),
            type_code: 'q',
        };
        let error_str = format!("{error}");
        assert!(error_str.contains("read42"));
        assert!(error_str.contains("XY"));
        assert!(error_str.contains('q'));
    }

    #[test]
    fn test_format_error_payload_length_mismatch() {
        let error = FormatError::PayloadLengthMismatch {
            declared: 100,
            got: 90,
        };
        let error_str = format!("{error}");
        assert!(error_str.contains("100"));
        assert!(error_str.contains("90"));
    }

    #[test]
    fn test_format_error_invalid_cigar_op() {
        let error = FormatError::InvalidCigarOp {
            name: "r1".to_string(),
            code: 12,
        };
        let error_str = format!("{error}");
        assert!(error_str.contains("12"));
        assert!(error_str.contains("r1"));
    }

    // ==================== OrderingError Display Tests ====================

    #[test]
    fn test_ordering_error_position_decreased() {
        let error = OrderingError::PositionDecreased {
            reference_id: 2,
            previous: 500,
            current: 100,
        };
        let error_str = format!("{error}");
        assert!(error_str.contains("500"));
        assert!(error_str.contains("100"));
        assert!(error_str.contains('2'));
    }

    // ==================== RangeError Display Tests ====================

    #[test]
    fn test_range_error_unknown_reference_id() {
        let error = RangeError::UnknownReferenceId {
            requested: 5,
            available: 3,
        };
        let error_str = format!("{error}");
        assert!(error_str.contains('5'));
        assert!(error_str.contains('3'));
    }

    #[test]
    fn test_range_error_invalid_interval() {
        let error = RangeError::InvalidInterval {
            start: 900,
            end: 100,
        };
        let error_str = format!("{error}");
        assert!(error_str.contains("900"));
        assert!(error_str.contains("100"));
    }
}
