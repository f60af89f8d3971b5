use core::fmt;

use crate::{read::NsoFromBytesError, segment::SegmentKind};

/// Fatal errors of the loading pipeline.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file does not start with "NSO0"
    #[error("invalid magic: expected 0x304f534e (NSO0), found {found:#010x}")]
    BadMagic {
        /// Found magic number
        found: u32,
    },
    /// The header or a segment payload extends past the end of the file
    #[error("{region} truncated: need {required} bytes, have {available}")]
    Truncated {
        /// What was being read
        region: Region,
        /// End offset of the region
        required: usize,
        /// File size
        available: usize,
    },
    /// Uncompressed payload length differs from the declared segment size
    #[error("{segment} size mismatch: expected {expected:#x} bytes, found {found:#x}")]
    SizeMismatch {
        /// Offending segment
        segment: SegmentKind,
        /// Declared size
        expected: usize,
        /// Actual payload length
        found: usize,
    },
    /// Compressed payload could not be decompressed to the declared size
    #[error("failed to decompress {segment}")]
    DecompressionFailure {
        /// Offending segment
        segment: SegmentKind,
        /// Underlying failure
        #[source]
        source: DecompressError,
    },
    /// Decompressed segment does not match the hash recorded in the header
    #[error("{segment} hash mismatch")]
    HashMismatch {
        /// Offending segment
        segment: SegmentKind,
    },
    /// Segment virtual ranges overlap or are not in ascending order
    #[error(
        "{segment} [{start:#x}, {end:#x}) overlaps or follows {next} at {next_start:#x}"
    )]
    OverlapOrDisorder {
        /// Earlier segment
        segment: SegmentKind,
        /// Start address of the earlier segment
        start: u64,
        /// End address of the earlier segment
        end: u64,
        /// Following segment
        next: SegmentKind,
        /// Start address of the following segment
        next_start: u64,
    },
    /// The `.dynamic` array is out of bounds or unterminated
    #[error(transparent)]
    MalformedDynamic(#[from] DynamicError),
}

impl LoadError {
    pub(crate) fn decompress(segment: SegmentKind, err: DecompressError) -> Self {
        match err {
            DecompressError::SizeMismatch { expected, found } => LoadError::SizeMismatch {
                segment,
                expected,
                found,
            },
            source => LoadError::DecompressionFailure { segment, source },
        }
    }
}

impl From<NsoFromBytesError> for LoadError {
    fn from(err: NsoFromBytesError) -> Self {
        match err {
            NsoFromBytesError::InvalidMagic { found } => LoadError::BadMagic { found },
            NsoFromBytesError::BufferTooSmall {
                required,
                available,
            } => LoadError::Truncated {
                region: Region::Header,
                required,
                available,
            },
            NsoFromBytesError::SegmentOutOfBounds {
                segment,
                required,
                available,
            } => LoadError::Truncated {
                region: Region::Segment(segment),
                required,
                available,
            },
        }
    }
}

/// Part of the file a [`LoadError::Truncated`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// The fixed 0x100-byte header
    Header,
    /// A segment payload
    Segment(SegmentKind),
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Header => f.write_str("header"),
            Region::Segment(kind) => write!(f, "{kind} payload"),
        }
    }
}

/// Failure of the segment decompressor, independent of the segment it ran on.
#[derive(Debug, thiserror::Error)]
pub enum DecompressError {
    /// Uncompressed input length differs from the declared size
    #[error("expected {expected:#x} bytes, found {found:#x}")]
    SizeMismatch {
        /// Declared size
        expected: usize,
        /// Input length
        found: usize,
    },
    /// Malformed LZ4 block or output larger than declared
    #[error("malformed lz4 block")]
    Lz4(#[from] lz4_flex::block::DecompressError),
    /// Declared size exceeds what the block could decode to
    #[error("declared size {size:#x} exceeds the {limit:#x}-byte limit for this block")]
    ImplausibleSize {
        /// Declared size
        size: usize,
        /// Maximum output of the block
        limit: usize,
    },
    /// Block decoded to fewer bytes than declared
    #[error("decompressed to {found:#x} bytes, expected {expected:#x}")]
    ShortOutput {
        /// Declared size
        expected: usize,
        /// Bytes produced
        found: usize,
    },
}

/// Malformed `.dynamic` array reached through MOD0.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DynamicError {
    /// `.dynamic` starts outside the image
    #[error("malformed .dynamic: image offset {offset:#x} is outside the image")]
    OutOfImage {
        /// Image-relative offset computed from MOD0
        offset: i64,
    },
    /// No `DT_NULL` terminator before the end of the image
    #[error("malformed .dynamic: unterminated after {entries} entries at {address:#x}")]
    Unterminated {
        /// Virtual address of the array
        address: u64,
        /// Complete entries read
        entries: usize,
    },
}

/// Non-fatal anomaly observed during a successful load.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Diagnostic {
    /// Zero bytes inserted between two segments
    #[error("inserted {len:#x} bytes of padding after {after} at {address:#x}")]
    Padding {
        /// Segment the padding follows
        after: SegmentKind,
        /// Virtual address of the first padding byte
        address: u64,
        /// Number of padding bytes
        len: u64,
    },
    /// A symbol table entry was dropped
    #[error("skipped symbol {index} (name offset {name_offset:#x}): {reason}")]
    SymbolEntrySkipped {
        /// Index of the entry in the symbol table
        index: usize,
        /// Name offset of the entry
        name_offset: u32,
        /// Why it was dropped
        reason: SkipReason,
    },
    /// The symbol table as a whole could not be read
    #[error("symbol table rejected: {0}")]
    SymbolTableRejected(TableFault),
    /// The `.dynamic` array was malformed; no symbols were loaded
    #[error(transparent)]
    MalformedDynamic(DynamicError),
}

/// Reason a single symbol entry was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    /// Name offset is past the end of the string table
    #[error("name offset outside string table")]
    NameOutOfBounds,
    /// No NUL terminator before the end of the string table
    #[error("unterminated name")]
    UnterminatedName,
}

/// Reason the whole symbol table was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TableFault {
    /// `DT_SYMENT` is smaller than an ELF64 symbol
    #[error("symbol entry size {syment:#x} is too small")]
    EntrySizeTooSmall {
        /// Declared entry size
        syment: u64,
    },
    /// `DT_STRTAB` points outside the image
    #[error("string table at {offset:#x} is outside the image")]
    StringTableOutOfImage {
        /// Image-relative offset
        offset: u64,
    },
    /// `DT_SYMTAB` points outside the image
    #[error("symbol table at {offset:#x} is outside the image")]
    SymbolTableOutOfImage {
        /// Image-relative offset
        offset: u64,
    },
}
