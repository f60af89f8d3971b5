use bitflags::bitflags;
use static_assertions::const_assert_eq;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, little_endian::*};

/// NSO magic number: "NSO0" in ASCII (0x304f534e).
pub const NSO_MAGIC: u32 = 0x304f534e;

/// Size of the fixed NSO header.
pub const NSO_HEADER_SIZE: usize = 0x100;

/// Number of segments described by the header.
pub const SEGMENT_COUNT: usize = 3;

bitflags! {
    /// NSO header flags indicating compression and hash validation.
    ///
    /// Bit `i` marks segment `i` as compressed, bit `i + 3` requests a hash
    /// check of segment `i`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NsoFlags: u32 {
        /// Text segment is compressed
        const TEXT_COMPRESS = 1 << 0;
        /// Data segment is compressed
        const DATA_COMPRESS = 1 << 1;
        /// Rodata segment is compressed
        const RODATA_COMPRESS = 1 << 2;
        /// Text segment hash should be checked
        const TEXT_HASH = 1 << 3;
        /// Data segment hash should be checked
        const DATA_HASH = 1 << 4;
        /// Rodata segment hash should be checked
        const RODATA_HASH = 1 << 5;
    }
}

impl NsoFlags {
    /// Compression flag for the segment at `index`.
    pub const fn compress(index: usize) -> Self {
        Self::from_bits_retain(1 << index)
    }

    /// Hash-check flag for the segment at `index`.
    pub const fn hash(index: usize) -> Self {
        Self::from_bits_retain(1 << (index + 3))
    }
}

/// NSO segment descriptor.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct NsoSegmentHeader {
    /// Offset to the (possibly compressed) segment payload within the file
    pub file_offset: U32,
    /// Offset where the segment is loaded, relative to the module base
    pub memory_offset: U32,
    /// Size of the segment after decompression
    pub size: U32,
    /// Extra per-segment word (module name offset/size or BSS size)
    pub aux_size: U32,
}

const_assert_eq!(size_of::<NsoSegmentHeader>(), 0x10);

/// NSO header (0x100 bytes).
///
/// Segments are stored in index order: text, data, rodata.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct NsoHeader {
    /// Magic number (must be [`NSO_MAGIC`])
    pub magic: U32,
    /// Format version
    pub version: U32,
    /// Reserved
    _reserved: U32,
    /// Flags (compression and hash validation)
    pub flags: U32,
    /// Segment descriptors: [text, data, rodata]
    pub segments: [NsoSegmentHeader; SEGMENT_COUNT],
    /// 32-byte module ID (build ID)
    pub module_id: [u8; 0x20],
    /// Size of each segment payload in the file
    pub file_sizes: [U32; SEGMENT_COUNT],
    /// Reserved
    _reserved2: [u8; 0x1C],
    /// Offset to embedded data
    pub embedded_offset: U32,
    /// Size of embedded data
    pub embedded_size: U32,
    /// Dynamic string table location hint; not authoritative
    pub dynstr_hint: U64,
    /// Dynamic symbol table location hint; not authoritative
    pub dynsym_hint: U64,
    /// SHA256 hashes of the decompressed segments
    pub hashes: [[u8; 0x20]; SEGMENT_COUNT],
}

const_assert_eq!(size_of::<NsoHeader>(), NSO_HEADER_SIZE);
