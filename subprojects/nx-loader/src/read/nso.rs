use zerocopy::FromBytes;

use crate::{
    raw::nso::{NSO_HEADER_SIZE, NSO_MAGIC, NsoFlags, NsoHeader, NsoSegmentHeader},
    segment::SegmentKind,
};

/// High-level NSO parser with access to the segment payloads.
#[derive(Clone, Copy)]
pub struct Nso<'a> {
    bytes: &'a [u8],
    header: &'a NsoHeader,
}

impl<'a> Nso<'a> {
    /// Parse the NSO header from bytes with magic and size validation.
    ///
    /// The magic is checked before the length, so a buffer with a wrong magic
    /// is rejected after reading only its first four bytes.
    pub fn try_from_bytes(bytes: &'a [u8]) -> Result<Self, FromBytesError> {
        if let Some(magic) = bytes.first_chunk::<4>() {
            let found = u32::from_le_bytes(*magic);
            if found != NSO_MAGIC {
                return Err(FromBytesError::InvalidMagic { found });
            }
        }

        let header = NsoHeader::ref_from_prefix(bytes)
            .map_err(|_| FromBytesError::BufferTooSmall {
                required: NSO_HEADER_SIZE,
                available: bytes.len(),
            })?
            .0;

        Ok(Self { bytes, header })
    }

    /// Get the NSO header.
    pub fn header(&self) -> &'a NsoHeader {
        self.header
    }

    /// Get the 32-byte module ID.
    pub fn module_id(&self) -> &'a [u8; 32] {
        &self.header.module_id
    }

    /// Get the NSO flags.
    pub fn flags(&self) -> NsoFlags {
        NsoFlags::from_bits_retain(self.header.flags.get())
    }

    /// Get the descriptor of a segment.
    pub fn segment(&self, kind: SegmentKind) -> &'a NsoSegmentHeader {
        &self.header.segments[kind.index()]
    }

    /// Whether the segment payload is LZ4 compressed.
    pub fn is_compressed(&self, kind: SegmentKind) -> bool {
        self.flags().contains(NsoFlags::compress(kind.index()))
    }

    /// Whether the header requests a hash check of the segment.
    pub fn is_hash_checked(&self, kind: SegmentKind) -> bool {
        self.flags().contains(NsoFlags::hash(kind.index()))
    }

    /// SHA256 of the decompressed segment as recorded in the header.
    pub fn segment_hash(&self, kind: SegmentKind) -> &'a [u8; 0x20] {
        &self.header.hashes[kind.index()]
    }

    /// Get the raw (possibly compressed) payload of a segment.
    pub fn segment_payload(&self, kind: SegmentKind) -> Result<&'a [u8], FromBytesError> {
        let offset = self.segment(kind).file_offset.get() as usize;
        let size = self.header.file_sizes[kind.index()].get() as usize;
        let required = offset.saturating_add(size);
        self.bytes
            .get(offset..required)
            .ok_or(FromBytesError::SegmentOutOfBounds {
                segment: kind,
                required,
                available: self.bytes.len(),
            })
    }
}

/// Errors that can occur when parsing an NSO from bytes
#[derive(Debug, thiserror::Error)]
pub enum FromBytesError {
    /// Buffer is too small to contain the header
    #[error("buffer too small: need {required} bytes, have {available}")]
    BufferTooSmall {
        /// Number of bytes required
        required: usize,
        /// Number of bytes available
        available: usize,
    },
    /// Magic number does not match NSO0 (0x304f534e)
    #[error("invalid magic: expected 0x304f534e (NSO0), found {found:#010x}")]
    InvalidMagic {
        /// Found magic number
        found: u32,
    },
    /// Segment payload extends past the end of the file
    #[error("{segment} payload out of bounds: need {required} bytes, have {available}")]
    SegmentOutOfBounds {
        /// Segment whose payload is out of bounds
        segment: SegmentKind,
        /// End offset of the payload
        required: usize,
        /// File size
        available: usize,
    },
}
