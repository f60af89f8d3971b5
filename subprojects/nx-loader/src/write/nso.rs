//! NSO (Nintendo Software Object) builder.

use sha2::{Digest, Sha256};
use zerocopy::{FromZeros, IntoBytes};

use crate::{
    raw::nso::{NSO_HEADER_SIZE, NSO_MAGIC, NsoFlags, NsoHeader, NsoSegmentHeader, SEGMENT_COUNT},
    segment::SegmentKind,
};

/// Builder for constructing NSO files.
pub struct NsoBuilder {
    segments: [Option<Vec<u8>>; SEGMENT_COUNT],
    memory_offsets: [Option<u32>; SEGMENT_COUNT],
    module_id: Option<[u8; 0x20]>,
    alignment: u32,
    compress: bool,
    hash: bool,
}

impl NsoBuilder {
    /// Create a new NSO builder.
    ///
    /// Compression and hash flags are enabled and segments are placed on
    /// 0x1000-byte boundaries by default.
    pub fn new() -> Self {
        Self {
            segments: [None, None, None],
            memory_offsets: [None; SEGMENT_COUNT],
            module_id: None,
            alignment: 0x1000,
            compress: true,
            hash: true,
        }
    }

    /// Set the text (code) segment.
    pub fn text(self, data: impl Into<Vec<u8>>) -> Self {
        self.segment(SegmentKind::Text, data)
    }

    /// Set the data (read-write data) segment.
    pub fn data(self, data: impl Into<Vec<u8>>) -> Self {
        self.segment(SegmentKind::Data, data)
    }

    /// Set the rodata (read-only data) segment.
    pub fn rodata(self, data: impl Into<Vec<u8>>) -> Self {
        self.segment(SegmentKind::Rodata, data)
    }

    /// Set the contents of a segment.
    pub fn segment(mut self, kind: SegmentKind, data: impl Into<Vec<u8>>) -> Self {
        self.segments[kind.index()] = Some(data.into());
        self
    }

    /// Place a segment at an explicit memory offset instead of the next
    /// aligned address.
    pub fn memory_offset(mut self, kind: SegmentKind, offset: u32) -> Self {
        self.memory_offsets[kind.index()] = Some(offset);
        self
    }

    /// Set the alignment of automatically placed segments.
    pub fn alignment(mut self, alignment: u32) -> Self {
        self.alignment = alignment.max(1);
        self
    }

    /// Set the 32-byte module ID (build ID).
    ///
    /// If not provided, will default to all zeros.
    pub fn module_id(mut self, id: [u8; 0x20]) -> Self {
        self.module_id = Some(id);
        self
    }

    /// Enable or disable LZ4 compression of segments.
    pub fn compressed(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Enable or disable the hash-check flags.
    ///
    /// Hashes are always written to the header.
    pub fn hashed(mut self, hash: bool) -> Self {
        self.hash = hash;
        self
    }

    /// Build the complete NSO file.
    pub fn build(self) -> Result<Vec<u8>, BuildError> {
        let mut segments = Vec::with_capacity(SEGMENT_COUNT);
        for (kind, data) in SegmentKind::ALL.into_iter().zip(self.segments) {
            let data = data.ok_or(BuildError::MissingSegment(kind))?;
            let size = u32::try_from(data.len()).map_err(|_| BuildError::TooLarge(kind))?;
            segments.push((kind, data, size));
        }

        let mut header = NsoHeader::new_zeroed();
        header.magic = NSO_MAGIC.into();
        header.module_id = self.module_id.unwrap_or([0u8; 0x20]);

        let mut flags = NsoFlags::empty();
        let mut payloads = Vec::with_capacity(SEGMENT_COUNT);
        let mut file_offset = NSO_HEADER_SIZE as u32;
        let mut memory_end = 0u32;

        for (kind, data, size) in segments {
            let i = kind.index();
            let memory_offset = match self.memory_offsets[i] {
                Some(offset) => offset,
                None => align_up(memory_end, self.alignment).ok_or(BuildError::TooLarge(kind))?,
            };
            if i > 0 && memory_offset < memory_end {
                return Err(BuildError::MemoryOffsetNotIncreasing(kind));
            }
            memory_end = memory_offset
                .checked_add(size)
                .ok_or(BuildError::TooLarge(kind))?;

            header.hashes[i] = Sha256::digest(&data).into();

            let payload = if self.compress {
                flags |= NsoFlags::compress(i);
                lz4_flex::block::compress(&data)
            } else {
                data
            };
            if self.hash {
                flags |= NsoFlags::hash(i);
            }

            let file_size = u32::try_from(payload.len()).map_err(|_| BuildError::TooLarge(kind))?;
            header.segments[i] = NsoSegmentHeader {
                file_offset: file_offset.into(),
                memory_offset: memory_offset.into(),
                size: size.into(),
                aux_size: 0u32.into(),
            };
            header.file_sizes[i] = file_size.into();
            file_offset = file_offset
                .checked_add(file_size)
                .ok_or(BuildError::TooLarge(kind))?;
            payloads.push(payload);
        }
        header.flags = flags.bits().into();

        let mut buf = Vec::with_capacity(file_offset as usize);
        buf.extend_from_slice(header.as_bytes());
        for payload in &payloads {
            buf.extend_from_slice(payload);
        }

        Ok(buf)
    }
}

impl Default for NsoBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Error returned by [`NsoBuilder::build`].
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A segment was not provided.
    #[error("missing {0} segment")]
    MissingSegment(SegmentKind),
    /// A segment does not fit the 32-bit header fields.
    #[error("{0} segment does not fit in a 32-bit address space")]
    TooLarge(SegmentKind),
    /// A segment was placed below the end of the previous one.
    #[error("{0} segment overlaps the previous segment")]
    MemoryOffsetNotIncreasing(SegmentKind),
}

fn align_up(value: u32, alignment: u32) -> Option<u32> {
    Some(value.checked_add(alignment - 1)? / alignment * alignment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::Nso;

    #[test]
    fn test_default_layout() {
        let bytes = NsoBuilder::new()
            .text(vec![0xAA; 0x1800])
            .data(vec![0xBB; 0x10])
            .rodata(vec![0xCC; 0x20])
            .build()
            .unwrap();

        let nso = Nso::try_from_bytes(&bytes).unwrap();
        let offsets = SegmentKind::ALL.map(|kind| nso.segment(kind).memory_offset.get());
        assert_eq!(offsets, [0, 0x2000, 0x3000]);
        assert_eq!(nso.flags().bits(), 0b11_1111);
        assert_eq!(nso.segment(SegmentKind::Text).file_offset.get(), 0x100);
    }

    #[test]
    fn test_explicit_offsets() {
        let bytes = NsoBuilder::new()
            .text(vec![1; 0x10])
            .data(vec![2; 0x10])
            .rodata(vec![3; 0x10])
            .memory_offset(SegmentKind::Text, 0x1000)
            .memory_offset(SegmentKind::Data, 0x1020)
            .alignment(0x10)
            .compressed(false)
            .hashed(false)
            .build()
            .unwrap();

        let nso = Nso::try_from_bytes(&bytes).unwrap();
        let offsets = SegmentKind::ALL.map(|kind| nso.segment(kind).memory_offset.get());
        assert_eq!(offsets, [0x1000, 0x1020, 0x1030]);
        assert!(nso.flags().is_empty());
        assert_eq!(nso.segment_payload(SegmentKind::Data).unwrap(), &[2; 0x10]);
    }

    #[test]
    fn test_missing_segment() {
        let err = NsoBuilder::new().text(vec![0]).rodata(vec![0]).build().err();
        assert!(matches!(err, Some(BuildError::MissingSegment(SegmentKind::Data))));
    }

    #[test]
    fn test_overlapping_offsets() {
        let err = NsoBuilder::new()
            .text(vec![0; 0x100])
            .data(vec![0; 0x10])
            .rodata(vec![0; 0x10])
            .memory_offset(SegmentKind::Data, 0x80)
            .build()
            .err();
        assert!(matches!(
            err,
            Some(BuildError::MemoryOffsetNotIncreasing(SegmentKind::Data))
        ));
    }
}
