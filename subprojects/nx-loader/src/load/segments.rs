use log::debug;
use sha2::{Digest, Sha256};

use super::{
    error::{DecompressError, LoadError},
    options::LoadOptions,
};
use crate::{read::Nso, segment::SegmentKind};

/// A decompressed segment and the address it is loaded at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    kind: SegmentKind,
    memory_offset: u64,
    data: Vec<u8>,
}

impl Segment {
    /// Create a segment from its decompressed bytes.
    pub fn new(kind: SegmentKind, memory_offset: u64, data: Vec<u8>) -> Self {
        Self {
            kind,
            memory_offset,
            data,
        }
    }

    /// Which segment this is.
    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    /// Load address relative to the module base.
    pub fn memory_offset(&self) -> u64 {
        self.memory_offset
    }

    /// End of the segment (exclusive).
    pub fn memory_end(&self) -> u64 {
        self.memory_offset + self.data.len() as u64
    }

    /// Decompressed contents.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Largest output an LZ4 block of `len` bytes can decode to.
///
/// Each extra length byte of a match adds at most 255 bytes of output.
fn max_decompressed_len(len: usize) -> usize {
    len.saturating_mul(255).saturating_add(16)
}

/// Decompress one segment payload to exactly `size` bytes.
///
/// Uncompressed payloads are copied and must already be `size` bytes long.
/// Compressed payloads are raw LZ4 blocks without a size prefix. A `size`
/// the block cannot possibly reach is rejected before any allocation.
pub fn decompress(payload: &[u8], size: usize, compressed: bool) -> Result<Vec<u8>, DecompressError> {
    if !compressed {
        if payload.len() != size {
            return Err(DecompressError::SizeMismatch {
                expected: size,
                found: payload.len(),
            });
        }
        return Ok(payload.to_vec());
    }

    if size == 0 && payload.is_empty() {
        return Ok(Vec::new());
    }

    let limit = max_decompressed_len(payload.len());
    if size > limit {
        return Err(DecompressError::ImplausibleSize { size, limit });
    }

    let mut out = vec![0u8; size];
    let written = lz4_flex::block::decompress_into(payload, &mut out)?;
    if written != size {
        return Err(DecompressError::ShortOutput {
            expected: size,
            found: written,
        });
    }
    Ok(out)
}

/// Compare the SHA256 of a decompressed segment against the header hash.
pub fn verify_hash(segment: SegmentKind, data: &[u8], expected: &[u8; 0x20]) -> Result<(), LoadError> {
    let computed = Sha256::digest(data);
    if computed.as_slice() != expected {
        return Err(LoadError::HashMismatch { segment });
    }
    Ok(())
}

/// Extract, decompress and optionally verify one segment of `nso`.
pub(crate) fn load_segment(
    nso: &Nso<'_>,
    kind: SegmentKind,
    options: &LoadOptions,
) -> Result<Segment, LoadError> {
    let header = nso.segment(kind);
    let payload = nso.segment_payload(kind)?;
    let compressed = nso.is_compressed(kind);

    let data = decompress(payload, header.size.get() as usize, compressed)
        .map_err(|err| LoadError::decompress(kind, err))?;

    if options.hash_check.enabled(nso.is_hash_checked(kind)) {
        verify_hash(kind, &data, nso.segment_hash(kind))?;
    }

    debug!(
        "{kind}: {:#x} -> {:#x} bytes at {:#x}{}",
        payload.len(),
        data.len(),
        header.memory_offset.get(),
        if compressed { " (lz4)" } else { "" },
    );

    Ok(Segment::new(kind, header.memory_offset.get().into(), data))
}

/// Load all three segments, on scoped threads when `options.parallel` is set.
///
/// The first failing segment in header order determines the error.
pub(crate) fn load_segments(
    nso: &Nso<'_>,
    options: &LoadOptions,
) -> Result<[Segment; 3], LoadError> {
    let results = if options.parallel {
        std::thread::scope(|scope| {
            let handles =
                SegmentKind::ALL.map(|kind| scope.spawn(move || load_segment(nso, kind, options)));
            handles.map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
            })
        })
    } else {
        SegmentKind::ALL.map(|kind| load_segment(nso, kind, options))
    };

    let [text, data, rodata] = results;
    Ok([text?, data?, rodata?])
}
