use core::{fmt, ops::Range};

use log::warn;

use super::{
    error::{Diagnostic, LoadError},
    segments::Segment,
};
use crate::segment::{Permissions, SegmentKind};

/// What a [`MemoryRegion`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// One of the three file-backed segments
    Segment(SegmentKind),
    /// Zero-initialised memory described by MOD0, not backed by image bytes
    Bss,
}

/// A region to map, with its virtual range and permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    /// Section-style name (`.text`, `.data`, `.rodata`, `.bss`)
    pub name: &'static str,
    /// What the region holds
    pub kind: RegionKind,
    /// Virtual start address
    pub start: u64,
    /// Size in bytes
    pub size: u64,
    /// Access permissions
    pub permissions: Permissions,
}

impl MemoryRegion {
    fn segment(segment: &Segment) -> Self {
        let kind = segment.kind();
        Self {
            name: kind.name(),
            kind: RegionKind::Segment(kind),
            start: segment.memory_offset(),
            size: segment.data().len() as u64,
            permissions: kind.permissions(),
        }
    }

    pub(crate) fn bss(range: Range<u64>) -> Self {
        Self {
            name: ".bss",
            kind: RegionKind::Bss,
            start: range.start,
            size: range.end - range.start,
            permissions: Permissions::READ | Permissions::WRITE,
        }
    }

    /// End address (exclusive).
    pub fn end(&self) -> u64 {
        self.start + self.size
    }

    /// Whether `address` falls inside the region.
    pub fn contains(&self, address: u64) -> bool {
        (self.start..self.end()).contains(&address)
    }
}

/// The three segments laid out contiguously at their virtual addresses.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    base: u64,
    bytes: Vec<u8>,
}

impl Image {
    /// Virtual address of the first byte (the text segment's memory offset).
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Image contents.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the image holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Virtual end address (exclusive).
    pub fn end(&self) -> u64 {
        self.base + self.bytes.len() as u64
    }

    /// Image offset of a virtual address.
    pub fn offset_of(&self, address: u64) -> Option<usize> {
        let offset = usize::try_from(address.checked_sub(self.base)?).ok()?;
        (offset < self.bytes.len()).then_some(offset)
    }

    /// Read `len` bytes at a virtual address.
    pub fn read(&self, address: u64, len: usize) -> Option<&[u8]> {
        let offset = self.offset_of(address)?;
        self.bytes.get(offset..offset.checked_add(len)?)
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("base", &format_args!("{:#x}", self.base))
            .field("len", &format_args!("{:#x}", self.bytes.len()))
            .finish()
    }
}

/// Output of [`build_image`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Flat image of the three segments
    pub image: Image,
    /// One region per segment, in header order
    pub regions: Vec<MemoryRegion>,
}

/// Lay the segments out at their memory offsets, relative to the text segment.
///
/// Segments must be in ascending, non-overlapping order. Gaps are filled with
/// zeros and reported as [`Diagnostic::Padding`].
pub fn build_image(
    segments: [Segment; 3],
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Layout, LoadError> {
    for pair in segments.windows(2) {
        let (cur, next) = (&pair[0], &pair[1]);
        if next.memory_offset() <= cur.memory_offset() || cur.memory_end() > next.memory_offset() {
            return Err(LoadError::OverlapOrDisorder {
                segment: cur.kind(),
                start: cur.memory_offset(),
                end: cur.memory_end(),
                next: next.kind(),
                next_start: next.memory_offset(),
            });
        }
    }

    let base = segments[0].memory_offset();
    let regions = segments.iter().map(MemoryRegion::segment).collect();
    let total = (segments[2].memory_end() - base) as usize;

    let [text, rest @ ..] = segments;
    let mut prev = text.kind();
    let mut bytes = text.into_data();
    bytes.reserve_exact(total - bytes.len());

    for segment in rest {
        let offset = (segment.memory_offset() - base) as usize;
        if bytes.len() < offset {
            let address = base + bytes.len() as u64;
            let len = (offset - bytes.len()) as u64;
            warn!("padding {len:#x} bytes after {prev} at {address:#x}");
            diagnostics.push(Diagnostic::Padding {
                after: prev,
                address,
                len,
            });
            bytes.resize(offset, 0);
        }
        prev = segment.kind();
        bytes.extend_from_slice(segment.data());
    }

    Ok(Layout {
        image: Image { base, bytes },
        regions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(layout: [(u64, usize); 3]) -> [Segment; 3] {
        let mut fill = 0u8;
        SegmentKind::ALL.map(|kind| {
            let (offset, size) = layout[kind.index()];
            fill += 1;
            Segment::new(kind, offset, vec![fill; size])
        })
    }

    #[test]
    fn test_contiguous() {
        let mut diagnostics = Vec::new();
        let layout = build_image(
            segments([(0, 0x10), (0x10, 0x8), (0x18, 0x4)]),
            &mut diagnostics,
        )
        .unwrap();

        assert!(diagnostics.is_empty());
        assert_eq!(layout.image.base(), 0);
        assert_eq!(layout.image.len(), 0x1C);
        assert_eq!(&layout.image.bytes()[0xF..0x11], &[1, 2]);
        assert_eq!(&layout.image.bytes()[0x17..0x19], &[2, 3]);
    }

    #[test]
    fn test_gap_is_zero_padded() {
        let mut diagnostics = Vec::new();
        let layout = build_image(
            segments([(0x1000, 0x10), (0x1020, 0x10), (0x1030, 0x10)]),
            &mut diagnostics,
        )
        .unwrap();

        let image = &layout.image;
        assert_eq!(image.base(), 0x1000);
        assert_eq!(image.len(), 0x40);
        assert!(image.bytes()[..0x10].iter().all(|&b| b == 1));
        assert!(image.bytes()[0x10..0x20].iter().all(|&b| b == 0));
        assert!(image.bytes()[0x20..0x30].iter().all(|&b| b == 2));
        assert_eq!(image.read(0x1020, 1), Some(&[2u8][..]));

        assert_eq!(
            diagnostics,
            [Diagnostic::Padding {
                after: SegmentKind::Text,
                address: 0x1010,
                len: 0x10,
            }]
        );
    }

    #[test]
    fn test_overlap_rejected() {
        let err = build_image(
            segments([(0x1000, 0x30), (0x1020, 0x10), (0x1040, 0x10)]),
            &mut Vec::new(),
        )
        .err()
        .unwrap();

        assert!(matches!(
            err,
            LoadError::OverlapOrDisorder {
                segment: SegmentKind::Text,
                end: 0x1030,
                next: SegmentKind::Data,
                next_start: 0x1020,
                ..
            }
        ));
    }

    #[test]
    fn test_disorder_rejected() {
        let err = build_image(
            segments([(0x0, 0x10), (0x2000, 0x10), (0x1000, 0x10)]),
            &mut Vec::new(),
        )
        .err()
        .unwrap();

        assert!(matches!(
            err,
            LoadError::OverlapOrDisorder {
                segment: SegmentKind::Data,
                next: SegmentKind::Rodata,
                ..
            }
        ));
    }

    #[test]
    fn test_equal_offsets_rejected() {
        let result = build_image(
            segments([(0x0, 0x0), (0x0, 0x10), (0x10, 0x10)]),
            &mut Vec::new(),
        );
        assert!(matches!(result, Err(LoadError::OverlapOrDisorder { .. })));
    }

    #[test]
    fn test_regions() {
        let layout = build_image(
            segments([(0x0, 0x100), (0x1000, 0x80), (0x2000, 0x40)]),
            &mut Vec::new(),
        )
        .unwrap();

        let regions = &layout.regions;
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0].name, ".text");
        assert_eq!(regions[0].permissions, Permissions::READ | Permissions::EXECUTE);
        assert_eq!((regions[1].start, regions[1].size), (0x1000, 0x80));
        assert_eq!(regions[1].permissions, Permissions::READ | Permissions::WRITE);
        assert_eq!(regions[2].name, ".rodata");
        assert_eq!(regions[2].permissions, Permissions::READ);
        assert!(regions[2].contains(0x203F));
        assert!(!regions[2].contains(0x2040));
        assert_eq!(layout.image.len(), 0x2040);
    }

    #[test]
    fn test_image_addressing() {
        let layout = build_image(
            segments([(0x4000, 0x10), (0x4010, 0x10), (0x4020, 0x10)]),
            &mut Vec::new(),
        )
        .unwrap();

        let image = &layout.image;
        assert_eq!(image.offset_of(0x3FFF), None);
        assert_eq!(image.offset_of(0x4000), Some(0));
        assert_eq!(image.offset_of(0x4030), None);
        assert_eq!(image.read(0x402F, 2), None);
        assert_eq!(image.end(), 0x4030);
    }
}
