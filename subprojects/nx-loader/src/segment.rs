//! Segment identities shared by every layer.

use core::fmt;

use bitflags::bitflags;

bitflags! {
    /// Memory access permissions of a mapped region.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u8 {
        /// Readable
        const READ = 1 << 0;
        /// Writable
        const WRITE = 1 << 1;
        /// Executable
        const EXECUTE = 1 << 2;
    }
}

/// One of the three program segments of an NSO, in header order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SegmentKind {
    /// Executable code (index 0)
    Text,
    /// Writable data (index 1)
    Data,
    /// Read-only data (index 2)
    Rodata,
}

impl SegmentKind {
    /// All segments, in header order.
    pub const ALL: [SegmentKind; 3] = [SegmentKind::Text, SegmentKind::Data, SegmentKind::Rodata];

    /// Index of the segment in the header tables.
    pub const fn index(self) -> usize {
        match self {
            SegmentKind::Text => 0,
            SegmentKind::Data => 1,
            SegmentKind::Rodata => 2,
        }
    }

    /// Section-style name of the segment.
    pub const fn name(self) -> &'static str {
        match self {
            SegmentKind::Text => ".text",
            SegmentKind::Data => ".data",
            SegmentKind::Rodata => ".rodata",
        }
    }

    /// Permissions the segment is mapped with.
    pub const fn permissions(self) -> Permissions {
        match self {
            SegmentKind::Text => Permissions::READ.union(Permissions::EXECUTE),
            SegmentKind::Data => Permissions::READ.union(Permissions::WRITE),
            SegmentKind::Rodata => Permissions::READ,
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_follow_header_order() {
        for (i, kind) in SegmentKind::ALL.into_iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_permissions() {
        assert_eq!(
            SegmentKind::Text.permissions(),
            Permissions::READ | Permissions::EXECUTE
        );
        assert_eq!(
            SegmentKind::Data.permissions(),
            Permissions::READ | Permissions::WRITE
        );
        assert_eq!(SegmentKind::Rodata.permissions(), Permissions::READ);
    }
}
