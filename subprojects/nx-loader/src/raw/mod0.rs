use static_assertions::const_assert_eq;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, little_endian::*};

/// MOD0 magic number: "MOD0" in ASCII (0x30444f4d).
pub const MOD0_MAGIC: u32 = 0x30444f4d;

/// Offset within the text segment of the word holding the MOD0 header offset.
pub const MOD0_POINTER_OFFSET: usize = 4;

/// MOD0 header structure embedded in the text segment.
///
/// Every offset is relative to the address of the MOD0 header itself and may
/// be negative.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Mod0Header {
    /// Magic number (must be [`MOD0_MAGIC`])
    pub magic: U32,
    /// Offset to .dynamic section (relative to MOD0 base)
    pub dynamic_offset: I32,
    /// Offset to BSS start (relative to MOD0 base)
    pub bss_start_offset: I32,
    /// Offset to BSS end (relative to MOD0 base)
    pub bss_end_offset: I32,
}

const_assert_eq!(size_of::<Mod0Header>(), 0x10);
