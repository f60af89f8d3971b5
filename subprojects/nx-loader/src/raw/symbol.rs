use static_assertions::const_assert_eq;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, little_endian::*};

/// Section index of an undefined symbol.
pub const SHN_UNDEF: u16 = 0;

/// ELF64 symbol table entry (`Elf64_Sym`).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Elf64Sym {
    /// Offset of the symbol name in the string table
    pub name: U32,
    /// Type (low nibble) and binding (high nibble)
    pub info: u8,
    /// Visibility
    pub other: u8,
    /// Index of the section the symbol is defined in
    pub shndx: U16,
    /// Symbol value, module-relative for defined symbols
    pub value: U64,
    /// Size of the object the symbol describes
    pub size: U64,
}

const_assert_eq!(size_of::<Elf64Sym>(), 0x18);
