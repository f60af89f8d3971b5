use static_assertions::const_assert_eq;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, little_endian::*};

/// End of the `.dynamic` array.
pub const DT_NULL: i64 = 0;
/// Address of the SysV symbol hash table.
pub const DT_HASH: i64 = 4;
/// Address of the dynamic string table.
pub const DT_STRTAB: i64 = 5;
/// Address of the dynamic symbol table.
pub const DT_SYMTAB: i64 = 6;
/// Size in bytes of the dynamic string table.
pub const DT_STRSZ: i64 = 10;
/// Size in bytes of one symbol table entry.
pub const DT_SYMENT: i64 = 11;
/// Address of the GNU-style symbol hash table.
pub const DT_GNU_HASH: i64 = 0x6fff_fef5;

/// ELF64 `.dynamic` entry.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Elf64Dyn {
    /// Entry tag (`DT_*`)
    pub tag: I64,
    /// Value or module-relative address, depending on the tag
    pub value: U64,
}

const_assert_eq!(size_of::<Elf64Dyn>(), 0x10);
