use core::ops::Range;

use log::{debug, warn};
use zerocopy::{FromBytes, little_endian::U32};

use super::error::DynamicError;
use crate::{
    raw::{
        dynamic::{DT_GNU_HASH, DT_HASH, DT_STRSZ, DT_STRTAB, DT_SYMENT, DT_SYMTAB},
        mod0::MOD0_POINTER_OFFSET,
        symbol::Elf64Sym,
    },
    read::{Dynamic, DynamicFromBytesError, Mod0},
};

/// One `.dynamic` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicEntry {
    /// `DT_*` tag
    pub tag: i64,
    /// Value or module-relative address
    pub value: u64,
}

/// Where the dynamic symbol and string tables live, as image offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolTableLocation {
    /// `DT_SYMTAB`
    pub symtab: u64,
    /// `DT_STRTAB`
    pub strtab: u64,
    /// `DT_STRSZ`
    pub strsz: u64,
    /// `DT_SYMENT`, defaulting to the ELF64 symbol size
    pub syment: u64,
    /// Number of symbols, when a hash table provides it
    pub count: Option<u64>,
}

impl SymbolTableLocation {
    fn from_dynamic(dynamic: &Dynamic<'_>, image: &[u8]) -> Option<Self> {
        let (Some(symtab), Some(strtab), Some(strsz)) = (
            dynamic.get(DT_SYMTAB),
            dynamic.get(DT_STRTAB),
            dynamic.get(DT_STRSZ),
        ) else {
            debug!(".dynamic has no complete symbol/string table description");
            return None;
        };

        let count = dynamic
            .get(DT_HASH)
            .and_then(|offset| sysv_hash_count(image, offset))
            .or_else(|| {
                dynamic
                    .get(DT_GNU_HASH)
                    .and_then(|offset| gnu_hash_count(image, offset))
            });

        Some(Self {
            symtab,
            strtab,
            strsz,
            syment: dynamic
                .get(DT_SYMENT)
                .unwrap_or(size_of::<Elf64Sym>() as u64),
            count,
        })
    }
}

/// Dynamic-linking metadata found through the MOD0 header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mod0Info {
    /// Virtual address of the MOD0 header
    pub address: u64,
    /// Virtual address of the `.dynamic` array
    pub dynamic_address: u64,
    /// BSS bounds, when they lie at or above the image base
    pub bss: Option<Range<u64>>,
    /// `.dynamic` entries up to the terminator
    pub dynamic: Vec<DynamicEntry>,
    /// Symbol and string table location, when fully described
    pub symbol_table: Option<SymbolTableLocation>,
}

/// Find the MOD0 header of an image and parse the `.dynamic` array it points to.
///
/// `image` starts with the text segment of `text_len` bytes, loaded at
/// `text_base`. The word at offset 4 of the text segment holds the image
/// offset of the MOD0 header, which must lie inside the text segment.
/// Returns `Ok(None)` when there is no MOD0 header.
pub fn resolve_mod0(
    image: &[u8],
    text_base: u64,
    text_len: usize,
) -> Result<Option<Mod0Info>, DynamicError> {
    let Some(text) = image.get(..text_len) else {
        debug!("text segment of {text_len:#x} bytes exceeds the image");
        return Ok(None);
    };
    let Some(offset) = read_u32(text, MOD0_POINTER_OFFSET) else {
        debug!("text segment too short for a MOD0 pointer");
        return Ok(None);
    };

    let mod0 = match text.get(offset as usize..).map(Mod0::try_from_bytes) {
        Some(Ok(mod0)) => mod0,
        Some(Err(err)) => {
            debug!("no MOD0 at image offset {offset:#x}: {err}");
            return Ok(None);
        }
        None => {
            debug!("MOD0 pointer {offset:#x} is outside the text segment");
            return Ok(None);
        }
    };

    let relative = |delta: i32| i64::from(offset) + i64::from(delta);

    let dynamic_offset = relative(mod0.dynamic_offset());
    let dynamic_bytes = usize::try_from(dynamic_offset)
        .ok()
        .and_then(|start| image.get(start..))
        .filter(|bytes| !bytes.is_empty())
        .ok_or(DynamicError::OutOfImage {
            offset: dynamic_offset,
        })?;
    let dynamic_address = text_base + dynamic_offset as u64;

    let dynamic = Dynamic::try_from_bytes(dynamic_bytes).map_err(|err| match err {
        DynamicFromBytesError::Unterminated { entries } => DynamicError::Unterminated {
            address: dynamic_address,
            entries,
        },
    })?;

    let (bss_start, bss_end) = (
        relative(mod0.bss_start_offset()),
        relative(mod0.bss_end_offset()),
    );
    let bss = if bss_start >= 0 && bss_end >= bss_start {
        Some(text_base + bss_start as u64..text_base + bss_end as u64)
    } else {
        warn!("ignoring BSS bounds [{bss_start:#x}, {bss_end:#x}) from MOD0");
        None
    };

    let symbol_table = SymbolTableLocation::from_dynamic(&dynamic, image);

    debug!(
        "MOD0 at {:#x}: {} .dynamic entries at {dynamic_address:#x}",
        text_base + u64::from(offset),
        dynamic.entries().len(),
    );

    Ok(Some(Mod0Info {
        address: text_base + u64::from(offset),
        dynamic_address,
        bss,
        dynamic: dynamic
            .entries()
            .iter()
            .map(|entry| DynamicEntry {
                tag: entry.tag.get(),
                value: entry.value.get(),
            })
            .collect(),
        symbol_table,
    }))
}

fn read_u32(image: &[u8], offset: usize) -> Option<u32> {
    let (value, _) = U32::read_from_prefix(image.get(offset..)?).ok()?;
    Some(value.get())
}

/// Symbol count from a SysV hash table: its `nchain` field.
fn sysv_hash_count(image: &[u8], offset: u64) -> Option<u64> {
    let offset = usize::try_from(offset).ok()?;
    read_u32(image, offset.checked_add(4)?).map(u64::from)
}

/// Symbol count from a GNU hash table.
///
/// The highest symbol index reachable from any bucket, followed along its
/// chain until the end-of-chain bit, plus one.
fn gnu_hash_count(image: &[u8], offset: u64) -> Option<u64> {
    let offset = usize::try_from(offset).ok()?;
    let nbuckets = read_u32(image, offset)? as usize;
    let symoffset = read_u32(image, offset.checked_add(4)?)?;
    let bloom_size = read_u32(image, offset.checked_add(8)?)? as usize;

    let buckets = offset.checked_add(16)?.checked_add(bloom_size.checked_mul(8)?)?;
    let chains = buckets.checked_add(nbuckets.checked_mul(4)?)?;

    let mut last = 0u32;
    for i in 0..nbuckets {
        last = last.max(read_u32(image, buckets + i * 4)?);
    }
    if last < symoffset {
        return Some(symoffset.into());
    }

    let mut index = last;
    loop {
        let chain = read_u32(image, chains.checked_add((index - symoffset) as usize * 4)?)?;
        if chain & 1 != 0 {
            return Some(u64::from(index) + 1);
        }
        index = index.checked_add(1)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Image with a MOD0 header at 0x10 and `.dynamic` at 0x40.
    fn image(dynamic: &[(i64, u64)], terminated: bool) -> Vec<u8> {
        let mut image = vec![0u8; 0x40];
        image[4..8].copy_from_slice(&0x10u32.to_le_bytes());
        image[0x10..0x14].copy_from_slice(b"MOD0");
        image[0x14..0x18].copy_from_slice(&0x30i32.to_le_bytes());
        image[0x18..0x1C].copy_from_slice(&0x1F0i32.to_le_bytes());
        image[0x1C..0x20].copy_from_slice(&0x2F0i32.to_le_bytes());
        for &(tag, value) in dynamic {
            image.extend_from_slice(&tag.to_le_bytes());
            image.extend_from_slice(&value.to_le_bytes());
        }
        if terminated {
            image.extend_from_slice(&[0u8; 16]);
        }
        image
    }

    #[test]
    fn test_resolves_tables() {
        let image = image(
            &[(DT_STRTAB, 0x200), (DT_SYMTAB, 0x100), (DT_STRSZ, 0x40), (DT_SYMENT, 0x18)],
            true,
        );

        let info = resolve_mod0(&image, 0x7100_0000, image.len()).unwrap().unwrap();
        assert_eq!(info.address, 0x7100_0010);
        assert_eq!(info.dynamic_address, 0x7100_0040);
        assert_eq!(info.bss, Some(0x7100_0200..0x7100_0300));
        assert_eq!(info.dynamic.len(), 4);
        assert_eq!(
            info.dynamic[0],
            DynamicEntry {
                tag: DT_STRTAB,
                value: 0x200
            }
        );
        assert_eq!(
            info.symbol_table,
            Some(SymbolTableLocation {
                symtab: 0x100,
                strtab: 0x200,
                strsz: 0x40,
                syment: 0x18,
                count: None,
            })
        );
    }

    #[test]
    fn test_missing_magic() {
        let mut image = image(&[], true);
        image[0x10..0x14].copy_from_slice(b"MOD1");
        assert_eq!(resolve_mod0(&image, 0, image.len()).unwrap(), None);
    }

    #[test]
    fn test_pointer_outside_image() {
        let mut image = image(&[], true);
        image[4..8].copy_from_slice(&0xFFFF_0000u32.to_le_bytes());
        assert_eq!(resolve_mod0(&image, 0, image.len()).unwrap(), None);
    }

    #[test]
    fn test_tiny_text() {
        assert_eq!(resolve_mod0(&[0u8; 6], 0, 6).unwrap(), None);
    }

    #[test]
    fn test_pointer_read_from_text_only() {
        // text is 4 bytes; the pointer and MOD0 that follow belong to data
        let mut image = vec![0u8; 0x40];
        image[4..8].copy_from_slice(&8u32.to_le_bytes());
        image[8..0xC].copy_from_slice(b"MOD0");
        image[0xC..0x10].copy_from_slice(&0x10i32.to_le_bytes());

        assert_eq!(resolve_mod0(&image, 0, 4).unwrap(), None);
        assert!(resolve_mod0(&image, 0, image.len()).unwrap().is_some());
    }

    #[test]
    fn test_mod0_past_text_end() {
        let image = image(&[], true);
        // the header at 0x10 needs 0x20 bytes of text
        assert_eq!(resolve_mod0(&image, 0, 0x1F).unwrap(), None);
        assert!(resolve_mod0(&image, 0, 0x20).unwrap().is_some());
    }

    #[test]
    fn test_negative_dynamic_offset() {
        let mut image = vec![0u8; 0x40];
        image[4..8].copy_from_slice(&0x30u32.to_le_bytes());
        image[0x30..0x34].copy_from_slice(b"MOD0");
        image[0x34..0x38].copy_from_slice(&(-0x20i32).to_le_bytes());
        // .dynamic at 0x10: a single terminator
        let info = resolve_mod0(&image, 0, image.len()).unwrap().unwrap();
        assert_eq!(info.dynamic_address, 0x10);
        assert!(info.dynamic.is_empty());
        assert_eq!(info.symbol_table, None);
    }

    #[test]
    fn test_dynamic_before_image() {
        let mut image = vec![0u8; 0x40];
        image[4..8].copy_from_slice(&0x10u32.to_le_bytes());
        image[0x10..0x14].copy_from_slice(b"MOD0");
        image[0x14..0x18].copy_from_slice(&(-0x20i32).to_le_bytes());

        assert_eq!(
            resolve_mod0(&image, 0, image.len()),
            Err(DynamicError::OutOfImage { offset: -0x10 })
        );
    }

    #[test]
    fn test_unterminated_dynamic() {
        let image = image(&[(DT_STRTAB, 0x200), (DT_SYMTAB, 0x100)], false);
        assert_eq!(
            resolve_mod0(&image, 0x1000, image.len()),
            Err(DynamicError::Unterminated {
                address: 0x1040,
                entries: 2
            })
        );
    }

    #[test]
    fn test_missing_tags_yield_no_table() {
        let image = image(&[(DT_STRTAB, 0x200), (DT_STRSZ, 0x10)], true);
        let info = resolve_mod0(&image, 0, image.len()).unwrap().unwrap();
        assert_eq!(info.symbol_table, None);
    }

    #[test]
    fn test_default_syment_and_sysv_count() {
        let mut image = image(
            &[(DT_STRTAB, 0x200), (DT_SYMTAB, 0x100), (DT_STRSZ, 0x40), (DT_HASH, 0x90)],
            true,
        );
        image.resize(0xA0, 0);
        image[0x90..0x94].copy_from_slice(&1u32.to_le_bytes());
        image[0x94..0x98].copy_from_slice(&7u32.to_le_bytes());

        let location = resolve_mod0(&image, 0, image.len()).unwrap().unwrap().symbol_table.unwrap();
        assert_eq!(location.syment, 0x18);
        assert_eq!(location.count, Some(7));
    }

    #[test]
    fn test_gnu_hash_count() {
        // nbuckets=2, symoffset=1, bloom_size=1, bloom_shift=0
        let mut table = Vec::new();
        for word in [2u32, 1, 1, 0] {
            table.extend_from_slice(&word.to_le_bytes());
        }
        table.extend_from_slice(&[0u8; 8]);
        // buckets: first symbol of each chain
        for word in [1u32, 3] {
            table.extend_from_slice(&word.to_le_bytes());
        }
        // chains for symbols 1..=4, symbol 4 ends the last chain
        for word in [0x10u32, 0x21, 0x30, 0x41] {
            table.extend_from_slice(&word.to_le_bytes());
        }

        let mut image = vec![0u8; 0x20];
        image.extend_from_slice(&table);
        assert_eq!(gnu_hash_count(&image, 0x20), Some(5));
    }

    #[test]
    fn test_gnu_hash_empty_buckets() {
        let mut image = Vec::new();
        for word in [1u32, 3, 0, 0, 0] {
            image.extend_from_slice(&word.to_le_bytes());
        }
        assert_eq!(gnu_hash_count(&image, 0), Some(3));
    }
}
