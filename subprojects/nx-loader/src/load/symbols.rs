use std::collections::BTreeMap;

use log::{debug, warn};
use zerocopy::FromBytes;

use super::{
    error::{Diagnostic, SkipReason, TableFault},
    mod0::SymbolTableLocation,
};
use crate::raw::symbol::{Elf64Sym, SHN_UNDEF};

/// Symbol type (`STT_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolType {
    /// Unspecified
    NoType,
    /// Data object
    Object,
    /// Function
    Func,
    /// Section
    Section,
    /// Source file
    File,
    /// Uninitialised common block
    Common,
    /// Thread-local storage object
    Tls,
    /// OS- or processor-specific type
    Other(u8),
}

impl SymbolType {
    fn from_info(info: u8) -> Self {
        match info & 0xF {
            0 => SymbolType::NoType,
            1 => SymbolType::Object,
            2 => SymbolType::Func,
            3 => SymbolType::Section,
            4 => SymbolType::File,
            5 => SymbolType::Common,
            6 => SymbolType::Tls,
            other => SymbolType::Other(other),
        }
    }
}

/// Symbol binding (`STB_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolBinding {
    /// Not visible outside the module
    Local,
    /// Visible to every module
    Global,
    /// Global with lower precedence
    Weak,
    /// OS- or processor-specific binding
    Other(u8),
}

impl SymbolBinding {
    fn from_info(info: u8) -> Self {
        match info >> 4 {
            0 => SymbolBinding::Local,
            1 => SymbolBinding::Global,
            2 => SymbolBinding::Weak,
            other => SymbolBinding::Other(other),
        }
    }
}

/// A named address from the dynamic symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Symbol name
    pub name: String,
    /// Virtual address (image base + symbol value); meaningless for imports
    pub address: u64,
    /// Size of the object or function, 0 when unknown
    pub size: u64,
    /// Symbol type
    pub kind: SymbolType,
    /// Symbol binding
    pub binding: SymbolBinding,
    /// Section index, [`SHN_UNDEF`] for imports
    pub section_index: u16,
}

impl Symbol {
    /// Whether the symbol is defined in this module rather than imported.
    pub fn is_defined(&self) -> bool {
        self.section_index != SHN_UNDEF
    }
}

/// Dynamic symbols in table order, indexed by address.
///
/// Undefined symbols are kept in the sequence but are never returned by
/// the address lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    by_address: BTreeMap<u64, Vec<usize>>,
}

impl SymbolTable {
    /// Number of symbols, imports included.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether the table holds no symbols.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Iterate over all symbols in table order.
    pub fn iter(&self) -> core::slice::Iter<'_, Symbol> {
        self.symbols.iter()
    }

    /// Get the symbol at `index` in table order.
    ///
    /// Skipped entries are not counted, so this is not the ELF symbol index.
    pub fn get(&self, index: usize) -> Option<&Symbol> {
        self.symbols.get(index)
    }

    /// All symbols with the given name, in table order.
    pub fn lookup<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Symbol> + 'a {
        self.symbols.iter().filter(move |symbol| symbol.name == name)
    }

    /// All defined symbols starting exactly at `address`, in table order.
    pub fn at_address(&self, address: u64) -> impl Iterator<Item = &Symbol> {
        self.by_address
            .get(&address)
            .into_iter()
            .flatten()
            .map(|&index| &self.symbols[index])
    }

    /// The defined symbol covering `address`.
    ///
    /// Only symbols starting at the closest address at or below `address`
    /// are considered. A zero-sized symbol covers its own address only.
    pub fn containing(&self, address: u64) -> Option<&Symbol> {
        let (&start, indices) = self.by_address.range(..=address).next_back()?;
        indices
            .iter()
            .map(|&index| &self.symbols[index])
            .find(|symbol| address < start.saturating_add(symbol.size.max(1)))
    }
}

impl From<Vec<Symbol>> for SymbolTable {
    fn from(symbols: Vec<Symbol>) -> Self {
        let mut by_address = BTreeMap::<u64, Vec<usize>>::new();
        for (index, symbol) in symbols.iter().enumerate() {
            if !symbol.is_defined() {
                continue;
            }
            by_address.entry(symbol.address).or_default().push(index);
        }
        Self {
            symbols,
            by_address,
        }
    }
}

impl<'a> IntoIterator for &'a SymbolTable {
    type Item = &'a Symbol;
    type IntoIter = core::slice::Iter<'a, Symbol>;

    fn into_iter(self) -> Self::IntoIter {
        self.symbols.iter()
    }
}

/// Read the dynamic symbol table of an image loaded at `base`.
///
/// The number of entries comes from the hash table when one was found;
/// otherwise the table is assumed to end where the string table starts, or
/// at the end of the image when the string table precedes it. Entry 0 and
/// unnamed entries are skipped silently, entries with a bad name offset are
/// skipped with a [`Diagnostic::SymbolEntrySkipped`].
pub fn build_symbols(
    image: &[u8],
    base: u64,
    location: &SymbolTableLocation,
    diagnostics: &mut Vec<Diagnostic>,
) -> SymbolTable {
    let mut reject = |fault: TableFault| {
        warn!("symbol table rejected: {fault}");
        diagnostics.push(Diagnostic::SymbolTableRejected(fault));
        SymbolTable::default()
    };

    if location.syment < size_of::<Elf64Sym>() as u64 {
        return reject(TableFault::EntrySizeTooSmall {
            syment: location.syment,
        });
    }
    let Some(strtab) = table_bytes(image, location.strtab, location.strsz) else {
        return reject(TableFault::StringTableOutOfImage {
            offset: location.strtab,
        });
    };
    if location.symtab >= image.len() as u64 {
        return reject(TableFault::SymbolTableOutOfImage {
            offset: location.symtab,
        });
    }

    let limit = match location.count {
        Some(count) => count,
        None if location.strtab > location.symtab => {
            (location.strtab - location.symtab) / location.syment
        }
        None => (image.len() as u64 - location.symtab) / location.syment,
    };
    debug!(
        "reading up to {limit} symbols at {:#x}",
        base + location.symtab
    );

    let mut symbols = Vec::new();
    for index in 0..limit {
        let Some(entry) = location
            .syment
            .checked_mul(index)
            .and_then(|offset| offset.checked_add(location.symtab))
            .and_then(|offset| usize::try_from(offset).ok())
            .and_then(|offset| image.get(offset..))
            .and_then(|bytes| Elf64Sym::read_from_prefix(bytes).ok())
            .map(|(entry, _)| entry)
        else {
            debug!("symbol table ends at image end after {index} entries");
            break;
        };

        let name_offset = entry.name.get();
        if index == 0 || name_offset == 0 {
            continue;
        }

        let name = match read_name(strtab, name_offset) {
            Ok(name) => name,
            Err(reason) => {
                warn!("skipping symbol {index}: {reason}");
                diagnostics.push(Diagnostic::SymbolEntrySkipped {
                    index: index as usize,
                    name_offset,
                    reason,
                });
                continue;
            }
        };
        if name.is_empty() {
            continue;
        }

        symbols.push(Symbol {
            name,
            address: base.wrapping_add(entry.value.get()),
            size: entry.size.get(),
            kind: SymbolType::from_info(entry.info),
            binding: SymbolBinding::from_info(entry.info),
            section_index: entry.shndx.get(),
        });
    }

    SymbolTable::from(symbols)
}

/// The string table, clamped to the image.
fn table_bytes(image: &[u8], offset: u64, size: u64) -> Option<&[u8]> {
    let start = usize::try_from(offset).ok()?;
    let end = usize::try_from(offset.saturating_add(size))
        .unwrap_or(usize::MAX)
        .min(image.len());
    image.get(start..end).filter(|bytes| !bytes.is_empty())
}

fn read_name(strtab: &[u8], offset: u32) -> Result<String, SkipReason> {
    let tail = strtab
        .get(offset as usize..)
        .filter(|tail| !tail.is_empty())
        .ok_or(SkipReason::NameOutOfBounds)?;
    let len = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or(SkipReason::UnterminatedName)?;
    Ok(String::from_utf8_lossy(&tail[..len]).into_owned())
}
