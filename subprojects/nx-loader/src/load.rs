//! The loading pipeline.
//!
//! `header -> segments (x3, independent) -> layout -> MOD0 -> symbols`
//!
//! Each stage is a pure function over the outputs of the previous ones.
//! Fatal problems stop the load with a [`LoadError`]; recoverable anomalies
//! are collected as [`Diagnostic`]s on the result.

mod error;
mod layout;
mod mod0;
mod options;
mod segments;
mod symbols;

use log::warn;

pub use self::{
    error::{
        DecompressError, Diagnostic, DynamicError, LoadError, Region, SkipReason, TableFault,
    },
    layout::{Image, Layout, MemoryRegion, RegionKind, build_image},
    mod0::{DynamicEntry, Mod0Info, SymbolTableLocation, resolve_mod0},
    options::{HashCheck, LoadOptions},
    segments::{Segment, decompress, verify_hash},
    symbols::{Symbol, SymbolBinding, SymbolTable, SymbolType, build_symbols},
};
use crate::{
    raw::nso::{NSO_MAGIC, NsoHeader},
    read::Nso,
};

/// Whether `bytes` starts with the NSO magic. Reads at most four bytes.
pub fn is_valid(bytes: &[u8]) -> bool {
    bytes
        .first_chunk::<4>()
        .is_some_and(|magic| u32::from_le_bytes(*magic) == NSO_MAGIC)
}

/// Load an NSO with the default [`LoadOptions`].
pub fn load(bytes: &[u8]) -> Result<LoadedNso, LoadError> {
    load_with(bytes, &LoadOptions::default())
}

/// Load an NSO.
pub fn load_with(bytes: &[u8], options: &LoadOptions) -> Result<LoadedNso, LoadError> {
    let nso = Nso::try_from_bytes(bytes)?;
    let segments = segments::load_segments(&nso, options)?;
    let text_len = segments[0].data().len();

    let mut diagnostics = Vec::new();
    let Layout { image, mut regions } = build_image(segments, &mut diagnostics)?;

    let mod0 = match resolve_mod0(image.bytes(), image.base(), text_len) {
        Ok(mod0) => mod0,
        Err(err) if options.strict_dynamic => return Err(err.into()),
        Err(err) => {
            warn!("{err}; continuing without symbols");
            diagnostics.push(Diagnostic::MalformedDynamic(err));
            None
        }
    };

    if let Some(bss) = mod0
        .as_ref()
        .and_then(|mod0| mod0.bss.clone())
        .filter(|bss| !bss.is_empty())
    {
        regions.push(MemoryRegion::bss(bss));
    }

    let symbols = mod0
        .as_ref()
        .and_then(|mod0| mod0.symbol_table.as_ref())
        .map(|location| build_symbols(image.bytes(), image.base(), location, &mut diagnostics))
        .unwrap_or_default();

    Ok(LoadedNso {
        header: *nso.header(),
        image,
        regions,
        mod0,
        symbols,
        diagnostics,
    })
}

/// A loaded NSO module.
#[derive(Debug, Clone)]
pub struct LoadedNso {
    header: NsoHeader,
    image: Image,
    regions: Vec<MemoryRegion>,
    mod0: Option<Mod0Info>,
    symbols: SymbolTable,
    diagnostics: Vec<Diagnostic>,
}

impl LoadedNso {
    /// Copy of the file header.
    pub fn header(&self) -> &NsoHeader {
        &self.header
    }

    /// Get the 32-byte module ID.
    pub fn module_id(&self) -> &[u8; 32] {
        &self.header.module_id
    }

    /// Entry point: the start of the text segment.
    pub fn entry_point(&self) -> u64 {
        self.image.base()
    }

    /// The flat memory image.
    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Regions to map: `.text`, `.data`, `.rodata`, then `.bss` when present.
    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    /// MOD0 metadata, if the module has a MOD0 header.
    pub fn mod0(&self) -> Option<&Mod0Info> {
        self.mod0.as_ref()
    }

    /// Dynamic symbols; empty without MOD0 or a complete `.dynamic`.
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Non-fatal anomalies seen while loading.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}
