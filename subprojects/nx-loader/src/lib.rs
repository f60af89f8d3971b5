//! # nx-loader
//! Loader for Nintendo Switch NSO executables.
//!
//! Turns the bytes of an NSO file into a flat, addressable memory image, the
//! typed memory regions needed to map it, and (when the module carries a MOD0
//! header) the dynamic symbol table used to label addresses.
//!
//! This crate provides four layers:
//! - `raw`: Low-level binary structure definitions using `zerocopy`
//! - `read`: Validated views over the raw structures
//! - `load`: The loading pipeline (decompression, layout, MOD0 and symbols)
//! - `write`: A builder for well-formed NSO files
//!
//! ```no_run
//! let bytes = std::fs::read("main").unwrap();
//! if nx_loader::is_valid(&bytes) {
//!     let nso = nx_loader::load(&bytes).unwrap();
//!     for region in nso.regions() {
//!         println!("{} {:#x} {:#x}", region.name, region.start, region.size);
//!     }
//! }
//! ```
//!
//! # References
//! - [switchbrew NSO](https://switchbrew.org/wiki/NSO)
//! - [switchbrew NRO (MOD0)](https://switchbrew.org/wiki/NRO#MOD)

pub mod load;
pub mod raw;
pub mod read;
pub mod segment;
pub mod write;

pub use self::{
    load::{
        Diagnostic, HashCheck, Image, LoadError, LoadOptions, LoadedNso, MemoryRegion, Mod0Info,
        Symbol, SymbolTable, is_valid, load, load_with,
    },
    segment::{Permissions, SegmentKind},
};
