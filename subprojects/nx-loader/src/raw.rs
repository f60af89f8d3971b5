//! Raw binary structure definitions for NSO executables and the dynamic-linking
//! metadata embedded in them.
//!
//! This module contains zero-copy struct definitions using the `zerocopy` crate.
//! All structures are defined with `#[repr(C)]` and use unaligned little-endian
//! field types, so they can be viewed at any offset of a byte buffer.
//!
//! For validated access with error handling, see the `read` module.

pub mod dynamic;
pub mod mod0;
pub mod nso;
pub mod symbol;
