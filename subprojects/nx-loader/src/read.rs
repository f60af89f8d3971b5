//! Validated views over the raw structures.
//!
//! This module provides safe parsing interfaces over the raw binary structures.
//! Each parser validates magic numbers and sizes and borrows from the input
//! buffer instead of copying it.

mod dynamic;
mod mod0;
mod nso;

pub use self::{
    dynamic::{Dynamic, FromBytesError as DynamicFromBytesError},
    mod0::{FromBytesError as Mod0FromBytesError, Mod0},
    nso::{FromBytesError as NsoFromBytesError, Nso},
};
