//! Builders for NSO files.
//!
//! Builders follow a consistent pattern:
//!
//! 1. Create a new builder with `Builder::new()`
//! 2. Configure it with chainable setter methods
//! 3. Call `.build()` to generate the final byte buffer
//!
//! # Example
//!
//! ```no_run
//! use nx_loader::write::NsoBuilder;
//!
//! let nso = NsoBuilder::new()
//!     .text(vec![0u8; 0x100])
//!     .data(vec![0u8; 0x40])
//!     .rodata(b"hello".to_vec())
//!     .build()
//!     .expect("failed to build NSO");
//! ```

pub mod nso;

pub use nso::NsoBuilder;
