use zerocopy::FromBytes;

use crate::raw::mod0::{MOD0_MAGIC, Mod0Header};

/// High-level MOD0 parser with offset accessors.
#[derive(Clone, Copy)]
pub struct Mod0<'a> {
    header: &'a Mod0Header,
}

impl<'a> Mod0<'a> {
    /// Parse MOD0 from bytes with magic validation.
    pub fn try_from_bytes(bytes: &'a [u8]) -> Result<Self, FromBytesError> {
        let header = Mod0Header::ref_from_prefix(bytes)
            .map_err(|_| FromBytesError::BufferTooSmall {
                required: size_of::<Mod0Header>(),
                available: bytes.len(),
            })?
            .0;

        if header.magic.get() != MOD0_MAGIC {
            return Err(FromBytesError::InvalidMagic {
                found: header.magic.get(),
            });
        }

        Ok(Self { header })
    }

    /// Get the MOD0 header.
    pub fn header(&self) -> &'a Mod0Header {
        self.header
    }

    /// Get offset to .dynamic section.
    pub fn dynamic_offset(&self) -> i32 {
        self.header.dynamic_offset.get()
    }

    /// Get offset to BSS start.
    pub fn bss_start_offset(&self) -> i32 {
        self.header.bss_start_offset.get()
    }

    /// Get offset to BSS end.
    pub fn bss_end_offset(&self) -> i32 {
        self.header.bss_end_offset.get()
    }
}

/// Errors that can occur when parsing MOD0 from bytes
#[derive(Debug, thiserror::Error)]
pub enum FromBytesError {
    /// Buffer is too small to contain the required data
    #[error("buffer too small: need {required} bytes, have {available}")]
    BufferTooSmall {
        /// Number of bytes required
        required: usize,
        /// Number of bytes available
        available: usize,
    },
    /// Magic number does not match MOD0 (0x30444f4d)
    #[error("invalid magic: expected 0x30444f4d (MOD0), found {found:#010x}")]
    InvalidMagic {
        /// Found magic number
        found: u32,
    },
}
