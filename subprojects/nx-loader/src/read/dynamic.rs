use zerocopy::FromBytes;

use crate::raw::dynamic::{DT_NULL, Elf64Dyn};

/// Borrowed `.dynamic` array, excluding its `DT_NULL` terminator.
#[derive(Clone, Copy)]
pub struct Dynamic<'a> {
    entries: &'a [Elf64Dyn],
}

impl<'a> Dynamic<'a> {
    /// Parse a `.dynamic` array starting at the beginning of `bytes`.
    ///
    /// The array must be terminated by a `DT_NULL` entry that lies entirely
    /// within `bytes`.
    pub fn try_from_bytes(bytes: &'a [u8]) -> Result<Self, FromBytesError> {
        let (all, _) = <[Elf64Dyn]>::ref_from_prefix(bytes)
            .map_err(|_| FromBytesError::Unterminated { entries: 0 })?;

        let len = all
            .iter()
            .position(|entry| entry.tag.get() == DT_NULL)
            .ok_or(FromBytesError::Unterminated {
                entries: all.len(),
            })?;

        Ok(Self {
            entries: &all[..len],
        })
    }

    /// Entries in file order.
    pub fn entries(&self) -> &'a [Elf64Dyn] {
        self.entries
    }

    /// Value of the first entry with the given tag.
    pub fn get(&self, tag: i64) -> Option<u64> {
        self.entries
            .iter()
            .find(|entry| entry.tag.get() == tag)
            .map(|entry| entry.value.get())
    }
}

/// Errors that can occur when parsing a `.dynamic` array
#[derive(Debug, thiserror::Error)]
pub enum FromBytesError {
    /// No `DT_NULL` entry before the end of the buffer
    #[error("unterminated .dynamic array: {entries} entries before end of buffer")]
    Unterminated {
        /// Complete entries read before running out of bytes
        entries: usize,
    },
}
