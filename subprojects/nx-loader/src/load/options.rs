/// When segment hashes are verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashCheck {
    /// Verify the segments whose hash flag is set in the header
    #[default]
    FromFlags,
    /// Verify every segment
    Always,
    /// Never hash
    Never,
}

impl HashCheck {
    pub(crate) fn enabled(self, flagged: bool) -> bool {
        match self {
            HashCheck::FromFlags => flagged,
            HashCheck::Always => true,
            HashCheck::Never => false,
        }
    }
}

/// Options for [`load_with`](super::load_with).
///
/// ```
/// use nx_loader::{HashCheck, LoadOptions};
///
/// let options = LoadOptions::new()
///     .hash_check(HashCheck::Never)
///     .parallel(false);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub(crate) hash_check: HashCheck,
    pub(crate) parallel: bool,
    pub(crate) strict_dynamic: bool,
}

impl LoadOptions {
    /// Create the default options.
    ///
    /// Hashes are checked as flagged, segments are decompressed in parallel
    /// and a malformed `.dynamic` array is reported as a diagnostic.
    pub fn new() -> Self {
        Self {
            hash_check: HashCheck::FromFlags,
            parallel: true,
            strict_dynamic: false,
        }
    }

    /// Set the hash verification policy.
    pub fn hash_check(mut self, hash_check: HashCheck) -> Self {
        self.hash_check = hash_check;
        self
    }

    /// Decompress the three segments on separate threads.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Fail the load with [`LoadError::MalformedDynamic`](super::LoadError::MalformedDynamic)
    /// instead of continuing without symbols.
    pub fn strict_dynamic(mut self, strict: bool) -> Self {
        self.strict_dynamic = strict;
        self
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::new()
    }
}
