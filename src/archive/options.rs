/// Number of records shown when no query is active.
pub const DEFAULT_PREVIEW_SIZE: usize = 10;

/// Load and browse settings of an archive session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveOptions {
    /// Attach the source file name of every record as an `Origen` column
    pub provenance: bool,
    /// Records returned for an empty query
    pub preview_size: usize,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            provenance: false,
            preview_size: DEFAULT_PREVIEW_SIZE,
        }
    }
}

impl ArchiveOptions {
    pub fn with_provenance(mut self, provenance: bool) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn with_preview_size(mut self, preview_size: usize) -> Self {
        self.preview_size = preview_size;
        self
    }
}
