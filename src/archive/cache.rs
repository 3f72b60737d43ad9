use crate::archive::loader::load_archive_with;
use crate::archive::loader::TableReader;
use crate::archive::loader::WorkbookReader;
use crate::archive::options::ArchiveOptions;
use crate::archive::Archive;
use crate::error::ClippingsError;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Session-owned memo of the last load of a directory.
///
/// The archive is loaded on first use and kept until [`ArchiveCache::invalidate`]
/// or [`ArchiveCache::reload`]. Callers holding an earlier `Arc<Archive>` keep
/// their snapshot.
pub struct ArchiveCache<R: TableReader = WorkbookReader> {
    directory: PathBuf,
    options: ArchiveOptions,
    reader: R,
    archive: Option<Arc<Archive>>,
}

impl ArchiveCache<WorkbookReader> {
    pub fn new(directory: impl Into<PathBuf>, options: ArchiveOptions) -> Self {
        Self::with_reader(directory, options, WorkbookReader)
    }
}

impl<R: TableReader> ArchiveCache<R> {
    pub fn with_reader(directory: impl Into<PathBuf>, options: ArchiveOptions, reader: R) -> Self {
        Self {
            directory: directory.into(),
            options,
            reader,
            archive: None,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn is_loaded(&self) -> bool {
        self.archive.is_some()
    }

    /// Returns the cached archive, loading the directory on first use.
    pub fn get(&mut self) -> Result<Arc<Archive>, ClippingsError> {
        if let Some(archive) = &self.archive {
            return Ok(Arc::clone(archive));
        }
        debug!(directory = %self.directory.display(), "Loading archive");
        let archive = Arc::new(load_archive_with(&self.reader, &self.directory, self.options.clone())?);
        self.archive = Some(Arc::clone(&archive));
        Ok(archive)
    }

    pub fn invalidate(&mut self) {
        self.archive = None;
    }

    /// Drops the cached archive and rescans the directory.
    pub fn reload(&mut self) -> Result<Arc<Archive>, ClippingsError> {
        self.invalidate();
        self.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::Table;
    use std::cell::Cell;

    /// Returns one single-row table per file and counts the reads.
    #[derive(Default)]
    struct CountingReader {
        reads: Cell<usize>,
    }

    impl TableReader for CountingReader {
        fn read_table(&self, _path: &Path, _header_row: usize) -> Result<Table, ClippingsError> {
            self.reads.set(self.reads.get() + 1);
            Ok(Table {
                columns: vec!["Titulo".to_owned()],
                rows: vec![vec!["Lluvias".into()]],
            })
        }
    }

    #[test]
    fn loads_once_until_invalidated() {
        let directory = tempfile::tempdir().unwrap();
        std::fs::write(directory.path().join("tomo1.xlsx"), b"").unwrap();
        let mut cache = ArchiveCache::with_reader(directory.path(), ArchiveOptions::default(), CountingReader::default());
        assert!(!cache.is_loaded());

        let first = cache.get().unwrap();
        let second = cache.get().unwrap();
        assert!(cache.is_loaded());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.reader.reads.get(), 1);

        cache.invalidate();
        assert!(!cache.is_loaded());
        let third = cache.get().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(cache.reader.reads.get(), 2);
    }

    #[test]
    fn reload_picks_up_new_files() {
        let directory = tempfile::tempdir().unwrap();
        std::fs::write(directory.path().join("tomo1.xlsx"), b"").unwrap();
        let mut cache = ArchiveCache::with_reader(directory.path(), ArchiveOptions::default(), CountingReader::default());
        let before = cache.get().unwrap();
        assert_eq!(before.len(), 1);

        std::fs::write(directory.path().join("tomo2.xlsx"), b"").unwrap();
        assert_eq!(cache.get().unwrap().len(), 1);
        let after = cache.reload().unwrap();
        assert_eq!(after.len(), 2);
        assert_eq!(after.file_count(), 2);
        // Earlier snapshots are untouched
        assert_eq!(before.len(), 1);
    }

    #[test]
    fn default_reader_loads_empty_directories() {
        let directory = tempfile::tempdir().unwrap();
        let mut cache = ArchiveCache::new(directory.path(), ArchiveOptions::default());
        assert!(cache.get().unwrap().is_empty());
        assert_eq!(cache.directory(), directory.path());
    }
}
